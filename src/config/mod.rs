//! Application configuration

mod app_config;

pub use app_config::{AppConfig, ExecutorSettings, LogFormat, LoggingConfig, StorageSettings};
