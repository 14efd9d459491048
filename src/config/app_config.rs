use std::path::PathBuf;

use serde::Deserialize;

use crate::infrastructure::storage::{StorageConfig, StorageType};
use crate::infrastructure::workflow::WorkflowExecutorConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub logging: LoggingConfig,
    pub executor: ExecutorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `file` or `memory`
    pub backend: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Shell used as `<shell> -c <command>`
    pub shell: String,
    /// Working directory for command steps; the process's own when unset
    pub working_dir: Option<PathBuf>,
    /// Capacity of each execution's log channel
    pub log_buffer: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: None,
            log_buffer: 100,
        }
    }
}

impl StorageSettings {
    /// Resolve the backend name; unknown names fall back to file storage
    pub fn storage_config(&self) -> StorageConfig {
        match StorageType::from_str(&self.backend) {
            Some(StorageType::InMemory) => StorageConfig::in_memory(),
            Some(StorageType::File) | None => StorageConfig::file(&self.data_dir),
        }
    }
}

impl ExecutorSettings {
    pub fn executor_config(&self) -> WorkflowExecutorConfig {
        WorkflowExecutorConfig {
            working_dir: self.working_dir.clone(),
            log_buffer: self.log_buffer,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
