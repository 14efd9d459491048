//! Infrastructure layer - Storage, process execution and service implementations

pub mod logging;
pub mod observability;
pub mod services;
pub mod shell;
pub mod storage;
pub mod variable;
pub mod workflow;
