//! Workflow infrastructure implementations

mod executor_impl;
mod interpreter;
mod storage_repository;

pub use executor_impl::{WorkflowExecutorConfig, WorkflowExecutorImpl};
pub use storage_repository::StorageWorkflowRepository;
