//! Workflow error types

use thiserror::Error;

use crate::domain::shell::ShellError;
use crate::domain::DomainError;

/// Errors raised while loading or running a workflow
///
/// Apart from the top-level `NotFound` returned by `execute`, these are
/// recovered at the step or execution boundary and end up as a terminal
/// execution status plus log entries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Failed to start process: {0}")]
    ProcessStart(String),

    #[error("Process exited with code {exit_code}")]
    ProcessExit { exit_code: i32, output: String },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Sub-workflow cycle detected: {0}")]
    Cycle(String),

    #[error("Sub-workflow '{workflow}' ended with status {status}")]
    SubWorkflow { workflow: String, status: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn unknown_step_type(step_type: impl Into<String>) -> Self {
        Self::UnknownStepType(step_type.into())
    }

    pub fn process_start(message: impl Into<String>) -> Self {
        Self::ProcessStart(message.into())
    }

    pub fn process_exit(exit_code: i32, output: impl Into<String>) -> Self {
        Self::ProcessExit {
            exit_code,
            output: output.into(),
        }
    }

    pub fn cycle(chain: &[String]) -> Self {
        Self::Cycle(chain.join(" -> "))
    }

    pub fn sub_workflow(workflow: impl Into<String>, status: impl Into<String>) -> Self {
        Self::SubWorkflow {
            workflow: workflow.into(),
            status: status.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

impl From<ShellError> for WorkflowError {
    fn from(err: ShellError) -> Self {
        match err {
            ShellError::Spawn(msg) | ShellError::Wait(msg) => Self::ProcessStart(msg),
            ShellError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::NotFound(message),
            DomainError::Validation { message } => Self::Validation(message),
            other => Self::Storage(other.to_string()),
        }
    }
}
