//! Workflow domain module
//!
//! A workflow is a named, ordered list of steps. Each step either runs a shell
//! command template or references another workflow. Conditions evaluated
//! against a step's output and exit code, together with the step's
//! success/failure hooks, can stop the run, jump to another step, or run a
//! step inline.
//!
//! ## Variable References
//!
//! Command steps use `{NAME}` placeholders, resolved from the execution's
//! merged scope (see [`VariableScope`]).

mod context;
mod entity;
mod error;
mod execution;
mod executor;
pub mod repository;
mod step_types;

pub use context::VariableScope;
pub use entity::{
    validate_workflow_id, VariableType, Workflow, WorkflowId, WorkflowVariable, MAX_ID_LENGTH,
};
pub use error::WorkflowError;
pub use execution::{
    ExecutionHandle, ExecutionLog, ExecutionStatus, LogLevel, WorkflowExecution,
};
pub use executor::{LogStream, StartedExecution, WorkflowExecutor};
pub use repository::WorkflowRepository;
pub use step_types::{
    first_match, Condition, ConditionType, Step, StepAction, StepActionType, StepType,
};
