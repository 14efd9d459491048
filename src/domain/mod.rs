//! Domain layer - Core entities, traits and error types

pub mod error;
pub mod shell;
pub mod storage;
pub mod template;
pub mod variable;
pub mod workflow;

pub use error::DomainError;
pub use shell::{OutputLine, ShellError, ShellExit, ShellRequest, ShellRunner};
pub use storage::{Storage, StorageEntity, StorageKey};
pub use template::CommandTemplate;
pub use variable::{GlobalVariable, VariableStore};
pub use workflow::{
    Condition, ConditionType, ExecutionHandle, ExecutionLog, ExecutionStatus, LogLevel,
    LogStream, StartedExecution, Step, StepAction, StepActionType, StepType, VariableScope,
    Workflow, WorkflowError, WorkflowExecution, WorkflowExecutor, WorkflowId,
    WorkflowRepository, WorkflowVariable,
};
