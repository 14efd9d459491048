//! Workflow executor trait

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::error::WorkflowError;
use super::execution::ExecutionHandle;

/// Live log lines of one execution; ends when the run reaches a terminal status
pub type LogStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// An execution that has been started
pub struct StartedExecution {
    pub handle: ExecutionHandle,
    pub logs: LogStream,
}

impl std::fmt::Debug for StartedExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartedExecution")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Trait for workflow execution
///
/// `execute` returns as soon as the execution record exists; the steps run on
/// an independent task.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    /// Start a workflow with its own cancellation token
    async fn execute(
        &self,
        workflow_id: &str,
        inputs: HashMap<String, String>,
    ) -> Result<StartedExecution, WorkflowError> {
        self.execute_with_cancellation(workflow_id, inputs, CancellationToken::new())
            .await
    }

    /// Start a workflow that stops when `cancel` fires
    async fn execute_with_cancellation(
        &self,
        workflow_id: &str,
        inputs: HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<StartedExecution, WorkflowError>;
}
