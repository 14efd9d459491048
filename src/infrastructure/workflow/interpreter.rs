//! Step interpreter for a single execution
//!
//! One `Interpreter` is owned by the task driving one execution. It is the
//! only writer of the execution record and the only sender on its log
//! channel; dropping it closes the log stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor_impl::ExecutorInner;
use crate::domain::shell::{OutputLine, ShellRequest};
use crate::domain::template::substitute;
use crate::domain::workflow::{
    first_match, ExecutionStatus, LogLevel, Step, StepAction, StepActionType, StepType,
    VariableScope, Workflow, WorkflowError, WorkflowExecution,
};
use crate::infrastructure::observability::{
    record_execution, record_step, ExecutionMetricParams, StepMetricParams, StepOutcome,
};

/// Result of running one step body
#[derive(Debug)]
struct StepRun {
    /// Accumulated stdout and stderr lines, newline terminated
    output: String,
    exit_code: i32,
    result: Result<(), WorkflowError>,
}

impl StepRun {
    fn finished(result: Result<(), WorkflowError>) -> Self {
        let exit_code = if result.is_ok() { 0 } else { -1 };
        Self {
            output: String::new(),
            exit_code,
            result,
        }
    }

    fn outcome(&self) -> StepOutcome {
        match self.result {
            Ok(()) => StepOutcome::Success,
            Err(WorkflowError::Cancelled) => StepOutcome::Cancelled,
            Err(_) => StepOutcome::Failure,
        }
    }
}

pub(super) struct Interpreter {
    pub(super) inner: Arc<ExecutorInner>,
    pub(super) workflow: Workflow,
    pub(super) scope: VariableScope,
    pub(super) record: Arc<RwLock<WorkflowExecution>>,
    pub(super) status: watch::Sender<ExecutionStatus>,
    pub(super) logs: mpsc::Sender<String>,
    pub(super) cancel: CancellationToken,
    /// Workflow IDs from the top-level run down to this one
    pub(super) ancestry: Vec<String>,
}

impl Interpreter {
    /// Drive the execution to a terminal status
    pub(super) async fn run(self) {
        let started = Instant::now();

        self.info("", format!("Starting workflow: {}", self.workflow.name()))
            .await;

        let status = self.interpret().await;
        self.finish(status, started).await;
    }

    async fn interpret(&self) -> ExecutionStatus {
        let steps = self.workflow.steps();
        let index = self.workflow.step_index();
        let total = steps.len();
        let mut cursor = 0;

        while cursor < total {
            let step = &steps[cursor];

            if self.cancel.is_cancelled() {
                self.info(step.id(), "Execution cancelled").await;
                return ExecutionStatus::Cancelled;
            }

            self.info(
                step.id(),
                format!("Step {}/{}: {}", cursor + 1, total, step.name()),
            )
            .await;

            let step_started = Instant::now();
            let run = self.run_step(step).await;
            record_step(StepMetricParams {
                step_type: step.step_type(),
                outcome: run.outcome(),
                duration: step_started.elapsed(),
            });

            if self.cancel.is_cancelled() {
                self.info(step.id(), "Execution cancelled").await;
                return ExecutionStatus::Cancelled;
            }

            let mut next = cursor + 1;

            // Conditions first; a matched jump lands one past its target
            if let Some(condition) = first_match(step.conditions(), &run.output, run.exit_code) {
                let action = &condition.action;
                self.info(step.id(), format!("Condition matched: {}", action.action_type))
                    .await;

                match action.action_type {
                    StepActionType::Stop => {
                        self.info("", "Workflow stopped by condition").await;
                        return ExecutionStatus::Completed;
                    }
                    StepActionType::JumpTo => {
                        if let Some(target) = self.resolve_target(step, action, &index).await {
                            self.info(
                                step.id(),
                                format!("Jumping to step: {}", steps[target].name()),
                            )
                            .await;
                            next = target + 1;
                        }
                    }
                    StepActionType::ExecuteStep => {
                        self.execute_inline(step, action, &index).await;
                    }
                    StepActionType::Continue | StepActionType::Unknown => {}
                }
            }

            // Then the step's own hooks; a hook jump lands on its target
            let hook = match &run.result {
                Err(err) => {
                    self.error(step.id(), format!("Step failed: {}", err)).await;
                    match step.on_failure() {
                        Some(action) => action,
                        None => return ExecutionStatus::Failed,
                    }
                }
                Ok(()) => match step.on_success() {
                    Some(action) => action,
                    None => {
                        cursor = next;
                        continue;
                    }
                },
            };

            match hook.action_type {
                StepActionType::Stop => next = total,
                StepActionType::JumpTo => {
                    if let Some(target) = self.resolve_target(step, hook, &index).await {
                        next = target;
                    }
                }
                StepActionType::ExecuteStep => self.execute_inline(step, hook, &index).await,
                StepActionType::Continue | StepActionType::Unknown => {}
            }

            cursor = next;
        }

        self.info("", "Workflow completed successfully").await;
        ExecutionStatus::Completed
    }

    async fn resolve_target(
        &self,
        step: &Step,
        action: &StepAction,
        index: &HashMap<&str, usize>,
    ) -> Option<usize> {
        let target = index.get(action.target.as_str()).copied();
        if target.is_none() {
            warn!(
                workflow_id = %self.workflow.id(),
                step_id = %step.id(),
                "Ignoring {} to unknown step '{}'",
                action.action_type,
                action.target
            );
            self.error(step.id(), format!("Target step not found: {}", action.target))
                .await;
        }
        target
    }

    /// Run the target step's command in place, ignoring its result
    async fn execute_inline(
        &self,
        step: &Step,
        action: &StepAction,
        index: &HashMap<&str, usize>,
    ) {
        if let Some(target) = self.resolve_target(step, action, index).await {
            let target = &self.workflow.steps()[target];
            self.info(step.id(), format!("Executing step: {}", target.name()))
                .await;
            let _ = self.run_command(target).await;
        }
    }

    async fn run_step(&self, step: &Step) -> StepRun {
        match step.step_type() {
            StepType::Command => self.run_command(step).await,
            StepType::WorkflowRef => StepRun::finished(self.run_sub_workflow(step).await),
            StepType::Unknown => {
                StepRun::finished(Err(WorkflowError::unknown_step_type(step.step_type().to_string())))
            }
        }
    }

    async fn run_command(&self, step: &Step) -> StepRun {
        let command = substitute(step.content(), &self.scope.for_step(step));
        self.info(step.id(), format!("$ {}", command)).await;

        let mut request = ShellRequest::new(command);
        if let Some(ref dir) = self.inner.config.working_dir {
            request = request.with_cwd(dir);
        }

        let (tx, mut rx) = mpsc::channel::<OutputLine>(self.inner.config.log_buffer.max(1));
        let mut output = String::new();

        let forward = async {
            while let Some(line) = rx.recv().await {
                output.push_str(line.text());
                output.push('\n');
                if line.is_stderr() {
                    self.error(step.id(), line.text()).await;
                } else {
                    self.info(step.id(), line.text()).await;
                }
            }
        };

        let (result, ()) = tokio::join!(
            self.inner.shell.run(request, self.cancel.clone(), tx),
            forward
        );

        match result {
            Ok(exit) if exit.success() => StepRun {
                output,
                exit_code: exit.exit_code,
                result: Ok(()),
            },
            Ok(exit) => StepRun {
                result: Err(WorkflowError::process_exit(exit.exit_code, output.clone())),
                output,
                exit_code: exit.exit_code,
            },
            Err(err) => StepRun {
                output,
                exit_code: -1,
                result: Err(err.into()),
            },
        }
    }

    /// Run the referenced workflow to completion, relaying its log lines
    async fn run_sub_workflow(&self, step: &Step) -> Result<(), WorkflowError> {
        let child_id = step.content().trim().to_string();
        self.info(step.id(), format!("Executing sub-workflow: {}", child_id))
            .await;

        let mut started = self
            .inner
            .clone()
            .start(
                child_id.clone(),
                self.scope.values().clone(),
                self.cancel.child_token(),
                self.ancestry.clone(),
            )
            .await?;

        while let Some(line) = started.logs.next().await {
            self.info(step.id(), format!("  {}", line)).await;
        }

        match started.handle.wait().await {
            ExecutionStatus::Completed => Ok(()),
            status => Err(WorkflowError::sub_workflow(child_id, status.as_str())),
        }
    }

    async fn info(&self, step_id: &str, message: impl Into<String>) {
        self.log(step_id, LogLevel::Info, message.into()).await;
    }

    async fn error(&self, step_id: &str, message: impl Into<String>) {
        self.log(step_id, LogLevel::Error, message.into()).await;
    }

    /// Append to the record, then publish on the live stream
    async fn log(&self, step_id: &str, level: LogLevel, message: String) {
        self.record
            .write()
            .await
            .push_log(step_id, level, message.clone());

        // The consumer may have dropped the stream; the record still has the line
        let _ = self.logs.send(message).await;
    }

    async fn finish(&self, status: ExecutionStatus, started: Instant) {
        let (changed, execution_id) = {
            let mut record = self.record.write().await;
            (record.finish(status), record.id.clone())
        };

        if !changed {
            debug!(execution_id = %execution_id, "Execution already terminal");
            return;
        }

        self.status.send_replace(status);

        record_execution(ExecutionMetricParams {
            workflow_id: self.workflow.id().as_str(),
            status,
            duration: started.elapsed(),
        });

        info!(
            execution_id = %execution_id,
            workflow_id = %self.workflow.id(),
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Workflow execution finished"
        );
    }
}
