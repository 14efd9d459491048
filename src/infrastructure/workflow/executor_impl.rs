//! Workflow executor implementation

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, watch, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::interpreter::Interpreter;
use crate::domain::shell::ShellRunner;
use crate::domain::variable::VariableStore;
use crate::domain::workflow::{
    ExecutionHandle, ExecutionStatus, StartedExecution, VariableScope, WorkflowError,
    WorkflowExecution, WorkflowExecutor, WorkflowRepository,
};

/// Configuration for the workflow executor
#[derive(Debug, Clone)]
pub struct WorkflowExecutorConfig {
    /// Working directory for command steps; inherits the process's when `None`
    pub working_dir: Option<PathBuf>,

    /// Capacity of each execution's log channel
    pub log_buffer: usize,
}

impl Default for WorkflowExecutorConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            log_buffer: 100,
        }
    }
}

impl WorkflowExecutorConfig {
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_log_buffer(mut self, capacity: usize) -> Self {
        self.log_buffer = capacity;
        self
    }
}

#[derive(Debug)]
pub(super) struct ExecutorInner {
    pub(super) workflows: Arc<dyn WorkflowRepository>,
    pub(super) variables: Arc<dyn VariableStore>,
    pub(super) shell: Arc<dyn ShellRunner>,
    pub(super) config: WorkflowExecutorConfig,
}

impl ExecutorInner {
    /// Load, merge and spawn one execution
    ///
    /// `ancestry` lists the workflows already running above this one; starting
    /// any of them again is a cycle.
    pub(super) fn start(
        self: Arc<Self>,
        workflow_id: String,
        inputs: HashMap<String, String>,
        cancel: CancellationToken,
        mut ancestry: Vec<String>,
    ) -> BoxFuture<'static, Result<StartedExecution, WorkflowError>> {
        async move {
            if ancestry.iter().any(|id| *id == workflow_id) {
                ancestry.push(workflow_id);
                return Err(WorkflowError::cycle(&ancestry));
            }

            let workflow = self.workflows.get(&workflow_id).await.map_err(|e| {
                if e.is_not_found() {
                    WorkflowError::not_found(&workflow_id)
                } else {
                    WorkflowError::from(e)
                }
            })?;

            let globals = self.variables.get_all().await?;
            let scope = VariableScope::merge(globals, workflow.variables(), &inputs);

            let execution = WorkflowExecution::new(&workflow_id, scope.values().clone());
            let execution_id = execution.id.clone();
            let record = Arc::new(RwLock::new(execution));
            let (status_tx, status_rx) = watch::channel(ExecutionStatus::Running);
            let (log_tx, log_rx) = mpsc::channel(self.config.log_buffer.max(1));

            let handle = ExecutionHandle::new(
                execution_id.clone(),
                record.clone(),
                status_rx,
                cancel.clone(),
            );

            info!(
                execution_id = %execution_id,
                workflow_id = %workflow_id,
                steps = workflow.step_count(),
                depth = ancestry.len(),
                "Starting workflow execution"
            );
            debug!("Merged scope for '{}' has {} variables", workflow_id, scope.values().len());

            ancestry.push(workflow_id);
            let interpreter = Interpreter {
                inner: self,
                workflow,
                scope,
                record,
                status: status_tx,
                logs: log_tx,
                cancel,
                ancestry,
            };
            tokio::spawn(interpreter.run());

            Ok(StartedExecution {
                handle,
                logs: Box::pin(ReceiverStream::new(log_rx)),
            })
        }
        .boxed()
    }
}

/// Workflow executor backed by a repository, a variable store and a shell runner
///
/// Cloning is cheap; clones share the same collaborators.
#[derive(Debug, Clone)]
pub struct WorkflowExecutorImpl {
    inner: Arc<ExecutorInner>,
}

impl WorkflowExecutorImpl {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        variables: Arc<dyn VariableStore>,
        shell: Arc<dyn ShellRunner>,
    ) -> Self {
        Self::with_config(workflows, variables, shell, WorkflowExecutorConfig::default())
    }

    pub fn with_config(
        workflows: Arc<dyn WorkflowRepository>,
        variables: Arc<dyn VariableStore>,
        shell: Arc<dyn ShellRunner>,
        config: WorkflowExecutorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                workflows,
                variables,
                shell,
                config,
            }),
        }
    }

    pub fn config(&self) -> &WorkflowExecutorConfig {
        &self.inner.config
    }
}

#[async_trait]
impl WorkflowExecutor for WorkflowExecutorImpl {
    async fn execute_with_cancellation(
        &self,
        workflow_id: &str,
        inputs: HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<StartedExecution, WorkflowError> {
        self.inner
            .clone()
            .start(workflow_id.to_string(), inputs, cancel, Vec::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::sync::mpsc;

    use crate::domain::shell::{OutputLine, ShellError, ShellExit, ShellRequest};
    use crate::domain::variable::MockVariableStore;
    use crate::domain::workflow::repository::mock::MockWorkflowRepository;
    use crate::domain::workflow::{
        Condition, ConditionType, LogLevel, Step, StepAction, StepType, Workflow, WorkflowId,
        WorkflowVariable,
    };
    use crate::domain::DomainError;
    use crate::infrastructure::shell::ProcessShellRunner;

    /// Shell fake answering each command with canned output
    #[derive(Debug, Default)]
    struct ScriptedShell {
        responses: HashMap<String, (Vec<OutputLine>, i32)>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedShell {
        fn new() -> Self {
            Self::default()
        }

        fn respond(mut self, command: &str, stdout: &[&str], exit_code: i32) -> Self {
            let lines = stdout
                .iter()
                .map(|l| OutputLine::Stdout(l.to_string()))
                .collect();
            self.responses.insert(command.to_string(), (lines, exit_code));
            self
        }

        fn respond_stderr(mut self, command: &str, stderr: &str, exit_code: i32) -> Self {
            self.responses.insert(
                command.to_string(),
                (vec![OutputLine::Stderr(stderr.to_string())], exit_code),
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ShellRunner for ScriptedShell {
        async fn run(
            &self,
            request: ShellRequest,
            cancel: CancellationToken,
            output: mpsc::Sender<OutputLine>,
        ) -> Result<ShellExit, ShellError> {
            if cancel.is_cancelled() {
                return Err(ShellError::Cancelled);
            }
            self.calls.lock().unwrap().push(request.command.clone());

            if request.command == "spawn-error" {
                return Err(ShellError::Spawn("no such shell".to_string()));
            }

            let (lines, exit_code) = self
                .responses
                .get(&request.command)
                .cloned()
                .unwrap_or_default();
            for line in lines {
                output.send(line).await.unwrap();
            }
            Ok(ShellExit { exit_code })
        }
    }

    fn globals(pairs: &[(&str, &str)]) -> Arc<MockVariableStore> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut store = MockVariableStore::new();
        store
            .expect_get_all()
            .returning(move || Ok(values.clone()));
        Arc::new(store)
    }

    fn workflow(id: &str, steps: Vec<Step>) -> Workflow {
        Workflow::new(WorkflowId::new(id).unwrap(), format!("Workflow {}", id)).with_steps(steps)
    }

    fn executor(
        workflows: Vec<Workflow>,
        variables: Arc<MockVariableStore>,
        shell: Arc<dyn ShellRunner>,
    ) -> WorkflowExecutorImpl {
        let repo = workflows
            .into_iter()
            .fold(MockWorkflowRepository::new(), |repo, wf| repo.with_workflow(wf));
        WorkflowExecutorImpl::new(Arc::new(repo), variables, shell)
    }

    async fn run_to_end(
        executor: &WorkflowExecutorImpl,
        id: &str,
        inputs: &[(&str, &str)],
    ) -> (WorkflowExecution, Vec<String>) {
        let inputs = inputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let started = executor.execute(id, inputs).await.unwrap();
        let lines: Vec<String> = started.logs.collect().await;
        started.handle.wait().await;
        (started.handle.snapshot().await, lines)
    }

    fn has_line(lines: &[String], expected: &str) -> bool {
        lines.iter().any(|l| l == expected)
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let shell = Arc::new(ScriptedShell::new().respond("echo hi", &["hi"], 0));
        let executor = executor(
            vec![workflow(
                "basic",
                vec![
                    Step::command("a", "Say hi", "echo hi"),
                    Step::command("b", "List", "ls"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "basic", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.end_time.is_some());
        assert_eq!(shell.calls(), vec!["echo hi", "ls"]);
        assert_eq!(
            lines,
            vec![
                "Starting workflow: Workflow basic",
                "Step 1/2: Say hi",
                "$ echo hi",
                "hi",
                "Step 2/2: List",
                "$ ls",
                "Workflow completed successfully",
            ]
        );
        assert_eq!(execution.logs.len(), lines.len());
        assert_eq!(execution.logs[2].step_id, "a");
        assert!(execution.logs[0].step_id.is_empty());
    }

    #[tokio::test]
    async fn test_first_failing_step_fails_run() {
        let shell = Arc::new(ScriptedShell::new().respond_stderr("false", "boom", 1));
        let executor = executor(
            vec![workflow(
                "failing",
                vec![
                    Step::command("a", "A", "true"),
                    Step::command("b", "B", "false"),
                    Step::command("c", "C", "never"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "failing", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(shell.calls(), vec!["true", "false"]);
        assert!(has_line(&lines, "Step failed: Process exited with code 1"));
        assert!(!has_line(&lines, "Workflow completed successfully"));

        let stderr = execution.logs.iter().find(|l| l.message == "boom").unwrap();
        assert_eq!(stderr.level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_on_failure_stop_completes() {
        let shell = Arc::new(ScriptedShell::new().respond("echo hi", &["hi"], 0).respond("exit 1", &[], 1));
        let executor = executor(
            vec![workflow(
                "stopper",
                vec![
                    Step::command("a", "A", "echo hi"),
                    Step::command("b", "B", "exit 1").with_on_failure(StepAction::stop()),
                    Step::command("c", "C", "never"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "stopper", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["echo hi", "exit 1"]);
        assert!(has_line(&lines, "Step failed: Process exited with code 1"));
    }

    #[tokio::test]
    async fn test_condition_jump_lands_past_target() {
        let shell = Arc::new(ScriptedShell::new().respond("check", &["go"], 0));
        let executor = executor(
            vec![workflow(
                "jumper",
                vec![
                    Step::command("check", "Check", "check").with_condition(Condition::new(
                        ConditionType::Contains,
                        "go",
                        StepAction::jump_to("target"),
                    )),
                    Step::command("middle", "Middle", "middle"),
                    Step::command("target", "Target", "target"),
                    Step::command("after", "After", "after"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "jumper", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["check", "after"]);
        assert!(has_line(&lines, "Condition matched: jump_to"));
        assert!(has_line(&lines, "Jumping to step: Target"));
    }

    #[tokio::test]
    async fn test_hook_jump_lands_on_target() {
        let shell = Arc::new(ScriptedShell::new());
        let executor = executor(
            vec![workflow(
                "hook-jump",
                vec![
                    Step::command("first", "First", "first")
                        .with_on_success(StepAction::jump_to("third")),
                    Step::command("second", "Second", "second"),
                    Step::command("third", "Third", "third"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, _) = run_to_end(&executor, "hook-jump", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_condition_stop_skips_hooks() {
        let shell = Arc::new(ScriptedShell::new().respond("status", &["DONE"], 0));
        let executor = executor(
            vec![workflow(
                "cond-stop",
                vec![
                    Step::command("s", "Status", "status")
                        .with_condition(Condition::new(
                            ConditionType::Equals,
                            "DONE",
                            StepAction::stop(),
                        ))
                        .with_on_success(StepAction::jump_to("later")),
                    Step::command("later", "Later", "later"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "cond-stop", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["status"]);
        assert!(has_line(&lines, "Workflow stopped by condition"));
        assert!(!has_line(&lines, "Workflow completed successfully"));
    }

    #[tokio::test]
    async fn test_execute_step_runs_inline() {
        let shell = Arc::new(ScriptedShell::new().respond("probe", &["ok"], 0));
        let executor = executor(
            vec![workflow(
                "inline",
                vec![
                    Step::command("probe", "Probe", "probe").with_condition(Condition::new(
                        ConditionType::Equals,
                        "ok",
                        StepAction::execute_step("cleanup"),
                    )),
                    Step::command("work", "Work", "work"),
                    Step::command("cleanup", "Cleanup", "cleanup"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "inline", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["probe", "cleanup", "work", "cleanup"]);
        assert!(has_line(&lines, "Executing step: Cleanup"));
    }

    #[tokio::test]
    async fn test_condition_and_hook_both_apply() {
        let shell = Arc::new(ScriptedShell::new().respond("flaky", &[], 1));
        let executor = executor(
            vec![workflow(
                "both",
                vec![
                    Step::command("s1", "Flaky", "flaky")
                        .with_condition(Condition::new(
                            ConditionType::ExitCode,
                            "1",
                            StepAction::jump_to("s2"),
                        ))
                        .with_on_failure(StepAction::default()),
                    Step::command("s2", "Skipped", "skipped"),
                    Step::command("s3", "Final", "final"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "both", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["flaky", "final"]);
        assert!(has_line(&lines, "Step failed: Process exited with code 1"));
    }

    #[tokio::test]
    async fn test_unknown_jump_target_is_ignored() {
        let shell = Arc::new(ScriptedShell::new());
        let executor = executor(
            vec![workflow(
                "lost",
                vec![
                    Step::command("a", "A", "a").with_on_success(StepAction::jump_to("nowhere")),
                    Step::command("b", "B", "b"),
                ],
            )],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "lost", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shell.calls(), vec!["a", "b"]);
        assert!(has_line(&lines, "Target step not found: nowhere"));
    }

    #[tokio::test]
    async fn test_global_beats_declared_default() {
        let shell = Arc::new(ScriptedShell::new());
        let wf = workflow("vars", vec![Step::command("d", "Deploy", "deploy {REGION} {MISSING}")])
            .with_variable(WorkflowVariable::new("REGION").with_default("us-west-2"));
        let executor = executor(vec![wf], globals(&[("REGION", "us-east-1")]), shell.clone());

        let (execution, _) = run_to_end(&executor, "vars", &[]).await;

        assert_eq!(shell.calls(), vec!["deploy us-east-1 {MISSING}"]);
        assert_eq!(execution.variables.get("REGION").map(String::as_str), Some("us-east-1"));
    }

    #[tokio::test]
    async fn test_inputs_override_everything() {
        let shell = Arc::new(ScriptedShell::new());
        let wf = workflow("vars", vec![Step::command("d", "Deploy", "deploy {REGION} {ENV}")])
            .with_variable(WorkflowVariable::new("ENV").with_default("staging"));
        let executor = executor(vec![wf], globals(&[("REGION", "us-east-1")]), shell.clone());

        let (execution, _) =
            run_to_end(&executor, "vars", &[("REGION", "eu-west-1"), ("ENV", "prod")]).await;

        assert_eq!(shell.calls(), vec!["deploy eu-west-1 prod"]);
        assert_eq!(execution.variables.len(), 2);
    }

    #[tokio::test]
    async fn test_step_remap_does_not_leak() {
        let shell = Arc::new(ScriptedShell::new());
        let wf = workflow(
            "remap",
            vec![
                Step::command("p", "Prod", "ctx {CLUSTER}").with_variable("CLUSTER", "PROD_CLUSTER"),
                Step::command("d", "Dev", "ctx {CLUSTER}"),
            ],
        );
        let executor = executor(
            vec![wf],
            globals(&[("CLUSTER", "dev"), ("PROD_CLUSTER", "prod")]),
            shell.clone(),
        );

        let (execution, _) = run_to_end(&executor, "remap", &[]).await;

        assert_eq!(shell.calls(), vec!["ctx prod", "ctx dev"]);
        assert_eq!(execution.variables.get("CLUSTER").map(String::as_str), Some("dev"));
    }

    #[tokio::test]
    async fn test_missing_workflow_is_not_found() {
        let executor = executor(vec![], globals(&[]), Arc::new(ScriptedShell::new()));
        let err = executor.execute("ghost", HashMap::new()).await.unwrap_err();
        assert_eq!(err, WorkflowError::NotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_variable_store_failure_is_storage_error() {
        let mut store = MockVariableStore::new();
        store
            .expect_get_all()
            .returning(|| Err(DomainError::storage("disk gone")));
        let executor = executor(
            vec![workflow("wf", vec![Step::command("a", "A", "a")])],
            Arc::new(store),
            Arc::new(ScriptedShell::new()),
        );

        let err = executor.execute("wf", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
    }

    #[tokio::test]
    async fn test_unknown_step_type_fails() {
        let executor = executor(
            vec![workflow(
                "odd",
                vec![Step::command("x", "Mystery", "x").with_type(StepType::Unknown)],
            )],
            globals(&[]),
            Arc::new(ScriptedShell::new()),
        );

        let (execution, lines) = run_to_end(&executor, "odd", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(has_line(&lines, "Step failed: Unknown step type: unknown"));
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_exit_code() {
        let executor = executor(
            vec![workflow(
                "spawn",
                vec![
                    Step::command("s", "Spawn", "spawn-error")
                        .with_condition(Condition::new(
                            ConditionType::ExitCode,
                            "-1",
                            StepAction::jump_to("s"),
                        ))
                        .with_on_failure(StepAction::default()),
                    Step::command("next", "Next", "next"),
                ],
            )],
            globals(&[]),
            Arc::new(ScriptedShell::new()),
        );

        let (execution, lines) = run_to_end(&executor, "spawn", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(has_line(&lines, "Condition matched: jump_to"));
        assert!(lines.iter().any(|l| l.starts_with("Step failed: Failed to start process")));
    }

    #[tokio::test]
    async fn test_sub_workflow_logs_are_indented() {
        let shell = Arc::new(ScriptedShell::new().respond("echo child", &["child"], 0));
        let executor = executor(
            vec![
                workflow("parent", vec![Step::workflow_ref("r", "Run child", "child")]),
                workflow("child", vec![Step::command("c", "Child step", "echo child")]),
            ],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "parent", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(has_line(&lines, "Executing sub-workflow: child"));
        assert!(has_line(&lines, "  Starting workflow: Workflow child"));
        assert!(has_line(&lines, "  $ echo child"));
        assert!(has_line(&lines, "  child"));
        assert!(has_line(&lines, "  Workflow completed successfully"));
        assert_eq!(lines.last().map(String::as_str), Some("Workflow completed successfully"));
    }

    #[tokio::test]
    async fn test_sub_workflow_inherits_scope() {
        let shell = Arc::new(ScriptedShell::new());
        let executor = executor(
            vec![
                workflow("parent", vec![Step::workflow_ref("r", "Child", "child")])
                    .with_variable(WorkflowVariable::new("ENV").with_default("prod")),
                workflow("child", vec![Step::command("c", "Echo", "echo {ENV} {TEAM}")])
                    .with_variable(WorkflowVariable::new("ENV").with_default("dev"))
                    .with_variable(WorkflowVariable::new("TEAM").with_default("ops")),
            ],
            globals(&[]),
            shell.clone(),
        );

        run_to_end(&executor, "parent", &[]).await;

        assert_eq!(shell.calls(), vec!["echo prod ops"]);
    }

    #[tokio::test]
    async fn test_failed_sub_workflow_fails_parent() {
        let shell = Arc::new(ScriptedShell::new().respond("false", &[], 1));
        let executor = executor(
            vec![
                workflow(
                    "parent",
                    vec![
                        Step::workflow_ref("r", "Child", "child"),
                        Step::command("after", "After", "after"),
                    ],
                ),
                workflow("child", vec![Step::command("c", "Fail", "false")]),
            ],
            globals(&[]),
            shell.clone(),
        );

        let (execution, lines) = run_to_end(&executor, "parent", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(shell.calls(), vec!["false"]);
        assert!(has_line(
            &lines,
            "Step failed: Sub-workflow 'child' ended with status failed"
        ));
    }

    #[tokio::test]
    async fn test_missing_sub_workflow_fails_step() {
        let executor = executor(
            vec![workflow("parent", vec![Step::workflow_ref("r", "Ghost", "ghost")])],
            globals(&[]),
            Arc::new(ScriptedShell::new()),
        );

        let (execution, lines) = run_to_end(&executor, "parent", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(has_line(&lines, "Step failed: Workflow not found: ghost"));
    }

    #[tokio::test]
    async fn test_sub_workflow_cycle_is_rejected() {
        let executor = executor(
            vec![
                workflow("a", vec![Step::workflow_ref("to-b", "B", "b")]),
                workflow("b", vec![Step::workflow_ref("to-a", "A", "a")]),
            ],
            globals(&[]),
            Arc::new(ScriptedShell::new()),
        );

        let (execution, lines) = tokio::time::timeout(
            Duration::from_secs(5),
            run_to_end(&executor, "a", &[]),
        )
        .await
        .expect("cycle must not recurse forever");

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(has_line(
            &lines,
            "  Step failed: Sub-workflow cycle detected: a -> b -> a"
        ));
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_is_cancelled() {
        let shell = Arc::new(ScriptedShell::new());
        let executor = executor(
            vec![workflow("wf", vec![Step::command("a", "A", "a")])],
            globals(&[]),
            shell.clone(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = executor
            .execute_with_cancellation("wf", HashMap::new(), cancel)
            .await
            .unwrap();
        let lines: Vec<String> = started.logs.collect().await;

        assert_eq!(started.handle.wait().await, ExecutionStatus::Cancelled);
        assert!(shell.calls().is_empty());
        assert_eq!(lines.last().map(String::as_str), Some("Execution cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_kills_running_process() {
        let executor = executor(
            vec![workflow(
                "slow",
                vec![
                    Step::command("sleep", "Sleep", "sleep 30"),
                    Step::command("after", "After", "echo after"),
                ],
            )],
            globals(&[]),
            Arc::new(ProcessShellRunner::default()),
        );

        let started = executor.execute("slow", HashMap::new()).await.unwrap();
        let handle = started.handle.clone();

        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let lines: Vec<String> = tokio::time::timeout(Duration::from_secs(10), started.logs.collect())
            .await
            .expect("log stream should close after cancellation");

        assert_eq!(handle.wait().await, ExecutionStatus::Cancelled);
        assert!(handle.is_cancel_requested());
        assert!(has_line(&lines, "Execution cancelled"));
        assert!(!has_line(&lines, "$ echo after"));
        assert!(handle.snapshot().await.end_time.is_some());
    }

    #[tokio::test]
    async fn test_real_shell_captures_output_for_conditions() {
        let executor = executor(
            vec![workflow(
                "real",
                vec![
                    Step::command("v", "Version", "echo 'version: 1.2.3'; echo warn >&2")
                        .with_condition(Condition::new(
                            ConditionType::Regex,
                            r"version: \d+\.\d+",
                            StepAction::stop(),
                        )),
                    Step::command("never", "Never", "echo never"),
                ],
            )],
            globals(&[]),
            Arc::new(ProcessShellRunner::default()),
        );

        let (execution, lines) = run_to_end(&executor, "real", &[]).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(has_line(&lines, "version: 1.2.3"));
        assert!(has_line(&lines, "Workflow stopped by condition"));
        assert!(!has_line(&lines, "never"));
    }
}
