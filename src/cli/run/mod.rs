//! Run command - executes a workflow and streams its log to stdout

use std::process::ExitCode;

use clap::Args;
use futures::StreamExt;
use tokio::signal;
use tracing::{info, warn};

use super::{bootstrap, into_inputs, parse_key_val, GlobalArgs};
use crate::domain::ExecutionStatus;

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Workflow ID
    pub id: String,

    /// Input variable, highest precedence (repeatable)
    #[arg(short = 'v', long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub vars: Vec<(String, String)>,

    /// Refuse to start when inputs leave required variables or placeholders unresolved
    #[arg(long)]
    pub strict: bool,
}

/// Run a workflow to completion
///
/// Ctrl-C cancels the execution; the process exits non-zero unless the
/// workflow completed.
pub async fn run(global: &GlobalArgs, args: RunArgs) -> anyhow::Result<ExitCode> {
    let state = bootstrap(global).await?;
    let inputs = into_inputs(args.vars);

    let report = state.workflow_service.check_inputs(&args.id, &inputs).await?;
    if !report.is_ok() {
        for name in &report.missing_required {
            warn!("Required variable '{}' has no value", name);
        }
        for (name, value) in &report.invalid_values {
            warn!("Variable '{}' does not accept '{}'", name, value);
        }
        for (step_id, names) in &report.unresolved {
            warn!("Step '{}' leaves placeholders unresolved: {}", step_id, names.join(", "));
        }
        if args.strict {
            anyhow::bail!("Inputs for workflow '{}' are incomplete", args.id);
        }
    }

    let started = state.executor.execute(&args.id, inputs).await?;
    let handle = started.handle;
    let mut logs = started.logs;
    let mut interrupted = false;

    loop {
        tokio::select! {
            line = logs.next() => match line {
                Some(line) => println!("{}", line),
                None => break,
            },
            result = signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        info!("Received Ctrl+C, cancelling execution {}", handle.id());
                        handle.cancel();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            }
        }
    }

    let status = handle.wait().await;
    let execution = handle.snapshot().await;
    info!(
        execution_id = %execution.id,
        status = %status,
        log_lines = execution.logs.len(),
        "Execution finished"
    );

    Ok(exit_code(status))
}

fn exit_code(status: ExecutionStatus) -> ExitCode {
    match status {
        ExecutionStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
