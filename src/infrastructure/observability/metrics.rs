//! Workflow execution metrics

use std::time::Duration;

use metrics::{counter, histogram};

use crate::domain::workflow::{ExecutionStatus, StepType};

/// How a single step ended, for metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
    Cancelled,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Parameters for execution-level metrics
pub struct ExecutionMetricParams<'a> {
    pub workflow_id: &'a str,
    pub status: ExecutionStatus,
    pub duration: Duration,
}

/// Parameters for step-level metrics
pub struct StepMetricParams {
    pub step_type: StepType,
    pub outcome: StepOutcome,
    pub duration: Duration,
}

/// Record a finished workflow execution
pub fn record_execution(params: ExecutionMetricParams<'_>) {
    let labels = [
        ("workflow", params.workflow_id.to_string()),
        ("status", params.status.as_str().to_string()),
    ];
    counter!("workflow_executions_total", &labels).increment(1);

    histogram!(
        "workflow_execution_duration_seconds",
        "workflow" => params.workflow_id.to_string()
    )
    .record(params.duration.as_secs_f64());
}

/// Record a finished step
pub fn record_step(params: StepMetricParams) {
    let step_type = params.step_type.to_string();
    let labels = [
        ("type", step_type.clone()),
        ("outcome", params.outcome.as_str().to_string()),
    ];
    counter!("workflow_steps_total", &labels).increment(1);

    histogram!("workflow_step_duration_seconds", "type" => step_type)
        .record(params.duration.as_secs_f64());
}
