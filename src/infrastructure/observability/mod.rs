//! Observability infrastructure - Execution metrics
//!
//! Metrics go through the `metrics` facade; no exporter is installed here, so
//! they are no-ops unless the host process installs a recorder.

mod metrics;

pub use metrics::{
    record_execution, record_step, ExecutionMetricParams, StepMetricParams, StepOutcome,
};
