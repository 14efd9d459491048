//! Execution records and the handle callers use to observe them

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Lifecycle state of an execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// A single log entry produced during execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,

    /// Empty for workflow-level messages
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub step_id: String,

    pub level: LogLevel,

    pub message: String,
}

/// Runtime record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,

    pub workflow_id: String,

    pub status: ExecutionStatus,

    /// Merged scope, fixed when the run starts
    pub variables: HashMap<String, String>,

    /// Append-only
    pub logs: Vec<ExecutionLog>,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Create a running execution with a fresh ID
    pub fn new(workflow_id: impl Into<String>, variables: HashMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            status: ExecutionStatus::Running,
            variables,
            logs: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn push_log(&mut self, step_id: &str, level: LogLevel, message: impl Into<String>) {
        self.logs.push(ExecutionLog {
            timestamp: Utc::now(),
            step_id: step_id.to_string(),
            level,
            message: message.into(),
        });
    }

    /// Move to a terminal status. Returns false if already terminal.
    pub fn finish(&mut self, status: ExecutionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Caller-side view of a running execution
///
/// The interpreter task is the only writer; every read here goes through the
/// lock and returns a copy.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    id: String,
    record: Arc<RwLock<WorkflowExecution>>,
    status: watch::Receiver<ExecutionStatus>,
    cancel: CancellationToken,
}

impl ExecutionHandle {
    pub fn new(
        id: impl Into<String>,
        record: Arc<RwLock<WorkflowExecution>>,
        status: watch::Receiver<ExecutionStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            record,
            status,
            cancel,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Consistent copy of the whole record
    pub async fn snapshot(&self) -> WorkflowExecution {
        self.record.read().await.clone()
    }

    /// Latest published status
    pub fn status(&self) -> ExecutionStatus {
        *self.status.borrow()
    }

    /// Request cancellation; takes effect at the next step boundary and kills
    /// a running subprocess immediately
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until the execution reaches a terminal status
    pub async fn wait(&self) -> ExecutionStatus {
        let mut status = self.status.clone();
        loop {
            let current = *status.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if status.changed().await.is_err() {
                return *status.borrow();
            }
        }
    }
}
