//! Shell execution primitive consumed by the workflow executor

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A command to run through the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    pub command: String,
    /// Working directory; inherits the process's when `None`
    pub cwd: Option<PathBuf>,
}

impl ShellRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// One line of process output, tagged by stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            Self::Stdout(line) | Self::Stderr(line) => line,
        }
    }

    pub fn is_stderr(&self) -> bool {
        matches!(self, Self::Stderr(_))
    }
}

/// Final status of a process that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellExit {
    /// `-1` when the process was terminated by a signal
    pub exit_code: i32,
}

impl ShellExit {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures of the shell primitive itself
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShellError {
    #[error("Failed to start process: {0}")]
    Spawn(String),

    #[error("Failed to wait for process: {0}")]
    Wait(String),

    #[error("Process cancelled")]
    Cancelled,
}

/// Runs a shell command, streaming its output line by line
///
/// Every output line is sent on `output` as soon as it is read; the sender is
/// dropped before this returns so the receiving side observes end-of-stream.
/// Firing `cancel` terminates the process and yields [`ShellError::Cancelled`].
#[async_trait]
pub trait ShellRunner: Send + Sync + std::fmt::Debug {
    async fn run(
        &self,
        request: ShellRequest,
        cancel: CancellationToken,
        output: mpsc::Sender<OutputLine>,
    ) -> Result<ShellExit, ShellError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_line_accessors() {
        let out = OutputLine::Stdout("hello".to_string());
        let err = OutputLine::Stderr("boom".to_string());
        assert_eq!(out.text(), "hello");
        assert!(!out.is_stderr());
        assert!(err.is_stderr());
    }

    #[test]
    fn test_shell_exit_success() {
        assert!(ShellExit { exit_code: 0 }.success());
        assert!(!ShellExit { exit_code: 2 }.success());
    }

    #[test]
    fn test_request_builder() {
        let request = ShellRequest::new("ls").with_cwd("/tmp");
        assert_eq!(request.command, "ls");
        assert_eq!(request.cwd, Some(PathBuf::from("/tmp")));
    }
}
