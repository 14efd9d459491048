//! Subprocess-backed shell runner

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::shell::{OutputLine, ShellError, ShellExit, ShellRequest, ShellRunner};

/// Interval at which a finished process's readers are checked for a stalled pipe
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Runs commands through `<shell> -c <command>`
///
/// Each command gets its own process group so that cancellation reaches every
/// process the shell started.
#[derive(Debug, Clone)]
pub struct ProcessShellRunner {
    shell: String,
}

impl Default for ProcessShellRunner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ProcessShellRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

/// An output reader task and its progress
struct Reader {
    task: JoinHandle<()>,
    /// Set while blocked on the pipe, clear while delivering a line
    waiting: Arc<AtomicBool>,
    lines: Arc<AtomicU64>,
}

impl Reader {
    async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

fn spawn_reader<R>(stream: R, output: mpsc::Sender<OutputLine>, tag: fn(String) -> OutputLine) -> Reader
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let waiting = Arc::new(AtomicBool::new(false));
    let lines = Arc::new(AtomicU64::new(0));
    let (task_waiting, task_lines) = (waiting.clone(), lines.clone());

    let task = tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            task_waiting.store(true, Ordering::Release);
            let read = reader.read_until(b'\n', &mut buf).await;
            task_waiting.store(false, Ordering::Release);

            match read {
                Ok(0) => break,
                Ok(_) => {
                    task_lines.fetch_add(1, Ordering::AcqRel);
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if output.send(tag(line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read process output");
                    break;
                }
            }
        }
    });

    Reader {
        task,
        waiting,
        lines,
    }
}

/// Send SIGTERM to the whole process group led by `pid`
#[cfg(unix)]
fn terminate_group(pid: Option<u32>) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        debug!(pid, "Sending SIGTERM to process group");
        if let Err(e) = signal::kill(Pid::from_raw(-(pid as i32)), Signal::SIGTERM) {
            debug!(pid, error = %e, "Failed to signal process group");
        }
    }
}

#[cfg(not(unix))]
fn terminate_group(_pid: Option<u32>) {}

#[async_trait]
impl ShellRunner for ProcessShellRunner {
    async fn run(
        &self,
        request: ShellRequest,
        cancel: CancellationToken,
        output: mpsc::Sender<OutputLine>,
    ) -> Result<ShellExit, ShellError> {
        if cancel.is_cancelled() {
            return Err(ShellError::Cancelled);
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        if let Some(ref cwd) = request.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ShellError::Spawn(format!("{}: {}", self.shell, e)))?;
        let pid = child.id();

        debug!(pid = ?pid, command = %request.command, "Spawned shell process");

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, output.clone(), OutputLine::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, output.clone(), OutputLine::Stderr));
        }
        drop(output);

        tokio::select! {
            _ = cancel.cancelled() => {
                terminate_group(pid);
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill cancelled process");
                }
                for reader in readers {
                    reader.stop().await;
                }
                Err(ShellError::Cancelled)
            }
            result = child.wait() => {
                let status = result.map_err(|e| ShellError::Wait(e.to_string()))?;
                drain_readers(readers, &cancel).await;
                Ok(ShellExit {
                    exit_code: status.code().unwrap_or(-1),
                })
            }
        }
    }
}

/// Collect the output a finished process left in its pipes
///
/// A background process may inherit the pipes and keep them open after the
/// shell exits. A reader that sits idle on the pipe for a whole poll interval
/// is detached; one that is still delivering lines is waited for.
async fn drain_readers(readers: Vec<Reader>, cancel: &CancellationToken) {
    for mut reader in readers {
        let mut seen = reader.lines.load(Ordering::Acquire);

        let finished = loop {
            tokio::select! {
                _ = &mut reader.task => break true,
                _ = cancel.cancelled() => break false,
                _ = tokio::time::sleep(DRAIN_POLL) => {
                    let lines = reader.lines.load(Ordering::Acquire);
                    if reader.waiting.load(Ordering::Acquire) && lines == seen {
                        debug!("Output pipe still held open after exit, detaching reader");
                        break false;
                    }
                    seen = lines;
                }
            }
        };

        if !finished {
            reader.stop().await;
        }
    }
}
