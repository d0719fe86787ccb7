//! Child process supervision

use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wsgw_core::{LineFramer, ShutdownReason};

use crate::error::{Result, RunnerError};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const READ_BUFFER_SIZE: usize = 8 * 1024;
/// How long to wait for stdout/stderr to reach EOF after the child exits
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Events reported by the supervisor, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    /// One non-blank stdout record, without its line terminator
    Line(String),
    /// One line of stderr output
    Stderr(String),
    /// The process is gone; always the last event
    Exited(ExitReport),
}

/// How the child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    /// Terminating signal (Unix only)
    pub signal: Option<i32>,
}

impl ExitReport {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl From<ExitReport> for ShutdownReason {
    fn from(report: ExitReport) -> Self {
        ShutdownReason::ChildExited {
            code: report.code,
            signal: report.signal,
        }
    }
}

/// Cloneable handle for writing to and killing the child
#[derive(Debug, Clone)]
pub struct ChildHandle {
    pid: Option<u32>,
    stdin_tx: mpsc::UnboundedSender<String>,
    kill_tx: mpsc::Sender<()>,
    alive: Arc<AtomicBool>,
}

impl ChildHandle {
    /// Queue one line for the child's stdin; a newline is appended.
    ///
    /// Lines are written whole by a single writer task, so concurrent callers
    /// never interleave bytes. Returns false when the child is already gone,
    /// in which case the line is dropped.
    pub fn write(&self, line: impl Into<String>) -> bool {
        if !self.is_alive() {
            debug!("Child is not running, dropping stdin write");
            return false;
        }
        if self.stdin_tx.send(line.into()).is_err() {
            debug!("Child stdin closed, dropping write");
            return false;
        }
        true
    }

    /// Request termination. Idempotent; the exit is reported as
    /// [`ChildEvent::Exited`].
    pub fn kill(&self) {
        if self.kill_tx.try_send(()).is_err() {
            debug!("Kill already requested or child already reaped");
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Handle that is not backed by a process; writes land on the returned
    /// receiver and `kill` only flips the liveness flag.
    #[doc(hidden)]
    pub fn loopback() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (kill_tx, mut kill_rx) = mpsc::channel(1);
        let alive = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&alive);
        tokio::spawn(async move {
            if kill_rx.recv().await.is_some() {
                flag.store(false, Ordering::Release);
            }
        });

        (
            Self {
                pid: None,
                stdin_tx,
                kill_tx,
                alive,
            },
            stdin_rx,
        )
    }
}

/// A started child: its handle plus the ordered event stream
pub struct StdioChild {
    pub handle: ChildHandle,
    pub events: mpsc::Receiver<ChildEvent>,
}

impl StdioChild {
    pub fn into_parts(self) -> (ChildHandle, mpsc::Receiver<ChildEvent>) {
        (self.handle, self.events)
    }
}

/// Spawns and supervises the single stdio child
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Spawn `command_line` through the platform shell, inheriting the
    /// environment. Must be called inside a Tokio runtime.
    pub fn start(command_line: &str) -> Result<StdioChild> {
        let mut cmd = shell_command(command_line);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            RunnerError::spawn_failed_with_source(
                format!("Failed to spawn `{}`: {}", command_line, e),
                e,
            )
        })?;

        let pid = child.id();
        info!("Spawned child process pid={:?}: {}", pid, command_line);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunnerError::spawn_failed("Failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::spawn_failed("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::spawn_failed("Failed to capture stderr"))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = mpsc::channel(1);
        let alive = Arc::new(AtomicBool::new(true));

        tokio::spawn(write_stdin(stdin, stdin_rx));
        let readers = [
            tokio::spawn(read_stdout(stdout, event_tx.clone())),
            tokio::spawn(read_stderr(stderr, event_tx.clone())),
        ];
        tokio::spawn(watch_exit(
            child,
            kill_rx,
            readers,
            event_tx,
            Arc::clone(&alive),
        ));

        Ok(StdioChild {
            handle: ChildHandle {
                pid,
                stdin_tx,
                kill_tx,
                alive,
            },
            events: event_rx,
        })
    }
}

fn shell_command(command_line: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_line);
        c
    }
}

async fn write_stdin(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');

        if let Err(e) = stdin.write_all(&bytes).await {
            debug!("Child stdin closed: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            debug!("Failed to flush child stdin: {}", e);
            break;
        }
    }
}

async fn read_stdout(mut stdout: ChildStdout, tx: mpsc::Sender<ChildEvent>) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read child stdout: {}", e);
                break;
            }
        };

        for record in framer.feed(&buf[..n]) {
            if record.trim().is_empty() {
                continue;
            }
            if tx.send(ChildEvent::Line(record)).await.is_err() {
                debug!("Event channel closed, stopping stdout reader");
                return;
            }
        }
    }

    if let Some(tail) = framer.take_pending() {
        if !tail.trim().is_empty() {
            warn!("Discarding unterminated stdout record: {}", tail);
        }
    }
}

async fn read_stderr(stderr: ChildStderr, tx: mpsc::Sender<ChildEvent>) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line).trim_end().to_string();
                if text.is_empty() {
                    continue;
                }
                if tx.send(ChildEvent::Stderr(text)).await.is_err() {
                    debug!("Event channel closed, stopping stderr reader");
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read child stderr: {}", e);
                break;
            }
        }
    }
}

async fn watch_exit(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    readers: [JoinHandle<()>; 2],
    tx: mpsc::Sender<ChildEvent>,
    alive: Arc<AtomicBool>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Some(()) = kill_rx.recv() => {
            debug!("Killing child process pid={:?}", child.id());
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill child process: {}", e);
            }
            child.wait().await
        }
    };

    alive.store(false, Ordering::Release);

    let report = match status {
        Ok(status) => ExitReport::from_status(status),
        Err(e) => {
            error!("Failed to wait for child process: {}", e);
            ExitReport {
                code: None,
                signal: None,
            }
        }
    };

    // Flush output the child wrote right before exiting
    let drain = async {
        for reader in readers {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
        debug!("Child output still open after exit, not waiting for EOF");
    }

    let _ = tx.send(ChildEvent::Exited(report)).await;
}
