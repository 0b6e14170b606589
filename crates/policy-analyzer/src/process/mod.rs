//! Child-process transport for analyzer plugins.
//!
//! [`ProcessTransport`] spawns the executable named by an
//! [`AnalyzerManifest`] with all three standard streams piped and keeps it
//! alive for the whole run. Each round trip writes one JSONL line to the
//! child's stdin and waits for the next line from its stdout. Stdout is read
//! on a background thread so that the `close` exchange can be bounded by the
//! manifest's grace period. Stderr is drained on another thread and
//! forwarded to the log so a chatty plugin cannot block on a full pipe.
//!
//! Shutdown closes stdin and waits for the child to exit. The grace period
//! starts when `close` is sent, and the child is killed once it elapses.


use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::manifest::AnalyzerManifest;
use crate::remote::{RemoteAnalyzer, Transport};

/// Tracing target for plugin process operations.
const PROCESS_TARGET: &str = "policy_analyzer::process";

/// Interval between exit-status polls during shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A running analyzer plugin process.
///
/// # Example
///
/// ```rust,no_run
/// use policy_analyzer::{AnalyzerManifest, AnalyzerSession, RemoteAnalyzer};
///
/// let manifest = AnalyzerManifest::new("baseline", "0.1.0", "/usr/bin/policy-analyzer-baseline");
/// let analyzer = RemoteAnalyzer::spawn(&manifest).unwrap();
/// let session = AnalyzerSession::new(analyzer);
/// session.close().unwrap();
/// ```
#[derive(Debug)]
pub struct ProcessTransport {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<io::Result<String>>,
    stderr_drain: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
    shutdown_deadline: Option<Instant>,
    finished: bool,
}

impl ProcessTransport {
    /// Spawns the plugin described by `manifest`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if the process cannot be started or
    /// its streams cannot be captured.
    pub fn spawn(manifest: &AnalyzerManifest) -> Result<Self, TransportError> {
        let name = manifest.name().to_owned();
        debug!(
            target: PROCESS_TARGET,
            analyzer = %name,
            executable = %manifest.executable().display(),
            "spawning analyzer process"
        );

        let mut child = Command::new(manifest.executable())
            .args(manifest.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| TransportError::Spawn {
                message: format!(
                    "cannot execute '{}': {err}",
                    manifest.executable().display()
                ),
                source: Some(Arc::new(err)),
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            drop(child.kill());
            drop(child.wait());
            return Err(TransportError::Spawn {
                message: String::from("failed to capture analyzer stdio"),
                source: None,
            });
        };
        let stderr_drain = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_drain(name.clone(), stderr));

        Ok(Self {
            name,
            child,
            stdin: Some(stdin),
            replies: spawn_stdout_reader(stdout),
            stderr_drain,
            shutdown_timeout: Duration::from_secs(manifest.shutdown_timeout_secs()),
            shutdown_deadline: None,
            finished: false,
        })
    }

    /// Returns the child's process id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stdin = self.stdin.as_mut().ok_or(TransportError::Closed)?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    fn read_line(&self) -> Result<String, TransportError> {
        let line = self.replies.recv().map_err(|_| TransportError::Closed)?;
        Ok(line?)
    }

    fn read_line_before(&self, deadline: Instant) -> Result<String, TransportError> {
        let wait = deadline.saturating_duration_since(Instant::now());
        let line = self.replies.recv_timeout(wait).map_err(|error| match error {
            RecvTimeoutError::Timeout => TransportError::Timeout {
                timeout_secs: self.shutdown_timeout.as_secs(),
            },
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })?;
        Ok(line?)
    }

    fn wait_for_exit(&mut self) -> Result<(), TransportError> {
        let deadline = *self
            .shutdown_deadline
            .get_or_insert_with(|| Instant::now() + self.shutdown_timeout);
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.finished = true;
                debug!(
                    target: PROCESS_TARGET,
                    analyzer = %self.name,
                    ?status,
                    "analyzer process exited"
                );
                if status.success() {
                    return Ok(());
                }
                return Err(TransportError::NonZeroExit {
                    status: status.code().unwrap_or(-1),
                });
            }
            if Instant::now() >= deadline {
                warn!(
                    target: PROCESS_TARGET,
                    analyzer = %self.name,
                    timeout_secs = self.shutdown_timeout.as_secs(),
                    "analyzer did not exit, killing process"
                );
                self.kill();
                return Err(TransportError::Timeout {
                    timeout_secs: self.shutdown_timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        drop(self.child.kill());
        drop(self.child.wait());
        self.finished = true;
    }

    fn join_stderr_drain(&mut self) {
        if let Some(handle) = self.stderr_drain.take()
            && handle.join().is_err()
        {
            warn!(
                target: PROCESS_TARGET,
                analyzer = %self.name,
                "stderr drain thread panicked"
            );
        }
    }
}

impl Transport for ProcessTransport {
    fn round_trip(&mut self, line: &str) -> Result<String, TransportError> {
        self.write_line(line)?;
        self.read_line()
    }

    /// Starts the grace period, then waits for the reply no longer than it
    /// allows.
    fn close_round_trip(&mut self, line: &str) -> Result<String, TransportError> {
        let deadline = Instant::now() + self.shutdown_timeout;
        self.shutdown_deadline = Some(deadline);
        self.write_line(line)?;
        self.read_line_before(deadline)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        if self.finished {
            return Ok(());
        }
        // Dropping stdin signals end of input.
        drop(self.stdin.take());
        let result = self.wait_for_exit();
        self.join_stderr_drain();
        result
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        if !self.finished {
            self.kill();
        }
        self.join_stderr_drain();
    }
}

/// Forwards stdout lines to a channel until the stream ends.
///
/// The thread is detached: it finishes when the child closes stdout, which
/// at the latest happens when the child is killed.
fn spawn_stdout_reader(stdout: ChildStdout) -> Receiver<io::Result<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if sender.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    drop(sender.send(Err(error)));
                    break;
                }
            }
        }
    });
    receiver
}

fn spawn_stderr_drain(name: String, stderr: impl Read + Send + 'static) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            match line {
                Ok(text) if text.trim().is_empty() => {}
                Ok(text) => debug!(
                    target: PROCESS_TARGET,
                    analyzer = %name,
                    stderr = %text.trim_end(),
                    "analyzer stderr output"
                ),
                Err(_) => break,
            }
        }
    })
}

impl RemoteAnalyzer<ProcessTransport> {
    /// Launches the plugin described by `manifest` and returns a stub bound
    /// to it, named after the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if the process cannot be started.
    pub fn spawn(manifest: &AnalyzerManifest) -> Result<Self, TransportError> {
        let transport = ProcessTransport::spawn(manifest)?;
        Ok(Self::new(manifest.name(), transport))
    }
}
