//! Process invoker - runs one external command and captures its output
//!
//! Blocking and synchronous. Without a timeout or cancel token the child is
//! simply waited on; with either, the child is polled and killed once the
//! deadline passes or the token fires. The deadline also bounds reading
//! the output streams, which a forked grandchild may keep open after the
//! child itself has exited.

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::types::CommandOutput;
use std::io::Read;
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Runs command specs
///
/// The seam between the engine and the operating system. Tests substitute
/// `testing::ScriptedInvoker`, built with the `testing` feature.
pub trait Invoker {
    /// Run `command` to completion and capture its output.
    ///
    /// A non-zero exit is not an error here; interpreting it is the
    /// driver's job.
    fn invoke(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Shared flag that asks a running invocation to terminate its child
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Invoker backed by real child processes
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
    poll_interval: Duration,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self {
            timeout: None,
            cancel: None,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminate children that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Terminate children when `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn expired(&self, started: Instant) -> bool {
        self.timeout.is_some_and(|t| started.elapsed() >= t)
    }

    /// Timeout or cancellation error for a terminated invocation
    fn terminated(&self, command: String, started: Instant) -> Error {
        log::warn!("terminated after {:?}: {command}", started.elapsed());
        if self.cancelled() {
            Error::Cancelled { command }
        } else {
            Error::Timeout {
                command,
                after: self.timeout.unwrap_or_default(),
            }
        }
    }

    /// Wait for a drained stream
    ///
    /// Returns `None` once the deadline passes or the token fires.
    fn collect(&self, stream: Option<Receiver<Vec<u8>>>, started: Instant) -> Option<String> {
        let Some(rx) = stream else {
            return Some(String::new());
        };
        loop {
            match rx.recv_timeout(self.poll_interval) {
                Ok(bytes) => return Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(RecvTimeoutError::Disconnected) => return Some(String::new()),
                Err(RecvTimeoutError::Timeout) => {
                    if self.expired(started) || self.cancelled() {
                        return None;
                    }
                }
            }
        }
    }

    /// Poll until the child exits or the deadline/token fires.
    ///
    /// Returns `Ok(None)` when the child had to be killed, otherwise the
    /// child's exit code (itself `None` if a signal ended it).
    fn wait_bounded(
        &self,
        child: &mut Child,
        started: Instant,
    ) -> std::io::Result<Option<Option<i32>>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status.code()));
            }
            if self.expired(started) || self.cancelled() {
                child.kill()?;
                child.wait()?;
                return Ok(None);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let shown = command.to_string();
        log::debug!("spawning: {shown}");

        let mut child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: shown.clone(),
                source,
            })?;

        let started = Instant::now();
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let exit_code = if self.timeout.is_none() && self.cancel.is_none() {
            child
                .wait()
                .map_err(|source| Error::Spawn {
                    command: shown.clone(),
                    source,
                })?
                .code()
        } else {
            let finished = self
                .wait_bounded(&mut child, started)
                .map_err(|source| Error::Spawn {
                    command: shown.clone(),
                    source,
                })?;
            match finished {
                Some(code) => code,
                None => return Err(self.terminated(shown, started)),
            }
        };

        // Readers still blocked on a pipe held by a grandchild are detached
        let stdout = self.collect(stdout, started);
        let stderr = self.collect(stderr, started);
        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            return Err(self.terminated(shown, started));
        };
        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}
