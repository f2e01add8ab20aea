//! A running tool server attached to a pair of message channels.

use super::pump::{self, Pumps};
use super::shutdown::{ShutdownCoordinator, ShutdownReport};
use super::spec::{ProcessSpec, StderrMode};
use crate::error::{Result, TransportError};
use crate::framing::LineFramer;
use crate::message::{Frame, Message};
use crate::traits::{Connect, MessageTransport};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The child process and the tasks serving its pipes.
#[derive(Debug)]
pub(crate) struct LiveProcess {
    pub(crate) child: Child,
    pub(crate) pumps: Pumps,
}

/// A spawned tool server speaking newline-delimited JSON over stdio.
///
/// Messages sent on the outbound side are written to the child's stdin in
/// order; every line the child writes to stdout arrives on the inbound side
/// as a [`Frame`], also in order. Both directions run concurrently, so a child
/// that stops reading never blocks delivery of what it already wrote.
///
/// A session is used once: after [`shutdown`](Self::shutdown) it cannot be
/// restarted. Dropping a session without shutting it down aborts the pumps
/// and kills the child.
#[derive(Debug)]
pub struct ProcessSession {
    program: String,
    pid: Option<u32>,
    grace: Duration,
    pub(super) outbound: Option<mpsc::Sender<Message>>,
    pub(super) inbound: Option<mpsc::Receiver<Frame>>,
    pub(super) live: Option<LiveProcess>,
}

impl ProcessSession {
    /// Spawn the child described by `spec` and start its pumps.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Config`] if the spec fails validation; nothing is
    ///   spawned in that case.
    /// - [`TransportError::Spawn`] if the OS refuses to start the program.
    pub async fn start(spec: ProcessSpec) -> Result<Self> {
        spec.validate()?;

        let mut child = spec
            .command()
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: spec.program.clone(),
                source,
            })?;
        let pid = child.id();

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.start_kill();
            return Err(TransportError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::other("stdio pipes were not captured"),
            });
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(spec.channel_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(spec.channel_capacity);
        let framer = || LineFramer::new(spec.decode_policy, spec.max_line_bytes);

        let mut pumps = Pumps {
            stdin: Some(tokio::spawn(pump::stdin_pump(
                stdin,
                framer(),
                outbound_rx,
                pid,
            ))),
            stdout: Some(tokio::spawn(pump::stdout_pump(
                stdout,
                framer(),
                inbound_tx,
                pid,
            ))),
            stderr: None,
        };
        if spec.stderr == StderrMode::Log
            && let Some(stderr) = child.stderr.take()
        {
            pumps.stderr = Some(tokio::spawn(pump::stderr_pump(stderr, pid)));
        }

        info!(
            ?pid,
            program = %spec.program,
            args = ?spec.args,
            "tool server started"
        );

        Ok(Self {
            program: spec.program,
            pid,
            grace: spec.shutdown_grace,
            outbound: Some(outbound_tx),
            inbound: Some(inbound_rx),
            live: Some(LiveProcess { child, pumps }),
        })
    }

    /// OS process id, if the platform reported one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The program this session launched.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Queue a message for the child's stdin.
    ///
    /// Waits while the outbound channel is full.
    pub async fn send(&self, message: Message) -> Result<()> {
        let tx = self.outbound.as_ref().ok_or(TransportError::StreamClosed)?;
        tx.send(message)
            .await
            .map_err(|_| TransportError::StreamClosed)
    }

    /// A clone of the outbound sender, for producers living on other tasks.
    ///
    /// The stdin pump stops only once every clone has been dropped.
    pub fn sender(&self) -> Option<mpsc::Sender<Message>> {
        self.outbound.clone()
    }

    /// Drop the session's own outbound sender.
    ///
    /// Once all clones from [`sender`](Self::sender) are gone too, the child
    /// sees EOF on stdin.
    pub fn close_outbound(&mut self) {
        self.outbound = None;
    }

    /// Next frame from the child's stdout, or `None` once the stream ended.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.as_mut()?.recv().await
    }

    /// Take ownership of the inbound receiver.
    ///
    /// Afterwards [`recv`](Self::recv) always returns `None`.
    pub fn take_inbound(&mut self) -> Option<mpsc::Receiver<Frame>> {
        self.inbound.take()
    }

    /// Whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        self.live
            .as_mut()
            .is_some_and(|live| matches!(live.child.try_wait(), Ok(None)))
    }

    /// Whether [`shutdown`](Self::shutdown) has already run.
    pub fn is_shut_down(&self) -> bool {
        self.live.is_none()
    }

    /// Stop the child using the grace period from its spec.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let grace = self.grace;
        self.shutdown_with(grace).await
    }

    /// Stop the child with an explicit grace period.
    pub async fn shutdown_with(&mut self, grace: Duration) -> ShutdownReport {
        ShutdownCoordinator::new(grace).shutdown(self).await
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            debug!(pid = ?self.pid, "session dropped without shutdown; killing tool server");
            live.pumps.abort_all();
            #[cfg(unix)]
            if let Some(pid) = self.pid {
                let _ = super::shutdown::signal_group(pid, nix::sys::signal::Signal::SIGKILL);
            }
            // `kill_on_drop` takes care of the child itself.
        }
    }
}

#[async_trait]
impl MessageTransport for ProcessSession {
    async fn send(&self, message: Message) -> Result<()> {
        ProcessSession::send(self, message).await
    }

    async fn recv(&mut self) -> Option<Frame> {
        ProcessSession::recv(self).await
    }

    async fn close(&mut self) {
        self.shutdown().await;
    }

    fn is_closed(&self) -> bool {
        self.is_shut_down()
    }
}

/// How long a probed child must stay up to count as started.
const STARTUP_SETTLE: Duration = Duration::from_millis(100);

/// Probing a spec starts a session, checks that the child survives its first
/// moments, and shuts it down again.
///
/// Spawning and settling together must fit in the spec's startup timeout.
#[async_trait]
impl Connect for ProcessSpec {
    async fn connect(&self) -> Result<()> {
        let timeout = self.startup_timeout;
        let mut session = tokio::time::timeout(timeout, async {
            let session = ProcessSession::start(self.clone()).await?;
            tokio::time::sleep(STARTUP_SETTLE).await;
            Ok::<_, TransportError>(session)
        })
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

        let running = session.is_running();
        session.shutdown().await;
        if running {
            Ok(())
        } else {
            Err(TransportError::Spawn {
                program: self.program.clone(),
                source: std::io::Error::other("exited during startup"),
            })
        }
    }

    fn describe(&self) -> String {
        format!("process `{}`", self.program)
    }
}
