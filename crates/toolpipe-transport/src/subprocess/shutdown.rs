//! Escalating termination of a tool server.
//!
//! SIGTERM, a short grace period, then SIGKILL, unconditionally. On unix
//! both signals go to the child's whole process group. The
//! coordinator never waits for the child to exit on the caller's path:
//! reaping happens on a detached task so a child that ignores signals
//! cannot stall shutdown.

use super::pump::Pumps;
use super::session::ProcessSession;
use crate::error::Result;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default pause between SIGTERM and SIGKILL.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(50);

/// Shortest wait for an aborted pump, so a zero grace still lets the
/// runtime process the cancellation.
const PUMP_JOIN_FLOOR: Duration = Duration::from_millis(10);

/// How long the background reaper waits for the killed child by default.
pub const DEFAULT_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened when the coordinator signalled the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// Termination and kill signals were delivered.
    Signalled,
    /// The child was already gone before it could be signalled.
    AlreadyExited,
    /// Nothing was signalled because the session had already been shut down.
    NotAttempted,
}

/// Summary of a [`ShutdownCoordinator::shutdown`] call.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// True when this call found the session already shut down.
    pub already_shut_down: bool,
    /// Process id of the child, when known
    pub pid: Option<u32>,
    /// Signal delivery result
    pub termination: TerminationOutcome,
    /// Pumps that ended with an error, panicked, or outlived the grace period
    pub pump_failures: usize,
    /// Wall time spent in the call
    pub elapsed: Duration,
}

impl ShutdownReport {
    fn repeated(pid: Option<u32>) -> Self {
        Self {
            already_shut_down: true,
            pid,
            termination: TerminationOutcome::NotAttempted,
            pump_failures: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Stops a [`ProcessSession`] in bounded time.
///
/// Shutdown never fails from the caller's point of view. Every error on the
/// way (the process already gone, a pipe already closed, a pump that
/// crashed) is logged and swallowed, and calling it twice is harmless.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    grace: Duration,
    reap_timeout: Option<Duration>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_GRACE)
    }
}

impl ShutdownCoordinator {
    /// Create a coordinator with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            reap_timeout: Some(DEFAULT_REAP_TIMEOUT),
        }
    }

    /// How long the background reaper waits for the child; `None` leaves
    /// reaping entirely to the runtime.
    pub fn with_reap_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reap_timeout = timeout;
        self
    }

    /// The configured grace period.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Terminate the session's child and close its streams.
    ///
    /// Takes roughly twice the grace period at most: one for the signal
    /// escalation and one for the pumps to wind down.
    pub async fn shutdown(&self, session: &mut ProcessSession) -> ShutdownReport {
        let pid = session.pid();
        let Some(live) = session.live.take() else {
            debug!(?pid, "shutdown requested for a session that is already shut down");
            return ShutdownReport::repeated(pid);
        };

        let started = Instant::now();
        let mut child = live.child;
        info!(?pid, grace_ms = self.grace.as_millis() as u64, "shutting down tool server");

        let termination = terminate(&mut child, pid, self.grace).await;

        // Each endpoint is closed independently; a failure on one never keeps
        // the others open.
        session.outbound = None;
        session.inbound = None;
        let pump_failures = self.stop_pumps(live.pumps, pid).await;

        spawn_reaper(child, pid, self.reap_timeout);

        let elapsed = started.elapsed();
        info!(
            ?pid,
            ?termination,
            pump_failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "tool server shut down"
        );

        ShutdownReport {
            already_shut_down: false,
            pid,
            termination,
            pump_failures,
            elapsed,
        }
    }

    async fn stop_pumps(&self, pumps: Pumps, pid: Option<u32>) -> usize {
        pumps.abort_all();
        let (stdin, stdout, stderr) = tokio::join!(
            join_pump("stdin", pumps.stdin, self.grace, pid),
            join_pump("stdout", pumps.stdout, self.grace, pid),
            join_pump("stderr", pumps.stderr, self.grace, pid),
        );
        [stdin, stdout, stderr].into_iter().filter(|ok| !ok).count()
    }
}

/// Wait for an aborted pump to finish; returns false if it failed.
async fn join_pump(
    name: &'static str,
    handle: Option<JoinHandle<Result<()>>>,
    budget: Duration,
    pid: Option<u32>,
) -> bool {
    let Some(handle) = handle else {
        return true;
    };
    match tokio::time::timeout(budget.max(PUMP_JOIN_FLOOR), handle).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(e))) => {
            warn!(?pid, pump = name, error = %e, "pump ended with an error");
            false
        }
        Ok(Err(e)) if e.is_cancelled() => true,
        Ok(Err(e)) => {
            error!(?pid, pump = name, error = %e, "pump panicked");
            false
        }
        Err(_) => {
            warn!(?pid, pump = name, "pump did not stop within the grace period");
            false
        }
    }
}

#[cfg(unix)]
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) -> TerminationOutcome {
    use nix::errno::Errno;
    use nix::sys::signal::Signal;

    let Some(group) = pid else {
        return force_kill(child);
    };

    match signal_group(group, Signal::SIGTERM) {
        Ok(()) => debug!(pid = group, "sent SIGTERM to process group"),
        Err(Errno::ESRCH) => {
            debug!(pid = group, "tool server already exited");
            return TerminationOutcome::AlreadyExited;
        }
        Err(e) => warn!(pid = group, error = %e, "failed to send SIGTERM"),
    }

    tokio::time::sleep(grace).await;

    match signal_group(group, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid = group, error = %e, "failed to send SIGKILL to process group"),
    }
    // The leader may already have been reaped; the group was signalled anyway.
    force_kill(child);
    TerminationOutcome::Signalled
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _pid: Option<u32>, grace: Duration) -> TerminationOutcome {
    // No polite termination signal off unix; wait out the grace anyway so
    // timing stays comparable.
    tokio::time::sleep(grace).await;
    force_kill(child)
}

/// Send `signal` to the process group led by `pid`.
#[cfg(unix)]
pub(super) fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> nix::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|_| Errno::EINVAL)?;
    killpg(Pid::from_raw(pgid), signal)
}

fn force_kill(child: &mut Child) -> TerminationOutcome {
    match child.start_kill() {
        Ok(()) => {
            debug!(pid = ?child.id(), "sent SIGKILL");
            TerminationOutcome::Signalled
        }
        // Raised when the child was already reaped.
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => TerminationOutcome::AlreadyExited,
        Err(e) if is_no_such_process(&e) => TerminationOutcome::AlreadyExited,
        Err(e) => {
            warn!(pid = ?child.id(), error = %e, "failed to kill tool server");
            TerminationOutcome::Signalled
        }
    }
}

#[cfg(unix)]
fn is_no_such_process(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32)
}

#[cfg(not(unix))]
fn is_no_such_process(_e: &std::io::Error) -> bool {
    false
}

fn spawn_reaper(mut child: Child, pid: Option<u32>, timeout: Option<Duration>) {
    let Some(timeout) = timeout else {
        return;
    };
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(?pid, %status, "tool server reaped"),
            Ok(Err(e)) => warn!(?pid, error = %e, "failed to reap tool server"),
            Err(_) => warn!(
                ?pid,
                timeout_ms = timeout.as_millis() as u64,
                "tool server still running after SIGKILL"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let coordinator = ShutdownCoordinator::default();
        assert_eq!(coordinator.grace(), Duration::from_millis(50));
        assert_eq!(coordinator.reap_timeout, Some(DEFAULT_REAP_TIMEOUT));
    }

    #[tokio::test]
    async fn test_join_pump_classifies_outcomes() {
        let budget = Duration::from_millis(200);

        let ok = tokio::spawn(async { Ok(()) });
        assert!(join_pump("ok", Some(ok), budget, None).await);

        let failed = tokio::spawn(async {
            Err(crate::TransportError::Io(std::io::Error::other("pipe gone")))
        });
        assert!(!join_pump("failed", Some(failed), budget, None).await);

        let pending = tokio::spawn(std::future::pending::<Result<()>>());
        pending.abort();
        assert!(join_pump("cancelled", Some(pending), budget, None).await);

        assert!(join_pump("absent", None, budget, None).await);
    }

    #[tokio::test]
    async fn test_zero_budget_still_sees_cancellation() {
        let pending = tokio::spawn(std::future::pending::<Result<()>>());
        pending.abort();
        assert!(join_pump("cancelled", Some(pending), Duration::ZERO, None).await);
    }
}
