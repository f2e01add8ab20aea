//! Bounded, fixed-cadence connection retry.

use crate::events::ConnectionEvent;
use crate::traits::Connect;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use toolpipe_core::retry::{BackoffStrategy, FixedDelay};
use tracing::{error, info, warn};

/// Attempt budget used by [`ConnectionSupervisor::default`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Pause between attempts used by [`ConnectionSupervisor::default`].
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

type Observer = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Runs a connection attempt until it succeeds or the budget is spent.
///
/// Attempts are strictly sequential with the same pause after every failure
/// and none after the last one. Failures never escape: the outcome is a
/// plain `bool`, and the reasons are logged (and reported to the observer,
/// if one is set).
///
/// ```rust
/// use std::time::Duration;
/// use toolpipe_transport::{ConnectionSupervisor, TransportError};
///
/// # async fn example() {
/// let supervisor = ConnectionSupervisor::new(3, Duration::from_millis(10));
/// let up = supervisor
///     .connect_with_retry(|| async { Err::<(), _>(TransportError::Http("refused".into())) })
///     .await;
/// assert!(!up);
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionSupervisor {
    policy: FixedDelay,
    observer: Option<Observer>,
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("policy", &self.policy)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl ConnectionSupervisor {
    /// Create a supervisor making at most `max_attempts` attempts, `delay`
    /// apart.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            policy: FixedDelay::new(max_attempts, delay),
            observer: None,
        }
    }

    /// Report every [`ConnectionEvent`] to `observer`.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts()
    }

    /// Pause between attempts
    pub fn delay(&self) -> Duration {
        self.policy.delay()
    }

    /// Invoke `factory` until it succeeds or the attempts run out.
    ///
    /// Returns `true` on the first success. With a budget of zero the
    /// factory is never called and the result is `false`.
    pub async fn connect_with_retry<C: Connect>(&self, factory: C) -> bool {
        self.connect(&factory).await
    }

    /// Same as [`connect_with_retry`](Self::connect_with_retry), borrowing
    /// the target.
    pub async fn connect<C: Connect + ?Sized>(&self, target: &C) -> bool {
        let max_attempts = self.policy.max_attempts();
        let server = target.describe();
        if max_attempts == 0 {
            warn!(%server, "connection attempt budget is zero; not connecting");
            self.emit(ConnectionEvent::Exhausted { attempts: 0 });
            return false;
        }

        for attempt in 1..=max_attempts {
            info!(%server, attempt, max_attempts, "connecting");
            self.emit(ConnectionEvent::Attempting {
                attempt,
                max_attempts,
            });

            match target.connect().await {
                Ok(()) => {
                    info!(%server, attempt, "connected");
                    self.emit(ConnectionEvent::Connected { attempt });
                    return true;
                }
                Err(e) => {
                    let retry_in = self.policy.next_delay(attempt);
                    warn!(%server, attempt, max_attempts, error = %e, "connection attempt failed");
                    self.emit(ConnectionEvent::AttemptFailed {
                        attempt,
                        error: e.to_string(),
                        retry_in,
                    });
                    if let Some(delay) = retry_in {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!(%server, attempts = max_attempts, "could not connect; giving up");
        self.emit(ConnectionEvent::Exhausted {
            attempts: max_attempts,
        });
        false
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}

/// Run `factory` up to `max_attempts` times, `delay` apart, with a one-off
/// [`ConnectionSupervisor`].
pub async fn connect_with_retry<C: Connect>(factory: C, max_attempts: u32, delay: Duration) -> bool {
    ConnectionSupervisor::new(max_attempts, delay)
        .connect_with_retry(factory)
        .await
}
