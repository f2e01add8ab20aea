//! Connection lifecycle events
//!
//! Emitted by [`ConnectionSupervisor`](crate::ConnectionSupervisor) to an
//! optional observer, next to the regular `tracing` output.

use std::time::Duration;

/// Something that happened while establishing a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// An attempt is about to start.
    Attempting {
        /// 1-based attempt number
        attempt: u32,
        /// Configured attempt limit
        max_attempts: u32,
    },

    /// An attempt succeeded.
    Connected {
        /// Attempt that succeeded
        attempt: u32,
    },

    /// An attempt failed.
    AttemptFailed {
        /// Attempt that failed
        attempt: u32,
        /// Error text
        error: String,
        /// Pause before the next attempt; `None` when this was the last one
        retry_in: Option<Duration>,
    },

    /// Every attempt failed.
    Exhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl ConnectionEvent {
    /// Whether this event ends the connection sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected { .. } | Self::Exhausted { .. })
    }

    /// Get a human-readable description
    pub fn description(&self) -> String {
        match self {
            Self::Attempting {
                attempt,
                max_attempts,
            } => format!("Connecting (attempt {attempt}/{max_attempts})"),
            Self::Connected { attempt } => format!("Connected on attempt {attempt}"),
            Self::AttemptFailed {
                attempt,
                error,
                retry_in: Some(delay),
            } => format!("Attempt {attempt} failed: {error}; retrying in {delay:?}"),
            Self::AttemptFailed {
                attempt,
                error,
                retry_in: None,
            } => format!("Attempt {attempt} failed: {error}"),
            Self::Exhausted { attempts } => {
                format!("Giving up after {attempts} failed attempt(s)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_description() {
        let event = ConnectionEvent::AttemptFailed {
            attempt: 2,
            error: "connection refused".to_string(),
            retry_in: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            event.description(),
            "Attempt 2 failed: connection refused; retrying in 2s"
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        assert!(ConnectionEvent::Connected { attempt: 1 }.is_terminal());
        assert!(ConnectionEvent::Exhausted { attempts: 5 }.is_terminal());
        assert!(
            !ConnectionEvent::Attempting {
                attempt: 1,
                max_attempts: 5
            }
            .is_terminal()
        );
    }
}
