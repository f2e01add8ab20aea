//! Transport error types

use std::time::Duration;
use thiserror::Error;
use toolpipe_core::error_boundary;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations.
///
/// Expected operational conditions (a bad line from the child, a server that
/// is not healthy yet, a process that already exited) never surface here;
/// they are absorbed by the component that observes them. What remains are
/// configuration mistakes and genuine failures the caller has to act on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The child process could not be created.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that was being launched
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Invalid or incomplete configuration, detected before any process or
    /// connection is attempted.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error on a process pipe
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A URL could not be parsed or derived
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// An operation did not finish within its time budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The session's channel or stream is no longer open
    #[error("stream closed")]
    StreamClosed,
}

error_boundary!(serde_json::Error => TransportError, |e| {
    TransportError::Serialization(e.to_string())
});

error_boundary!(reqwest::Error => TransportError, |e| {
    TransportError::Http(e.to_string())
});

error_boundary!(url::ParseError => TransportError, |e| {
    TransportError::InvalidUrl(e.to_string())
});

/// A received line that could not be turned into a [`Message`](crate::Message).
///
/// Delivered in-band on the inbound channel next to well-formed messages, so
/// consumers can tell protocol corruption from valid traffic. Receiving one
/// never stops the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The line is not valid JSON, or is JSON but not an object.
    #[error("malformed message ({reason}): {line}")]
    Malformed {
        /// The offending line, without its terminator
        line: String,
        /// Parser diagnostic
        reason: String,
    },

    /// The line is not valid UTF-8 and the decode policy is strict.
    #[error("invalid UTF-8 in line ({reason}): {line}")]
    InvalidEncoding {
        /// The offending line, lossily decoded for diagnostics
        line: String,
        /// Decoder diagnostic
        reason: String,
    },

    /// The line grew beyond the configured maximum and was discarded.
    #[error("line exceeds {max_bytes} bytes (saw {observed_bytes})")]
    Oversized {
        /// Configured limit
        max_bytes: usize,
        /// Bytes buffered when the limit was hit
        observed_bytes: usize,
    },
}

impl FrameError {
    /// The offending line, when the error carries one.
    pub fn line(&self) -> Option<&str> {
        match self {
            Self::Malformed { line, .. } | Self::InvalidEncoding { line, .. } => Some(line),
            Self::Oversized { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_program() {
        let err = TransportError::Spawn {
            program: "npx".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let text = err.to_string();
        assert!(text.contains("npx"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_json_error_converts() {
        fn parse() -> Result<serde_json::Value> {
            Ok(serde_json::from_str("{nope")?)
        }
        assert!(matches!(parse(), Err(TransportError::Serialization(_))));
    }

    #[test]
    fn test_url_error_converts() {
        fn parse() -> Result<url::Url> {
            Ok(url::Url::parse("not a url")?)
        }
        assert!(matches!(parse(), Err(TransportError::InvalidUrl(_))));
    }

    #[test]
    fn test_frame_error_line() {
        let err = FrameError::Malformed {
            line: "{oops".to_string(),
            reason: "EOF".to_string(),
        };
        assert_eq!(err.line(), Some("{oops"));
        assert!(err.to_string().contains("{oops"));

        let err = FrameError::Oversized {
            max_bytes: 10,
            observed_bytes: 11,
        };
        assert_eq!(err.line(), None);
    }
}
