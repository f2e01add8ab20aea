//! Seams between the transports and the code driving them.
//!
//! [`Connect`] is what the supervisor retries; [`MessageTransport`] is what a
//! protocol client talks through once connected.

use crate::error::Result;
use crate::message::{Frame, Message};
use async_trait::async_trait;

/// A single attempt to reach a tool server.
///
/// Implemented for [`ProcessSpec`](crate::ProcessSpec) (spawn and tear down),
/// [`HttpServerSpec`](crate::HttpServerSpec) (one health probe), and for any
/// closure returning a future of `Result<()>`, which keeps ad-hoc factories
/// cheap to write in tests.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Try once. Any error counts as a failed attempt.
    async fn connect(&self) -> Result<()>;

    /// Short human-readable target name for logs.
    fn describe(&self) -> String {
        "tool server".to_string()
    }
}

#[async_trait]
impl<F, Fut> Connect for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    async fn connect(&self) -> Result<()> {
        (self)().await
    }
}

/// A bidirectional, ordered message channel to a tool server.
#[async_trait]
pub trait MessageTransport: Send {
    /// Queue a message for delivery.
    async fn send(&self, message: Message) -> Result<()>;

    /// Next inbound frame, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Frame>;

    /// Tear the transport down. Idempotent and infallible.
    async fn close(&mut self);

    /// Whether [`close`](Self::close) has run.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_closures_are_connectors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let connector = move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TransportError::Http("connection refused".to_string()))
            } else {
                Ok(())
            }
        };

        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
        assert_eq!(connector.describe(), "tool server");
    }
}
