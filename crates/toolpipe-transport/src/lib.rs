//! Process-based message transport for tool servers.
//!
//! A tool server is a child process speaking newline-delimited JSON over
//! stdin/stdout, or a network service exposing a `/health` endpoint. This
//! crate launches the former, moves messages in and out of it, takes it down
//! again in bounded time, and waits for either kind to become reachable.
//!
//! # Architecture
//!
//! - **Framing**: [`LineFramer`] turns messages into lines and arbitrary byte
//!   chunks back into [`Frame`]s, isolating bad lines
//! - **Sessions**: [`ProcessSession`] spawns a [`ProcessSpec`] and runs one
//!   pump task per pipe
//! - **Shutdown**: [`ShutdownCoordinator`] escalates SIGTERM to SIGKILL and
//!   never blocks on the child's exit
//! - **Supervision**: [`ConnectionSupervisor`] retries any [`Connect`] target
//!   at a fixed cadence; [`HealthWaiter`] polls HTTP servers
//!
//! # Usage
//!
//! ```no_run
//! use toolpipe_transport::{Message, ProcessSession, ProcessSpec};
//!
//! # async fn example() -> toolpipe_transport::Result<()> {
//! let spec = ProcessSpec::new("npx").with_args(["-y", "some-tool-server"]);
//! let mut session = ProcessSession::start(spec).await?;
//!
//! session
//!     .send(Message::new().with("jsonrpc", "2.0").with("method", "ping").with("id", 1))
//!     .await?;
//! if let Some(Ok(reply)) = session.recv().await {
//!     println!("{reply:?}");
//! }
//!
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod framing;
pub mod http;
pub mod message;
pub mod presets;
pub mod subprocess;
pub mod supervisor;
pub mod traits;

// Re-export commonly used types
pub use error::{FrameError, Result, TransportError};
pub use events::ConnectionEvent;
pub use framing::{DecodePolicy, LineFramer};
pub use crate::http::{HealthCheckConfig, HealthReport, HealthWaiter, HttpServerSpec};
pub use message::{Frame, Message};
pub use subprocess::{
    EnvInheritance, ProcessSession, ProcessSpec, ShutdownCoordinator, ShutdownReport, StderrMode,
    TerminationOutcome,
};
pub use supervisor::{ConnectionSupervisor, connect_with_retry};
pub use traits::{Connect, MessageTransport};
