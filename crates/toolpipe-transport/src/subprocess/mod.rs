//! Tool servers running as child processes.
//!
//! A [`ProcessSpec`] describes what to launch, [`ProcessSession::start`]
//! spawns it and wires its stdio to message channels, and
//! [`ShutdownCoordinator`] takes it down again in bounded time.

mod pump;
mod session;
mod shutdown;
mod spec;

pub use session::ProcessSession;
pub use shutdown::{
    DEFAULT_REAP_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, ShutdownCoordinator, ShutdownReport,
    TerminationOutcome,
};
pub use spec::{DEFAULT_INHERITED_ENV_VARS, EnvInheritance, ProcessSpec, StderrMode};
