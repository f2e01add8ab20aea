//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;
use toolpipe_transport::{ProcessSpec, StderrMode};

/// Route `tracing` output through the test harness; `RUST_LOG` controls it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A `/bin/sh -c <script>` child with quiet stderr and a short grace period.
pub fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("/bin/sh")
        .with_args(["-c", script])
        .with_stderr(StderrMode::Null)
        .with_shutdown_grace(Duration::from_millis(100))
}
