#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions shared by the toolpipe crates.
//!
//! - **Retry strategies** via the [`BackoffStrategy`](retry::BackoffStrategy) trait,
//!   with [`FixedDelay`](retry::FixedDelay) as the policy used for connecting to
//!   tool servers (fixed count, fixed delay, no growth, no jitter)
//! - **Declarative error boundaries** via the [`error_boundary!`] macro
//!
//! # Examples
//!
//! ```rust
//! use toolpipe_core::prelude::*;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = FixedDelay::new(3, Duration::from_millis(10));
//!
//! let result = policy.execute(|| async {
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod retry;

pub use retry::{BackoffStrategy, FixedDelay};

/// Convenient re-exports of commonly used items.
pub mod prelude {
    pub use crate::error_boundary;
    pub use crate::retry::{BackoffStrategy, FixedDelay};
}
