//! Retry strategies.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - Core trait for retry strategies
//! - [`FixedDelay`] - Fixed attempt budget with a constant pause between attempts
//!
//! # Examples
//!
//! ```rust
//! use toolpipe_core::retry::{BackoffStrategy, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = FixedDelay::new(5, Duration::from_secs(2));
//!
//! let result = policy.execute(|| async {
//!     // Your operation here
//!     Ok::<_, std::io::Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

mod fixed;
mod strategy;

pub use fixed::FixedDelay;
pub use strategy::BackoffStrategy;
