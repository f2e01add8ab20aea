//! The retry strategy trait.

use async_trait::async_trait;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// A strategy for retrying failed operations.
///
/// Implementations decide how many attempts an operation gets, how long to
/// pause after a failed attempt, and which errors are worth retrying at all.
///
/// Attempts are counted from 1. `next_delay(n)` is asked after attempt `n`
/// failed; `None` means the budget is spent.
///
/// # Examples
///
/// ```rust
/// use toolpipe_core::retry::{BackoffStrategy, FixedDelay};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = FixedDelay::new(3, Duration::from_millis(100));
///
/// let result = policy.execute(|| async {
///     // Your async operation here
///     Ok::<_, std::io::Error>(42)
/// }).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BackoffStrategy: Send + Sync {
    /// Execute an operation until it succeeds, fails with a non-retryable
    /// error, or runs out of attempts.
    ///
    /// # Returns
    /// - `Ok(T)`: The first successful result
    /// - `Err(E)`: The error of the last attempt
    ///
    /// # Examples
    ///
    /// ```rust
    /// use toolpipe_core::retry::{BackoffStrategy, FixedDelay};
    /// use std::time::Duration;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let policy = FixedDelay::new(3, Duration::from_millis(1));
    ///
    /// let attempts = Arc::new(AtomicU32::new(0));
    /// let result = policy.execute(|| {
    ///     let attempts = Arc::clone(&attempts);
    ///     async move {
    ///         if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
    ///             Err(std::io::Error::other("server not up yet"))
    ///         } else {
    ///             Ok("connected")
    ///         }
    ///     }
    /// }).await?;
    /// assert_eq!(result, "connected");
    /// # Ok(())
    /// # }
    /// ```
    async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Error + Send + Sync + 'static,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if !self.should_retry(&err, attempt) => return Err(err),
                Err(err) => match self.next_delay(attempt) {
                    Some(delay) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(attempt, ?delay, error = %err, "attempt failed, retrying");
                        drop(err);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Determine if an error is retryable.
    ///
    /// Default implementation retries every error.
    fn should_retry(&self, error: &dyn Error, attempt: u32) -> bool {
        let _ = (error, attempt);
        true
    }

    /// Pause to take after attempt `attempt` (1-indexed) failed, or `None`
    /// when no further attempt should be made.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Total number of attempts, including the first one.
    fn max_attempts(&self) -> u32;
}
