use std::{fmt, future::Future, time::Duration};

use async_trait::async_trait;
use tokio_retry::strategy::FixedInterval;
use tracing::debug;

/// A retry strategy trait.
pub trait Strategy: Iterator<Item = Duration> + Clone + Send + Sync + 'static {}

/// Implement the Strategy trait for any type that is an iterator of Durations (i.e. all backoffs
/// exported by `tokio_retry`)
impl<T> Strategy for T where T: Iterator<Item = Duration> + Clone + Send + Sync + 'static {}

/// Something that can wait for a given duration.
///
/// Production code waits on the Tokio timer; tests inject an implementation that returns
/// immediately and records the requested delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration` before returning.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returned when every attempt of a bounded retry failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// Number of attempts made
    pub attempts: u32,
    /// Error produced by the final attempt
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last_error)
    }
}

/// A fixed cadence allowing at most `max_attempts` attempts.
///
/// The strategy yields one delay per retry, so `max_attempts - 1` delays. A budget of zero is
/// treated as a single attempt.
pub fn fixed_attempts(interval: Duration, max_attempts: u32) -> impl Strategy {
    FixedInterval::new(interval).take(max_attempts.max(1) as usize - 1)
}

/// Run `op` until it succeeds or `strategy` runs out of delays.
///
/// Between attempts the next delay produced by `strategy` is awaited through `sleeper`.
pub async fn retry_with_strategy<S, Z, F, Fut, T, E>(
    strategy: S,
    sleeper: &Z,
    mut op: F,
) -> Result<T, Exhausted<E>>
where
    S: Strategy,
    Z: Sleeper + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut delays = strategy;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => match delays.next() {
                Some(delay) => {
                    debug!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    sleeper.sleep(delay).await;
                }
                None => return Err(Exhausted { attempts, last_error: e }),
            },
        }
    }
}
