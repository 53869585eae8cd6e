use crate::core::Result;
use futures::future::BoxFuture;
use log::warn;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry Policy: re-invoke a failed operation with a fixed delay.
///
/// `retries` is the number of additional attempts after the first, so the
/// total attempt count is `retries + 1` and `retries = 0` means exactly one
/// attempt with no delay. The retry is blind: any failure triggers another
/// attempt regardless of its kind. Intermediate failures are logged and
/// swallowed; the failure from the final attempt is surfaced unchanged, with
/// no wrapper error masking the cause.
///
/// The pause between attempts is a non-blocking `tokio::time::sleep`; it
/// suspends only the calling task.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
    deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            deadline: None,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Cap the total time spent across all attempts.
    ///
    /// This is a hardening addition, off by default: when the next pause
    /// would exceed the deadline, the policy stops early and surfaces the
    /// most recent failure instead of sleeping.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Invoke `op` until it succeeds or attempts are exhausted.
    ///
    /// The closure is called once per attempt and builds a fresh future each
    /// time, so composing retry *outside* a connection scope opens a fresh
    /// connection per attempt.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let total = self.retries + 1;
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= total {
                        warn!("all {} attempts failed, last error: {}", total, err);
                        return Err(err);
                    }
                    if let Some(deadline) = self.deadline {
                        if started.elapsed() + self.delay >= deadline {
                            warn!(
                                "retry deadline reached after {} attempts, last error: {}",
                                attempt, err
                            );
                            return Err(err);
                        }
                    }
                    warn!(
                        "attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, total, err, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }

    /// Retry against one already-open connection.
    ///
    /// All attempts reuse the same borrowed handle; use this to compose
    /// retry *inside* a connection scope.
    pub async fn run_on<C, T, F>(&self, conn: &mut C, mut op: F) -> Result<T>
    where
        F: for<'c> FnMut(&'c mut C) -> BoxFuture<'c, Result<T>>,
    {
        let started = Instant::now();
        let total = self.retries + 1;
        let mut attempt: u32 = 0;

        loop {
            match op(&mut *conn).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= total {
                        warn!("all {} attempts failed, last error: {}", total, err);
                        return Err(err);
                    }
                    if let Some(deadline) = self.deadline {
                        if started.elapsed() + self.delay >= deadline {
                            warn!(
                                "retry deadline reached after {} attempts, last error: {}",
                                attempt, err
                            );
                            return Err(err);
                        }
                    }
                    warn!(
                        "attempt {}/{} failed: {}, retrying in {:?}",
                        attempt, total, err, self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three retries, two seconds apart — the classic defaults.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
