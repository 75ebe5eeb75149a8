//! Bounded retry for fallible async operations.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pause between attempts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// Sleep a fixed duration between attempts.
    Fixed(Duration),
}

/// Retry policy: at most `attempts` tries, separated by `backoff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Retry {
    attempts: u32,
    backoff: Backoff,
}

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Retry {
    /// Non-positive attempt counts are treated as 1.
    pub fn new(attempts: i64) -> Self {
        let attempts = attempts.clamp(1, u32::MAX as i64) as u32;
        Self {
            attempts,
            backoff: Backoff::None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Run `op` until it succeeds or attempts run out. `op` receives the
    /// 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.attempts => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last: e,
                    })
                }
                Err(e) => {
                    debug!(attempt, max = self.attempts, error = %e, "attempt failed, retrying");
                    if let Backoff::Fixed(pause) = self.backoff {
                        tokio::time::sleep(pause).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
