//! Run-scoped deadline.
//!
//! One [`Deadline`] is created at the top of a run and handed to every
//! operation that touches the network or spawns a process. Each such operation
//! wraps its future in [`Deadline::run`]; once the instant passes, the future is
//! dropped (child processes are spawned with `kill_on_drop`) and
//! [`StackError::Cancelled`] is returned. Nothing is retried.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::StackError;

/// An optional absolute instant after which work is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now.
    #[must_use]
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Some(Instant::now() + limit),
            limit,
        }
    }

    /// A deadline that never expires.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            at: None,
            limit: Duration::ZERO,
        }
    }

    /// `Some(secs)` → deadline, `None` or zero → unlimited.
    #[must_use]
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(s) if s > 0 => Self::after(Duration::from_secs(s)),
            _ => Self::none(),
        }
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail fast with `Cancelled` if the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.expired() {
            return Err(self.cancelled(operation).into());
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the deadline passes first.
    pub async fn run<F, T>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.at {
            None => fut.await,
            Some(at) => match tokio::time::timeout_at(at, fut).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("{} exceeded the {}s deadline", operation, self.limit.as_secs());
                    Err(self.cancelled(operation).into())
                }
            },
        }
    }

    fn cancelled(&self, operation: &str) -> StackError {
        StackError::Cancelled {
            operation: operation.to_string(),
            seconds: self.limit.as_secs(),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
