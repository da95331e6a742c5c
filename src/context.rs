//! Cancellation contexts
//!
//! A [`Context`] bounds how long a caller is willing to wait for a control
//! interface operation. It combines an explicit cancellation token with an
//! optional deadline; whichever fires first ends the wait.
//!
//! Contexts form a tree: a context derived with [`Context::child`],
//! [`Context::with_timeout`] or [`Context::with_deadline`] is cancelled along
//! with its parent and never outlives the parent's deadline, while cancelling
//! the child leaves the parent untouched.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped waiting
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    /// [`Context::cancel`] was called on the context or one of its ancestors
    #[error("context canceled")]
    Canceled,

    /// The context's deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation token plus optional deadline passed to every blocking call
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a root context that only ends when cancelled explicitly
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a context that is cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a context that expires `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that expires at `deadline`, or earlier if this one does
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(inherited) => inherited.min(deadline),
            None => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The instant after which the context reports `DeadlineExceeded`
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking check; `None` while the context is still live
    pub fn err(&self) -> Option<Cancellation> {
        if self.token.is_cancelled() {
            return Some(Cancellation::Canceled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancellation::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the context is cancelled or its deadline passes
    pub async fn done(&self) -> Cancellation {
        if let Some(reason) = self.err() {
            return reason;
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Cancellation::Canceled,
            _ = expired => Cancellation::DeadlineExceeded,
        }
    }

    /// Sleep for `duration`, waking early if the context ends first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancellation> {
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
