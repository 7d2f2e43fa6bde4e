//! Operation Context
//!
//! Carries the cancellation signal and the optional deadline of one inbound
//! request down to every command it runs.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline scope of one operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::background()
    }
}

impl OperationContext {
    /// Context with no deadline that is only cancelled explicitly
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context expiring `timeout` from now
    ///
    /// A timeout too far out to be represented leaves the context unbounded.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child scope that is cancelled with its parent and never
    /// outlives the parent's deadline
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let deadline = match timeout {
            Some(timeout) => self.effective_deadline(timeout),
            None => self.deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The earlier of this context's deadline and `now + timeout`
    ///
    /// `None` when neither bound is representable.
    pub fn effective_deadline(&self, timeout: Duration) -> Option<Instant> {
        match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(deadline), Some(bounded)) => Some(deadline.min(bounded)),
            (deadline, bounded) => deadline.or(bounded),
        }
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the operation is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
