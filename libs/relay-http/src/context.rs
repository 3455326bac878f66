//! Per-call cancellation and deadline, carried as a request extension.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline governing one intercepted call.
///
/// Attach it to the outbound request with
/// `request.extensions_mut().insert(ctx)` (or through
/// [`RequestBuilder::context`](crate::RequestBuilder::context)). The relay
/// uses the same context for the gateway leg: cancelling the token aborts
/// the gateway call, and a deadline shortens the configured timeout.
///
/// A request without a `CallContext` is never cancelled and is bounded only
/// by the configured timeout.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context with a fresh token and no deadline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context driven by an existing cancellation token
    #[must_use]
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set an absolute deadline
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Absolute deadline, if one was set
    #[must_use]
    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token that aborts the call when cancelled
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the call
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the call has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Time left before the effective deadline.
    ///
    /// The tighter of `configured` and this context's deadline; zero once
    /// the deadline has passed.
    #[must_use]
    pub fn remaining(&self, configured: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(configured),
            None => configured,
        }
    }
}
