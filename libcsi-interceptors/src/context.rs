//! Per-call context threaded through the interceptor chain.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// State owned by a single call for as long as it is in the chain.
///
/// Cloning a context shares its cancellation token; use [`CallContext::child`]
/// for a context that can be cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    request_id: Option<u64>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl CallContext {
    /// A fresh context with no request id, no timeout and its own
    /// cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlation id assigned by the request-id interceptor, or forwarded
    /// by the caller.
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_request_id(mut self, id: u64) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Per-call timeout applied by the chain.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Abort the call with `DeadlineExceeded` if it runs longer than
    /// `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The token observed by the chain and the pager.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A context that is cancelled with this one but can also be cancelled
    /// independently.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            timeout: self.timeout,
            cancel: self.cancel.child_token(),
        }
    }
}
