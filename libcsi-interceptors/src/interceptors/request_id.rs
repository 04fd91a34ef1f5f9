//! Per-call correlation ids.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{Instrument, debug_span};

use crate::context::CallContext;
use crate::error::CsiError;
use crate::interceptor::{Interceptor, Next};
use crate::message::{CsiRequest, CsiResponse};

/// Last id handed out in this process.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

/// Assigns a monotonically increasing id to every call that does not already
/// carry one.
///
/// Ids come from one process-wide counter starting at 1, so every chain in
/// the process draws from the same sequence and no two calls share an id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdInterceptor;

impl RequestIdInterceptor {
    /// Stable name reported by [`Interceptor::name`].
    pub const NAME: &'static str = "request_id";

    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn allocate() -> u64 {
        NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn intercept(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        next: Next<'_>,
    ) -> Result<CsiResponse, CsiError> {
        let ctx = match ctx.request_id() {
            Some(_) => ctx,
            None => ctx.with_request_id(Self::allocate()),
        };
        let span = debug_span!("csi_call", method = %req.method(), request_id = ctx.request_id());
        next.run(ctx, req).instrument(span).await
    }
}
