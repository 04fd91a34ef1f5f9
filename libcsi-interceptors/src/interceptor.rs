//! The unary call boundary and the interceptor contract.
//!
//! A [`UnaryHandler`] is whatever finally answers a request: a plugin
//! dispatcher on the serving side, a transport invoker on the calling side.
//! An [`Interceptor`] wraps that boundary and decides whether, and how, to
//! continue down the chain through [`Next`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::{CsiRequest, CsiResponse};

/// A unary `(context, request) -> response` call.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    /// Answer a single request.
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError>;
}

#[async_trait]
impl<T: UnaryHandler + ?Sized> UnaryHandler for Arc<T> {
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        (**self).call(ctx, req).await
    }
}

/// Adapts an async closure into a [`UnaryHandler`].
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> UnaryHandler for HandlerFn<F>
where
    F: Fn(CallContext, CsiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CsiResponse, CsiError>> + Send,
{
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        (self.0)(ctx, req).await
    }
}

/// Build a [`HandlerFn`], pinning the closure's argument types.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(CallContext, CsiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CsiResponse, CsiError>> + Send,
{
    HandlerFn(f)
}

/// A wrapper applied uniformly around every unary call.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Short, stable name used for ordering checks and diagnostics.
    fn name(&self) -> &'static str;

    /// Handle `req`, usually by calling [`Next::run`] exactly once.
    ///
    /// Returning without running `next` short-circuits the rest of the chain
    /// and the handler.
    async fn intercept(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        next: Next<'_>,
    ) -> Result<CsiResponse, CsiError>;
}

/// The remainder of a chain: the interceptors not yet run, then the handler.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    handler: &'a dyn UnaryHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Interceptor>], handler: &'a dyn UnaryHandler) -> Self {
        Self { rest, handler }
    }

    /// Continue with the next interceptor, or the handler once none remain.
    pub async fn run(self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        match self.rest.split_first() {
            Some((first, rest)) => {
                first
                    .intercept(ctx, req, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.call(ctx, req).await,
        }
    }
}
