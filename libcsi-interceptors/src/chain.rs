//! Interceptor chain composition.
//!
//! An [`InterceptorChain`] is an ordered list of interceptors applied around
//! a [`UnaryHandler`].  The same chain type wraps both sides of the call
//! boundary:
//!
//! - [`Served`] puts a chain in front of a serving-side handler, usually a
//!   [`PluginDispatcher`](crate::server::PluginDispatcher).
//! - [`Channel`] puts a chain in front of a calling-side invoker (whatever
//!   carries requests to a remote plugin) and exposes the CSI services as
//!   typed methods.
//!
//! The canonical order built by [`InterceptorChain::from_config`] is
//! request id → spec validator → serial access → logging → handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{ChainConfig, ConfigError, LogDestination, LoggingConfig};
use crate::context::CallContext;
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::interceptor::{Interceptor, Next, UnaryHandler};
use crate::interceptors::logging::{Direction, LogSink, LoggingInterceptor, TracingSink, WriterSink};
use crate::interceptors::{RequestIdInterceptor, SerialVolumeAccess, SpecValidator};
use crate::message::{CsiRequest, CsiResponse, Method};
use crate::node::CsiNode;
use crate::types::*;
use crate::version::Version;

/// An ordered, immutable list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// A chain with no interceptors; calls go straight to the handler.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the canonical chain for `cfg`, leaving out disabled stages.
    pub fn from_config(cfg: &ChainConfig) -> Result<Self, ConfigError> {
        let mut builder = ChainBuilder::new();
        if cfg.request_ids {
            builder = builder.with(RequestIdInterceptor::new());
        }
        if cfg.spec_validation.is_enabled() {
            builder = builder.with(SpecValidator::new(cfg.spec_validation.clone()));
        }
        if cfg.serial_access.enabled {
            builder = builder.with(SerialVolumeAccess::for_methods(
                cfg.serial_access.methods.iter().copied(),
            ));
        }
        if cfg.logging.is_enabled() {
            builder = builder.with(logging_from_config(&cfg.logging));
        }
        let chain = builder.build()?;
        debug!(interceptors = ?chain.names(), "assembled interceptor chain");
        Ok(chain)
    }

    /// Names of the interceptors, outermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run `req` through every interceptor and then `handler`.
    ///
    /// The call is abandoned with [`CsiError::Cancelled`] once the context's
    /// token is cancelled, or with [`CsiError::DeadlineExceeded`] once its
    /// timeout elapses.  Abandoning drops the in-progress call, which
    /// releases anything it holds (such as a serial-access key).
    pub async fn call(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        handler: &dyn UnaryHandler,
    ) -> Result<CsiResponse, CsiError> {
        let cancel = ctx.cancellation().clone();
        let timeout = ctx.timeout();
        let run = Next::new(&self.interceptors, handler).run(ctx, req);
        let run = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, run)
                    .await
                    .unwrap_or(Err(CsiError::DeadlineExceeded)),
                None => run.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CsiError::Cancelled),
            rep = run => rep,
        }
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}

fn logging_from_config(cfg: &LoggingConfig) -> LoggingInterceptor {
    let (request_sink, response_sink): (Arc<dyn LogSink>, Arc<dyn LogSink>) = match cfg.sink {
        LogDestination::Tracing => (
            Arc::new(TracingSink::new(Direction::Request)),
            Arc::new(TracingSink::new(Direction::Response)),
        ),
        LogDestination::Stdout => {
            let sink: Arc<dyn LogSink> = Arc::new(WriterSink::stdout());
            (Arc::clone(&sink), sink)
        }
        LogDestination::Stderr => {
            let sink: Arc<dyn LogSink> = Arc::new(WriterSink::stderr());
            (Arc::clone(&sink), sink)
        }
    };

    let mut logging = LoggingInterceptor::new().with_redacted_fields(cfg.redacted_fields.clone());
    if cfg.request {
        logging = logging.with_request_logging(request_sink);
    }
    if cfg.response {
        logging = logging.with_response_logging(response_sink);
    }
    logging
}

/// Assembles an [`InterceptorChain`] in caller-chosen order.
#[derive(Default)]
pub struct ChainBuilder {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ChainBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interceptor; the first one added is the outermost.
    #[must_use]
    pub fn with(self, interceptor: impl Interceptor + 'static) -> Self {
        self.with_arc(Arc::new(interceptor))
    }

    /// Append an interceptor the caller keeps a handle to.
    #[must_use]
    pub fn with_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Finish the chain.
    ///
    /// Fails when serial access would run before spec validation, since an
    /// invalid request must never claim a volume key.
    pub fn build(self) -> Result<InterceptorChain, ConfigError> {
        let position = |name: &str| self.interceptors.iter().position(|i| i.name() == name);
        let serial = position(SerialVolumeAccess::NAME);
        let validator = position(SpecValidator::NAME);
        if matches!((serial, validator), (Some(s), Some(v)) if s < v) {
            return Err(ConfigError::Ordering(format!(
                "{} must come after {}",
                SerialVolumeAccess::NAME,
                SpecValidator::NAME
            )));
        }
        Ok(InterceptorChain {
            interceptors: self.interceptors,
        })
    }
}

/// A serving-side handler behind an interceptor chain.
pub struct Served<H> {
    chain: Arc<InterceptorChain>,
    handler: H,
}

impl<H: UnaryHandler> Served<H> {
    pub fn new(chain: Arc<InterceptorChain>, handler: H) -> Self {
        Self { chain, handler }
    }

    #[must_use]
    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: UnaryHandler> UnaryHandler for Served<H> {
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        self.chain.call(ctx, req, &self.handler).await
    }
}

/// A calling-side invoker behind an interceptor chain.
///
/// Besides being a [`UnaryHandler`], a channel implements [`CsiIdentity`],
/// [`CsiController`] and [`CsiNode`], so a remote plugin can be driven
/// through the same traits as a local one.
pub struct Channel<I> {
    chain: Arc<InterceptorChain>,
    invoker: I,
    version: Option<Version>,
}

impl<I: UnaryHandler> Channel<I> {
    pub fn new(chain: Arc<InterceptorChain>, invoker: I) -> Self {
        Self {
            chain,
            invoker,
            version: None,
        }
    }

    /// Protocol version stamped on the requests the channel builds itself
    /// (probes and `GetNodeId`).
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    async fn invoke(&self, ctx: &CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        self.chain.call(ctx.clone(), req, &self.invoker).await
    }
}

#[async_trait]
impl<I: UnaryHandler> UnaryHandler for Channel<I> {
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        self.chain.call(ctx, req, &self.invoker).await
    }
}

fn unexpected(method: Method, rep: CsiResponse) -> CsiError {
    CsiError::UnexpectedResponse {
        method: method.full_name().to_owned(),
        got: rep.to_string(),
    }
}

#[async_trait]
impl<I: UnaryHandler> CsiIdentity for Channel<I> {
    async fn get_supported_versions(&self, ctx: &CallContext) -> Result<Vec<Version>, CsiError> {
        let req = CsiRequest::GetSupportedVersions(GetSupportedVersionsRequest {});
        match self.invoke(ctx, req).await? {
            CsiResponse::GetSupportedVersions(r) => Ok(r.supported_versions),
            other => Err(unexpected(Method::GetSupportedVersions, other)),
        }
    }

    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        match self.invoke(ctx, CsiRequest::GetPluginInfo(req)).await? {
            CsiResponse::GetPluginInfo(r) => Ok(r),
            other => Err(unexpected(Method::GetPluginInfo, other)),
        }
    }
}

#[async_trait]
impl<I: UnaryHandler> CsiController for Channel<I> {
    async fn create_volume(
        &self,
        ctx: &CallContext,
        req: CreateVolumeRequest,
    ) -> Result<Volume, CsiError> {
        match self.invoke(ctx, CsiRequest::CreateVolume(req)).await? {
            CsiResponse::CreateVolume(r) => Ok(r.volume_info),
            other => Err(unexpected(Method::CreateVolume, other)),
        }
    }

    async fn delete_volume(
        &self,
        ctx: &CallContext,
        req: DeleteVolumeRequest,
    ) -> Result<(), CsiError> {
        match self.invoke(ctx, CsiRequest::DeleteVolume(req)).await? {
            CsiResponse::DeleteVolume => Ok(()),
            other => Err(unexpected(Method::DeleteVolume, other)),
        }
    }

    async fn controller_publish_volume(
        &self,
        ctx: &CallContext,
        req: ControllerPublishVolumeRequest,
    ) -> Result<StringMap, CsiError> {
        match self
            .invoke(ctx, CsiRequest::ControllerPublishVolume(req))
            .await?
        {
            CsiResponse::ControllerPublishVolume(r) => Ok(r.publish_volume_info),
            other => Err(unexpected(Method::ControllerPublishVolume, other)),
        }
    }

    async fn controller_unpublish_volume(
        &self,
        ctx: &CallContext,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        match self
            .invoke(ctx, CsiRequest::ControllerUnpublishVolume(req))
            .await?
        {
            CsiResponse::ControllerUnpublishVolume => Ok(()),
            other => Err(unexpected(Method::ControllerUnpublishVolume, other)),
        }
    }

    async fn validate_volume_capabilities(
        &self,
        ctx: &CallContext,
        req: ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError> {
        match self
            .invoke(ctx, CsiRequest::ValidateVolumeCapabilities(req))
            .await?
        {
            CsiResponse::ValidateVolumeCapabilities(r) => Ok(r),
            other => Err(unexpected(Method::ValidateVolumeCapabilities, other)),
        }
    }

    async fn list_volumes(
        &self,
        ctx: &CallContext,
        req: ListVolumesRequest,
    ) -> Result<ListVolumesResponse, CsiError> {
        match self.invoke(ctx, CsiRequest::ListVolumes(req)).await? {
            CsiResponse::ListVolumes(r) => Ok(r),
            other => Err(unexpected(Method::ListVolumes, other)),
        }
    }

    async fn get_capacity(
        &self,
        ctx: &CallContext,
        req: GetCapacityRequest,
    ) -> Result<u64, CsiError> {
        match self.invoke(ctx, CsiRequest::GetCapacity(req)).await? {
            CsiResponse::GetCapacity(r) => Ok(r.available_capacity),
            other => Err(unexpected(Method::GetCapacity, other)),
        }
    }

    async fn controller_probe(&self, ctx: &CallContext) -> Result<(), CsiError> {
        let req = CsiRequest::ControllerProbe(ProbeRequest {
            version: self.version,
        });
        match self.invoke(ctx, req).await? {
            CsiResponse::ControllerProbe => Ok(()),
            other => Err(unexpected(Method::ControllerProbe, other)),
        }
    }
}

#[async_trait]
impl<I: UnaryHandler> CsiNode for Channel<I> {
    async fn node_publish_volume(
        &self,
        ctx: &CallContext,
        req: NodePublishVolumeRequest,
    ) -> Result<(), CsiError> {
        match self.invoke(ctx, CsiRequest::NodePublishVolume(req)).await? {
            CsiResponse::NodePublishVolume => Ok(()),
            other => Err(unexpected(Method::NodePublishVolume, other)),
        }
    }

    async fn node_unpublish_volume(
        &self,
        ctx: &CallContext,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        match self
            .invoke(ctx, CsiRequest::NodeUnpublishVolume(req))
            .await?
        {
            CsiResponse::NodeUnpublishVolume => Ok(()),
            other => Err(unexpected(Method::NodeUnpublishVolume, other)),
        }
    }

    async fn get_node_id(&self, ctx: &CallContext) -> Result<String, CsiError> {
        let req = CsiRequest::GetNodeId(GetNodeIdRequest {
            version: self.version,
        });
        match self.invoke(ctx, req).await? {
            CsiResponse::GetNodeId(r) => Ok(r.node_id),
            other => Err(unexpected(Method::GetNodeId, other)),
        }
    }

    async fn node_probe(&self, ctx: &CallContext) -> Result<(), CsiError> {
        let req = CsiRequest::NodeProbe(ProbeRequest {
            version: self.version,
        });
        match self.invoke(ctx, req).await? {
            CsiResponse::NodeProbe => Ok(()),
            other => Err(unexpected(Method::NodeProbe, other)),
        }
    }
}
