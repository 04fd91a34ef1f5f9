//! Serving-side dispatch from [`CsiRequest`] to a plugin's trait methods.
//!
//! [`PluginDispatcher`] is the innermost [`UnaryHandler`] on the serving
//! side.  Wrap it in a [`Served`](crate::chain::Served) to put an
//! interceptor chain in front of a plugin:
//!
//! ```ignore
//! let plugin = Arc::new(MyPlugin::default());
//! let chain = Arc::new(InterceptorChain::from_config(&ChainConfig::from_env()?)?);
//! let served = Served::new(chain, PluginDispatcher::new(plugin));
//! let rep = served.call(CallContext::new(), req).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::context::CallContext;
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::interceptor::UnaryHandler;
use crate::message::{CsiRequest, CsiResponse};
use crate::node::CsiNode;
use crate::types::*;

/// Routes each request to the matching [`CsiIdentity`], [`CsiController`]
/// or [`CsiNode`] method of `T`.
pub struct PluginDispatcher<T: ?Sized> {
    plugin: Arc<T>,
}

impl<T> PluginDispatcher<T>
where
    T: CsiIdentity + CsiController + CsiNode + ?Sized,
{
    pub fn new(plugin: Arc<T>) -> Self {
        Self { plugin }
    }

    #[must_use]
    pub fn plugin(&self) -> &Arc<T> {
        &self.plugin
    }
}

impl<T: ?Sized> Clone for PluginDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            plugin: Arc::clone(&self.plugin),
        }
    }
}

#[async_trait]
impl<T> UnaryHandler for PluginDispatcher<T>
where
    T: CsiIdentity + CsiController + CsiNode + ?Sized,
{
    #[instrument(skip_all, fields(method = %req.method(), request_id = ctx.request_id()))]
    async fn call(&self, ctx: CallContext, req: CsiRequest) -> Result<CsiResponse, CsiError> {
        debug!(%req, "dispatching CSI request");
        let plugin = &*self.plugin;
        let ctx = &ctx;

        let rep = match req {
            // --- Identity ---------------------------------------------------
            CsiRequest::GetSupportedVersions(_) => {
                let supported_versions = plugin.get_supported_versions(ctx).await?;
                CsiResponse::GetSupportedVersions(GetSupportedVersionsResponse {
                    supported_versions,
                })
            }
            CsiRequest::GetPluginInfo(req) => {
                CsiResponse::GetPluginInfo(plugin.get_plugin_info(ctx, req).await?)
            }

            // --- Controller -------------------------------------------------
            CsiRequest::CreateVolume(req) => {
                let volume_info = plugin.create_volume(ctx, req).await?;
                CsiResponse::CreateVolume(CreateVolumeResponse { volume_info })
            }
            CsiRequest::DeleteVolume(req) => {
                plugin.delete_volume(ctx, req).await?;
                CsiResponse::DeleteVolume
            }
            CsiRequest::ControllerPublishVolume(req) => {
                let publish_volume_info = plugin.controller_publish_volume(ctx, req).await?;
                CsiResponse::ControllerPublishVolume(ControllerPublishVolumeResponse {
                    publish_volume_info,
                })
            }
            CsiRequest::ControllerUnpublishVolume(req) => {
                plugin.controller_unpublish_volume(ctx, req).await?;
                CsiResponse::ControllerUnpublishVolume
            }
            CsiRequest::ValidateVolumeCapabilities(req) => CsiResponse::ValidateVolumeCapabilities(
                plugin.validate_volume_capabilities(ctx, req).await?,
            ),
            CsiRequest::ListVolumes(req) => {
                CsiResponse::ListVolumes(plugin.list_volumes(ctx, req).await?)
            }
            CsiRequest::GetCapacity(req) => {
                let available_capacity = plugin.get_capacity(ctx, req).await?;
                CsiResponse::GetCapacity(GetCapacityResponse { available_capacity })
            }
            CsiRequest::ControllerProbe(_) => {
                plugin.controller_probe(ctx).await?;
                CsiResponse::ControllerProbe
            }

            // --- Node -------------------------------------------------------
            CsiRequest::NodePublishVolume(req) => {
                plugin.node_publish_volume(ctx, req).await?;
                CsiResponse::NodePublishVolume
            }
            CsiRequest::NodeUnpublishVolume(req) => {
                plugin.node_unpublish_volume(ctx, req).await?;
                CsiResponse::NodeUnpublishVolume
            }
            CsiRequest::GetNodeId(_) => {
                let node_id = plugin.get_node_id(ctx).await?;
                CsiResponse::GetNodeId(GetNodeIdResponse { node_id })
            }
            CsiRequest::NodeProbe(_) => {
                plugin.node_probe(ctx).await?;
                CsiResponse::NodeProbe
            }
        };
        Ok(rep)
    }
}
