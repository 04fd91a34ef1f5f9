//! CSI Identity service trait.
//!
//! The Identity service allows callers to discover the protocol versions a
//! plugin speaks and its name.  Every CSI plugin must implement this service.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::types::{GetPluginInfoRequest, GetPluginInfoResponse};
use crate::version::Version;

/// Identity service: version discovery and plugin metadata.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    /// Protocol versions the plugin accepts, in preference order.
    async fn get_supported_versions(&self, ctx: &CallContext) -> Result<Vec<Version>, CsiError>;

    /// Return the plugin name, vendor version and free-form manifest.
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError>;
}
