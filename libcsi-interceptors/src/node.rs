//! CSI Node service trait.
//!
//! The Node service runs on each worker node and makes a published volume
//! available at a target path inside the workload.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::types::{NodePublishVolumeRequest, NodeUnpublishVolumeRequest};

/// Node service: local mount / unmount operations.
#[async_trait]
pub trait CsiNode: Send + Sync {
    /// Publish a volume at `req.target_path`.
    ///
    /// This is idempotent: publishing again at the same target path should
    /// succeed without error.
    async fn node_publish_volume(
        &self,
        ctx: &CallContext,
        req: NodePublishVolumeRequest,
    ) -> Result<(), CsiError>;

    /// Remove the volume from `req.target_path`.
    async fn node_unpublish_volume(
        &self,
        ctx: &CallContext,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<(), CsiError>;

    /// Identifier of the node this service runs on.
    async fn get_node_id(&self, ctx: &CallContext) -> Result<String, CsiError>;

    /// Health check for the node service.
    async fn node_probe(&self, ctx: &CallContext) -> Result<(), CsiError>;
}
