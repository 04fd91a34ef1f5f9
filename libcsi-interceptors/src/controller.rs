//! CSI Controller service trait.
//!
//! The Controller service manages the centralized volume lifecycle: creation,
//! deletion, attachment to nodes, capability validation, listing and
//! capacity queries.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::types::{
    ControllerPublishVolumeRequest, ControllerUnpublishVolumeRequest, CreateVolumeRequest,
    DeleteVolumeRequest, GetCapacityRequest, ListVolumesRequest, ListVolumesResponse, StringMap,
    ValidateVolumeCapabilitiesRequest, ValidateVolumeCapabilitiesResponse, Volume,
};

/// Controller service: centralized volume management.
///
/// Implementations must be safe to call concurrently for distinct volumes.
/// When served behind a chain with serial access enabled, the mutating
/// methods are never entered twice at once for the same volume.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a new volume.
    ///
    /// The returned [`Volume`] carries the assigned `volume_id` and the
    /// attributes that must be forwarded to subsequent Node operations.
    async fn create_volume(
        &self,
        ctx: &CallContext,
        req: CreateVolumeRequest,
    ) -> Result<Volume, CsiError>;

    /// Delete a previously provisioned volume.
    ///
    /// Returns a `NotFound` error for an unknown volume id.
    async fn delete_volume(&self, ctx: &CallContext, req: DeleteVolumeRequest)
    -> Result<(), CsiError>;

    /// Make a volume available on a node; returns the publish info the node
    /// needs to mount it.
    async fn controller_publish_volume(
        &self,
        ctx: &CallContext,
        req: ControllerPublishVolumeRequest,
    ) -> Result<StringMap, CsiError>;

    /// Reverse [`CsiController::controller_publish_volume`].
    async fn controller_unpublish_volume(
        &self,
        ctx: &CallContext,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError>;

    /// Check whether the given capabilities are compatible with the volume.
    async fn validate_volume_capabilities(
        &self,
        ctx: &CallContext,
        req: ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError>;

    /// Return one page of volumes, starting at `req.starting_token`.
    ///
    /// An empty `next_token` marks the last page.
    async fn list_volumes(
        &self,
        ctx: &CallContext,
        req: ListVolumesRequest,
    ) -> Result<ListVolumesResponse, CsiError>;

    /// Return the available capacity in bytes.
    async fn get_capacity(&self, ctx: &CallContext, req: GetCapacityRequest)
    -> Result<u64, CsiError>;

    /// Health check for the controller service.
    async fn controller_probe(&self, ctx: &CallContext) -> Result<(), CsiError>;
}
