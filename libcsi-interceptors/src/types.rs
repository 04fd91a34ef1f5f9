//! Core CSI types: volumes, capabilities, and the request/response payloads
//! of every unary call.
//!
//! These types form the data model shared by the plugin traits, the
//! interceptor chain and the pager.  They are all [`Serialize`]/[`Deserialize`]
//! so they can be carried by any transport.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::version::Version;

/// Free-form string map used for parameters, attributes and credentials.
pub type StringMap = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Volume identity
// ---------------------------------------------------------------------------

/// Opaque, unique identifier for a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    /// Single-node read-write.
    #[default]
    SingleNodeWriter,
    /// Single-node read-only.
    SingleNodeReaderOnly,
    /// Multi-node read-only.
    MultiNodeReaderOnly,
    /// Multi-node, one writer.
    MultiNodeSingleWriter,
    /// Multi-node read-write.
    MultiNodeMultiWriter,
}

/// Describes the capabilities required from a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCapability {
    /// Requested access mode.
    pub access_mode: AccessMode,
    /// Filesystem type, e.g. `"ext4"`.  Empty for block access.
    #[serde(default)]
    pub fs_type: String,
    /// Additional mount flags (e.g. `"noatime"`).
    #[serde(default)]
    pub mount_flags: Vec<String>,
}

impl VolumeCapability {
    /// A mount capability with the given filesystem and flags.
    pub fn mount(access_mode: AccessMode, fs_type: impl Into<String>, flags: &[&str]) -> Self {
        Self {
            access_mode,
            fs_type: fs_type.into(),
            mount_flags: flags.iter().map(|f| (*f).to_owned()).collect(),
        }
    }
}

impl fmt::Display for VolumeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.access_mode)?;
        if !self.fs_type.is_empty() {
            write!(f, "/{}", self.fs_type)?;
        }
        if !self.mount_flags.is_empty() {
            write!(f, "[{}]", self.mount_flags.join(","))?;
        }
        Ok(())
    }
}

/// Requested size bounds for a new volume.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRange {
    /// Minimum capacity in bytes.
    pub required_bytes: u64,
    /// Maximum capacity in bytes; zero means unbounded.
    pub limit_bytes: u64,
}

impl fmt::Display for CapacityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.required_bytes, self.limit_bytes)
    }
}

// ---------------------------------------------------------------------------
// Volume metadata
// ---------------------------------------------------------------------------

/// Metadata for a provisioned volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Unique volume identifier.
    pub volume_id: VolumeId,
    /// Provisioned capacity in bytes.
    pub capacity_bytes: u64,
    /// Opaque attributes passed from Controller to Node operations.
    #[serde(default)]
    pub attributes: StringMap,
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} bytes)", self.volume_id, self.capacity_bytes)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Query the protocol versions a plugin accepts.  Carries no version itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetSupportedVersionsRequest {}

/// Versions accepted by the plugin, in its order of preference.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetSupportedVersionsResponse {
    /// Supported versions.
    pub supported_versions: Vec<Version>,
}

/// Query plugin information.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPluginInfoRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
}

/// Information about the CSI plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetPluginInfoResponse {
    /// Plugin name, e.g. `"rk8s.mock.csi"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
    /// Optional free-form manifest.
    #[serde(default)]
    pub manifest: StringMap,
}

/// Health probe, used for both the Controller and Node services.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Request to create a new volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Caller-chosen name; also the serial-access key for creation.
    pub name: String,
    /// Desired capacity bounds.
    #[serde(default)]
    pub capacity_range: Option<CapacityRange>,
    /// Required capabilities.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Arbitrary parameters forwarded to the backend.
    #[serde(default)]
    pub parameters: StringMap,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
}

/// Result of a successful volume creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateVolumeResponse {
    /// The created (or already existing) volume.
    pub volume_info: Volume,
}

/// Request to delete a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to delete.
    pub volume_id: VolumeId,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
}

/// Request to make a volume available on a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerPublishVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to publish.
    pub volume_id: VolumeId,
    /// Node that will consume the volume.
    pub node_id: String,
    /// Capability the node will use.
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    /// Whether the volume is published read-only.
    #[serde(default)]
    pub readonly: bool,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
    /// Attributes returned by `CreateVolume`.
    #[serde(default)]
    pub volume_attributes: StringMap,
}

/// Result of a controller publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerPublishVolumeResponse {
    /// Opaque data forwarded to `NodePublishVolume`.
    #[serde(default)]
    pub publish_volume_info: StringMap,
}

/// Request to withdraw a volume from a node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerUnpublishVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to unpublish.
    pub volume_id: VolumeId,
    /// Node the volume is withdrawn from; empty means all nodes.
    #[serde(default)]
    pub node_id: String,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
}

/// Request to check capabilities against an existing volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateVolumeCapabilitiesRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to check.
    pub volume_id: VolumeId,
    /// Capabilities to validate.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Attributes returned by `CreateVolume`.
    #[serde(default)]
    pub volume_attributes: StringMap,
}

/// Result of a capability check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateVolumeCapabilitiesResponse {
    /// Whether every capability is supported.
    pub supported: bool,
    /// Optional explanation.
    #[serde(default)]
    pub message: String,
}

/// One page of a volume enumeration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListVolumesRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Page size hint; zero lets the plugin choose.
    #[serde(default)]
    pub max_entries: u32,
    /// Cursor returned by the previous page; empty for the first page.
    #[serde(default)]
    pub starting_token: String,
}

/// A page of volumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListVolumesResponse {
    /// Volumes in this page.
    #[serde(default)]
    pub entries: Vec<Volume>,
    /// Cursor for the next page; empty when the enumeration is complete.
    #[serde(default)]
    pub next_token: String,
}

/// Query remaining capacity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetCapacityRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Restrict the answer to volumes with these capabilities.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
    /// Restrict the answer to volumes created with these parameters.
    #[serde(default)]
    pub parameters: StringMap,
}

/// Remaining capacity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetCapacityResponse {
    /// Available capacity in bytes.
    pub available_capacity: u64,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Request to mount a published volume at a target path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodePublishVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to publish.
    pub volume_id: VolumeId,
    /// Data returned by `ControllerPublishVolume`.
    #[serde(default)]
    pub publish_volume_info: StringMap,
    /// Target path inside the container runtime's rootfs.
    pub target_path: String,
    /// Capability to mount with.
    #[serde(default)]
    pub volume_capability: Option<VolumeCapability>,
    /// Whether the mount should be read-only.
    #[serde(default)]
    pub readonly: bool,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
    /// Attributes returned by `CreateVolume`.
    #[serde(default)]
    pub volume_attributes: StringMap,
}

/// Request to unmount a volume from a target path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeUnpublishVolumeRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
    /// Volume to unpublish.
    pub volume_id: VolumeId,
    /// Target path to unmount.
    pub target_path: String,
    /// Secrets for the backend.  Never logged.
    #[serde(default)]
    pub user_credentials: StringMap,
}

/// Query the identifier of the node the Node service runs on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetNodeIdRequest {
    /// Protocol version of the caller.
    pub version: Option<Version>,
}

/// Identifier of the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GetNodeIdResponse {
    /// Unique node identifier.
    pub node_id: String,
}
