//! Request and response envelopes for the unary call boundary.
//!
//! Every call passing through an [`InterceptorChain`](crate::chain::InterceptorChain)
//! is a [`CsiRequest`] answered by a [`CsiResponse`] (or a
//! [`CsiError`](crate::error::CsiError)).  The accessors on [`CsiRequest`]
//! give interceptors uniform access to the fields they care about without
//! matching on every payload type themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::version::Version;

/// The unary calls of the CSI Identity, Controller and Node services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    GetSupportedVersions,
    GetPluginInfo,
    CreateVolume,
    DeleteVolume,
    ControllerPublishVolume,
    ControllerUnpublishVolume,
    ValidateVolumeCapabilities,
    ListVolumes,
    GetCapacity,
    ControllerProbe,
    NodePublishVolume,
    NodeUnpublishVolume,
    GetNodeId,
    NodeProbe,
}

impl Method {
    /// Calls that change plugin state and are serialized per resource key
    /// unless configured otherwise.
    pub const MUTATING: [Method; 6] = [
        Method::CreateVolume,
        Method::DeleteVolume,
        Method::ControllerPublishVolume,
        Method::ControllerUnpublishVolume,
        Method::NodePublishVolume,
        Method::NodeUnpublishVolume,
    ];

    /// The fully-qualified method name, e.g. `/csi.Controller/CreateVolume`.
    #[must_use]
    pub const fn full_name(self) -> &'static str {
        match self {
            Method::GetSupportedVersions => "/csi.Identity/GetSupportedVersions",
            Method::GetPluginInfo => "/csi.Identity/GetPluginInfo",
            Method::CreateVolume => "/csi.Controller/CreateVolume",
            Method::DeleteVolume => "/csi.Controller/DeleteVolume",
            Method::ControllerPublishVolume => "/csi.Controller/ControllerPublishVolume",
            Method::ControllerUnpublishVolume => "/csi.Controller/ControllerUnpublishVolume",
            Method::ValidateVolumeCapabilities => "/csi.Controller/ValidateVolumeCapabilities",
            Method::ListVolumes => "/csi.Controller/ListVolumes",
            Method::GetCapacity => "/csi.Controller/GetCapacity",
            Method::ControllerProbe => "/csi.Controller/ControllerProbe",
            Method::NodePublishVolume => "/csi.Node/NodePublishVolume",
            Method::NodeUnpublishVolume => "/csi.Node/NodeUnpublishVolume",
            Method::GetNodeId => "/csi.Node/GetNodeID",
            Method::NodeProbe => "/csi.Node/NodeProbe",
        }
    }

    /// Whether requests of this method carry a protocol version.
    #[must_use]
    pub const fn has_version(self) -> bool {
        !matches!(self, Method::GetSupportedVersions)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

/// A request entering the interceptor chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CsiRequest {
    // ----- Identity --------------------------------------------------------
    GetSupportedVersions(GetSupportedVersionsRequest),
    GetPluginInfo(GetPluginInfoRequest),

    // ----- Controller ------------------------------------------------------
    CreateVolume(CreateVolumeRequest),
    DeleteVolume(DeleteVolumeRequest),
    ControllerPublishVolume(ControllerPublishVolumeRequest),
    ControllerUnpublishVolume(ControllerUnpublishVolumeRequest),
    ValidateVolumeCapabilities(ValidateVolumeCapabilitiesRequest),
    ListVolumes(ListVolumesRequest),
    GetCapacity(GetCapacityRequest),
    ControllerProbe(ProbeRequest),

    // ----- Node ------------------------------------------------------------
    NodePublishVolume(NodePublishVolumeRequest),
    NodeUnpublishVolume(NodeUnpublishVolumeRequest),
    GetNodeId(GetNodeIdRequest),
    NodeProbe(ProbeRequest),
}

impl CsiRequest {
    /// The method this request invokes.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::GetSupportedVersions(_) => Method::GetSupportedVersions,
            Self::GetPluginInfo(_) => Method::GetPluginInfo,
            Self::CreateVolume(_) => Method::CreateVolume,
            Self::DeleteVolume(_) => Method::DeleteVolume,
            Self::ControllerPublishVolume(_) => Method::ControllerPublishVolume,
            Self::ControllerUnpublishVolume(_) => Method::ControllerUnpublishVolume,
            Self::ValidateVolumeCapabilities(_) => Method::ValidateVolumeCapabilities,
            Self::ListVolumes(_) => Method::ListVolumes,
            Self::GetCapacity(_) => Method::GetCapacity,
            Self::ControllerProbe(_) => Method::ControllerProbe,
            Self::NodePublishVolume(_) => Method::NodePublishVolume,
            Self::NodeUnpublishVolume(_) => Method::NodeUnpublishVolume,
            Self::GetNodeId(_) => Method::GetNodeId,
            Self::NodeProbe(_) => Method::NodeProbe,
        }
    }

    /// The protocol version carried by the request, if any.
    ///
    /// Always `None` for methods where [`Method::has_version`] is `false`.
    #[must_use]
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::GetSupportedVersions(_) => None,
            Self::GetPluginInfo(r) => r.version.as_ref(),
            Self::CreateVolume(r) => r.version.as_ref(),
            Self::DeleteVolume(r) => r.version.as_ref(),
            Self::ControllerPublishVolume(r) => r.version.as_ref(),
            Self::ControllerUnpublishVolume(r) => r.version.as_ref(),
            Self::ValidateVolumeCapabilities(r) => r.version.as_ref(),
            Self::ListVolumes(r) => r.version.as_ref(),
            Self::GetCapacity(r) => r.version.as_ref(),
            Self::ControllerProbe(r) | Self::NodeProbe(r) => r.version.as_ref(),
            Self::NodePublishVolume(r) => r.version.as_ref(),
            Self::NodeUnpublishVolume(r) => r.version.as_ref(),
            Self::GetNodeId(r) => r.version.as_ref(),
        }
    }

    /// The volume name, for calls that create a volume.
    #[must_use]
    pub fn volume_name(&self) -> Option<&str> {
        match self {
            Self::CreateVolume(r) => Some(&r.name),
            _ => None,
        }
    }

    /// The volume id, for calls that operate on an existing volume.
    #[must_use]
    pub fn volume_id(&self) -> Option<&VolumeId> {
        match self {
            Self::DeleteVolume(r) => Some(&r.volume_id),
            Self::ControllerPublishVolume(r) => Some(&r.volume_id),
            Self::ControllerUnpublishVolume(r) => Some(&r.volume_id),
            Self::ValidateVolumeCapabilities(r) => Some(&r.volume_id),
            Self::NodePublishVolume(r) => Some(&r.volume_id),
            Self::NodeUnpublishVolume(r) => Some(&r.volume_id),
            _ => None,
        }
    }

    /// The node id of a controller publish.
    #[must_use]
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::ControllerPublishVolume(r) => Some(&r.node_id),
            _ => None,
        }
    }

    /// The target path of a node publish or unpublish.
    #[must_use]
    pub fn target_path(&self) -> Option<&str> {
        match self {
            Self::NodePublishVolume(r) => Some(&r.target_path),
            Self::NodeUnpublishVolume(r) => Some(&r.target_path),
            _ => None,
        }
    }

    /// The credentials map, for calls that carry one.
    #[must_use]
    pub fn user_credentials(&self) -> Option<&StringMap> {
        match self {
            Self::CreateVolume(r) => Some(&r.user_credentials),
            Self::DeleteVolume(r) => Some(&r.user_credentials),
            Self::ControllerPublishVolume(r) => Some(&r.user_credentials),
            Self::ControllerUnpublishVolume(r) => Some(&r.user_credentials),
            Self::NodePublishVolume(r) => Some(&r.user_credentials),
            Self::NodeUnpublishVolume(r) => Some(&r.user_credentials),
            _ => None,
        }
    }

    /// The volume attributes handed to a node publish.
    #[must_use]
    pub fn volume_attributes(&self) -> Option<&StringMap> {
        match self {
            Self::NodePublishVolume(r) => Some(&r.volume_attributes),
            _ => None,
        }
    }

    /// The key used to serialize mutating calls: the volume name for
    /// creation, the volume id for everything else that targets a volume.
    #[must_use]
    pub fn resource_key(&self) -> Option<&str> {
        self.volume_name()
            .or_else(|| self.volume_id().map(VolumeId::as_str))
    }
}

impl fmt::Display for CsiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.method().full_name();
        match self.resource_key() {
            Some(key) => write!(f, "{name}({key})"),
            None => f.write_str(name),
        }
    }
}

/// A successful reply leaving the interceptor chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CsiResponse {
    GetSupportedVersions(GetSupportedVersionsResponse),
    GetPluginInfo(GetPluginInfoResponse),
    CreateVolume(CreateVolumeResponse),
    DeleteVolume,
    ControllerPublishVolume(ControllerPublishVolumeResponse),
    ControllerUnpublishVolume,
    ValidateVolumeCapabilities(ValidateVolumeCapabilitiesResponse),
    ListVolumes(ListVolumesResponse),
    GetCapacity(GetCapacityResponse),
    ControllerProbe,
    NodePublishVolume,
    NodeUnpublishVolume,
    GetNodeId(GetNodeIdResponse),
    NodeProbe,
}

impl CsiResponse {
    /// The method this response answers.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::GetSupportedVersions(_) => Method::GetSupportedVersions,
            Self::GetPluginInfo(_) => Method::GetPluginInfo,
            Self::CreateVolume(_) => Method::CreateVolume,
            Self::DeleteVolume => Method::DeleteVolume,
            Self::ControllerPublishVolume(_) => Method::ControllerPublishVolume,
            Self::ControllerUnpublishVolume => Method::ControllerUnpublishVolume,
            Self::ValidateVolumeCapabilities(_) => Method::ValidateVolumeCapabilities,
            Self::ListVolumes(_) => Method::ListVolumes,
            Self::GetCapacity(_) => Method::GetCapacity,
            Self::ControllerProbe => Method::ControllerProbe,
            Self::NodePublishVolume => Method::NodePublishVolume,
            Self::NodeUnpublishVolume => Method::NodeUnpublishVolume,
            Self::GetNodeId(_) => Method::GetNodeId,
            Self::NodeProbe => Method::NodeProbe,
        }
    }
}

impl fmt::Display for CsiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateVolume(r) => write!(f, "VolumeCreated({})", r.volume_info.volume_id),
            Self::ListVolumes(r) => write!(f, "VolumeList(count={})", r.entries.len()),
            Self::GetCapacity(r) => write!(f, "Capacity({})", r.available_capacity),
            Self::GetNodeId(r) => write!(f, "NodeId({})", r.node_id),
            other => write!(f, "{:?}", other.method()),
        }
    }
}
