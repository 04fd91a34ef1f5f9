//! Field tables used to render payloads into log lines.
//!
//! Each payload type lists its fields once, as a static table of
//! `(name, render)` pairs.  [`render`] walks the table, drops fields whose
//! name is redacted or whose rendering is empty, and joins the rest as
//! `name=value` pairs separated by `, `.
//!
//! A rendering is empty when it is `""`, `[]`, `{}` or `<nil>`.

use std::collections::HashMap;
use std::fmt::{Display, Write as _};

use crate::message::{CsiRequest, CsiResponse};
use crate::types::*;

/// One loggable field of `T`.
pub struct Field<T> {
    /// Field name as it appears in the log line.
    pub name: &'static str,
    /// Render the field's value.
    pub render: fn(&T) -> String,
}

/// Payload types with a static field table.
pub trait LogFields: Sized + 'static {
    /// Fields in rendering order.
    const FIELDS: &'static [Field<Self>];
}

/// Whether a rendered value counts as empty and is omitted from the line.
#[must_use]
pub fn is_empty_rendering(s: &str) -> bool {
    matches!(s, "" | "[]" | "{}" | "<nil>")
}

/// Render every non-empty, non-redacted field of `value`.
///
/// Returns an empty string when no field survives.
pub fn render<T: LogFields>(value: &T, redacted: &[String]) -> String {
    let mut out = String::new();
    for field in T::FIELDS {
        if redacted.iter().any(|r| r == field.name) {
            continue;
        }
        let text = (field.render)(value);
        if is_empty_rendering(&text) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(", ");
        }
        let _ = write!(out, "{}={}", field.name, text);
    }
    out
}

fn opt<T: Display>(v: Option<&T>) -> String {
    v.map_or_else(|| "<nil>".to_owned(), ToString::to_string)
}

fn list<T: Display>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(" "))
}

fn map(m: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = m.iter().collect();
    pairs.sort();
    let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}:{v}")).collect();
    format!("{{{}}}", parts.join(" "))
}

impl LogFields for GetSupportedVersionsRequest {
    const FIELDS: &'static [Field<Self>] = &[];
}

impl LogFields for GetSupportedVersionsResponse {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "supported_versions",
        render: |r| list(&r.supported_versions),
    }];
}

impl LogFields for GetPluginInfoRequest {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "version",
        render: |r| opt(r.version.as_ref()),
    }];
}

impl LogFields for GetPluginInfoResponse {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "name",
            render: |r| r.name.clone(),
        },
        Field {
            name: "vendor_version",
            render: |r| r.vendor_version.clone(),
        },
        Field {
            name: "manifest",
            render: |r| map(&r.manifest),
        },
    ];
}

impl LogFields for ProbeRequest {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "version",
        render: |r| opt(r.version.as_ref()),
    }];
}

impl LogFields for CreateVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "name",
            render: |r| r.name.clone(),
        },
        Field {
            name: "capacity_range",
            render: |r| opt(r.capacity_range.as_ref()),
        },
        Field {
            name: "volume_capabilities",
            render: |r| list(&r.volume_capabilities),
        },
        Field {
            name: "parameters",
            render: |r| map(&r.parameters),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
    ];
}

impl LogFields for CreateVolumeResponse {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "volume_id",
            render: |r| r.volume_info.volume_id.to_string(),
        },
        Field {
            name: "capacity_bytes",
            render: |r| r.volume_info.capacity_bytes.to_string(),
        },
        Field {
            name: "attributes",
            render: |r| map(&r.volume_info.attributes),
        },
    ];
}

impl LogFields for DeleteVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
    ];
}

impl LogFields for ControllerPublishVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "node_id",
            render: |r| r.node_id.clone(),
        },
        Field {
            name: "volume_capability",
            render: |r| opt(r.volume_capability.as_ref()),
        },
        Field {
            name: "readonly",
            render: |r| r.readonly.to_string(),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
        Field {
            name: "volume_attributes",
            render: |r| map(&r.volume_attributes),
        },
    ];
}

impl LogFields for ControllerPublishVolumeResponse {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "publish_volume_info",
        render: |r| map(&r.publish_volume_info),
    }];
}

impl LogFields for ControllerUnpublishVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "node_id",
            render: |r| r.node_id.clone(),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
    ];
}

impl LogFields for ValidateVolumeCapabilitiesRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "volume_capabilities",
            render: |r| list(&r.volume_capabilities),
        },
        Field {
            name: "volume_attributes",
            render: |r| map(&r.volume_attributes),
        },
    ];
}

impl LogFields for ValidateVolumeCapabilitiesResponse {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "supported",
            render: |r| r.supported.to_string(),
        },
        Field {
            name: "message",
            render: |r| r.message.clone(),
        },
    ];
}

impl LogFields for ListVolumesRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "max_entries",
            render: |r| r.max_entries.to_string(),
        },
        Field {
            name: "starting_token",
            render: |r| r.starting_token.clone(),
        },
    ];
}

impl LogFields for ListVolumesResponse {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "entries",
            render: |r| list(&r.entries),
        },
        Field {
            name: "next_token",
            render: |r| r.next_token.clone(),
        },
    ];
}

impl LogFields for GetCapacityRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_capabilities",
            render: |r| list(&r.volume_capabilities),
        },
        Field {
            name: "parameters",
            render: |r| map(&r.parameters),
        },
    ];
}

impl LogFields for GetCapacityResponse {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "available_capacity",
        render: |r| r.available_capacity.to_string(),
    }];
}

impl LogFields for NodePublishVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "publish_volume_info",
            render: |r| map(&r.publish_volume_info),
        },
        Field {
            name: "target_path",
            render: |r| r.target_path.clone(),
        },
        Field {
            name: "volume_capability",
            render: |r| opt(r.volume_capability.as_ref()),
        },
        Field {
            name: "readonly",
            render: |r| r.readonly.to_string(),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
        Field {
            name: "volume_attributes",
            render: |r| map(&r.volume_attributes),
        },
    ];
}

impl LogFields for NodeUnpublishVolumeRequest {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "version",
            render: |r| opt(r.version.as_ref()),
        },
        Field {
            name: "volume_id",
            render: |r| r.volume_id.to_string(),
        },
        Field {
            name: "target_path",
            render: |r| r.target_path.clone(),
        },
        Field {
            name: "user_credentials",
            render: |r| map(&r.user_credentials),
        },
    ];
}

impl LogFields for GetNodeIdRequest {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "version",
        render: |r| opt(r.version.as_ref()),
    }];
}

impl LogFields for GetNodeIdResponse {
    const FIELDS: &'static [Field<Self>] = &[Field {
        name: "node_id",
        render: |r| r.node_id.clone(),
    }];
}

impl CsiRequest {
    /// Render the payload's loggable fields, see [`render`].
    #[must_use]
    pub fn render_fields(&self, redacted: &[String]) -> String {
        match self {
            Self::GetSupportedVersions(r) => render(r, redacted),
            Self::GetPluginInfo(r) => render(r, redacted),
            Self::CreateVolume(r) => render(r, redacted),
            Self::DeleteVolume(r) => render(r, redacted),
            Self::ControllerPublishVolume(r) => render(r, redacted),
            Self::ControllerUnpublishVolume(r) => render(r, redacted),
            Self::ValidateVolumeCapabilities(r) => render(r, redacted),
            Self::ListVolumes(r) => render(r, redacted),
            Self::GetCapacity(r) => render(r, redacted),
            Self::ControllerProbe(r) | Self::NodeProbe(r) => render(r, redacted),
            Self::NodePublishVolume(r) => render(r, redacted),
            Self::NodeUnpublishVolume(r) => render(r, redacted),
            Self::GetNodeId(r) => render(r, redacted),
        }
    }
}

impl CsiResponse {
    /// Render the payload's loggable fields, see [`render`].
    ///
    /// Responses without a payload render as an empty string.
    #[must_use]
    pub fn render_fields(&self, redacted: &[String]) -> String {
        match self {
            Self::GetSupportedVersions(r) => render(r, redacted),
            Self::GetPluginInfo(r) => render(r, redacted),
            Self::CreateVolume(r) => render(r, redacted),
            Self::ControllerPublishVolume(r) => render(r, redacted),
            Self::ValidateVolumeCapabilities(r) => render(r, redacted),
            Self::ListVolumes(r) => render(r, redacted),
            Self::GetCapacity(r) => render(r, redacted),
            Self::GetNodeId(r) => render(r, redacted),
            Self::DeleteVolume
            | Self::ControllerUnpublishVolume
            | Self::ControllerProbe
            | Self::NodePublishVolume
            | Self::NodeUnpublishVolume
            | Self::NodeProbe => String::new(),
        }
    }
}
