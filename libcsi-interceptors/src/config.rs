//! Interceptor chain configuration.
//!
//! A [`ChainConfig`] is built once at startup, either from YAML or from the
//! environment, and handed to
//! [`InterceptorChain::from_config`](crate::chain::InterceptorChain::from_config).
//!
//! Environment variables (booleans accept `1/true/yes/on` and
//! `0/false/no/off`):
//! - `CSI_DEBUG`: enables both request and response logging.
//! - `CSI_REQUEST_LOGGING`, `CSI_RESPONSE_LOGGING`: toggle each direction.
//! - `CSI_SPEC_VALIDATION`: enables the spec validator.
//! - `CSI_SUPPORTED_VERSIONS`: comma-separated `MAJOR.MINOR.PATCH` list.
//! - `CSI_SERIAL_VOLUME_ACCESS`: enables serial access for mutating calls.
//! - `CSI_REQUIRE_VOLUME_NAME`, `CSI_REQUIRE_VOLUME_ID`,
//!   `CSI_REQUIRE_TARGET_PATH`: checks that are on by default whenever
//!   validation runs.
//! - `CSI_REQUIRE_NODE_ID`, `CSI_REQUIRE_CREDENTIALS`,
//!   `CSI_REQUIRE_VOLUME_ATTRIBUTES`, `CSI_REQUIRE_RESPONSE_VOLUME_ATTRIBUTES`,
//!   `CSI_REQUIRE_PUBLISH_INFO`, `CSI_SUCCESS_DELETE_NOT_FOUND`,
//!   `CSI_SUCCESS_UNPUBLISH_NOT_FOUND`: opt-in validator options; each one
//!   also turns validation on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CsiError;
use crate::interceptors::logging::DEFAULT_REDACTED_FIELDS;
use crate::message::Method;
use crate::version::Version;

/// Errors raised while loading configuration or assembling a chain.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("invalid version in {key}: {source}")]
    Version {
        key: String,
        #[source]
        source: CsiError,
    },

    #[error("invalid interceptor order: {0}")]
    Ordering(String),
}

/// Where rendered log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDestination {
    /// `info` events on the `csi::request` / `csi::response` targets.
    #[default]
    Tracing,
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log each request before the handler runs.
    pub request: bool,
    /// Log each response or error after the handler returns.
    pub response: bool,
    pub sink: LogDestination,
    /// Field names that are never rendered.
    pub redacted_fields: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            request: false,
            response: false,
            sink: LogDestination::default(),
            redacted_fields: DEFAULT_REDACTED_FIELDS
                .iter()
                .map(|f| (*f).to_owned())
                .collect(),
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.request || self.response
    }
}

/// Options of the spec validator.
///
/// Every opt-in check or remap implies validation, see
/// [`SpecValidationConfig::is_enabled`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecValidationConfig {
    pub enabled: bool,
    /// Versions accepted by the plugin.  When empty, any version is accepted
    /// but one must still be present.
    pub supported_versions: Vec<Version>,
    pub requires_volume_name: bool,
    pub requires_volume_id: bool,
    pub requires_node_publish_target_path: bool,
    pub requires_node_id: bool,
    pub requires_credentials: bool,
    pub requires_volume_attributes: bool,
    pub requires_response_volume_attributes: bool,
    pub requires_publish_info: bool,
    /// Treat `NotFound` from `DeleteVolume` as success.
    pub success_delete_volume_not_found: bool,
    /// Treat `NotFound` from either unpublish call as success.
    pub success_unpublish_not_found: bool,
}

impl Default for SpecValidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            supported_versions: Vec::new(),
            requires_volume_name: true,
            requires_volume_id: true,
            requires_node_publish_target_path: true,
            requires_node_id: false,
            requires_credentials: false,
            requires_volume_attributes: false,
            requires_response_volume_attributes: false,
            requires_publish_info: false,
            success_delete_volume_not_found: false,
            success_unpublish_not_found: false,
        }
    }
}

impl SpecValidationConfig {
    /// Whether the validator belongs in the chain.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
            || self.requires_node_id
            || self.requires_credentials
            || self.requires_volume_attributes
            || self.requires_response_volume_attributes
            || self.requires_publish_info
            || self.success_delete_volume_not_found
            || self.success_unpublish_not_found
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialAccessConfig {
    pub enabled: bool,
    /// Calls serialized per resource key.
    pub methods: Vec<Method>,
}

impl Default for SerialAccessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            methods: Method::MUTATING.to_vec(),
        }
    }
}

/// Everything needed to assemble an interceptor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Assign correlation ids to calls that arrive without one.
    pub request_ids: bool,
    pub logging: LoggingConfig,
    pub spec_validation: SpecValidationConfig,
    pub serial_access: SerialAccessConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            request_ids: true,
            logging: LoggingConfig::default(),
            spec_validation: SpecValidationConfig::default(),
            serial_access: SerialAccessConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Parse a YAML document; absent keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read the `CSI_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`ChainConfig::from_env`], reading variables through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| -> Result<Option<bool>, ConfigError> {
            lookup(key).map(|v| parse_bool(key, &v)).transpose()
        };

        let mut cfg = Self::default();

        if flag("CSI_DEBUG")? == Some(true) {
            cfg.logging.request = true;
            cfg.logging.response = true;
        }
        if let Some(on) = flag("CSI_REQUEST_LOGGING")? {
            cfg.logging.request = on;
        }
        if let Some(on) = flag("CSI_RESPONSE_LOGGING")? {
            cfg.logging.response = on;
        }

        let spec = &mut cfg.spec_validation;
        if let Some(on) = flag("CSI_SPEC_VALIDATION")? {
            spec.enabled = on;
        }
        if let Some(list) = lookup("CSI_SUPPORTED_VERSIONS") {
            spec.supported_versions = parse_versions("CSI_SUPPORTED_VERSIONS", &list)?;
        }
        let options: [(&str, &mut bool); 10] = [
            ("CSI_REQUIRE_VOLUME_NAME", &mut spec.requires_volume_name),
            ("CSI_REQUIRE_VOLUME_ID", &mut spec.requires_volume_id),
            (
                "CSI_REQUIRE_TARGET_PATH",
                &mut spec.requires_node_publish_target_path,
            ),
            ("CSI_REQUIRE_NODE_ID", &mut spec.requires_node_id),
            ("CSI_REQUIRE_CREDENTIALS", &mut spec.requires_credentials),
            (
                "CSI_REQUIRE_VOLUME_ATTRIBUTES",
                &mut spec.requires_volume_attributes,
            ),
            (
                "CSI_REQUIRE_RESPONSE_VOLUME_ATTRIBUTES",
                &mut spec.requires_response_volume_attributes,
            ),
            ("CSI_REQUIRE_PUBLISH_INFO", &mut spec.requires_publish_info),
            (
                "CSI_SUCCESS_DELETE_NOT_FOUND",
                &mut spec.success_delete_volume_not_found,
            ),
            (
                "CSI_SUCCESS_UNPUBLISH_NOT_FOUND",
                &mut spec.success_unpublish_not_found,
            ),
        ];
        for (key, option) in options {
            if let Some(on) = flag(key)? {
                *option = on;
            }
        }

        if let Some(on) = flag("CSI_SERIAL_VOLUME_ACCESS")? {
            cfg.serial_access.enabled = on;
        }
        Ok(cfg)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

fn parse_versions(key: &str, list: &str) -> Result<Vec<Version>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Version::parse(s).map_err(|source| ConfigError::Version {
                key: key.to_owned(),
                source,
            })
        })
        .collect()
}
