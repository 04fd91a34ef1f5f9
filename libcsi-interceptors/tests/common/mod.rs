//! In-memory CSI plugin and chain fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use libcsi_interceptors::config::SpecValidationConfig;
use libcsi_interceptors::{
    CallContext, ChainConfig, Channel, CsiController, CsiError, CsiIdentity, CsiNode,
    InterceptorChain, PluginDispatcher, Served, Version, types::*,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

pub const PLUGIN_NAME: &str = "rk8s.mock.csi";
pub const VENDOR_VERSION: &str = "0.1.0";
pub const NODE_ID: &str = "rk8s.mock.node";
pub const DEVICE: &str = "/dev/mock";
pub const CAPACITY: u64 = 100 * 1024 * 1024 * 1024;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn supported_versions() -> Vec<Version> {
    vec![
        Version::new(0, 1, 0),
        Version::new(0, 2, 0),
        Version::new(1, 0, 0),
        Version::new(1, 1, 0),
    ]
}

pub fn version() -> Option<Version> {
    Some(Version::new(0, 1, 0))
}

/// Attribute set on a volume while it is published to a node.
pub fn device_attribute() -> String {
    format!("{PLUGIN_NAME}/dev")
}

/// A plugin keeping its volumes in memory.
///
/// Starts with three volumes, ids `1` to `3`.  New volumes get the next
/// numeric id.
pub struct MockPlugin {
    volumes: Mutex<Vec<Volume>>,
    mounts: Mutex<HashMap<String, VolumeId>>,
    create_delay: Duration,
    create_calls: AtomicUsize,
}

impl MockPlugin {
    pub fn new() -> Self {
        let volumes = (1..=3)
            .map(|i| Volume {
                volume_id: VolumeId(i.to_string()),
                capacity_bytes: CAPACITY,
                attributes: HashMap::from([("name".to_owned(), format!("Mock Volume {i}"))]),
            })
            .collect();
        Self {
            volumes: Mutex::new(volumes),
            mounts: Mutex::new(HashMap::new()),
            create_delay: Duration::ZERO,
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every `CreateVolume` before creating.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn volume_count(&self) -> usize {
        self.volumes.lock().len()
    }

    pub fn volume(&self, id: &str) -> Option<Volume> {
        self.volumes
            .lock()
            .iter()
            .find(|v| v.volume_id.as_str() == id)
            .cloned()
    }

    pub fn is_mounted(&self, target_path: &str) -> bool {
        self.mounts.lock().contains_key(target_path)
    }
}

impl Default for MockPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CsiIdentity for MockPlugin {
    async fn get_supported_versions(&self, _ctx: &CallContext) -> Result<Vec<Version>, CsiError> {
        Ok(supported_versions())
    }

    async fn get_plugin_info(
        &self,
        _ctx: &CallContext,
        _req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        Ok(GetPluginInfoResponse {
            name: PLUGIN_NAME.to_owned(),
            vendor_version: VENDOR_VERSION.to_owned(),
            manifest: HashMap::new(),
        })
    }
}

#[async_trait]
impl CsiController for MockPlugin {
    async fn create_volume(
        &self,
        _ctx: &CallContext,
        req: CreateVolumeRequest,
    ) -> Result<Volume, CsiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        let mut volumes = self.volumes.lock();
        if let Some(existing) = volumes
            .iter()
            .find(|v| v.attributes.get("name") == Some(&req.name))
        {
            return Ok(existing.clone());
        }
        let capacity_bytes = match req.capacity_range {
            Some(range) if range.limit_bytes > 0 => range.limit_bytes,
            Some(range) => range.required_bytes,
            None => CAPACITY,
        };
        let volume = Volume {
            volume_id: VolumeId((volumes.len() + 1).to_string()),
            capacity_bytes,
            attributes: HashMap::from([("name".to_owned(), req.name)]),
        };
        volumes.push(volume.clone());
        Ok(volume)
    }

    async fn delete_volume(
        &self,
        _ctx: &CallContext,
        req: DeleteVolumeRequest,
    ) -> Result<(), CsiError> {
        let mut volumes = self.volumes.lock();
        let before = volumes.len();
        volumes.retain(|v| v.volume_id != req.volume_id);
        if volumes.len() == before {
            return Err(CsiError::VolumeNotFound(req.volume_id.to_string()));
        }
        Ok(())
    }

    async fn controller_publish_volume(
        &self,
        _ctx: &CallContext,
        req: ControllerPublishVolumeRequest,
    ) -> Result<StringMap, CsiError> {
        let mut volumes = self.volumes.lock();
        let volume = volumes
            .iter_mut()
            .find(|v| v.volume_id == req.volume_id)
            .ok_or_else(|| CsiError::VolumeNotFound(req.volume_id.to_string()))?;
        volume
            .attributes
            .insert(device_attribute(), DEVICE.to_owned());
        Ok(HashMap::from([("device".to_owned(), DEVICE.to_owned())]))
    }

    async fn controller_unpublish_volume(
        &self,
        _ctx: &CallContext,
        req: ControllerUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        let mut volumes = self.volumes.lock();
        let volume = volumes
            .iter_mut()
            .find(|v| v.volume_id == req.volume_id)
            .ok_or_else(|| CsiError::VolumeNotFound(req.volume_id.to_string()))?;
        volume.attributes.remove(&device_attribute());
        Ok(())
    }

    async fn validate_volume_capabilities(
        &self,
        _ctx: &CallContext,
        req: ValidateVolumeCapabilitiesRequest,
    ) -> Result<ValidateVolumeCapabilitiesResponse, CsiError> {
        if self.volume(req.volume_id.as_str()).is_none() {
            return Err(CsiError::VolumeNotFound(req.volume_id.to_string()));
        }
        Ok(ValidateVolumeCapabilitiesResponse {
            supported: true,
            message: String::new(),
        })
    }

    async fn list_volumes(
        &self,
        _ctx: &CallContext,
        req: ListVolumesRequest,
    ) -> Result<ListVolumesResponse, CsiError> {
        let volumes = self.volumes.lock();
        let start = if req.starting_token.is_empty() {
            0
        } else {
            req.starting_token
                .parse::<usize>()
                .ok()
                .filter(|&i| i <= volumes.len())
                .ok_or_else(|| {
                    CsiError::InvalidArgument(format!("bad starting token {}", req.starting_token))
                })?
        };
        let end = match req.max_entries {
            0 => volumes.len(),
            n => (start + n as usize).min(volumes.len()),
        };
        let next_token = if end < volumes.len() {
            end.to_string()
        } else {
            String::new()
        };
        Ok(ListVolumesResponse {
            entries: volumes[start..end].to_vec(),
            next_token,
        })
    }

    async fn get_capacity(
        &self,
        _ctx: &CallContext,
        _req: GetCapacityRequest,
    ) -> Result<u64, CsiError> {
        Ok(CAPACITY)
    }

    async fn controller_probe(&self, _ctx: &CallContext) -> Result<(), CsiError> {
        Ok(())
    }
}

#[async_trait]
impl CsiNode for MockPlugin {
    async fn node_publish_volume(
        &self,
        _ctx: &CallContext,
        req: NodePublishVolumeRequest,
    ) -> Result<(), CsiError> {
        if self.volume(req.volume_id.as_str()).is_none() {
            return Err(CsiError::VolumeNotFound(req.volume_id.to_string()));
        }
        self.mounts.lock().insert(req.target_path, req.volume_id);
        Ok(())
    }

    async fn node_unpublish_volume(
        &self,
        _ctx: &CallContext,
        req: NodeUnpublishVolumeRequest,
    ) -> Result<(), CsiError> {
        match self.mounts.lock().remove(&req.target_path) {
            Some(_) => Ok(()),
            None => Err(CsiError::VolumeNotFound(req.volume_id.to_string())),
        }
    }

    async fn get_node_id(&self, _ctx: &CallContext) -> Result<String, CsiError> {
        Ok(NODE_ID.to_owned())
    }

    async fn node_probe(&self, _ctx: &CallContext) -> Result<(), CsiError> {
        Ok(())
    }
}

pub type ServedPlugin = Served<PluginDispatcher<MockPlugin>>;

/// Server-side configuration used by most tests: validation against the
/// mock's versions plus serial volume access.
pub fn server_config() -> ChainConfig {
    let mut cfg = ChainConfig::default();
    cfg.spec_validation = SpecValidationConfig {
        enabled: true,
        supported_versions: supported_versions(),
        ..Default::default()
    };
    cfg.serial_access.enabled = true;
    cfg
}

pub fn serve(plugin: Arc<MockPlugin>, cfg: &ChainConfig) -> ServedPlugin {
    let chain = InterceptorChain::from_config(cfg).expect("valid chain config");
    Served::new(Arc::new(chain), PluginDispatcher::new(plugin))
}

/// A client channel with no interceptors of its own, talking directly to a
/// served plugin.
pub fn connect(served: ServedPlugin) -> Channel<ServedPlugin> {
    Channel::new(Arc::new(InterceptorChain::empty()), served).with_version(Version::new(0, 1, 0))
}
