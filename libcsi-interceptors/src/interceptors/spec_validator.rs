//! Protocol-level request and response validation.
//!
//! Request checks run in a fixed order and the first failure is reported:
//!
//! 1. version (present and in the supported set)
//! 2. volume name (`CreateVolume`)
//! 3. volume id
//! 4. node id (`ControllerPublishVolume`)
//! 5. target path (`NodePublishVolume`, `NodeUnpublishVolume`)
//! 6. user credentials (mutating calls)
//! 7. volume attributes (`NodePublishVolume`)
//!
//! A failed check short-circuits the call; the handler is never invoked.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::SpecValidationConfig;
use crate::context::CallContext;
use crate::error::{Code, CsiError};
use crate::interceptor::{Interceptor, Next};
use crate::message::{CsiRequest, CsiResponse, Method};
use crate::version::Version;

/// Enforces version support and required fields before the handler runs,
/// then validates and optionally normalizes the handler's result.
#[derive(Debug, Clone, Default)]
pub struct SpecValidator {
    opts: SpecValidationConfig,
}

impl SpecValidator {
    /// Stable name reported by [`Interceptor::name`].
    pub const NAME: &'static str = "spec_validator";

    #[must_use]
    pub fn new(opts: SpecValidationConfig) -> Self {
        Self { opts }
    }

    /// A validator accepting exactly `versions`, with the default
    /// required-field checks.
    #[must_use]
    pub fn with_versions(versions: Vec<Version>) -> Self {
        Self::new(SpecValidationConfig {
            enabled: true,
            supported_versions: versions,
            ..Default::default()
        })
    }

    #[must_use]
    pub fn options(&self) -> &SpecValidationConfig {
        &self.opts
    }

    /// Run every request-side check in order.
    pub fn validate_request(&self, req: &CsiRequest) -> Result<(), CsiError> {
        self.check_version(req)?;

        let opts = &self.opts;
        if opts.requires_volume_name {
            require(req.volume_name(), "volume name")?;
        }
        if opts.requires_volume_id {
            require(req.volume_id().map(|id| id.as_str()), "volume id")?;
        }
        if opts.requires_node_id {
            require(req.node_id(), "node id")?;
        }
        if opts.requires_node_publish_target_path {
            require(req.target_path(), "target path")?;
        }
        if opts.requires_credentials {
            if let Some(creds) = req.user_credentials() {
                if creds.is_empty() {
                    return Err(CsiError::MissingField("user credentials".into()));
                }
            }
        }
        if opts.requires_volume_attributes {
            if let Some(attrs) = req.volume_attributes() {
                if attrs.is_empty() {
                    return Err(CsiError::MissingField("volume attributes".into()));
                }
            }
        }
        Ok(())
    }

    fn check_version(&self, req: &CsiRequest) -> Result<(), CsiError> {
        if !req.method().has_version() {
            return Ok(());
        }
        let supported = &self.opts.supported_versions;
        match req.version() {
            None => Err(CsiError::UnsupportedVersion("nil".into())),
            // An empty supported set only demands that a version is present.
            Some(_) if supported.is_empty() => Ok(()),
            Some(v) if Version::is_supported(Some(v), supported) => Ok(()),
            Some(v) => Err(CsiError::UnsupportedVersion(v.to_string())),
        }
    }

    /// Apply the success remaps and the response-side checks to the
    /// handler's result.
    pub fn validate_response(
        &self,
        method: Method,
        result: Result<CsiResponse, CsiError>,
    ) -> Result<CsiResponse, CsiError> {
        let rep = match result {
            Ok(rep) => rep,
            Err(e) => return self.remap_error(method, e),
        };

        match &rep {
            CsiResponse::CreateVolume(r)
                if self.opts.requires_response_volume_attributes
                    && r.volume_info.attributes.is_empty() =>
            {
                Err(CsiError::MissingResponseField("volume attributes".into()))
            }
            CsiResponse::ControllerPublishVolume(r)
                if self.opts.requires_publish_info && r.publish_volume_info.is_empty() =>
            {
                Err(CsiError::MissingResponseField("publish volume info".into()))
            }
            _ => Ok(rep),
        }
    }

    fn remap_error(&self, method: Method, err: CsiError) -> Result<CsiResponse, CsiError> {
        if err.code() != Code::NotFound {
            return Err(err);
        }
        let remapped = match method {
            Method::DeleteVolume if self.opts.success_delete_volume_not_found => {
                Some(CsiResponse::DeleteVolume)
            }
            Method::ControllerUnpublishVolume if self.opts.success_unpublish_not_found => {
                Some(CsiResponse::ControllerUnpublishVolume)
            }
            Method::NodeUnpublishVolume if self.opts.success_unpublish_not_found => {
                Some(CsiResponse::NodeUnpublishVolume)
            }
            _ => None,
        };
        match remapped {
            Some(rep) => {
                debug!(%method, error = %err, "treating not found as success");
                Ok(rep)
            }
            None => Err(err),
        }
    }
}

fn require(value: Option<&str>, field: &str) -> Result<(), CsiError> {
    match value {
        Some(v) if v.is_empty() => Err(CsiError::MissingField(field.to_owned())),
        _ => Ok(()),
    }
}

#[async_trait]
impl Interceptor for SpecValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn intercept(
        &self,
        ctx: CallContext,
        req: CsiRequest,
        next: Next<'_>,
    ) -> Result<CsiResponse, CsiError> {
        if let Err(e) = self.validate_request(&req) {
            warn!(
                method = %req.method(),
                request_id = ctx.request_id(),
                error = %e,
                "rejected invalid request"
            );
            return Err(e);
        }
        let method = req.method();
        let result = next.run(ctx, req).await;
        self.validate_response(method, result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::chain::ChainBuilder;
    use crate::interceptor::handler_fn;
    use crate::types::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn supported() -> Vec<Version> {
        ["0.1.0", "0.2.0", "1.0.0", "1.1.0"].iter().map(|s| v(s)).collect()
    }

    fn delete(version: Option<Version>, id: &str) -> CsiRequest {
        CsiRequest::DeleteVolume(DeleteVolumeRequest {
            version,
            volume_id: id.into(),
            ..Default::default()
        })
    }

    #[test]
    fn version_support_is_exact() {
        let validator = SpecValidator::with_versions(supported());
        for ok in ["0.1.0", "0.2.0", "1.0.0", "1.1.0"] {
            assert!(validator.validate_request(&delete(Some(v(ok)), "1")).is_ok());
        }
        for bad in ["0.0.0", "1.2.0"] {
            assert_eq!(
                validator.validate_request(&delete(Some(v(bad)), "1")),
                Err(CsiError::UnsupportedVersion(bad.into()))
            );
        }
        let err = validator.validate_request(&delete(None, "1")).unwrap_err();
        assert_eq!(err.to_string(), "invalid request version: nil");
    }

    #[test]
    fn supported_versions_call_skips_version_check() {
        let validator = SpecValidator::with_versions(supported());
        let req = CsiRequest::GetSupportedVersions(GetSupportedVersionsRequest {});
        assert!(validator.validate_request(&req).is_ok());
    }

    #[test]
    fn empty_supported_set_still_requires_a_version() {
        let validator = SpecValidator::with_versions(Vec::new());
        assert!(validator.validate_request(&delete(Some(v("9.9.9")), "1")).is_ok());
        assert!(validator.validate_request(&delete(None, "1")).is_err());
    }

    #[test]
    fn checks_run_in_order() {
        let validator = SpecValidator::new(SpecValidationConfig {
            enabled: true,
            requires_node_id: true,
            requires_credentials: true,
            ..Default::default()
        });
        let mut req = ControllerPublishVolumeRequest {
            version: Some(v("0.1.0")),
            ..Default::default()
        };
        let check = |req: &ControllerPublishVolumeRequest| {
            validator
                .validate_request(&CsiRequest::ControllerPublishVolume(req.clone()))
                .map_err(|e| e.to_string())
        };

        assert_eq!(check(&req), Err("volume id is required".into()));
        req.volume_id = "4".into();
        assert_eq!(check(&req), Err("node id is required".into()));
        req.node_id = "node-1".into();
        assert_eq!(check(&req), Err("user credentials is required".into()));
        req.user_credentials = HashMap::from([("u".into(), "p".into())]);
        assert_eq!(check(&req), Ok(()));
    }

    #[test]
    fn node_publish_requirements() {
        let validator = SpecValidator::new(SpecValidationConfig {
            enabled: true,
            requires_volume_attributes: true,
            ..Default::default()
        });
        let mut req = NodePublishVolumeRequest {
            version: Some(v("0.1.0")),
            volume_id: "4".into(),
            ..Default::default()
        };
        let check = |req: &NodePublishVolumeRequest| {
            validator
                .validate_request(&CsiRequest::NodePublishVolume(req.clone()))
                .map_err(|e| e.to_string())
        };

        assert_eq!(check(&req), Err("target path is required".into()));
        req.target_path = "/mnt/4".into();
        assert_eq!(check(&req), Err("volume attributes is required".into()));
        req.volume_attributes = HashMap::from([("a".into(), "b".into())]);
        assert_eq!(check(&req), Ok(()));
    }

    #[tokio::test]
    async fn missing_name_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = {
            let calls = Arc::clone(&calls);
            handler_fn(move |_ctx, _req| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(CsiResponse::CreateVolume(Default::default())) }
            })
        };
        let chain = ChainBuilder::new()
            .with(SpecValidator::with_versions(supported()))
            .build()
            .unwrap();

        let req = CsiRequest::CreateVolume(CreateVolumeRequest {
            version: Some(v("0.1.0")),
            ..Default::default()
        });
        let err = chain
            .call(CallContext::new(), req, &handler)
            .await
            .unwrap_err();

        assert_eq!(err, CsiError::MissingField("volume name".into()));
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn not_found_remaps() {
        let validator = SpecValidator::new(SpecValidationConfig {
            enabled: true,
            success_delete_volume_not_found: true,
            ..Default::default()
        });
        let not_found = || CsiError::VolumeNotFound("4".into());

        assert_eq!(
            validator.validate_response(Method::DeleteVolume, Err(not_found())),
            Ok(CsiResponse::DeleteVolume)
        );
        assert_eq!(
            validator.validate_response(
                Method::DeleteVolume,
                Err(CsiError::status(Code::NotFound, "gone"))
            ),
            Ok(CsiResponse::DeleteVolume)
        );
        // Unpublish remapping is a separate switch.
        assert_eq!(
            validator.validate_response(Method::NodeUnpublishVolume, Err(not_found())),
            Err(not_found())
        );
        // Other codes pass through.
        let busy = CsiError::status(Code::Unavailable, "busy");
        assert_eq!(
            validator.validate_response(Method::DeleteVolume, Err(busy.clone())),
            Err(busy)
        );
    }

    #[test]
    fn response_checks() {
        let validator = SpecValidator::new(SpecValidationConfig {
            enabled: true,
            requires_response_volume_attributes: true,
            requires_publish_info: true,
            ..Default::default()
        });

        let created = CsiResponse::CreateVolume(CreateVolumeResponse::default());
        let err = validator
            .validate_response(Method::CreateVolume, Ok(created))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid response: volume attributes is required");
        assert_eq!(err.code(), Code::Internal);

        let published =
            CsiResponse::ControllerPublishVolume(ControllerPublishVolumeResponse {
                publish_volume_info: HashMap::from([("dev".into(), "/dev/sdb".into())]),
            });
        assert!(
            validator
                .validate_response(Method::ControllerPublishVolume, Ok(published))
                .is_ok()
        );
    }
}
