//! Identity service tests, including version negotiation and the request
//! and response log lines produced by a configured chain.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use libcsi_interceptors::interceptors::{
    LoggingInterceptor, MemorySink, RequestIdInterceptor, SerialVolumeAccess, SpecValidator,
};
use libcsi_interceptors::{
    CallContext, ChainBuilder, ChainConfig, Code, CsiController, CsiIdentity, PluginDispatcher,
    Served, Version, types::*,
};

use common::{
    MockPlugin, PLUGIN_NAME, VENDOR_VERSION, connect, init_logger, serve, server_config,
    supported_versions,
};

#[tokio::test]
async fn plugin_info_by_request_version() {
    init_logger();
    let client = connect(serve(Arc::new(MockPlugin::new()), &server_config()));
    let ctx = CallContext::new();

    for (text, valid) in [
        ("0.0.0", false),
        ("0.1.0", true),
        ("0.2.0", true),
        ("1.0.0", true),
        ("1.1.0", true),
        ("1.2.0", false),
    ] {
        let req = GetPluginInfoRequest {
            version: Some(Version::parse(text).unwrap()),
        };
        let result = client.get_plugin_info(&ctx, req).await;
        if valid {
            let info = result.unwrap();
            assert_eq!(info.name, PLUGIN_NAME);
            assert_eq!(info.vendor_version, VENDOR_VERSION);
            assert!(info.manifest.is_empty());
        } else {
            let err = result.unwrap_err();
            assert_eq!(err.code(), Code::InvalidArgument);
            assert_eq!(err.to_string(), format!("invalid request version: {text}"));
        }
    }
}

#[tokio::test]
async fn supported_versions_need_no_version() {
    let client = connect(serve(Arc::new(MockPlugin::new()), &server_config()));

    let versions = client
        .get_supported_versions(&CallContext::new())
        .await
        .unwrap();
    assert_eq!(versions, supported_versions());
}

#[tokio::test]
async fn versions_from_environment() {
    let cfg = ChainConfig::from_env_with(|key| match key {
        "CSI_SUPPORTED_VERSIONS" => Some("1.0.0".to_owned()),
        "CSI_SPEC_VALIDATION" => Some("true".to_owned()),
        _ => None,
    })
    .unwrap();
    let client = connect(serve(Arc::new(MockPlugin::new()), &cfg));
    let ctx = CallContext::new();

    let ok = GetPluginInfoRequest {
        version: Some(Version::new(1, 0, 0)),
    };
    client.get_plugin_info(&ctx, ok).await.unwrap();

    let rejected = GetPluginInfoRequest {
        version: Some(Version::new(0, 1, 0)),
    };
    assert!(client.get_plugin_info(&ctx, rejected).await.is_err());
}

#[tokio::test]
async fn request_and_response_lines() {
    let requests = Arc::new(MemorySink::new());
    let responses = Arc::new(MemorySink::new());
    let chain = ChainBuilder::new()
        .with(RequestIdInterceptor::new())
        .with(SpecValidator::with_versions(supported_versions()))
        .with(SerialVolumeAccess::new())
        .with(
            LoggingInterceptor::new()
                .with_request_logging(requests.clone())
                .with_response_logging(responses.clone()),
        )
        .build()
        .unwrap();
    let served = Served::new(
        Arc::new(chain),
        PluginDispatcher::new(Arc::new(MockPlugin::new())),
    );
    let client = connect(served);

    // The counter is process-wide, so pin the ids the lines should carry.
    client
        .get_plugin_info(
            &CallContext::new().with_request_id(1),
            GetPluginInfoRequest {
                version: Some(Version::new(0, 1, 0)),
            },
        )
        .await
        .unwrap();

    client
        .create_volume(
            &CallContext::new().with_request_id(2),
            CreateVolumeRequest {
                version: Some(Version::new(0, 1, 0)),
                name: "Test Volume".to_owned(),
                parameters: HashMap::from([("tag".to_owned(), "gold".to_owned())]),
                user_credentials: HashMap::from([("beour".to_owned(), "guest".to_owned())]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        requests.lines(),
        vec![
            "/csi.Identity/GetPluginInfo: REQ 0001: version=0.1.0",
            "/csi.Controller/CreateVolume: REQ 0002: version=0.1.0, name=Test Volume, parameters={tag:gold}",
        ]
    );
    assert_eq!(
        responses.lines(),
        vec![
            format!(
                "/csi.Identity/GetPluginInfo: REP 0001: name={PLUGIN_NAME}, vendor_version={VENDOR_VERSION}"
            ),
            format!(
                "/csi.Controller/CreateVolume: REP 0002: volume_id=4, capacity_bytes={}, attributes={{name:Test Volume}}",
                common::CAPACITY
            ),
        ]
    );
    // Credentials never reach the log.
    assert!(requests.lines().iter().all(|l| !l.contains("guest")));
}
