//! # libcsi-interceptors: unary interceptor chain for CSI
//!
//! `libcsi-interceptors` wraps the unary call boundary of a [Container
//! Storage Interface][csi] plugin, on the serving side and on the calling
//! side alike, with an ordered chain of interceptors.  It follows the RK8s
//! conventions (Tokio async runtime, `tracing` for observability,
//! `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `Volume`, `VolumeId`, capabilities, requests. |
//! | [`version`] | [`Version`] triples and the exact-match support check. |
//! | [`error`] | [`CsiError`] enum and its machine-readable [`Code`]. |
//! | [`message`] | [`CsiRequest`] / [`CsiResponse`] envelopes and [`Method`] names. |
//! | [`fields`] | Static field tables used to render payloads into log lines. |
//! | [`context`] | [`CallContext`]: correlation id, cancellation, timeout. |
//! | [`identity`] | [`CsiIdentity`] trait: versions & plugin info. |
//! | [`controller`] | [`CsiController`] trait: volume lifecycle. |
//! | [`node`] | [`CsiNode`] trait: publish, unpublish, node id. |
//! | [`interceptor`] | [`Interceptor`] and [`UnaryHandler`] traits. |
//! | [`interceptors`] | Request ids, logging, spec validation, serial volume access. |
//! | [`chain`] | [`InterceptorChain`], [`Served`] and [`Channel`]. |
//! | [`paging`] | Cursor-driven pagination as a [`PageStream`]. |
//! | [`config`] | [`ChainConfig`] from YAML or `CSI_*` environment variables. |
//! | [`server`] | [`PluginDispatcher`]: requests to plugin trait methods. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod chain;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod fields;
pub mod identity;
pub mod interceptor;
pub mod interceptors;
pub mod message;
pub mod node;
pub mod paging;
pub mod server;
pub mod types;
pub mod version;

// Re-export the most commonly used items at crate root for convenience.
pub use chain::{ChainBuilder, Channel, InterceptorChain, Served};
pub use config::{ChainConfig, ConfigError};
pub use context::CallContext;
pub use controller::CsiController;
pub use error::{Code, CsiError};
pub use identity::CsiIdentity;
pub use interceptor::{Interceptor, Next, UnaryHandler, handler_fn};
pub use message::{CsiRequest, CsiResponse, Method};
pub use node::CsiNode;
pub use paging::{Cursor, Page, PageSource, PageStream, page_all_volumes, paginate};
pub use server::PluginDispatcher;
pub use types::*;
pub use version::Version;
