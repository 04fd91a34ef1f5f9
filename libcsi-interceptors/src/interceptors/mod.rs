//! The interceptors composed by [`InterceptorChain`](crate::chain::InterceptorChain).
//!
//! | Interceptor | Concern |
//! |---|---|
//! | [`RequestIdInterceptor`] | Correlation id per call. |
//! | [`SpecValidator`] | Version support, required fields, success-code remapping. |
//! | [`SerialVolumeAccess`] | At most one in-flight mutating call per volume. |
//! | [`LoggingInterceptor`] | Request/response lines to a [`LogSink`]. |

pub mod logging;
pub mod request_id;
pub mod serial_access;
pub mod spec_validator;

pub use logging::{Direction, LogSink, LoggingInterceptor, MemorySink, TracingSink, WriterSink};
pub use request_id::RequestIdInterceptor;
pub use serial_access::{InFlightRegistry, SerialVolumeAccess};
pub use spec_validator::SpecValidator;
