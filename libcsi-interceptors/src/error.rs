//! CSI error types.
//!
//! All errors produced or forwarded by the interceptor chain are represented
//! by the [`CsiError`] enum, which derives [`thiserror::Error`] for ergonomic
//! error handling and also implements [`Serialize`]/[`Deserialize`] so errors
//! can travel across whatever transport sits under the chain.  Every variant
//! maps to a machine-readable [`Code`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes carried by [`CsiError`].
///
/// These match the subset of the [gRPC status codes][codes] used by CSI
/// plugins.
///
/// [codes]: https://github.com/grpc/grpc/blob/master/doc/statuscodes.md
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    /// The operation was cancelled.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// Client specified an invalid argument.
    InvalidArgument,
    /// Deadline expired before operation could complete.
    DeadlineExceeded,
    /// Some requested entity was not found.
    NotFound,
    /// Some entity that we attempted to create already exists.
    AlreadyExists,
    /// The system is not in a state required for the operation's execution.
    FailedPrecondition,
    /// The operation was aborted.
    Aborted,
    /// Operation is not implemented or not supported.
    Unimplemented,
    /// Internal error.
    Internal,
    /// The service is currently unavailable.
    Unavailable,
}

impl Code {
    /// Canonical upper-snake name of the code, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for CSI calls passing through the interceptor chain.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum CsiError {
    /// The requested volume already exists.
    #[error("volume {0} already exists")]
    VolumeAlreadyExists(String),

    /// The requested volume was not found.
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// Text that is not a `MAJOR.MINOR.PATCH` triple.
    #[error("invalid version: {0:?}")]
    MalformedVersion(String),

    /// The request version is absent or not in the supported set.
    ///
    /// Carries the rendered version, or `nil` when the request had none.
    #[error("invalid request version: {0}")]
    UnsupportedVersion(String),

    /// A required request field is empty.
    #[error("{0} is required")]
    MissingField(String),

    /// A required response field is empty.
    #[error("invalid response: {0} is required")]
    MissingResponseField(String),

    /// Another call for the same resource key is still in flight.
    #[error("op pending: {0}")]
    OperationPending(String),

    /// The storage backend returned an error.
    #[error("backend error: {0}")]
    BackendError(String),

    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The call context was cancelled before the call completed.
    #[error("call cancelled")]
    Cancelled,

    /// The per-call timeout elapsed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The handler replied with a response that does not belong to the
    /// request's method.
    #[error("unexpected response {got} to {method}")]
    UnexpectedResponse {
        /// Full method name of the request.
        method: String,
        /// Description of the response actually received.
        got: String,
    },

    /// An opaque status forwarded unchanged from a handler or transport.
    #[error("{message}")]
    Status {
        /// Status code reported by the handler.
        code: Code,
        /// Human-readable message.
        message: String,
    },

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CsiError {
    /// The machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::VolumeAlreadyExists(_) => Code::AlreadyExists,
            Self::VolumeNotFound(_) => Code::NotFound,
            Self::MalformedVersion(_)
            | Self::UnsupportedVersion(_)
            | Self::MissingField(_)
            | Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::OperationPending(_) => Code::Aborted,
            Self::Cancelled => Code::Cancelled,
            Self::DeadlineExceeded => Code::DeadlineExceeded,
            Self::BackendError(_) | Self::MissingResponseField(_) | Self::Internal(_) => {
                Code::Internal
            }
            Self::UnexpectedResponse { .. } => Code::Unknown,
            Self::Status { code, .. } => *code,
        }
    }

    /// Build an opaque [`CsiError::Status`].
    pub fn status(code: Code, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Create a [`CsiError::BackendError`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn backend<E: fmt::Display>(e: E) -> Self {
        Self::BackendError(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// `true` when the error was produced by the serial access guard.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::OperationPending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CsiError::VolumeNotFound("vol-123".into());
        assert_eq!(err.to_string(), "volume vol-123 not found");

        let err = CsiError::MissingField("volume name".into());
        assert_eq!(err.to_string(), "volume name is required");

        let err = CsiError::UnsupportedVersion("nil".into());
        assert_eq!(err.to_string(), "invalid request version: nil");
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            CsiError::UnsupportedVersion("1.2.0".into()).code(),
            Code::InvalidArgument
        );
        assert_eq!(CsiError::OperationPending("vol".into()).code(), Code::Aborted);
        assert_eq!(CsiError::VolumeNotFound("v".into()).code(), Code::NotFound);
        assert_eq!(
            CsiError::status(Code::Unavailable, "backend down").code(),
            Code::Unavailable
        );
    }

    #[test]
    fn status_message_is_passed_through() {
        let err = CsiError::status(Code::NotFound, "no such thing");
        assert_eq!(err.to_string(), "no such thing");
        assert_eq!(err.code().to_string(), "NOT_FOUND");
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = CsiError::Status {
            code: Code::FailedPrecondition,
            message: "volume is published".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let de: CsiError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, de);
    }
}
