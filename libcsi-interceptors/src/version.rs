//! CSI protocol versions.
//!
//! A [`Version`] is a `MAJOR.MINOR.PATCH` triple.  Requests carry the version
//! of the protocol they were built against, and plugins advertise the set of
//! versions they accept.  Support is decided by exact membership only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CsiError;

/// A CSI protocol version.
///
/// Serialized as its `MAJOR.MINOR.PATCH` text form.  The derived ordering is
/// only used to sort versions for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Patch component.
    pub patch: u32,
}

impl Version {
    /// Build a version from its components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `MAJOR.MINOR.PATCH` string.
    ///
    /// Each component must be a non-empty run of ASCII digits that fits in a
    /// `u32`; signs, whitespace and extra components are rejected.
    pub fn parse(text: &str) -> Result<Self, CsiError> {
        let malformed = || CsiError::MalformedVersion(text.to_owned());

        let mut parts = text.split('.');
        let mut next = || -> Result<u32, CsiError> {
            let part = parts.next().ok_or_else(malformed)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            part.parse().map_err(|_| malformed())
        };

        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(version)
    }

    /// Whether `requested` exactly equals one of `supported`.
    ///
    /// An absent request version is never supported.
    #[must_use]
    pub fn is_supported(requested: Option<&Version>, supported: &[Version]) -> bool {
        requested.is_some_and(|v| supported.contains(v))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = CsiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = CsiError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
