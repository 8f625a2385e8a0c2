//! Commit version tokens
//!
//! Every committed write is stamped with the commit version of the
//! transaction that produced it. All writes in one commit share a version.
//! Versions are strictly increasing across commits, so two reads of the same
//! key that return the same version observed the same bytes.
//!
//! Version `0` is reserved for "absent": a transaction that reads a missing
//! key records version 0 in its read set, and validation fails if any commit
//! has since created the key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque version token returned by every read
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of a key that does not exist
    pub const ABSENT: Version = Version(0);

    /// Wrap a raw commit version
    #[inline]
    pub const fn new(v: u64) -> Self {
        Version(v)
    }

    /// Raw commit version
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for the absent sentinel
    #[inline]
    pub const fn is_absent(&self) -> bool {
        self.0 == 0
    }

    /// The version following this one
    #[inline]
    pub const fn next(&self) -> Self {
        Version(self.0 + 1)
    }
}

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Version(v)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
