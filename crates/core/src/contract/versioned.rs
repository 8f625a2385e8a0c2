//! Generic versioned wrapper type
//!
//! Every read from the store returns data wrapped in `Versioned<T>`:
//!
//! ```text
//! fn get(&self, key) -> Result<Option<Versioned<Value>>>
//! ```
//!
//! The version is what a later transaction must present unchanged for its
//! write to be accepted.

use super::Version;
use serde::{Deserialize, Serialize};

/// A value with the version of the commit that last wrote it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The actual value
    pub value: T,

    /// Version identifier
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Create a new versioned value
    pub fn new(value: T, version: Version) -> Self {
        Versioned { value, version }
    }

    /// Map the inner value to a new type, keeping the version
    pub fn map<U, F>(self, f: F) -> Versioned<U>
    where
        F: FnOnce(T) -> U,
    {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }

    /// Map the inner value through a fallible conversion
    pub fn try_map<U, E, F>(self, f: F) -> Result<Versioned<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(Versioned {
            value: f(self.value)?,
            version: self.version,
        })
    }

    /// Get a reference to the inner value
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume and return the inner value
    #[inline]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get the version
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Extract value and version as a tuple
    pub fn into_parts(self) -> (T, Version) {
        (self.value, self.version)
    }
}

impl<T> AsRef<T> for Versioned<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
