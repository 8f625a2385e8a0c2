//! Value types for Runkeeper
//!
//! A stored entry is either a record (the JSON form of an Assistant, Thread,
//! Message, Run or Step) under its primary key, or a pointer from a
//! secondary key to that primary key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Key;

/// A stored value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// JSON form of a record
    Record(serde_json::Value),
    /// Secondary key target
    Pointer(Key),
}

impl Value {
    /// Serialize a record into a stored value
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        Ok(Value::Record(serde_json::to_value(record)?))
    }

    /// Deserialize the record held by this value
    ///
    /// # Errors
    ///
    /// `Error::Serialization` if the value is a pointer or does not decode
    /// as `T`.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Value::Record(json) => Ok(T::deserialize(json)?),
            Value::Pointer(key) => Err(Error::Serialization {
                reason: format!("expected record, found pointer to {}", key),
            }),
        }
    }

    /// The primary key this value points at, if it is a pointer
    pub fn as_pointer(&self) -> Option<&Key> {
        match self {
            Value::Pointer(key) => Some(key),
            Value::Record(_) => None,
        }
    }
}
