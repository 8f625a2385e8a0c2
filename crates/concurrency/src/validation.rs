//! Transaction validation for OCC
//!
//! Key rules:
//! - First-committer-wins based on READ-SET, not write-set
//! - Blind writes (write without read) do NOT conflict
//! - Explicit version checks are validated separately from the read-set
//! - Read-only transactions always validate

use std::collections::HashMap;

use crate::transaction::{TransactionContext, VersionCheck};
use runkeeper_core::{Key, Result, Storage, Version};

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// Key was read at one version but the current version differs
    ReadWriteConflict {
        /// The key that has a conflict
        key: Key,
        /// Version recorded in read_set when read
        read_version: Version,
        /// Current version in storage at validation time
        current_version: Version,
    },

    /// An explicit version check no longer holds
    VersionCheckConflict {
        /// The checked key
        key: Key,
        /// Version the transaction required
        expected_version: Version,
        /// Current version in storage at validation time
        current_version: Version,
    },
}

impl ConflictType {
    /// The conflicting key
    pub fn key(&self) -> &Key {
        match self {
            ConflictType::ReadWriteConflict { key, .. } => key,
            ConflictType::VersionCheckConflict { key, .. } => key,
        }
    }
}

/// Result of transaction validation
///
/// A transaction commits only if is_valid() returns true.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// One-line summary naming the conflicting keys
    pub fn describe(&self) -> String {
        let keys: Vec<String> = self.conflicts.iter().map(|c| c.key().to_string()).collect();
        format!("{} conflict(s) on {}", keys.len(), keys.join(", "))
    }
}

fn current_version(store: &dyn Storage, key: &Key) -> Result<Version> {
    Ok(store
        .get(key)?
        .map_or(Version::ABSENT, |vv| vv.version))
}

/// Validate the read-set against current storage state
///
/// For each key in the read-set, the current version must equal the version
/// recorded when it was read; otherwise a `ReadWriteConflict` is reported.
pub fn validate_read_set(
    read_set: &HashMap<Key, Version>,
    store: &dyn Storage,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();
    for (key, read_version) in read_set {
        let current = current_version(store, key)?;
        if current != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version: current,
            });
        }
    }
    Ok(result)
}

/// Validate explicit version checks against current storage state
pub fn validate_check_set(
    check_set: &[VersionCheck],
    store: &dyn Storage,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();
    for check in check_set {
        let current = current_version(store, &check.key)?;
        if current != check.expected {
            result.conflicts.push(ConflictType::VersionCheckConflict {
                key: check.key.clone(),
                expected_version: check.expected,
                current_version: current,
            });
        }
    }
    Ok(result)
}

/// Validate a complete transaction against current storage state
///
/// Read-only transactions skip validation entirely and always succeed.
pub fn validate_transaction(
    txn: &TransactionContext,
    store: &dyn Storage,
) -> Result<ValidationResult> {
    if txn.is_read_only() {
        return Ok(ValidationResult::ok());
    }

    let mut result = ValidationResult::ok();
    result.merge(validate_read_set(&txn.read_set, store)?);
    result.merge(validate_check_set(&txn.check_set, store)?);
    Ok(result)
}
