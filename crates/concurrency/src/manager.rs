//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating, under one commit lock:
//! 1. Validation (first-committer-wins)
//! 2. Version allocation
//! 3. Storage application (records and queue messages together)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. acquire commit_lock
//! 2. txn.commit() - Active → Validating → Committed | Aborted
//! 3. IF read-only: return current version, nothing to apply
//! 4. allocate commit_version (increment global version)
//! 5. store.apply_batch(txn.take_batch(), commit_version)
//! 6. release commit_lock, return Ok(commit_version)
//! ```
//!
//! Holding the lock from step 2 to step 5 is what makes validation sound: no
//! other commit can change a validated key before this one is applied.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::transaction::{CommitError, TransactionContext};
use runkeeper_core::{Result, Version};

/// Manages transaction lifecycle and atomic commits
///
/// Global version counter is incremented once per writing transaction. All
/// keys written by a transaction get the same commit version.
#[derive(Debug)]
pub struct TransactionManager {
    /// Global version counter
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Serializes validate-and-apply
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Create a new transaction manager
    ///
    /// # Arguments
    /// * `initial_version` - Starting version, normally the store's current version
    pub fn new(initial_version: Version) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version.as_u64()),
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        }
    }

    /// Get current global version
    pub fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::SeqCst))
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate next commit version (increment global version)
    pub fn allocate_version(&self) -> Version {
        Version::new(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - Ok(commit_version) on success; for read-only transactions, the
    ///   current version
    /// - Err(CommitError) if validation fails or the store fails
    pub fn commit(&self, txn: &mut TransactionContext) -> std::result::Result<Version, CommitError> {
        let _guard = self.commit_lock.lock();

        txn.commit()?;

        if txn.is_read_only() {
            return Ok(self.current_version());
        }

        let commit_version = self.allocate_version();
        let batch = txn.take_batch().map_err(CommitError::Storage)?;
        let store = txn.store().clone();
        if let Err(e) = store.apply_batch(batch, commit_version) {
            error!(
                txn_id = txn.txn_id,
                commit_version = commit_version.as_u64(),
                error = %e,
                "storage application failed after validation"
            );
            return Err(CommitError::Storage(e));
        }

        debug!(
            txn_id = txn.txn_id,
            commit_version = commit_version.as_u64(),
            "transaction committed"
        );
        Ok(commit_version)
    }

    /// Explicitly abort a transaction
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        txn.mark_aborted(reason)
    }

    /// Commit with automatic rollback on failure
    ///
    /// Ensures the transaction ends Aborted if commit fails.
    pub fn commit_or_rollback(
        &self,
        txn: &mut TransactionContext,
    ) -> std::result::Result<Version, CommitError> {
        match self.commit(txn) {
            Ok(version) => Ok(version),
            Err(e) => {
                if txn.can_rollback() {
                    let _ = txn.mark_aborted(format!("commit failed: {}", e));
                }
                Err(e)
            }
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(Version::ABSENT)
    }
}
