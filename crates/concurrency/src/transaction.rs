//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. TransactionContext tracks all reads, writes, deletes,
//! explicit version checks and queued messages of a transaction, enabling
//! validation at commit time.
//!
//! Reads go straight to the store and record the version they observed.
//! Nothing is written until commit: the transaction manager validates every
//! recorded version under the commit lock and then applies the write set and
//! the queued messages as one batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::validation::{validate_transaction, ValidationResult};
use runkeeper_core::{Error, Key, KeyPrefix, Result, Storage, Value, Version, Versioned, WriteBatch};

/// Error type for commit failures
///
/// - All-or-nothing commit: a transaction either commits or aborts entirely
/// - First-committer-wins: conflicts are detected on the read-set and the
///   explicit version checks
#[derive(Debug, Error)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    #[error("commit failed: {} conflict(s)", .0.conflict_count())]
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The store failed while validating or applying
    #[error("storage failure during commit: {0}")]
    Storage(#[source] Error),
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => Error::TransactionConflict {
                reason: result.describe(),
            },
            CommitError::InvalidState(msg) => Error::Internal { reason: msg },
            CommitError::Storage(inner) => inner,
        }
    }
}

/// Summary of operations that would be applied on commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of pending put operations
    pub puts: usize,
    /// Number of pending delete operations
    pub deletes: usize,
    /// Number of pending version checks
    pub checks: usize,
    /// Number of pending queue messages
    pub enqueues: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes + self.checks + self.enqueues
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction aborted
    Aborted {
        /// Reason for abort
        reason: String,
    },
}

/// An explicit expectation on a key's version
///
/// `expected == Version::ABSENT` means "key must not exist". Checks are
/// validated at commit independently of the read-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    /// Key to check
    pub key: Key,
    /// Version the key must still have at commit
    pub expected: Version,
}

/// Transaction context for OCC
///
/// # Read-Your-Writes
///
/// Reads check, in order:
/// 1. **write_set**: returns the uncommitted write from this transaction
/// 2. **delete_set**: returns None for an uncommitted delete
/// 3. **store**: returns the committed value, tracked in `read_set`
///
/// # Read-Set Tracking
///
/// The first read of a key from the store records the version observed
/// (`Version::ABSENT` if missing). At commit, every recorded version must
/// still be current or the transaction aborts with a conflict.
///
/// # Lifecycle
///
/// 1. **BEGIN**: Create with `new()`, status is `Active`
/// 2. **READ/WRITE**: `get()`, `put()`, `delete()`, `check()`, `enqueue()`
/// 3. **VALIDATE**: `commit()` validates under the manager's commit lock
/// 4. **APPLY**: the manager applies `take_batch()` at the commit version
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,

    /// Store reads are served from and validated against
    store: Arc<dyn Storage>,

    /// Keys read and the versions first observed (for validation)
    ///
    /// Version 0 means the key did not exist when read.
    pub read_set: HashMap<Key, Version>,

    /// Keys written with their new values (buffered)
    pub write_set: BTreeMap<Key, Value>,

    /// Keys to delete (buffered)
    pub delete_set: BTreeSet<Key>,

    /// Explicit version expectations
    pub check_set: Vec<VersionCheck>,

    /// Queue payloads published on commit, in order
    pub enqueue_set: Vec<serde_json::Value>,

    /// Current transaction status
    pub status: TransactionStatus,

    start_time: Instant,
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("status", &self.status)
            .field("pending", &self.pending_operations())
            .finish()
    }
}

impl TransactionContext {
    /// Create a new transaction reading from `store`
    pub fn new(txn_id: u64, store: Arc<dyn Storage>) -> Self {
        TransactionContext {
            txn_id,
            store,
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            delete_set: BTreeSet::new(),
            check_set: Vec::new(),
            enqueue_set: Vec::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    /// The store this transaction validates against
    pub fn store(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    // === Read Operations ===

    /// Get a value from the transaction
    ///
    /// # Errors
    /// Returns `Error::InvalidState` if transaction is not active.
    pub fn get(&mut self, key: &Key) -> Result<Option<Value>> {
        Ok(self.get_versioned(key)?.map(Versioned::into_value))
    }

    /// Get a value together with the store version it was read at
    ///
    /// For keys written in this transaction the value is the buffered write
    /// and the version is the one previously observed from the store
    /// (`Version::ABSENT` if never read).
    ///
    /// # Errors
    /// Returns `Error::InvalidState` if transaction is not active.
    pub fn get_versioned(&mut self, key: &Key) -> Result<Option<Versioned<Value>>> {
        self.ensure_active()?;

        if let Some(value) = self.write_set.get(key) {
            let version = self.read_set.get(key).copied().unwrap_or(Version::ABSENT);
            return Ok(Some(Versioned::new(value.clone(), version)));
        }
        if self.delete_set.contains(key) {
            return Ok(None);
        }

        self.read_from_store(key)
    }

    fn read_from_store(&mut self, key: &Key) -> Result<Option<Versioned<Value>>> {
        let versioned = self.store.get(key)?;
        let observed = versioned
            .as_ref()
            .map_or(Version::ABSENT, |v| v.version);
        // Keep the first observation: validation compares against it.
        self.read_set.entry(key.clone()).or_insert(observed);
        Ok(versioned)
    }

    /// Check if a key exists in the transaction's view
    ///
    /// Tracks the read in the read-set like `get()`.
    pub fn exists(&mut self, key: &Key) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Scan all primary keys under a prefix
    ///
    /// Merges uncommitted writes and deletes of this transaction. Every key
    /// returned from the store is tracked in the read-set. Results are sorted
    /// by key order.
    pub fn scan_prefix(&mut self, prefix: &KeyPrefix) -> Result<Vec<(Key, Value)>> {
        self.ensure_active()?;

        let mut results: BTreeMap<Key, Value> = BTreeMap::new();
        for (key, vv) in self.store.scan_prefix(prefix)? {
            if !self.delete_set.contains(&key) {
                self.read_set.entry(key.clone()).or_insert(vv.version);
                results.insert(key, vv.value);
            }
        }
        for (key, value) in &self.write_set {
            if key.starts_with(prefix) {
                results.insert(key.clone(), value.clone());
            }
        }
        Ok(results.into_iter().collect())
    }

    /// Version recorded for a key in the read-set
    pub fn get_read_version(&self, key: &Key) -> Option<Version> {
        self.read_set.get(key).copied()
    }

    // === Write Operations ===

    /// Buffer a write
    ///
    /// Writes are blind: no read-set entry unless the key was read first.
    pub fn put(&mut self, key: Key, value: Value) -> Result<()> {
        self.ensure_active()?;
        self.delete_set.remove(&key);
        self.write_set.insert(key, value);
        Ok(())
    }

    /// Buffer a delete
    pub fn delete(&mut self, key: Key) -> Result<()> {
        self.ensure_active()?;
        self.write_set.remove(&key);
        self.delete_set.insert(key);
        Ok(())
    }

    /// Require `key` to still be at `expected` when the transaction commits
    pub fn check(&mut self, key: Key, expected: Version) -> Result<()> {
        self.ensure_active()?;
        self.check_set.push(VersionCheck { key, expected });
        Ok(())
    }

    /// Buffer a queue message, published only if the transaction commits
    pub fn enqueue(&mut self, payload: serde_json::Value) -> Result<()> {
        self.ensure_active()?;
        self.enqueue_set.push(payload);
        Ok(())
    }

    // === State Management ===

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// A transaction can be rolled back while Active or Validating
    pub fn can_rollback(&self) -> bool {
        matches!(
            self.status,
            TransactionStatus::Active | TransactionStatus::Validating
        )
    }

    /// Time since the transaction was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if transaction can accept operations
    ///
    /// # Errors
    /// Returns `Error::InvalidState` if transaction is not in `Active` state.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "transaction {} is not active: {:?}",
                self.txn_id, self.status
            )))
        }
    }

    /// Abort the transaction, discarding every buffered operation
    ///
    /// # State Transitions
    /// - `Active` → `Aborted`
    /// - `Validating` → `Aborted`
    pub fn mark_aborted(&mut self, reason: String) -> Result<()> {
        match &self.status {
            TransactionStatus::Committed => Err(Error::invalid_state(format!(
                "cannot abort committed transaction {}",
                self.txn_id
            ))),
            TransactionStatus::Aborted { .. } => Err(Error::invalid_state(format!(
                "transaction {} already aborted",
                self.txn_id
            ))),
            _ => {
                self.status = TransactionStatus::Aborted { reason };
                self.write_set.clear();
                self.delete_set.clear();
                self.check_set.clear();
                self.enqueue_set.clear();
                Ok(())
            }
        }
    }

    /// Counts of buffered operations
    pub fn pending_operations(&self) -> PendingOperations {
        PendingOperations {
            puts: self.write_set.len(),
            deletes: self.delete_set.len(),
            checks: self.check_set.len(),
            enqueues: self.enqueue_set.len(),
        }
    }

    /// True if the transaction would change nothing
    pub fn is_read_only(&self) -> bool {
        self.pending_operations().is_empty()
    }

    /// Number of keys in the read-set
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered puts
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Abort reason, if aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }

    // === Commit Operation ===

    /// Validate the transaction and mark it committed
    ///
    /// Must be called under the manager's commit lock so that no other commit
    /// lands between validation and apply.
    ///
    /// # Returns
    /// - Ok(()) if validation passed
    /// - Err(CommitError::ValidationFailed) if a recorded version changed
    /// - Err(CommitError::InvalidState) if not in Active state
    pub fn commit(&mut self) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "cannot commit transaction {} from {:?} state",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        let validation = match validate_transaction(self, self.store.as_ref()) {
            Ok(v) => v,
            Err(e) => {
                self.status = TransactionStatus::Aborted {
                    reason: format!("validation failed: {}", e),
                };
                return Err(CommitError::Storage(e));
            }
        };

        if !validation.is_valid() {
            self.status = TransactionStatus::Aborted {
                reason: format!(
                    "commit failed: {} conflict(s) detected",
                    validation.conflict_count()
                ),
            };
            return Err(CommitError::ValidationFailed(validation));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Move the buffered writes and messages out into a batch
    ///
    /// # Errors
    /// `Error::InvalidState` unless the transaction is committed.
    pub fn take_batch(&mut self) -> Result<WriteBatch> {
        if !self.is_committed() {
            return Err(Error::invalid_state(format!(
                "cannot apply writes: transaction {} is {:?}",
                self.txn_id, self.status
            )));
        }
        Ok(WriteBatch {
            puts: std::mem::take(&mut self.write_set).into_iter().collect(),
            deletes: std::mem::take(&mut self.delete_set).into_iter().collect(),
            enqueues: std::mem::take(&mut self.enqueue_set),
        })
    }
}
