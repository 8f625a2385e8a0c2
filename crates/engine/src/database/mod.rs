//! Database: the entry point every higher layer is handed explicitly
//!
//! A `Database` owns the in-memory store (and, through it, the work queue)
//! plus the transaction manager that serializes commits. All reads and
//! writes of records go through the transaction closure API:
//!
//! ```text
//! let run = db.transaction(|txn| {
//!     let run = txn.get_run(&run_id)?;
//!     ...
//!     Ok(run)
//! })?;
//! ```
//!
//! The closure's buffered writes and enqueues are applied together on
//! commit, or dropped together if the closure fails or validation finds a
//! conflict.

pub mod config;
pub mod transactions;

pub use config::{QueueConfig, RunkeeperConfig, WorkerConfig, CONFIG_FILE_NAME};
pub use transactions::RetryConfig;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runkeeper_concurrency::{TransactionContext, TransactionManager};
use runkeeper_core::{
    Delivery, Error, Key, KeyPrefix, Result, Storage, Value, Version, Versioned, WorkQueue,
};
use runkeeper_storage::{DeadLetter, MemoryQueue, MemoryStore};
use tracing::{debug, info, warn};

/// Main database struct
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Database {
    /// Records and the queue they publish to
    store: Arc<MemoryStore>,

    /// Commit protocol
    manager: TransactionManager,

    /// Loaded configuration
    config: RunkeeperConfig,

    /// Cleared by `shutdown()`
    accepting_transactions: AtomicBool,
}

impl Database {
    /// Create a database with the default configuration.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(RunkeeperConfig::default()))
    }

    /// Create a database from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the configuration does not validate.
    pub fn with_config(config: RunkeeperConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self::build(config)))
    }

    /// Create a database from a `runkeeper.toml` file.
    pub fn from_config_file(path: &Path) -> Result<Arc<Self>> {
        let config = RunkeeperConfig::from_file(path)?;
        info!(target: "runkeeper::db", path = %path.display(), "loaded configuration");
        Self::with_config(config)
    }

    fn build(config: RunkeeperConfig) -> Self {
        let queue = Arc::new(MemoryQueue::new(config.queue_options()));
        let store = Arc::new(MemoryStore::with_queue(queue));
        let manager = TransactionManager::new(store.current_version());
        Database {
            store,
            manager,
            config,
            accepting_transactions: AtomicBool::new(true),
        }
    }

    /// Loaded configuration.
    pub fn config(&self) -> &RunkeeperConfig {
        &self.config
    }

    /// Version of the latest commit.
    pub fn current_version(&self) -> Version {
        self.manager.current_version()
    }

    /// Whether the database still accepts transactions.
    pub fn is_open(&self) -> bool {
        self.accepting_transactions.load(Ordering::SeqCst)
    }

    /// Stop accepting new transactions.
    ///
    /// Queue operations keep working so consumers can finish in-flight
    /// deliveries; their transactions fail with `InvalidInput`.
    pub fn shutdown(&self) {
        if self.accepting_transactions.swap(false, Ordering::SeqCst) {
            info!(
                target: "runkeeper::db",
                version = self.current_version().as_u64(),
                pending = self.pending(),
                "database shut down"
            );
        }
    }

    // ========================================================================
    // Transaction API
    // ========================================================================

    fn check_accepting(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::invalid_input("Database is shutting down"));
        }
        Ok(())
    }

    /// Execute one transaction attempt: commit on success, abort on error.
    fn run_single_attempt<T>(
        &self,
        txn: &mut TransactionContext,
        result: Result<T>,
    ) -> Result<(T, Version)> {
        match result {
            Ok(value) => {
                let version = self.commit_transaction(txn)?;
                Ok((value, version))
            }
            Err(e) => {
                let _ = txn.mark_aborted(format!("Closure error: {}", e));
                Err(e)
            }
        }
    }

    /// Execute a transaction with the given closure
    ///
    /// # Returns
    /// * `Ok(T)` - Closure return value on successful commit
    /// * `Err` - On validation conflict or closure error; nothing is applied
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        self.transaction_with_version(f).map(|(value, _)| value)
    }

    /// Execute a transaction and return both the result and commit version
    ///
    /// Every key written by the transaction carries the returned version, so
    /// a later transaction can require that a record is still exactly as
    /// this one left it.
    pub fn transaction_with_version<F, T>(&self, f: F) -> Result<(T, Version)>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        self.check_accepting()?;
        let mut txn = self.begin_transaction();
        let result = f(&mut txn);
        self.run_single_attempt(&mut txn, result)
    }

    /// Execute a transaction with automatic retry on conflict
    ///
    /// The closure is re-run against fresh state until it commits, fails with
    /// a non-conflict error, or `config.max_retries` is exhausted.
    pub fn transaction_with_retry<F, T>(&self, config: RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut TransactionContext) -> Result<T>,
    {
        self.check_accepting()?;

        let mut attempt = 0;
        loop {
            let mut txn = self.begin_transaction();
            let result = f(&mut txn);
            match self.run_single_attempt(&mut txn, result) {
                Ok((value, _)) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < config.max_retries => {
                    debug!(target: "runkeeper::db", attempt, error = %e, "retrying transaction");
                    std::thread::sleep(config.calculate_delay(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Begin a new transaction (for manual control)
    ///
    /// Prefer the `transaction()` closure API, which commits or aborts for
    /// you.
    pub fn begin_transaction(&self) -> TransactionContext {
        TransactionContext::new(self.manager.next_txn_id(), self.store.clone())
    }

    /// Commit a manually managed transaction
    ///
    /// # Errors
    ///
    /// `TransactionConflict` if validation fails; the transaction is left
    /// aborted and nothing is applied.
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> Result<Version> {
        self.manager.commit_or_rollback(txn).map_err(|e| {
            let err = Error::from(e);
            if err.is_conflict() {
                debug!(target: "runkeeper::db", txn_id = txn.txn_id, error = %err, "commit rejected");
            } else {
                warn!(target: "runkeeper::db", txn_id = txn.txn_id, error = %err, "commit failed");
            }
            err
        })
    }

    // ========================================================================
    // Non-transactional reads
    // ========================================================================

    /// Latest committed value of `key`, outside any transaction.
    pub fn get(&self, key: &Key) -> Result<Option<Versioned<Value>>> {
        self.store.get(key)
    }

    /// Latest committed entries under `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &KeyPrefix) -> Result<Vec<(Key, Versioned<Value>)>> {
        self.store.scan_prefix(prefix)
    }

    // ========================================================================
    // Queue access
    // ========================================================================

    /// The work queue commits publish to.
    pub fn queue(&self) -> &Arc<MemoryQueue> {
        self.store.queue()
    }

    /// Block up to `timeout` for the next delivery.
    pub fn receive(&self, timeout: Duration) -> Result<Option<Delivery>> {
        self.queue().receive(timeout)
    }

    /// Acknowledge a delivery; it will not be redelivered.
    pub fn ack(&self, delivery_id: u64) -> Result<()> {
        self.queue().ack(delivery_id)
    }

    /// Return a delivery to the queue for redelivery.
    pub fn nack(&self, delivery_id: u64) -> Result<()> {
        self.queue().nack(delivery_id)
    }

    /// Messages that are ready or in flight.
    pub fn pending(&self) -> usize {
        self.queue().pending()
    }

    /// Messages that exhausted their deliveries.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.queue().dead_letters()
    }
}
