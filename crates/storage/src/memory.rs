//! MemoryStore: ordered in-memory storage with version management
//!
//! This module implements the Storage trait using:
//! - `BTreeMap<Key, Versioned<Value>>` for ordered key storage
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the most recent commit version
//!
//! # Design Notes
//!
//! - **No version history**: each key stores only its latest value and the
//!   version of the commit that wrote it
//! - **Batch atomicity**: `apply_batch` holds the write lock for the whole
//!   batch, including publishing its queue messages

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use runkeeper_core::{
    Key, KeyPrefix, Result, Storage, Value, Version, Versioned, WorkQueue, WriteBatch,
};

use crate::queue::{MemoryQueue, QueueOptions};

/// Ordered in-memory store
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`.
#[derive(Debug)]
pub struct MemoryStore {
    /// Ordered map from key to its latest versioned value
    data: RwLock<BTreeMap<Key, Versioned<Value>>>,
    /// Version of the most recent applied batch
    version: AtomicU64,
    /// Queue receiving messages published by batches
    queue: Arc<MemoryQueue>,
}

impl MemoryStore {
    /// Create an empty store with a default queue
    pub fn new() -> Self {
        Self::with_queue(Arc::new(MemoryQueue::new(QueueOptions::default())))
    }

    /// Create an empty store publishing to `queue`
    pub fn with_queue(queue: Arc<MemoryQueue>) -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            queue,
        }
    }

    /// The queue batches publish to
    pub fn queue(&self) -> &Arc<MemoryQueue> {
        &self.queue
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &Key) -> Result<Option<Versioned<Value>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &KeyPrefix) -> Result<Vec<(Key, Versioned<Value>)>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.lower_bound()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::Acquire))
    }

    fn apply_batch(&self, batch: WriteBatch, version: Version) -> Result<()> {
        let mut data = self.data.write();

        let WriteBatch {
            puts,
            deletes,
            enqueues,
        } = batch;
        trace!(
            version = version.as_u64(),
            puts = puts.len(),
            deletes = deletes.len(),
            enqueues = enqueues.len(),
            "applying batch"
        );

        for (key, value) in puts {
            data.insert(key, Versioned::new(value, version));
        }
        for key in &deletes {
            data.remove(key);
        }

        self.version.fetch_max(version.as_u64(), Ordering::AcqRel);

        // Published while the write lock is held: a consumer that receives
        // one of these messages always reads this batch's records.
        for payload in enqueues {
            self.queue.enqueue(payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runkeeper_core::{MessageId, RunId, ThreadId};
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    fn put_batch(key: Key, value: serde_json::Value) -> WriteBatch {
        WriteBatch {
            puts: vec![(key, Value::Record(value))],
            ..WriteBatch::default()
        }
    }

    #[test]
    fn test_store_creation() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.current_version(), Version::ABSENT);
    }

    #[test]
    fn test_apply_batch_stamps_version() {
        let store = MemoryStore::new();
        let key = Key::run(&ThreadId::from("t"), &RunId::from("r"));
        store
            .apply_batch(put_batch(key.clone(), json!({"n": 1})), Version::new(3))
            .unwrap();

        let got = store.get(&key).unwrap().unwrap();
        assert_eq!(got.version, Version::new(3));
        assert_eq!(got.value, Value::Record(json!({"n": 1})));
        assert_eq!(store.current_version(), Version::new(3));
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        let key = Key::run_index(&RunId::from("nope"));
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        let key = Key::run_index(&RunId::from("r"));
        store
            .apply_batch(put_batch(key.clone(), json!(1)), Version::new(1))
            .unwrap();
        store
            .apply_batch(
                WriteBatch {
                    deletes: vec![key.clone()],
                    ..WriteBatch::default()
                },
                Version::new(2),
            )
            .unwrap();
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_scan_prefix_is_ordered_and_scoped() {
        let store = MemoryStore::new();
        let t1 = ThreadId::from("thrd-1");
        let t2 = ThreadId::from("thrd-2");
        let batch = WriteBatch {
            puts: vec![
                (Key::message(&t1, &MessageId::from("msg-b")), Value::Record(json!("b"))),
                (Key::message(&t1, &MessageId::from("msg-a")), Value::Record(json!("a"))),
                (Key::message(&t2, &MessageId::from("msg-c")), Value::Record(json!("c"))),
                (Key::run(&t1, &RunId::from("run-1")), Value::Record(json!("r"))),
            ],
            ..WriteBatch::default()
        };
        store.apply_batch(batch, Version::new(1)).unwrap();

        let found = store.scan_prefix(&KeyPrefix::messages(&t1)).unwrap();
        let ids: Vec<&str> = found.iter().map(|(k, _)| k.id.as_str()).collect();
        assert_eq!(ids, vec!["msg-a", "msg-b"]);
    }

    #[test]
    fn test_enqueues_published_with_batch() {
        let store = MemoryStore::new();
        let key = Key::run_index(&RunId::from("r"));
        let mut batch = put_batch(key, json!(1));
        batch.enqueues.push(json!({"action": "execute", "runId": "r"}));
        store.apply_batch(batch, Version::new(1)).unwrap();

        let delivery = store
            .queue()
            .receive(Duration::from_millis(10))
            .unwrap()
            .unwrap();
        assert_eq!(delivery.payload["runId"], "r");
    }

    #[test]
    fn test_concurrent_batches_keep_max_version() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = Key::run_index(&RunId::from(format!("run-{i}")));
                    store
                        .apply_batch(put_batch(key, json!(i)), Version::new(i))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 8);
        assert_eq!(store.current_version(), Version::new(8));
    }

    #[test]
    fn test_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryStore>();
    }
}
