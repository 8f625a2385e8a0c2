//! Queue consumer pool
//!
//! A fixed set of threads, each looping receive → handle → ack/nack:
//! - handled (including skips) → ack
//! - substrate failure → nack, so the queue redelivers until it
//!   dead-letters the message after `queue.max_deliveries` attempts
//!
//! Workers are named `runkeeper-consumer-0`, `runkeeper-consumer-1`, etc.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use runkeeper_core::{Delivery, Error, Result};
use tracing::{debug, error, info};

use crate::worker::RunWorker;

#[derive(Debug, Default)]
struct ConsumerInner {
    shutdown: AtomicBool,
    acked: AtomicU64,
    nacked: AtomicU64,
}

/// Counters since the pool started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Deliveries handled and acknowledged
    pub acked: u64,
    /// Deliveries returned for redelivery
    pub nacked: u64,
    /// Number of consumer threads
    pub consumers: usize,
}

/// A pool of threads feeding queue deliveries to a [`RunWorker`]
#[derive(Debug)]
pub struct QueueConsumer {
    inner: Arc<ConsumerInner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    consumers: usize,
}

impl QueueConsumer {
    /// Start `worker.consumers` threads, as configured on the worker's database
    pub fn start(worker: RunWorker) -> Result<Self> {
        let consumers = worker.database().config().worker.consumers;
        Self::start_with(worker, consumers)
    }

    /// Start `consumers` threads
    ///
    /// # Errors
    ///
    /// `InvalidInput` for zero consumers; `Io` if a thread cannot be spawned.
    pub fn start_with(worker: RunWorker, consumers: usize) -> Result<Self> {
        if consumers == 0 {
            return Err(Error::invalid_input("a consumer pool needs at least one thread"));
        }
        let inner = Arc::new(ConsumerInner::default());
        let timeout = worker.database().config().receive_timeout();

        let handles = spawn_pool(&inner, consumers, |i| {
            let inner = Arc::clone(&inner);
            let worker = worker.clone();
            std::thread::Builder::new()
                .name(format!("runkeeper-consumer-{}", i))
                .spawn(move || consumer_loop(&inner, &worker, timeout))
        })?;
        info!(consumers, "queue consumers started");

        Ok(Self {
            inner,
            handles: Mutex::new(handles),
            consumers,
        })
    }

    /// Signal every thread to stop after its current delivery and join them
    pub fn shutdown(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        stop_all(&self.inner, handles);
        debug!("queue consumers stopped");
    }

    /// Counters since start
    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            acked: self.inner.acked.load(Ordering::Relaxed),
            nacked: self.inner.nacked.load(Ordering::Relaxed),
            consumers: self.consumers,
        }
    }

    /// Handle deliveries on the calling thread until none are ready
    ///
    /// Returns the number of deliveries handled, acked or not.
    pub fn drain(worker: &RunWorker) -> Result<usize> {
        let inner = ConsumerInner::default();
        let mut handled = 0;
        while let Some(delivery) = worker.database().receive(Duration::ZERO)? {
            process(&inner, worker, delivery)?;
            handled += 1;
        }
        Ok(handled)
    }
}

impl Drop for QueueConsumer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn `consumers` threads, or none: a failed spawn stops the ones
/// already running before the error is returned.
fn spawn_pool(
    inner: &ConsumerInner,
    consumers: usize,
    mut spawn: impl FnMut(usize) -> io::Result<JoinHandle<()>>,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(consumers);
    for i in 0..consumers {
        match spawn(i) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!(error = %e, started = handles.len(), "failed to spawn queue consumer");
                stop_all(inner, handles);
                return Err(e.into());
            }
        }
    }
    Ok(handles)
}

fn stop_all(inner: &ConsumerInner, handles: Vec<JoinHandle<()>>) {
    inner.shutdown.store(true, Ordering::Release);
    for handle in handles {
        if handle.join().is_err() {
            error!("queue consumer thread panicked");
        }
    }
}

fn consumer_loop(inner: &ConsumerInner, worker: &RunWorker, timeout: Duration) {
    while !inner.shutdown.load(Ordering::Acquire) {
        let result = worker
            .database()
            .receive(timeout)
            .and_then(|delivery| match delivery {
                Some(delivery) => process(inner, worker, delivery),
                None => Ok(()),
            });
        if let Err(e) = result {
            error!(error = %e, "queue consumer failed to talk to the queue");
        }
    }
}

/// Hand one delivery to the worker and settle it with the queue
fn process(inner: &ConsumerInner, worker: &RunWorker, delivery: Delivery) -> Result<()> {
    match worker.handle_payload(&delivery.payload) {
        Ok(outcome) => {
            debug!(delivery_id = delivery.id, ?outcome, "delivery handled");
            inner.acked.fetch_add(1, Ordering::Relaxed);
            worker.database().ack(delivery.id)
        }
        Err(e) => {
            error!(
                delivery_id = delivery.id,
                attempt = delivery.attempt,
                error = %e,
                "delivery failed, returning to queue"
            );
            inner.nacked.fetch_add(1, Ordering::Relaxed);
            worker.database().nack(delivery.id)
        }
    }
}
