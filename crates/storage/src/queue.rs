//! MemoryQueue: at-least-once work queue
//!
//! Messages are delivered to one receiver at a time. A delivery stays in
//! flight until it is acked; if it is nacked, or its visibility timeout
//! elapses first, it becomes receivable again. A message that has been
//! delivered `max_deliveries` times without an ack is moved to the dead
//! letter list instead of being redelivered.
//!
//! Ordering is not guaranteed to survive redelivery.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use runkeeper_core::{Delivery, Result, WorkQueue};

/// Delivery limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Deliveries of one message before it is dead-lettered
    pub max_deliveries: u32,
    /// How long a delivery may stay unacked before it is redelivered
    pub visibility_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            visibility_timeout: Duration::from_secs(30),
        }
    }
}

/// A message that exhausted its deliveries
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    /// Message payload
    pub payload: serde_json::Value,
    /// Deliveries made before giving up
    pub attempts: u32,
}

#[derive(Debug)]
struct Entry {
    payload: serde_json::Value,
    attempts: u32,
}

#[derive(Debug)]
struct InFlight {
    entry: Entry,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Entry>,
    in_flight: HashMap<u64, InFlight>,
    dead: Vec<DeadLetter>,
    next_delivery_id: u64,
}

/// In-memory at-least-once queue
#[derive(Debug)]
pub struct MemoryQueue {
    options: QueueOptions,
    state: Mutex<QueueState>,
    available: Condvar,
}

impl MemoryQueue {
    /// Create an empty queue
    pub fn new(options: QueueOptions) -> Self {
        Self {
            options,
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
        }
    }

    /// Delivery limits of this queue
    pub fn options(&self) -> QueueOptions {
        self.options
    }

    /// Messages that exhausted their deliveries
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead.clone()
    }

    /// Messages waiting to be received
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Deliveries not yet acked
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Requeue or dead-letter an entry that was delivered and not acked
    fn retire(&self, state: &mut QueueState, entry: Entry) {
        if entry.attempts >= self.options.max_deliveries {
            error!(
                attempts = entry.attempts,
                payload = %entry.payload,
                "message exhausted deliveries, dead-lettering"
            );
            state.dead.push(DeadLetter {
                payload: entry.payload,
                attempts: entry.attempts,
            });
        } else {
            state.ready.push_back(entry);
        }
    }

    /// Return expired in-flight deliveries to the ready list
    fn reclaim_expired(&self, state: &mut QueueState, now: Instant) {
        let expired: Vec<u64> = state
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(flight) = state.in_flight.remove(&id) {
                warn!(delivery_id = id, "visibility timeout elapsed, redelivering");
                self.retire(state, flight.entry);
            }
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(QueueOptions::default())
    }
}

impl WorkQueue for MemoryQueue {
    fn enqueue(&self, payload: serde_json::Value) -> Result<()> {
        let mut state = self.state.lock();
        state.ready.push_back(Entry {
            payload,
            attempts: 0,
        });
        self.available.notify_one();
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Option<Delivery>> {
        let give_up = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            self.reclaim_expired(&mut state, now);

            if let Some(mut entry) = state.ready.pop_front() {
                entry.attempts += 1;
                state.next_delivery_id += 1;
                let id = state.next_delivery_id;
                let delivery = Delivery {
                    id,
                    payload: entry.payload.clone(),
                    attempt: entry.attempts,
                };
                state.in_flight.insert(
                    id,
                    InFlight {
                        entry,
                        deadline: now + self.options.visibility_timeout,
                    },
                );
                return Ok(Some(delivery));
            }

            if now >= give_up {
                return Ok(None);
            }

            // Wake for the earlier of our own deadline and the next in-flight
            // expiry, which may make a message ready again.
            let wake = state
                .in_flight
                .values()
                .map(|f| f.deadline)
                .min()
                .map_or(give_up, |d| d.min(give_up));
            self.available.wait_until(&mut state, wake);
        }
    }

    fn ack(&self, delivery_id: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.in_flight.remove(&delivery_id).is_none() {
            debug!(delivery_id, "ack for unknown delivery ignored");
        }
        Ok(())
    }

    fn nack(&self, delivery_id: u64) -> Result<()> {
        let mut state = self.state.lock();
        match state.in_flight.remove(&delivery_id) {
            Some(flight) => {
                self.retire(&mut state, flight.entry);
                self.available.notify_one();
            }
            None => debug!(delivery_id, "nack for unknown delivery ignored"),
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        let state = self.state.lock();
        state.ready.len() + state.in_flight.len()
    }
}
