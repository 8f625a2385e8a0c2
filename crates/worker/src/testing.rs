//! Test doubles for the model seam
//!
//! [`ScriptedModelClient`] answers from a script instead of a backend and
//! can hold callers at a [`Gate`] so tests can land a competing commit while
//! a run is parked inside its model call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::model::{ChatTurn, ModelClient, ModelError};

/// One recorded `generate_reply` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// Resolved model name
    pub model: String,
    /// Conversation as passed
    pub turns: Vec<ChatTurn>,
    /// Resolved instructions
    pub instructions: Option<String>,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    entered: usize,
}

/// A latch that callers wait at until a test opens it
#[derive(Debug, Default)]
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    /// A closed gate
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let every current and future caller through
    pub fn open(&self) {
        let mut state = self.state.lock();
        state.open = true;
        self.changed.notify_all();
    }

    /// Block until at least `count` callers have arrived, or `timeout` passes.
    ///
    /// Returns whether the count was reached.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.entered < count {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.entered >= count;
            }
        }
        true
    }

    fn pass(&self) {
        let mut state = self.state.lock();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            self.changed.wait(&mut state);
        }
    }
}

/// Model client that replays scripted results
///
/// Scripted results are consumed in order; once the script is exhausted
/// every call gets the fallback reply.
#[derive(Debug)]
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedModelClient {
    /// A client that always replies `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: text.into(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// A client whose first call fails with `error`
    pub fn failing(error: ModelError) -> Self {
        let client = Self::replying("");
        client.push(Err(error));
        client
    }

    /// Hold every call at `gate` before answering
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Append a result to the script
    pub fn push(&self, result: Result<String, ModelError>) {
        self.script.lock().push_back(result);
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every call made so far, in order
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

impl ModelClient for ScriptedModelClient {
    fn generate_reply(
        &self,
        model: &str,
        turns: &[ChatTurn],
        instructions: Option<&str>,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(ModelRequest {
            model: model.to_string(),
            turns: turns.to_vec(),
            instructions: instructions.map(str::to_string),
        });
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
