//! Concurrent deliveries for the same run.
//!
//! Threads line up on a `Barrier` so the handlers overlap as much as the
//! scheduler allows; the assertions hold for every interleaving.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use runkeeper::{Error, ListParams, ModelError};

use crate::common::*;

#[test]
fn duplicate_execute_deliveries_start_the_run_once() {
    const DELIVERIES: usize = 8;

    for _ in 0..10 {
        let h = Harness::new();
        let model = Arc::new(ScriptedModelClient::replying("Hello"));
        let worker = h.worker(Arc::clone(&model));
        let run = h.queue_run();

        let barrier = Arc::new(Barrier::new(DELIVERIES));
        let transitions = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..DELIVERIES)
            .map(|_| {
                let worker = worker.clone();
                let barrier = Arc::clone(&barrier);
                let transitions = Arc::clone(&transitions);
                let id = run.id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    match worker.execute(&id).unwrap() {
                        Outcome::Transitioned(status) => {
                            assert_eq!(status, RunStatus::Completed);
                            transitions.fetch_add(1, Ordering::SeqCst);
                        }
                        Outcome::Skipped(reason) => assert!(matches!(
                            reason,
                            SkipReason::Conflict | SkipReason::StatusMismatch(_)
                        )),
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(transitions.load(Ordering::SeqCst), 1);
        assert_eq!(model.calls(), 1);
        let steps = h.records.list_steps(&run.id, &ListParams::new()).unwrap();
        assert_eq!(steps.data.len(), 1);
        assert_eq!(h.replies().len(), 1);
        assert_eq!(h.run(&run.id).status, RunStatus::Completed);
        h.assert_paired(&run.id);
    }
}

#[test]
fn cancel_racing_execute_ends_in_one_terminal_state() {
    for round in 0..20 {
        let h = Harness::new();
        let model = Arc::new(ScriptedModelClient::replying("Hello"));
        if round % 2 == 1 {
            model.push(Err(ModelError::UpstreamServerError("502".into())));
        }
        let worker = h.worker(model);
        let run = h.queue_run();
        let barrier = Arc::new(Barrier::new(2));

        let executing = {
            let worker = worker.clone();
            let barrier = Arc::clone(&barrier);
            let id = run.id.clone();
            thread::spawn(move || {
                barrier.wait();
                worker.execute(&id).unwrap()
            })
        };
        let cancelling = {
            let worker = worker.clone();
            let dispatcher = h.dispatcher.clone();
            let barrier = Arc::clone(&barrier);
            let id = run.id.clone();
            thread::spawn(move || {
                barrier.wait();
                match dispatcher.request_cancel(&id) {
                    Ok(_) => Some(worker.cancel(&id).unwrap()),
                    Err(Error::InvalidState { .. }) => None,
                    Err(e) => panic!("unexpected cancel error: {e}"),
                }
            })
        };
        executing.join().unwrap();
        let cancel = cancelling.join().unwrap();

        let run = h.run(&run.id);
        match cancel {
            Some(outcome) => {
                assert_eq!(outcome, Outcome::Transitioned(RunStatus::Cancelled));
                assert_eq!(run.status, RunStatus::Cancelled);
                assert!(h.replies().is_empty());
            }
            None => assert!(matches!(
                run.status,
                RunStatus::Completed | RunStatus::Failed
            )),
        }
        h.assert_paired(&run.id);
    }
}

#[test]
fn expire_racing_execute_never_splits_run_and_step() {
    for _ in 0..20 {
        let h = Harness::new();
        let worker = h.worker(Arc::new(ScriptedModelClient::replying("Hello")));
        let run = h.queue_run();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [true, false]
            .into_iter()
            .map(|execute| {
                let worker = worker.clone();
                let barrier = Arc::clone(&barrier);
                let id = run.id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if execute {
                        worker.execute(&id).unwrap()
                    } else {
                        worker.expire(&id).unwrap()
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let status = h.run(&run.id).status;
        assert!(matches!(status, RunStatus::Completed | RunStatus::Expired));
        h.assert_paired(&run.id);
    }
}

#[test]
fn cancel_while_model_is_answering_discards_the_reply() {
    let h = Harness::new();
    let gate = Gate::new();
    let worker = h.worker(Arc::new(
        ScriptedModelClient::replying("discarded").with_gate(Arc::clone(&gate)),
    ));
    let run = h.queue_run();

    let executing = {
        let worker = worker.clone();
        let id = run.id.clone();
        thread::spawn(move || worker.execute(&id))
    };
    assert!(gate.wait_entered(1, std::time::Duration::from_secs(5)));
    h.dispatcher.request_cancel(&run.id).unwrap();
    worker.cancel(&run.id).unwrap();
    gate.open();

    assert_eq!(
        executing.join().unwrap().unwrap(),
        Outcome::Skipped(SkipReason::Conflict)
    );
    assert_eq!(h.run(&run.id).status, RunStatus::Cancelled);
    assert_eq!(h.step(&run.id).unwrap().status, StepStatus::Cancelled);
    assert!(h.replies().is_empty());
}
