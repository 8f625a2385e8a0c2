//! Property tests: any sequence of deliveries keeps run and step paired.

use std::sync::Arc;

use proptest::prelude::*;
use runkeeper::ModelError;

use crate::common::*;

#[derive(Debug, Clone)]
enum Action {
    Execute { fail: bool },
    RequestCancel,
    Cancel,
    Expire,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        any::<bool>().prop_map(|fail| Action::Execute { fail }),
        Just(Action::RequestCancel),
        Just(Action::Cancel),
        Just(Action::Expire),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn deliveries_in_any_order_keep_run_and_step_paired(
        actions in prop::collection::vec(action(), 1..8)
    ) {
        let h = Harness::new();
        let model = Arc::new(ScriptedModelClient::replying("Hello"));
        let worker = h.worker(Arc::clone(&model));
        let run = h.queue_run();
        let mut settled = None;

        for action in actions {
            match action {
                Action::Execute { fail } => {
                    if fail {
                        model.push(Err(ModelError::Unknown("boom".into())));
                    }
                    worker.execute(&run.id).unwrap();
                }
                Action::RequestCancel => {
                    let _ = h.dispatcher.request_cancel(&run.id);
                }
                Action::Cancel => {
                    worker.cancel(&run.id).unwrap();
                }
                Action::Expire => {
                    worker.expire(&run.id).unwrap();
                }
            }
            h.assert_paired(&run.id);

            let current = h.run(&run.id);
            if let Some(previous) = &settled {
                prop_assert_eq!(&current, previous);
            } else if current.status.is_terminal() {
                settled = Some(current);
            }
        }

        prop_assert!(model.calls() <= 1);
        prop_assert!(h.replies().len() <= 1);
    }
}
