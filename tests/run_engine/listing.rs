//! Cursor pagination over runs, steps and messages.

use std::sync::Arc;

use runkeeper::{ListParams, Order, QueueConsumer};

use crate::common::*;

fn ids<T>(items: &[T], id: impl Fn(&T) -> String) -> Vec<String> {
    items.iter().map(id).collect()
}

fn harness_with_runs() -> Harness {
    let h = Harness::new();
    for name in ["run_a", "run_b", "run_c", "run_d", "run_e"] {
        h.dispatcher
            .create_with_id(RunId::from(name), &h.thread.id, h.request())
            .unwrap();
    }
    h
}

#[test]
fn runs_page_newest_first_by_default() {
    let h = harness_with_runs();
    let page = h
        .records
        .list_runs(&h.thread.id, &ListParams::new().with_limit(2))
        .unwrap();
    assert_eq!(ids(&page.data, |r| r.id.to_string()), ["run_e", "run_d"]);
    assert_eq!(page.first_id.as_deref(), Some("run_e"));
    assert_eq!(page.last_id.as_deref(), Some("run_d"));
    assert!(page.has_more);

    let next = h
        .records
        .list_runs(&h.thread.id, &ListParams::new().with_limit(2).after("run_d"))
        .unwrap();
    assert_eq!(ids(&next.data, |r| r.id.to_string()), ["run_c", "run_b"]);

    let last = h
        .records
        .list_runs(&h.thread.id, &ListParams::new().with_limit(2).after("run_b"))
        .unwrap();
    assert_eq!(ids(&last.data, |r| r.id.to_string()), ["run_a"]);
    assert!(!last.has_more);
}

#[test]
fn runs_page_ascending_between_cursors() {
    let h = harness_with_runs();
    let page = h
        .records
        .list_runs(
            &h.thread.id,
            &ListParams::new()
                .with_order(Order::Asc)
                .after("run_a")
                .before("run_e"),
        )
        .unwrap();
    assert_eq!(
        ids(&page.data, |r| r.id.to_string()),
        ["run_b", "run_c", "run_d"]
    );
    assert!(!page.has_more);
}

#[test]
fn runs_of_other_threads_are_not_listed() {
    let h = harness_with_runs();
    let other = h
        .records
        .create_thread(&OrganizationId::default(), Thread::new())
        .unwrap();
    let page = h.records.list_runs(&other.id, &ListParams::new()).unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.first_id, None);
    assert!(!page.has_more);
}

#[test]
fn messages_list_includes_replies() {
    let h = Harness::new();
    h.queue_run();
    QueueConsumer::drain(&h.worker(Arc::new(ScriptedModelClient::replying("Hello")))).unwrap();

    let page = h
        .records
        .list_messages(&h.thread.id, &ListParams::new().with_order(Order::Asc))
        .unwrap();
    let roles: Vec<Role> = page.data.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Assistant]);
}

#[test]
fn invalid_limits_and_missing_parents_are_rejected() {
    let h = harness_with_runs();
    for limit in [0, 101] {
        assert!(h
            .records
            .list_runs(&h.thread.id, &ListParams::new().with_limit(limit))
            .is_err());
    }
    assert!(h
        .records
        .list_runs(&ThreadId::from("thread_missing"), &ListParams::new())
        .unwrap_err()
        .is_not_found());
    assert!(h
        .records
        .list_steps(&RunId::from("run_missing"), &ListParams::new())
        .unwrap_err()
        .is_not_found());
}
