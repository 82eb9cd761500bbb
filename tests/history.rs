//! Undo/redo history tests.

use keepsake::{Action, DispatchOptions, Store};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn counter_store() -> Store {
    Store::with_state(json!({"n": 0})).unwrap()
}

#[test]
fn test_undo_redo_roundtrip() {
    let store = counter_store();
    let before = store.get_state();

    store.dispatch("set-n", json!(1)).unwrap();
    let after = store.get_state();

    assert!(store.undo());
    assert_eq!(store.get_state(), before);

    assert!(store.redo());
    assert_eq!(store.get_state(), after);
}

#[test]
fn test_skip_history_does_not_grow() {
    let store = counter_store();
    store
        .dispatch_with("set-n", json!(5), DispatchOptions::skip_history())
        .unwrap();

    assert_eq!(store.get_state()["n"], 5);
    assert_eq!(store.history_len(), 1);
}

#[test]
fn test_branch_truncation() {
    let store = counter_store();
    store.dispatch("set-n", json!(1)).unwrap();
    store.dispatch("set-n", json!(2)).unwrap();

    assert!(store.jump_to(1));
    store.dispatch("set-n", json!(3)).unwrap();

    let history = store.history();
    assert_eq!(
        history.entries,
        vec![json!({"n": 0}), json!({"n": 1}), json!({"n": 3})]
    );
    assert_eq!(history.index, 2);
}

#[test]
fn test_jump_is_idempotent() {
    let store = counter_store();
    for n in 1..=3 {
        store.dispatch("set-n", json!(n)).unwrap();
    }

    assert!(store.jump_to(2));
    let (state, index) = (store.get_state(), store.history_index());

    assert!(store.jump_to(2));
    assert_eq!(store.get_state(), state);
    assert_eq!(store.history_index(), index);
    assert_eq!(store.history_len(), 4);
}

#[test]
fn test_navigation_broadcasts_history_jump() {
    let store = counter_store();
    store.dispatch("set-n", json!(1)).unwrap();

    let actions = Arc::new(Mutex::new(Vec::new()));
    let transitions = Arc::new(Mutex::new(Vec::new()));

    let actions_clone = Arc::clone(&actions);
    store.subscribe(move |action: &Action| actions_clone.lock().push(action.clone()));
    let transitions_clone = Arc::clone(&transitions);
    store.watch_all(move |next: &Value, previous: &Value| {
        transitions_clone
            .lock()
            .push((previous["n"].clone(), next["n"].clone()))
    });

    store.undo();
    store.redo();

    assert_eq!(
        *actions.lock(),
        vec![
            Action::HistoryJump { index: 0 },
            Action::HistoryJump { index: 1 }
        ]
    );
    assert_eq!(
        *transitions.lock(),
        vec![(json!(1), json!(0)), (json!(0), json!(1))]
    );
}

#[test]
fn test_navigation_fires_watchers() {
    let store = counter_store();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    store.watch_key("n", move |new: &Value, _: &Value| seen_clone.lock().push(new.clone()));

    store.dispatch("set-n", json!(1)).unwrap();
    store.undo();
    store.undo();

    assert_eq!(*seen.lock(), vec![json!(1), json!(0)]);
}

#[test]
fn test_navigation_never_records() {
    let store = counter_store();
    store.dispatch("set-n", json!(1)).unwrap();
    store.dispatch("set-n", json!(2)).unwrap();

    store.undo();
    store.undo();
    store.redo();
    store.jump_to(0);

    assert_eq!(store.history_len(), 3);
}

#[test]
fn test_unchanged_dispatch_not_recorded() {
    let store = counter_store();
    store.dispatch("set-n", json!(0)).unwrap();
    store.dispatch("noop", Value::Null).unwrap();

    assert_eq!(store.history_len(), 1);
}

/// One step of a random session.
#[derive(Clone, Debug)]
enum Step {
    Set(u8),
    SetQuietly(u8),
    Undo,
    Redo,
    Jump(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..4).prop_map(Step::Set),
        (0u8..4).prop_map(Step::SetQuietly),
        Just(Step::Undo),
        Just(Step::Redo),
        (0usize..8).prop_map(Step::Jump),
    ]
}

proptest! {
    #[test]
    fn prop_history_invariants(steps in prop::collection::vec(step(), 0..40)) {
        let store = counter_store();
        let initial = store.get_state();
        // Live state diverges from the current snapshot after an unrecorded set.
        let mut detached = false;

        for step in steps {
            let len_before = store.history_len();
            let index_before = store.history_index();

            match step {
                Step::Set(n) => {
                    let changed = store.get_state()["n"] != json!(n);
                    let result = store.dispatch("set-n", json!(n)).unwrap();
                    prop_assert_eq!(result.recorded, changed);
                    if changed {
                        detached = false;
                        prop_assert_eq!(store.history_len(), index_before + 2);
                        prop_assert_eq!(store.history_index(), index_before + 1);
                    } else {
                        prop_assert_eq!(store.history_len(), len_before);
                    }
                }
                Step::SetQuietly(n) => {
                    store
                        .dispatch_with("set-n", json!(n), DispatchOptions::skip_history())
                        .unwrap();
                    prop_assert_eq!(store.history_len(), len_before);
                    prop_assert_eq!(store.history_index(), index_before);
                    detached = true;
                }
                Step::Undo => {
                    let moved = store.undo();
                    prop_assert_eq!(moved, index_before > 0);
                    detached &= !moved;
                    prop_assert_eq!(store.history_len(), len_before);
                }
                Step::Redo => {
                    let moved = store.redo();
                    prop_assert_eq!(moved, index_before + 1 < len_before);
                    detached &= !moved;
                    prop_assert_eq!(store.history_len(), len_before);
                }
                Step::Jump(i) => {
                    let moved = store.jump_to(i);
                    prop_assert_eq!(moved, i < len_before);
                    detached &= !moved;
                    prop_assert_eq!(store.history_len(), len_before);
                    if moved {
                        prop_assert_eq!(store.history_index(), i);
                    }
                }
            }

            let history = store.history();
            prop_assert!(history.index < history.len());
            prop_assert_eq!(&history.entries[0], &initial);
            if !detached {
                prop_assert_eq!(&store.get_state(), &history.entries[history.index]);
            }
        }
    }
}
