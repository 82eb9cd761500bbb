//! Cross-store link tests.

use keepsake::{link, link_two_way, Action, Store, Transform};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counting_listener(store: &Store) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    store.subscribe(move |_: &Action| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[test]
fn test_two_way_converges_without_echo() {
    let a = Store::with_state(json!({"theme": "light"})).unwrap();
    let b = Store::with_state(json!({"theme": "light"})).unwrap();
    let _link = link_two_way(&a, &b, "theme", None, None);

    let a_calls = counting_listener(&a);
    let b_calls = counting_listener(&b);

    a.dispatch("set-theme", json!("dark")).unwrap();

    assert_eq!(a.get_state()["theme"], "dark");
    assert_eq!(b.get_state()["theme"], "dark");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);

    b.dispatch("set-theme", json!("blue")).unwrap();

    assert_eq!(a.get_state()["theme"], "blue");
    assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_two_way_transforms() {
    let a = Store::with_state(json!({"size": 1})).unwrap();
    let b = Store::with_state(json!({"size": 2})).unwrap();

    let double: Transform = Arc::new(|v: &Value| json!(v.as_i64().unwrap_or(0) * 2));
    let halve: Transform = Arc::new(|v: &Value| json!(v.as_i64().unwrap_or(0) / 2));
    let _link = link_two_way(&a, &b, "size", Some(double), Some(halve));

    a.dispatch("set-size", json!(4)).unwrap();
    assert_eq!(b.get_state()["size"], 8);

    b.dispatch("set-size", json!(20)).unwrap();
    assert_eq!(a.get_state()["size"], 10);
    assert_eq!(b.get_state()["size"], 20);
}

#[test]
fn test_chained_links_have_independent_guards() {
    let a = Store::with_state(json!({})).unwrap();
    let b = Store::with_state(json!({})).unwrap();
    let c = Store::with_state(json!({})).unwrap();

    let _ab = link(&a, &b, "x", None);
    let _bc = link(&b, &c, "x", None);

    a.dispatch("set-x", json!(7)).unwrap();

    assert_eq!(b.get_state()["x"], 7);
    assert_eq!(c.get_state()["x"], 7);
}

#[test]
fn test_links_on_different_keys_do_not_interfere() {
    let a = Store::with_state(json!({})).unwrap();
    let b = Store::with_state(json!({})).unwrap();

    let _theme = link_two_way(&a, &b, "theme", None, None);
    let _lang = link_two_way(&a, &b, "lang", None, None);

    a.dispatch("set-theme", json!("dark")).unwrap();
    b.dispatch("set-lang", json!("fr")).unwrap();

    assert_eq!(a.get_state(), json!({"theme": "dark", "lang": "fr"}));
    assert_eq!(b.get_state(), a.get_state());
}

#[test]
fn test_propagated_dispatch_is_recorded_in_destination_history() {
    let a = Store::with_state(json!({"x": 0})).unwrap();
    let b = Store::with_state(json!({"x": 0})).unwrap();
    let _link = link_two_way(&a, &b, "x", None, None);

    a.dispatch("set-x", json!(1)).unwrap();

    assert_eq!(a.history_len(), 2);
    assert_eq!(b.history_len(), 2);
}

#[test]
fn test_unlinked_two_way_stops_both_directions() {
    let a = Store::with_state(json!({})).unwrap();
    let b = Store::with_state(json!({})).unwrap();
    let link = link_two_way(&a, &b, "x", None, None);
    assert!(link.is_two_way());
    assert_eq!(link.key(), "x");

    link.unlink();
    a.dispatch("set-x", json!(1)).unwrap();
    b.dispatch("set-x", json!(2)).unwrap();

    assert_eq!(a.get_state()["x"], 1);
    assert_eq!(b.get_state()["x"], 2);
}

#[test]
fn test_two_way_link_on_nested_path() {
    let a = Store::with_state(json!({"prefs": {"theme": "light"}})).unwrap();
    let b = Store::with_state(json!({"prefs": {"theme": "light", "lang": "en"}})).unwrap();
    let _link = link_two_way(&a, &b, "prefs.theme", None, None);

    a.dispatch("set-prefs.theme", json!("dark")).unwrap();
    assert_eq!(b.get_state(), json!({"prefs": {"theme": "dark", "lang": "en"}}));

    b.dispatch("set-prefs.theme", json!("blue")).unwrap();
    assert_eq!(a.get_state(), json!({"prefs": {"theme": "blue"}}));
}
