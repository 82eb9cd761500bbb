//! Links propagating one key between stores.
//!
//! A link watches a key or dotted path on a source store and dispatches
//! `set-<key>` on a destination store whenever the value changes,
//! optionally through a transform. Two-way links install both directions behind one guard so a
//! propagation does not bounce back to where it came from.

use crate::state::is_nested;
use crate::store::{Store, WeakStore};
use crate::subscriptions::Subscription;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Value transform applied while propagating.
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Re-entrancy guard owned by one link.
///
/// Held while a propagation dispatch is in flight; any watcher of the same
/// link firing meanwhile is suppressed.
#[derive(Debug, Default)]
struct LinkGuard {
    locked: AtomicBool,
}

impl LinkGuard {
    /// Take the guard. Returns false if it is already held.
    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

/// An installed link. Dropping it keeps the link in place; call
/// [`Link::unlink`] to remove it.
#[derive(Debug)]
pub struct Link {
    key: String,
    subscriptions: Vec<Subscription>,
    guard: Arc<LinkGuard>,
}

impl Link {
    /// The propagated key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this link propagates in both directions.
    pub fn is_two_way(&self) -> bool {
        self.subscriptions.len() == 2
    }

    /// Whether a propagation is currently in flight.
    pub fn is_propagating(&self) -> bool {
        self.guard.is_locked()
    }

    /// Remove every direction of the link.
    pub fn unlink(self) {
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
    }
}

/// Propagate `key` from `source` to `destination`. A dotted key is
/// watched and written as a path.
///
/// The destination receives `transform(value)` when a transform is given,
/// else the value itself.
pub fn link(source: &Store, destination: &Store, key: &str, transform: Option<Transform>) -> Link {
    let guard = Arc::new(LinkGuard::default());
    let subscription = propagate(source, destination, key, transform, Arc::clone(&guard));

    Link {
        key: key.to_string(),
        subscriptions: vec![subscription],
        guard,
    }
}

/// Propagate `key` between `a` and `b` in both directions.
///
/// `forward` applies on the way from `a` to `b`, `reverse` on the way back.
/// One dispatch on either side results in exactly one dispatch on the
/// other.
pub fn link_two_way(
    a: &Store,
    b: &Store,
    key: &str,
    forward: Option<Transform>,
    reverse: Option<Transform>,
) -> Link {
    let guard = Arc::new(LinkGuard::default());
    let to_b = propagate(a, b, key, forward, Arc::clone(&guard));
    let to_a = propagate(b, a, key, reverse, Arc::clone(&guard));

    Link {
        key: key.to_string(),
        subscriptions: vec![to_b, to_a],
        guard,
    }
}

fn propagate(
    source: &Store,
    destination: &Store,
    key: &str,
    transform: Option<Transform>,
    guard: Arc<LinkGuard>,
) -> Subscription {
    let destination: WeakStore = destination.downgrade();
    let source_name = source.name().to_string();
    let action = format!("{}{}", crate::types::SET_PREFIX, key);

    let nested = is_nested(key);
    let forward = move |value: &Value, _previous: &Value| {
        if !guard.acquire() {
            tracing::trace!(source = %source_name, action = %action, "link suppressed re-entrant propagation");
            return;
        }

        if let Some(destination) = destination.upgrade() {
            let payload = match &transform {
                Some(transform) => transform(value),
                None => value.clone(),
            };
            if let Err(e) = destination.dispatch(&action, payload) {
                tracing::warn!(
                    source = %source_name,
                    destination = %destination.name(),
                    action = %action,
                    error = %e,
                    "link propagation failed"
                );
            }
        }

        guard.release();
    };

    if nested {
        source.watch_path(key, forward)
    } else {
        source.watch_key(key, forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guard() {
        let guard = LinkGuard::default();
        assert!(guard.acquire());
        assert!(!guard.acquire());
        assert!(guard.is_locked());
        guard.release();
        assert!(guard.acquire());
    }

    #[test]
    fn test_one_way_link() {
        let a = Store::with_state(json!({"theme": "light"})).unwrap();
        let b = Store::with_state(json!({"theme": "light"})).unwrap();
        let link = link(&a, &b, "theme", None);

        a.dispatch("set-theme", json!("dark")).unwrap();
        assert_eq!(b.get_state()["theme"], "dark");

        b.dispatch("set-theme", json!("blue")).unwrap();
        assert_eq!(a.get_state()["theme"], "dark");

        assert!(!link.is_two_way());
        assert!(!link.is_propagating());
    }

    #[test]
    fn test_transform() {
        let a = Store::with_state(json!({"celsius": 0})).unwrap();
        let b = Store::with_state(json!({})).unwrap();
        link(
            &a,
            &b,
            "celsius",
            Some(Arc::new(|v: &Value| json!(v.as_f64().unwrap_or(0.0) * 1.8 + 32.0))),
        );

        a.dispatch("set-celsius", json!(100)).unwrap();
        assert_eq!(b.get_state()["celsius"], json!(212.0));
    }

    #[test]
    fn test_unlink() {
        let a = Store::with_state(json!({})).unwrap();
        let b = Store::with_state(json!({})).unwrap();
        let link = link(&a, &b, "x", None);
        assert_eq!(a.subscription_count(), 1);

        link.unlink();
        assert_eq!(a.subscription_count(), 0);

        a.dispatch("set-x", json!(1)).unwrap();
        assert_eq!(b.get_path("x"), None);
    }

    #[test]
    fn test_dropped_destination_is_ignored() {
        let a = Store::with_state(json!({})).unwrap();
        let b = Store::with_state(json!({})).unwrap();
        let _link = link(&a, &b, "x", None);
        drop(b);

        assert!(a.dispatch("set-x", json!(1)).is_ok());
    }

    #[test]
    fn test_nested_key_link() {
        let a = Store::with_state(json!({"prefs": {"theme": "light", "font": "serif"}})).unwrap();
        let b = Store::with_state(json!({})).unwrap();
        link(&a, &b, "prefs.theme", None);

        a.dispatch("set-prefs.font", json!("mono")).unwrap();
        assert_eq!(b.get_state(), json!({}));

        a.dispatch("set-prefs.theme", json!("dark")).unwrap();
        assert_eq!(b.get_state(), json!({"prefs": {"theme": "dark"}}));
    }
}
