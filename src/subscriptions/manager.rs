//! Subscription manager fanning store notifications out to listeners.

use crate::state::{get_path, EqualityPolicy};
use crate::types::Action;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::types::{
    DropReason, Listener, StateListener, StoreEvent, SubscriptionId, SubscriptionKind,
    WatchCallback,
};

/// What a watcher compares.
#[derive(Clone, Debug)]
enum WatchTarget {
    Key(String),
    Path(String),
}

impl WatchTarget {
    fn resolve(&self, state: &Value) -> Value {
        let found = match self {
            WatchTarget::Key(key) => state.get(key.as_str()),
            WatchTarget::Path(path) => get_path(state, path),
        };
        found.cloned().unwrap_or(Value::Null)
    }
}

/// Key or path watcher with its own last-seen value.
struct Watcher {
    id: SubscriptionId,
    target: WatchTarget,
    last_seen: Mutex<Value>,
    callback: WatchCallback,
}

impl Watcher {
    /// Compare against the last-seen value and record the new one.
    ///
    /// Returns `(new, old)` when the value changed.
    fn observe(&self, state: &Value, policy: EqualityPolicy) -> Option<(Value, Value)> {
        let next = self.target.resolve(state);
        let mut last = self.last_seen.lock();
        if policy.equal(&last, &next) {
            return None;
        }
        let previous = std::mem::replace(&mut *last, next.clone());
        Some((next, previous))
    }
}

/// Shared listener collections.
///
/// Each kind keeps registration order. Callbacks are cloned out before
/// they are invoked, so no lock is held while user code runs and
/// listeners may dispatch or subscribe re-entrantly.
#[derive(Default)]
struct Registry {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    state_listeners: RwLock<Vec<(SubscriptionId, StateListener)>>,
    watchers: RwLock<Vec<Arc<Watcher>>>,
    /// Senders of live event streams, told why they were detached.
    streams: Mutex<HashMap<SubscriptionId, Sender<StoreEvent>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut listeners = self.listeners.write();
            listeners
                .iter()
                .position(|(sid, _)| *sid == id)
                .map(|pos| listeners.remove(pos))
                .is_some()
        };
        if removed {
            self.close_stream(id, DropReason::Unsubscribed);
            return true;
        }
        {
            let mut listeners = self.state_listeners.write();
            if let Some(pos) = listeners.iter().position(|(sid, _)| *sid == id) {
                listeners.remove(pos);
                return true;
            }
        }
        let mut watchers = self.watchers.write();
        if let Some(pos) = watchers.iter().position(|w| w.id == id) {
            watchers.remove(pos);
            return true;
        }
        false
    }

    /// Send a best-effort `Dropped` notice to a stream and forget its sender.
    fn close_stream(&self, id: SubscriptionId, reason: DropReason) {
        if let Some(sender) = self.streams.lock().remove(&id) {
            tracing::debug!(subscription = id.0, reason = ?reason, "event stream detached");
            let _ = sender.try_send(StoreEvent::Dropped { reason });
        }
    }
}

/// Capability to cancel a subscription later.
///
/// Dropping the handle leaves the subscription in place.
#[derive(Clone, Debug)]
pub struct Subscription {
    id: SubscriptionId,
    kind: SubscriptionKind,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    /// Remove the subscription. Returns false if it was already gone.
    pub fn cancel(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }

    /// Whether the subscription is still registered.
    pub fn is_active(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let id = self.id;
        match self.kind {
            SubscriptionKind::Action => registry.listeners.read().iter().any(|(s, _)| *s == id),
            SubscriptionKind::WatchAll => registry
                .state_listeners
                .read()
                .iter()
                .any(|(s, _)| *s == id),
            SubscriptionKind::Watch => registry.watchers.read().iter().any(|w| w.id == id),
        }
    }
}

/// Channel-backed stream of dispatched actions.
pub struct EventStream {
    subscription: Subscription,
    receiver: Receiver<StoreEvent>,
}

impl EventStream {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<StoreEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Manages the listeners of one store and broadcasts to them.
pub struct SubscriptionManager {
    registry: Arc<Registry>,
    policy: EqualityPolicy,
}

impl SubscriptionManager {
    /// Create a manager using structural equality for watchers.
    pub fn new() -> Self {
        Self::with_policy(EqualityPolicy::default())
    }

    /// Create a manager with a custom watcher equality policy.
    pub fn with_policy(policy: EqualityPolicy) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            policy,
        }
    }

    pub fn policy(&self) -> EqualityPolicy {
        self.policy
    }

    fn handle(&self, id: SubscriptionId, kind: SubscriptionKind) -> Subscription {
        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.registry),
        }
    }

    // --- Registration ---

    /// Register a global listener.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.registry.allocate_id();
        self.registry.listeners.write().push((id, listener));
        self.handle(id, SubscriptionKind::Action)
    }

    /// Register a listener for every state transition.
    pub fn watch_all(&self, listener: StateListener) -> Subscription {
        let id = self.registry.allocate_id();
        self.registry.state_listeners.write().push((id, listener));
        self.handle(id, SubscriptionKind::WatchAll)
    }

    /// Watch a top-level key. `current` is the state at registration.
    pub fn watch_key(&self, key: &str, current: &Value, callback: WatchCallback) -> Subscription {
        self.add_watcher(WatchTarget::Key(key.to_string()), current, callback)
    }

    /// Watch a dotted path. `current` is the state at registration.
    pub fn watch_path(&self, path: &str, current: &Value, callback: WatchCallback) -> Subscription {
        self.add_watcher(WatchTarget::Path(path.to_string()), current, callback)
    }

    fn add_watcher(
        &self,
        target: WatchTarget,
        current: &Value,
        callback: WatchCallback,
    ) -> Subscription {
        let id = self.registry.allocate_id();
        let watcher = Watcher {
            id,
            last_seen: Mutex::new(target.resolve(current)),
            target,
            callback,
        };
        self.registry.watchers.write().push(Arc::new(watcher));
        self.handle(id, SubscriptionKind::Watch)
    }

    /// Invoke `listener` for the next action named `name`, then detach.
    pub fn once(&self, name: &str, listener: Listener) -> Subscription {
        let id = self.registry.allocate_id();
        let name = name.to_string();
        let fired = AtomicBool::new(false);
        let registry = Arc::downgrade(&self.registry);

        let wrapper: Listener = Arc::new(move |action: &Action| {
            if !action.is_named(&name) || fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
            listener(action);
        });

        self.registry.listeners.write().push((id, wrapper));
        self.handle(id, SubscriptionKind::Action)
    }

    /// Invoke `listener` for every action named `name`.
    pub fn when(&self, name: &str, listener: Listener) -> Subscription {
        let name = name.to_string();
        self.subscribe(Arc::new(move |action: &Action| {
            if action.is_named(&name) {
                listener(action);
            }
        }))
    }

    /// Stream actions through a bounded channel.
    ///
    /// A consumer that lets the buffer fill is detached. Its receiver still
    /// drains what was buffered. Cancelling the stream's subscription
    /// delivers a final `Dropped { Unsubscribed }` when there is room.
    pub fn stream(&self, buffer_size: usize) -> EventStream {
        let id = self.registry.allocate_id();
        let (sender, receiver) = bounded(buffer_size.max(1));
        let sender_handle = sender.clone();
        let registry = Arc::downgrade(&self.registry);
        let detached = AtomicBool::new(false);

        let forward: Listener = Arc::new(move |action: &Action| {
            if detached.load(Ordering::SeqCst) {
                return;
            }
            if !try_send(&sender, StoreEvent::Action { action: action.clone() }) {
                detached.store(true, Ordering::SeqCst);
                if let Some(registry) = registry.upgrade() {
                    registry.close_stream(id, DropReason::BufferOverflow);
                    registry.remove(id);
                }
            }
        });

        self.registry.streams.lock().insert(id, sender_handle);
        self.registry.listeners.write().push((id, forward));
        EventStream {
            subscription: self.handle(id, SubscriptionKind::Action),
            receiver,
        }
    }

    /// Cancel a subscription by ID.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    /// Number of active subscriptions across all kinds.
    pub fn subscription_count(&self) -> usize {
        self.registry.listeners.read().len()
            + self.registry.state_listeners.read().len()
            + self.registry.watchers.read().len()
    }

    // --- Broadcasting ---

    /// Deliver an action to every global listener, in registration order.
    pub fn broadcast_action(&self, action: &Action) {
        let listeners: Vec<Listener> = self
            .registry
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(action);
        }
    }

    /// Deliver a state transition to every watch-all listener.
    pub fn broadcast_state(&self, next: &Value, previous: &Value) {
        let listeners: Vec<StateListener> = self
            .registry
            .state_listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(next, previous);
        }
    }

    /// Re-evaluate key and path watchers against `state`.
    ///
    /// Each watcher fires only when its own last-seen value differs.
    pub fn notify_watchers(&self, state: &Value) {
        let watchers: Vec<Arc<Watcher>> = self.registry.watchers.read().clone();

        for watcher in watchers {
            if let Some((next, previous)) = watcher.observe(state, self.policy) {
                (watcher.callback)(&next, &previous);
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn try_send(sender: &Sender<StoreEvent>, event: StoreEvent) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(crossbeam_channel::TrySendError::Full(_)) => false,
        Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
    }
}
