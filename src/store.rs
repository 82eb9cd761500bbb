//! Main Store struct tying all components together.

use crate::computed::{ComputeFn, ComputedRegistry};
use crate::error::{Result, StoreError};
use crate::history::HistoryStack;
use crate::state::{get_path, is_nested, paths_overlap, EqualityPolicy, StateContainer};
use crate::storage::{JsonCodec, PersistenceSync, StorageDriver, ValueCodec};
use crate::subscriptions::{EventStream, Subscription, SubscriptionId, SubscriptionManager};
use crate::types::{Action, DispatchOptions, Dispatched, HistoryView, Snapshot, Version};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Store-specific action handler.
///
/// Receives a draft of the state document and the payload. Changes to the
/// draft are committed only if the handler returns `Ok`.
pub type Handler = Arc<dyn Fn(&mut Value, &Value) -> Result<()> + Send + Sync>;

/// Refresh hook for a bound key, called with the key's current value.
pub type RefreshHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// "State changed" hook, called after every dispatch and history move.
pub type InspectHook = Arc<dyn Fn(&HistoryView) + Send + Sync>;

/// Store configuration.
#[derive(Clone)]
pub struct StoreConfig {
    /// Store name, used by registries, log fields and storage key prefixes.
    pub name: String,

    /// Seed document. Must be an object or null.
    pub initial_state: Value,

    /// Keys or dotted paths to persist.
    pub sync_storage: Vec<String>,

    /// Backend for persisted keys. Required when `sync_storage` is set.
    pub storage: Option<Arc<dyn StorageDriver>>,

    /// Codec for persisted values.
    pub codec: Arc<dyn ValueCodec>,

    /// Duplicate suppression policy for key and path watchers.
    pub equality: EqualityPolicy,

    /// Log a state and history dump after every change.
    pub dev_panel: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            initial_state: Value::Object(Default::default()),
            sync_storage: Vec::new(),
            storage: None,
            codec: Arc::new(JsonCodec),
            equality: EqualityPolicy::default(),
            dev_panel: false,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("sync_storage", &self.sync_storage)
            .field("storage", &self.storage.is_some())
            .field("equality", &self.equality)
            .field("dev_panel", &self.dev_panel)
            .finish()
    }
}

struct StoreInner {
    name: String,

    /// Canonical document.
    state: RwLock<StateContainer>,

    /// Undo/redo snapshots.
    history: Mutex<HistoryStack>,

    /// Listener fan-out.
    subscriptions: SubscriptionManager,

    /// Store-specific action handlers by name.
    handlers: RwLock<HashMap<String, Handler>>,

    computed: ComputedRegistry,

    refresh_hooks: RwLock<Vec<(String, RefreshHook)>>,

    inspectors: RwLock<Vec<InspectHook>>,

    persistence: Option<PersistenceSync>,

    /// Serializes mutation and history recording. Re-entrant so a handler
    /// that dispatches on the same thread does not deadlock.
    write_lock: ReentrantMutex<()>,

    /// Set while a handler runs under `write_lock`.
    in_handler: AtomicBool,

    /// Dispatches issued by the running handler, replayed after it commits.
    deferred: Mutex<Vec<(Action, DispatchOptions)>>,
}

/// Marks a handler as running for as long as it is alive.
struct HandlerScope<'a> {
    flag: &'a AtomicBool,
}

impl<'a> HandlerScope<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for HandlerScope<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// An observable state container.
///
/// Cloning a `Store` yields another handle to the same container.
///
/// Mutation goes through [`Store::dispatch`]. Each dispatch runs to
/// completion synchronously: when it returns, every listener has observed
/// the new state and history already reflects it.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning handle to a [`Store`].
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    /// Create a store from a configuration.
    ///
    /// Persisted keys are read from storage and overlaid onto the initial
    /// state before the first history snapshot is taken.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let StoreConfig {
            name,
            initial_state,
            sync_storage,
            storage,
            codec,
            equality,
            dev_panel,
        } = config;

        let persistence = match (storage, sync_storage.is_empty()) {
            (_, true) => None,
            (Some(driver), false) => Some(PersistenceSync::new(&name, sync_storage, driver, codec)),
            (None, false) => {
                return Err(StoreError::InvalidConfig(
                    "sync_storage requires a storage driver".into(),
                ))
            }
        };

        let mut container = StateContainer::new(initial_state)?;
        if let Some(sync) = &persistence {
            let mut seeded = container.read();
            sync.seed(&mut seeded);
            container = StateContainer::new(seeded)?;
        }

        let history = HistoryStack::new(container.snapshot());

        let store = Self {
            inner: Arc::new(StoreInner {
                name,
                state: RwLock::new(container),
                history: Mutex::new(history),
                subscriptions: SubscriptionManager::with_policy(equality),
                handlers: RwLock::new(HashMap::new()),
                computed: ComputedRegistry::new(),
                refresh_hooks: RwLock::new(Vec::new()),
                inspectors: RwLock::new(Vec::new()),
                persistence,
                write_lock: ReentrantMutex::new(()),
                in_handler: AtomicBool::new(false),
                deferred: Mutex::new(Vec::new()),
            }),
        };

        if dev_panel {
            store.attach_dev_panel();
        }

        tracing::debug!(store = %store.inner.name, "store created");
        Ok(store)
    }

    /// Create an unnamed store seeded with `initial_state`.
    pub fn with_state(initial_state: Value) -> Result<Self> {
        Self::new(StoreConfig {
            initial_state,
            ..Default::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles point at the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Reads ---

    /// Deep copy of the whole state document.
    pub fn get_state(&self) -> Value {
        self.inner.state.read().read()
    }

    /// Read `key`: a computed value if one is defined, else the raw value at
    /// that key or dotted path.
    pub fn get(&self, key: &str) -> Option<Value> {
        if self.inner.computed.contains(key) {
            let state = self.get_state();
            if let Some(value) = self.inner.computed.evaluate(key, &state) {
                return Some(value);
            }
        }
        self.get_path(key)
    }

    /// Raw value at a dotted path. `None` if anything along it is missing.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        self.inner.state.read().read_path(path)
    }

    /// Version of the live document.
    pub fn version(&self) -> Version {
        self.inner.state.read().version()
    }

    // --- Dispatch ---

    /// Dispatch an action by name, e.g. `set-theme`.
    pub fn dispatch(&self, name: &str, payload: Value) -> Result<Dispatched> {
        self.dispatch_with(name, payload, DispatchOptions::default())
    }

    /// Dispatch an action by name with options.
    pub fn dispatch_with(
        &self,
        name: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> Result<Dispatched> {
        self.dispatch_action(Action::parse(name, payload), options)
    }

    /// Dispatch a typed action.
    ///
    /// `Set` assigns at its key or path. `Custom` runs the registered
    /// handler, if any; an unrecognized action changes nothing but is still
    /// broadcast. `HistoryJump` behaves like [`Store::jump_to`].
    ///
    /// Only a failing handler returns an error, and then nothing is
    /// applied, recorded or broadcast.
    ///
    /// A dispatch issued from inside a handler is queued and runs after
    /// that handler's change has been committed and broadcast. A handler
    /// that fails discards its queue.
    pub fn dispatch_action(&self, action: Action, options: DispatchOptions) -> Result<Dispatched> {
        let inner = &self.inner;
        {
            let _lock = inner.write_lock.lock();
            if inner.in_handler.load(Ordering::SeqCst) {
                tracing::trace!(store = %inner.name, action = %action.name(), "deferred until handler commits");
                inner.deferred.lock().push((action, options));
                return Ok(Dispatched {
                    deferred: true,
                    ..Dispatched::default()
                });
            }
        }

        if let Action::HistoryJump { index } = action {
            let changed = self.navigate(|history| history.jump_to(index).cloned());
            return Ok(Dispatched {
                changed: changed.unwrap_or(false),
                ..Dispatched::default()
            });
        }

        let (previous, next, version, written, dispatched, deferred) = {
            let _lock = inner.write_lock.lock();
            let mut deferred = Vec::new();

            let previous = self.get_state();
            let written = match &action {
                Action::Set { key, payload } => {
                    let mut state = inner.state.write();
                    if is_nested(key) {
                        state.write_path(key, payload.clone());
                    } else {
                        state.write_key(key, payload.clone());
                    }
                    Some(key.clone())
                }
                Action::Custom { name, payload } => {
                    let handler = inner.handlers.read().get(name).cloned();
                    match handler {
                        Some(handler) => {
                            let mut draft = previous.clone();
                            let result = {
                                let _scope = HandlerScope::enter(&inner.in_handler);
                                handler(&mut draft, payload)
                            };
                            deferred = std::mem::take(&mut *inner.deferred.lock());
                            result.map_err(|e| match e {
                                StoreError::Handler { .. } => e,
                                other => StoreError::handler(name.as_str(), other.to_string()),
                            })?;
                            inner.state.write().replace(draft);
                        }
                        None => {
                            tracing::trace!(store = %inner.name, action = %name, "no handler, broadcasting only");
                        }
                    }
                    None
                }
                Action::HistoryJump { .. } => None,
            };

            let (next, version) = {
                let state = inner.state.read();
                (state.read(), state.version())
            };
            let changed = previous != next;
            let recorded = changed && !options.skip_history;
            if recorded {
                inner.history.lock().push(Snapshot::new(version, next.clone()));
            }

            let dispatched = Dispatched {
                changed,
                recorded,
                deferred: false,
            };
            (previous, next, version, written, dispatched, deferred)
        };

        tracing::trace!(
            store = %inner.name,
            action = %action.name(),
            changed = dispatched.changed,
            recorded = dispatched.recorded,
            "dispatched"
        );

        if let Some(key) = &written {
            self.run_refresh_hooks(&next, |hook_key| paths_overlap(key, hook_key));
        }
        if let Some(sync) = &inner.persistence {
            if dispatched.changed || written.is_some() {
                sync.sync(written.as_deref(), &previous, &next);
            }
        }

        inner.subscriptions.broadcast_action(&action);
        inner.subscriptions.broadcast_state(&next, &previous);
        self.notify_watchers(&next, version);
        self.run_inspectors();

        for (action, options) in deferred {
            let name = action.name();
            if let Err(e) = self.dispatch_action(action, options) {
                tracing::warn!(store = %inner.name, action = %name, error = %e, "deferred dispatch failed");
            }
        }

        Ok(dispatched)
    }

    /// Register a handler for a store-specific action name.
    ///
    /// Names that parse as `set-<key>` are reserved for assignment.
    pub fn register_handler<F>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        if matches!(Action::parse(name, Value::Null), Action::Set { .. }) {
            return Err(StoreError::InvalidConfig(format!(
                "{name} is handled as an assignment"
            )));
        }

        let mut handlers = self.inner.handlers.write();
        if handlers.contains_key(name) {
            return Err(StoreError::HandlerExists(name.to_string()));
        }
        handlers.insert(name.to_string(), Arc::new(handler));
        Ok(())
    }

    // --- History ---

    /// Step back one snapshot. Returns false at the start of history.
    pub fn undo(&self) -> bool {
        self.navigate(|history| history.undo().cloned()).is_some()
    }

    /// Step forward one snapshot. Returns false at the tail.
    pub fn redo(&self) -> bool {
        self.navigate(|history| history.redo().cloned()).is_some()
    }

    /// Apply snapshot `index`. Returns false if it is out of range.
    pub fn jump_to(&self, index: usize) -> bool {
        self.navigate(|history| history.jump_to(index).cloned()).is_some()
    }

    pub fn can_undo(&self) -> bool {
        self.inner.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.inner.history.lock().can_redo()
    }

    /// Copy of the history stack and its current index.
    pub fn history(&self) -> HistoryView {
        self.inner.history.lock().view()
    }

    pub fn history_index(&self) -> usize {
        self.inner.history.lock().index()
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    /// Move the history index with `step` and apply the resulting snapshot.
    ///
    /// Returns `None` if `step` did not move, else whether the live state
    /// changed. Never records a new history entry.
    fn navigate<F>(&self, step: F) -> Option<bool>
    where
        F: FnOnce(&mut HistoryStack) -> Option<Snapshot>,
    {
        let inner = &self.inner;
        let (previous, next, version, index) = {
            let _lock = inner.write_lock.lock();
            if inner.in_handler.load(Ordering::SeqCst) {
                tracing::warn!(store = %inner.name, "history navigation from inside a handler ignored");
                return None;
            }

            let (snapshot, index) = {
                let mut history = inner.history.lock();
                let snapshot = step(&mut history)?;
                (snapshot, history.index())
            };

            let mut state = inner.state.write();
            let previous = state.read();
            state.replace(snapshot.to_state());
            (previous, state.read(), state.version(), index)
        };

        tracing::debug!(store = %inner.name, index, "applied history snapshot");

        self.run_refresh_hooks(&next, |hook_key| {
            get_path(&previous, hook_key) != get_path(&next, hook_key)
        });
        if let Some(sync) = &inner.persistence {
            sync.sync(None, &previous, &next);
        }

        inner
            .subscriptions
            .broadcast_action(&Action::HistoryJump { index });
        inner.subscriptions.broadcast_state(&next, &previous);
        self.notify_watchers(&next, version);
        self.run_inspectors();

        Some(previous != next)
    }

    // --- Subscriptions ---

    /// Call `listener` with every dispatched action.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.inner.subscriptions.subscribe(Arc::new(listener))
    }

    /// Call `listener` with `(new, old)` whenever the top-level value at
    /// `key` changes.
    pub fn watch_key<F>(&self, key: &str, listener: F) -> Subscription
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let current = self.get_state();
        self.inner
            .subscriptions
            .watch_key(key, &current, Arc::new(listener))
    }

    /// Call `listener` with `(new, old)` whenever the value at the dotted
    /// `path` changes.
    pub fn watch_path<F>(&self, path: &str, listener: F) -> Subscription
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let current = self.get_state();
        self.inner
            .subscriptions
            .watch_path(path, &current, Arc::new(listener))
    }

    /// Call `listener` with `(next, previous)` after every dispatch, changed
    /// or not.
    pub fn watch_all<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.inner.subscriptions.watch_all(Arc::new(listener))
    }

    /// Call `listener` for the next action named `name` only.
    pub fn once<F>(&self, name: &str, listener: F) -> Subscription
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.inner.subscriptions.once(name, Arc::new(listener))
    }

    /// Call `listener` for every action named `name`.
    pub fn when<F>(&self, name: &str, listener: F) -> Subscription
    where
        F: Fn(&Action) + Send + Sync + 'static,
    {
        self.inner.subscriptions.when(name, Arc::new(listener))
    }

    /// Receive dispatched actions through a bounded channel.
    pub fn event_stream(&self, buffer_size: usize) -> EventStream {
        self.inner.subscriptions.stream(buffer_size)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.unsubscribe(id)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.subscription_count()
    }

    // --- Computed values ---

    /// Define a computed value. It shadows any state value of the same name
    /// in [`Store::get`].
    pub fn define_computed<F>(&self, key: &str, compute: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let compute: ComputeFn = Arc::new(compute);
        self.inner.computed.define(key, compute);
    }

    pub fn remove_computed(&self, key: &str) -> bool {
        self.inner.computed.remove(key)
    }

    // --- Collaborator hooks ---

    /// Register a refresh hook for a bound key or path.
    ///
    /// Called with the current value after any assignment that overlaps
    /// `key`, and after history moves that change it.
    pub fn on_refresh<F>(&self, key: &str, hook: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .refresh_hooks
            .write()
            .push((key.to_string(), Arc::new(hook)));
    }

    /// Register a hook called with the history view after every dispatch
    /// and every history move.
    pub fn on_change<F>(&self, hook: F)
    where
        F: Fn(&HistoryView) + Send + Sync + 'static,
    {
        self.inner.inspectors.write().push(Arc::new(hook));
    }

    fn attach_dev_panel(&self) {
        let name = self.inner.name.clone();
        self.on_change(move |view: &HistoryView| {
            let state = view.current().map(Value::to_string).unwrap_or_default();
            tracing::debug!(
                store = %name,
                index = view.index,
                len = view.len(),
                state = %state,
                "state changed"
            );
        });
    }

    fn run_refresh_hooks<P>(&self, state: &Value, mut affected: P)
    where
        P: FnMut(&str) -> bool,
    {
        let hooks: Vec<(String, RefreshHook)> = self
            .inner
            .refresh_hooks
            .read()
            .iter()
            .filter(|(key, _)| affected(key))
            .cloned()
            .collect();

        for (key, hook) in hooks {
            let value = get_path(state, &key).cloned().unwrap_or(Value::Null);
            hook(&value);
        }
    }

    /// Run key and path watchers against the live document.
    ///
    /// A listener may have dispatched again while this change was being
    /// broadcast; watchers then compare against the newer document so they
    /// never move backwards.
    fn notify_watchers(&self, next: &Value, version: Version) {
        if self.version() == version {
            self.inner.subscriptions.notify_watchers(next);
        } else {
            self.inner.subscriptions.notify_watchers(&self.get_state());
        }
    }

    fn run_inspectors(&self) {
        let inspectors: Vec<InspectHook> = self.inner.inspectors.read().clone();
        if inspectors.is_empty() {
            return;
        }

        let view = self.history();
        for inspect in inspectors {
            inspect(&view);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("history_index", &self.history_index())
            .field("history_len", &self.history_len())
            .finish()
    }
}
