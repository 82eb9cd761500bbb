//! # Keepsake
//!
//! An observable state container: one JSON document of application state,
//! mutated only through named actions, observed by listeners, with linear
//! undo/redo history and computed values.
//!
//! ## Core Concepts
//!
//! - **Actions**: `set-<key>` assigns a value at a key or dotted path; other
//!   names go to store-specific handlers or are broadcast untouched
//! - **Watchers**: key and path subscriptions that fire only on change
//! - **History**: full snapshots with undo, redo and jump
//! - **Computed values**: pure functions of the state, evaluated on read
//! - **Links**: keep one key in sync across stores, one-way or two-way
//!
//! ## Example
//!
//! ```
//! use keepsake::Store;
//! use serde_json::json;
//!
//! let store = Store::with_state(json!({"theme": "light"})).unwrap();
//!
//! store.watch_key("theme", |new, old| {
//!     println!("theme changed from {} to {}", old, new);
//! });
//!
//! store.dispatch("set-theme", json!("dark")).unwrap();
//! assert_eq!(store.get_state()["theme"], "dark");
//!
//! assert!(store.undo());
//! assert_eq!(store.get_state()["theme"], "light");
//! ```

pub mod computed;
pub mod error;
pub mod history;
pub mod link;
pub mod registry;
pub mod state;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use computed::{ComputeFn, ComputedRegistry};
pub use error::{Result, StoreError};
pub use history::HistoryStack;
pub use link::{link, link_two_way, Link, Transform};
pub use registry::StoreRegistry;
pub use state::{get_path, set_path, values_equal, EqualityPolicy, StateContainer};
pub use storage::{
    FileStorage, FnCodec, JsonCodec, MemoryStorage, PersistenceSync, StorageDriver, ValueCodec,
};
pub use store::{Handler, InspectHook, RefreshHook, Store, StoreConfig, WeakStore};
pub use subscriptions::{
    DropReason, EventStream, StoreEvent, Subscription, SubscriptionId, SubscriptionKind,
    SubscriptionManager,
};
pub use types::*;
