//! Notification fan-out for a store.
//!
//! Four kinds of subscribers are supported:
//! - Global listeners, called with every dispatched action
//! - Watch-all listeners, called with the next and previous state
//! - Key and path watchers, called only when their value changes
//! - Event streams, a bounded channel of actions
//!
//! Fan-out is synchronous and preserves registration order within a kind.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//!
//! let sub = manager.when("set-theme", Arc::new(|action: &Action| {
//!     println!("theme is now {}", action.payload());
//! }));
//!
//! manager.broadcast_action(&Action::set("theme", "dark"));
//! sub.cancel();
//! ```

mod manager;
mod types;

pub use manager::{EventStream, Subscription, SubscriptionManager};
pub use types::{
    DropReason, Listener, StateListener, StoreEvent, SubscriptionId, SubscriptionKind,
    WatchCallback,
};
