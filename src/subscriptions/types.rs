//! Subscription types for store notifications.

use crate::types::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Global listener: every dispatched action, including unknown ones and
/// history jumps.
pub type Listener = Arc<dyn Fn(&Action) + Send + Sync>;

/// Watch-all listener: `(next_state, previous_state)` after every dispatch.
pub type StateListener = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Key or path watcher: `(new_value, old_value)`, missing values as `null`.
pub type WatchCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Kind of subscription, for introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Global action listener (also `once`, `when` and event streams).
    Action,
    /// Full-state listener.
    WatchAll,
    /// Key or path watcher.
    Watch,
}

/// Events delivered through an [`EventStream`](super::EventStream).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// An action was dispatched.
    Action { action: Action },

    /// The stream was detached from the store.
    Dropped { reason: DropReason },
}

/// Why an event stream was detached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly cancelled.
    Unsubscribed,
}
