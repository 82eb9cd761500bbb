//! Core types for the state store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Prefix of the generic assignment action (`set-<key>`).
pub const SET_PREFIX: &str = "set-";

/// Name of the synthetic action broadcast after undo, redo and jumps.
pub const HISTORY_JUMP: &str = "history-jump";

/// Monotonic version of the state document.
///
/// Bumped on every applied write, including history navigation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Version(pub u64);

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Version {
    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

/// A named action against a store.
///
/// The string convention `<verb>-<key>` maps onto these variants through
/// [`Action::parse`]; only `set` is handled generically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Assign `payload` at `key`. A dotted key addresses a nested path.
    Set { key: String, payload: Value },

    /// Synthetic action emitted when a history snapshot is applied.
    HistoryJump { index: usize },

    /// Anything else: routed to a registered handler, or broadcast as-is.
    Custom { name: String, payload: Value },
}

impl Action {
    /// `set-<key>` action.
    pub fn set(key: impl Into<String>, payload: impl Into<Value>) -> Self {
        Action::Set {
            key: key.into(),
            payload: payload.into(),
        }
    }

    /// Store-specific or unknown action.
    pub fn custom(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        Action::Custom {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Map an action name onto a variant.
    ///
    /// `set-` with an empty key is not an assignment and stays `Custom`.
    /// `history-jump` is never parsed: only the history stack emits it.
    pub fn parse(name: &str, payload: Value) -> Self {
        match name.strip_prefix(SET_PREFIX) {
            Some(key) if !key.is_empty() => Action::Set {
                key: key.to_string(),
                payload,
            },
            _ => Action::Custom {
                name: name.to_string(),
                payload,
            },
        }
    }

    /// The action name as listeners see it.
    pub fn name(&self) -> String {
        match self {
            Action::Set { key, .. } => format!("{SET_PREFIX}{key}"),
            Action::HistoryJump { .. } => HISTORY_JUMP.to_string(),
            Action::Custom { name, .. } => name.clone(),
        }
    }

    /// The action payload as listeners see it.
    pub fn payload(&self) -> Value {
        match self {
            Action::Set { payload, .. } | Action::Custom { payload, .. } => payload.clone(),
            Action::HistoryJump { index } => json!({ "index": index }),
        }
    }

    /// Whether this action's name equals `name`.
    pub fn is_named(&self, name: &str) -> bool {
        match self {
            Action::Set { key, .. } => name
                .strip_prefix(SET_PREFIX)
                .is_some_and(|rest| rest == key),
            Action::HistoryJump { .. } => name == HISTORY_JUMP,
            Action::Custom { name: own, .. } => own == name,
        }
    }
}

/// Per-dispatch options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Apply the mutation without recording a history snapshot.
    ///
    /// Used for input echoes so that every keystroke does not become an
    /// undo step.
    pub skip_history: bool,
}

impl DispatchOptions {
    pub fn skip_history() -> Self {
        Self { skip_history: true }
    }
}

/// What a dispatch did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dispatched {
    /// The state document differs from before the dispatch.
    pub changed: bool,
    /// A history snapshot was pushed.
    pub recorded: bool,
    /// Issued from inside a running handler; queued to run once that
    /// handler's change has been committed and broadcast.
    pub deferred: bool,
}

/// Immutable deep copy of the state document at one version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    version: Version,
    state: Value,
}

impl Snapshot {
    pub(crate) fn new(version: Version, state: Value) -> Self {
        Self { version, state }
    }

    /// Version of the document this snapshot was taken at.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Borrow the captured document.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Owned copy of the captured document.
    pub fn to_state(&self) -> Value {
        self.state.clone()
    }
}

/// Debug view over the history stack.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    /// Every snapshot, oldest first.
    pub entries: Vec<Value>,
    /// Index of the snapshot the live state currently matches.
    pub index: usize,
}

impl HistoryView {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The snapshot at the current index.
    pub fn current(&self) -> Option<&Value> {
        self.entries.get(self.index)
    }
}
