//! The canonical state document.

use crate::error::{Result, StoreError};
use crate::state::path::{get_path, set_path};
use crate::types::{Snapshot, Version};
use serde_json::{Map, Value};

/// Owns the live state document of one store.
///
/// The document is always a JSON object. Reads hand out deep copies so
/// callers can never alias the canonical value; every applied write bumps
/// the version.
#[derive(Debug)]
pub struct StateContainer {
    document: Value,
    version: Version,
}

impl StateContainer {
    /// Create a container seeded with `initial`.
    ///
    /// `null` seeds an empty document. Any other non-object is rejected.
    pub fn new(initial: Value) -> Result<Self> {
        let document = match initial {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => initial,
            other => {
                return Err(StoreError::InvalidConfig(format!(
                    "initial state must be an object, got {}",
                    kind_of(&other)
                )))
            }
        };

        Ok(Self {
            document,
            version: Version::default(),
        })
    }

    /// Deep copy of the whole document.
    pub fn read(&self) -> Value {
        self.document.clone()
    }

    /// Copy of the value at `path`, if present.
    pub fn read_path(&self, path: &str) -> Option<Value> {
        get_path(&self.document, path).cloned()
    }

    /// Current document version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Assign a top-level key, leaving siblings untouched.
    pub fn write_key(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.document {
            map.insert(key.to_string(), value);
        }
        self.bump();
    }

    /// Assign at a dotted path, creating intermediate mappings.
    pub fn write_path(&mut self, path: &str, value: Value) {
        set_path(&mut self.document, path, value);
        self.bump();
    }

    /// Replace the whole document, e.g. with a history snapshot.
    ///
    /// Non-object documents are ignored.
    pub fn replace(&mut self, document: Value) {
        if document.is_object() {
            self.document = document;
            self.bump();
        }
    }

    /// Immutable snapshot of the current document.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.version, self.read())
    }

    fn bump(&mut self) {
        self.version = self.version.next();
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
