//! Change detection between two state values.
//!
//! Decides whether a watcher should fire and whether a dispatch produced a
//! change worth recording in history.
//!
//! Known limitation: only JSON-representable values are compared. Numbers
//! are compared as `serde_json` numbers, so `1` and `1.0` are different.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How composite values (arrays and objects) are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityPolicy {
    /// Composites are equal when their contents are equal. Object key order
    /// is ignored.
    #[default]
    Structural,

    /// Composites are never equal to each other, mirroring identity
    /// comparison on values that are always freshly copied. Scalars still
    /// compare by value.
    Identity,
}

impl EqualityPolicy {
    /// Whether `a` and `b` count as the same value.
    pub fn equal(self, a: &Value, b: &Value) -> bool {
        match self {
            EqualityPolicy::Structural => a == b,
            EqualityPolicy::Identity => {
                if is_composite(a) || is_composite(b) {
                    false
                } else {
                    a == b
                }
            }
        }
    }

    /// Same as [`EqualityPolicy::equal`] with a missing value treated as
    /// `null`.
    pub fn equal_opt(self, a: Option<&Value>, b: Option<&Value>) -> bool {
        self.equal(a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null))
    }
}

/// Structural equality, the default policy.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    EqualityPolicy::Structural.equal(a, b)
}

fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}
