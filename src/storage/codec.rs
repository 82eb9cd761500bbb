//! Value codecs for persisted keys.

use crate::error::{Result, StoreError};
use serde_json::Value;
use std::sync::Arc;

/// Turns state values into stored strings and back.
///
/// This is where encryption or compression of persisted values plugs in.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String>;
    fn decode(&self, raw: &str) -> Result<Value>;
}

/// Plain JSON text.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}

type EncodeFn = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;
type DecodeFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Codec built from a pair of closures.
#[derive(Clone)]
pub struct FnCodec {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl FnCodec {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&Value) -> Result<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl ValueCodec for FnCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        (self.encode)(value)
    }

    fn decode(&self, raw: &str) -> Result<Value> {
        (self.decode)(raw)
    }
}
