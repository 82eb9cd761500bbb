//! Persistence of selected state keys to a string storage backend.
//!
//! A store lists the keys or paths it wants persisted. At construction the
//! stored values are decoded and overlaid onto the initial state; after
//! every applied mutation the touched keys are encoded and written back.

mod codec;
mod driver;
mod sync;

pub use codec::{FnCodec, JsonCodec, ValueCodec};
pub use driver::{FileStorage, MemoryStorage, StorageDriver};
pub use sync::PersistenceSync;
