//! Storage backends for persisted keys.

use crate::error::{Result, StoreError};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A string key/value backend.
pub trait StorageDriver: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// In-memory backend with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push keys plus values past `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            quota: Some(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn used_bytes(items: &BTreeMap<String, String>) -> usize {
        items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl StorageDriver for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write();
        if let Some(quota) = self.quota {
            let replaced = items.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
            let needed = Self::used_bytes(&items) - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StoreError::Storage(format!(
                    "quota exceeded: {} > {} bytes",
                    needed, quota
                )));
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write().remove(key);
        Ok(())
    }
}

/// Backend keeping all items in one JSON object file.
///
/// Every write rewrites the file through a temporary sibling and a rename,
/// holding an exclusive lock on `<file>.lock` so that several processes
/// sharing the file do not interleave.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open or create the storage file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = with_suffix(&path, "lock");

        Ok(Self {
            path,
            lock_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_items(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut contents = String::new();
        File::open(&self.path)?.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            StoreError::Storage(format!("corrupt storage file {}: {}", self.path.display(), e))
        })
    }

    fn write_items(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let tmp_path = with_suffix(&self.path, "tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(&serde_json::to_vec_pretty(items)?)?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the in-process and file locks.
    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock();

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        lock_file.lock_exclusive()?;

        let result = self.read_items().and_then(|mut items| {
            f(&mut items);
            self.write_items(&items)
        });

        let _ = lock_file.unlock();
        result
    }
}

impl StorageDriver for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
