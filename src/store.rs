//! Durable key-value persistence for chapters and generated questions.
//!
//! `KvStore` is the raw string store (a JSON file on disk, or memory in tests).
//! `PersistenceGateway` sits on top and speaks JSON values over the five fixed
//! keys. Failures are logged and reported as `false`/`None`, never raised.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::error::StoreError;

/// The five fixed storage slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
  Bab1,
  Bab2,
  Bab3,
  Questions,
  Timestamp,
}

impl StorageKey {
  pub const ALL: [StorageKey; 5] = [
    StorageKey::Bab1,
    StorageKey::Bab2,
    StorageKey::Bab3,
    StorageKey::Questions,
    StorageKey::Timestamp,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      StorageKey::Bab1 => "speech_assistant_bab1",
      StorageKey::Bab2 => "speech_assistant_bab2",
      StorageKey::Bab3 => "speech_assistant_bab3",
      StorageKey::Questions => "speech_assistant_questions",
      StorageKey::Timestamp => "speech_assistant_timestamp",
    }
  }
}

/// Raw string store. Implementations synchronise internally.
pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
  fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(map.get(key).cloned())
  }

  fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    map.insert(key.to_string(), value);
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    map.remove(key);
    Ok(())
  }
}

/// Whole map kept in memory, rewritten to `path` on every change
/// (write to a sibling temp file, then rename).
pub struct FileStore {
  path: PathBuf,
  map: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Open (or lazily create) the store at `path`. A missing file is an empty store;
  /// an unreadable or corrupt one is an error.
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let map = match fs::read_to_string(&path) {
      Ok(s) if s.trim().is_empty() => BTreeMap::new(),
      Ok(s) => serde_json::from_str(&s)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    info!(target: "store", entries = map.len(), "File store opened");
    Ok(Self { path, map: Mutex::new(map) })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn flush(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      fs::create_dir_all(dir)?;
    }
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(map)?)?;
    fs::rename(&tmp, &self.path)?;
    Ok(())
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(map.get(key).cloned())
  }

  fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    let previous = map.insert(key.to_string(), value);
    if let Err(e) = self.flush(&map) {
      // keep memory and disk in agreement
      match previous {
        Some(v) => map.insert(key.to_string(), v),
        None => map.remove(key),
      };
      return Err(e);
    }
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    let Some(previous) = map.remove(key) else {
      return Ok(());
    };
    if let Err(e) = self.flush(&map) {
      map.insert(key.to_string(), previous);
      return Err(e);
    }
    Ok(())
  }
}

/// JSON values over the fixed keys. Cheap to clone.
#[derive(Clone)]
pub struct PersistenceGateway {
  store: Arc<dyn KvStore>,
}

impl PersistenceGateway {
  pub fn new(store: Arc<dyn KvStore>) -> Self {
    Self { store }
  }

  #[instrument(level = "debug", skip(self, value), fields(key = key.as_str()))]
  pub fn save<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> bool {
    let encoded = match serde_json::to_string(value) {
      Ok(s) => s,
      Err(e) => {
        error!(target: "store", key = key.as_str(), error = %e, "Failed to encode value");
        return false;
      }
    };
    match self.store.set(key.as_str(), encoded) {
      Ok(()) => {
        debug!(target: "store", key = key.as_str(), "Saved");
        true
      }
      Err(e) => {
        error!(target: "store", key = key.as_str(), error = %e, "Failed to save value");
        false
      }
    }
  }

  #[instrument(level = "debug", skip(self), fields(key = key.as_str()))]
  pub fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Option<T> {
    let raw = match self.store.get(key.as_str()) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        error!(target: "store", key = key.as_str(), error = %e, "Failed to read value");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "store", key = key.as_str(), error = %e, "Stored value is not valid JSON for this slot");
        None
      }
    }
  }

  #[instrument(level = "debug", skip(self), fields(key = key.as_str()))]
  pub fn remove(&self, key: StorageKey) -> bool {
    match self.store.remove(key.as_str()) {
      Ok(()) => true,
      Err(e) => {
        error!(target: "store", key = key.as_str(), error = %e, "Failed to remove value");
        false
      }
    }
  }
}
