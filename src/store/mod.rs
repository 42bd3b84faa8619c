//! Durable key-value storage for alarm state.
//!
//! Two kinds of records live here:
//!
//! - `snooze_count_<base>`: consecutive snooze counter per base alarm
//! - `pending_<id>`: timer registrations, used to restore timers after a
//!   daemon restart and to cancel everything on request
//!
//! [`FileStore`] persists every write before returning; [`MemoryStore`] is
//! the test double.

mod error;
mod file;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

pub use error::StoreError;
pub use file::FileStore;

/// Key-value storage with synchronous durability.
///
/// Implementations use interior mutability so a single store can be shared
/// between the snooze policy and the scheduling gateway.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes a value; returns once the write is durable.
    fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Removes a value; returns true if it existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Lists keys starting with `prefix`, in sorted order.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).keys_with_prefix(prefix)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store for tests.
///
/// `set_fail_writes(true)` makes every `put`/`remove` fail, to exercise the
/// storage-unavailable paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "writes disabled"),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
