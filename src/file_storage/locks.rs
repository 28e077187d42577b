//! # Per-Id Lock Table
//!
//! Serializes mutations of the same id while leaving distinct ids
//! independent. Readers that must not observe a content version disappearing
//! under them take the shared side.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use super::errors::{StorageError, StorageResult};

/// Lock table keyed by record id
#[derive(Debug, Default)]
pub struct IdLocks {
    table: Mutex<HashMap<Uuid, Arc<RwLock<()>>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lease on the lock of `id`, creating it on first use
    pub fn lease(&self, id: Uuid) -> StorageResult<IdLease<'_>> {
        let mut table = self.table.lock().map_err(|_| StorageError::poisoned())?;
        let lock = table.entry(id).or_default().clone();
        Ok(IdLease {
            locks: self,
            id,
            lock,
        })
    }

    /// Number of ids with an outstanding lease
    pub fn active(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn release(&self, id: &Uuid) {
        if let Ok(mut table) = self.table.lock() {
            // Table plus the lease being dropped
            if table.get(id).map(|l| Arc::strong_count(l) <= 2).unwrap_or(false) {
                table.remove(id);
            }
        }
    }
}

/// Handle on one id's lock; the table entry is pruned when the last lease drops
#[derive(Debug)]
pub struct IdLease<'a> {
    locks: &'a IdLocks,
    id: Uuid,
    lock: Arc<RwLock<()>>,
}

impl IdLease<'_> {
    /// Exclusive access for mutations
    pub fn write(&self) -> StorageResult<RwLockWriteGuard<'_, ()>> {
        self.lock.write().map_err(|_| StorageError::poisoned())
    }

    /// Shared access for readers
    pub fn read(&self) -> StorageResult<RwLockReadGuard<'_, ()>> {
        self.lock.read().map_err(|_| StorageError::poisoned())
    }
}

impl Drop for IdLease<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.id);
    }
}
