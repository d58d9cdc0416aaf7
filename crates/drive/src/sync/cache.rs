//! Permission cache shared across documents
//!
//! Entries are never evicted. Once an ID is cached its entry is treated as
//! authoritative until a full fetch for some document returns it again.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::models::{Permission, PermissionId};

/// Thread-safe map from permission ID to permission
///
/// Pass the same instance (behind an `Arc`) to several runs to reuse lookups
/// across them.
#[derive(Debug, Default)]
pub struct PermissionCache {
    entries: RwLock<HashMap<PermissionId, Permission>>,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PermissionId) -> Option<Permission> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(id).cloned()
    }

    pub fn contains(&self, id: &PermissionId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(id)
    }

    /// Look up every ID under a single read lock.
    ///
    /// Returns `None` unless all of them are cached; a partial hit is
    /// useless to the resolver.
    pub fn get_all(&self, ids: &[PermissionId]) -> Option<Vec<Permission>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        ids.iter().map(|id| entries.get(id).cloned()).collect()
    }

    /// Insert or overwrite a batch of entries under a single write lock
    ///
    /// Returns the number of entries written.
    pub fn insert_batch<I>(&self, permissions: I) -> usize
    where
        I: IntoIterator<Item = Permission>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut written = 0;
        for permission in permissions {
            entries.insert(permission.id.clone(), permission);
            written += 1;
        }
        written
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
