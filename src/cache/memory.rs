use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::CacheEntry;

/// Process-lifetime tier. Synchronous and cheap; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means another caller panicked mid-insert; the
    // map itself is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.lock().insert(entry.key.clone(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every key starting with `prefix`, returning the removed keys
    pub fn remove_prefix(&self, prefix: &str) -> Vec<String> {
        let mut map = self.lock();
        let doomed: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            map.remove(key);
        }
        doomed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }
}
