use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::CacheEntry;
use crate::io::recovery::atomic_write;

/// Reload-surviving cache tier.
///
/// Implementations never surface errors: an unreadable entry is a miss and a
/// failed write only costs a future cache miss.
pub trait DurableTier: Send + Sync {
    fn load(&self, key: &str) -> Option<CacheEntry>;
    fn store(&self, entry: &CacheEntry);
    fn remove(&self, key: &str) -> bool;
    /// Remove every key starting with `prefix`, returning the removed keys
    fn remove_prefix(&self, prefix: &str) -> Vec<String>;
    fn clear(&self);
}

/// Disabled durable tier (memory-only caching)
#[derive(Debug, Default)]
pub struct NullTier;

impl DurableTier for NullTier {
    fn load(&self, _key: &str) -> Option<CacheEntry> {
        None
    }

    fn store(&self, _entry: &CacheEntry) {}

    fn remove(&self, _key: &str) -> bool {
        false
    }

    fn remove_prefix(&self, _prefix: &str) -> Vec<String> {
        Vec::new()
    }

    fn clear(&self) {}
}

type EntryMap = BTreeMap<String, CacheEntry>;

/// Durable tier stored as one JSON object on disk
#[derive(Debug)]
pub struct FileTier {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl FileTier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTier {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn read_map(&self) -> EntryMap {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(_) => return EntryMap::new(),
        };
        match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "unreadable durable cache, treating as empty");
                EntryMap::new()
            }
        }
    }

    fn write_map(&self, map: &EntryMap) {
        let result = serde_json::to_vec(map)
            .map_err(std::io::Error::other)
            .and_then(|bytes| {
                if let Some(dir) = self.path.parent() {
                    fs::create_dir_all(dir)?;
                }
                atomic_write(&self.path, &bytes)
            });
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "could not write durable cache");
        }
    }

    fn modify<R>(&self, f: impl FnOnce(&mut EntryMap) -> R) -> R {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map();
        let out = f(&mut map);
        self.write_map(&map);
        out
    }
}

impl DurableTier for FileTier {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        self.read_map().remove(key)
    }

    fn store(&self, entry: &CacheEntry) {
        self.modify(|map| {
            map.insert(entry.key.clone(), entry.clone());
        });
    }

    fn remove(&self, key: &str) -> bool {
        self.modify(|map| map.remove(key).is_some())
    }

    fn remove_prefix(&self, prefix: &str) -> Vec<String> {
        self.modify(|map| {
            let doomed: Vec<String> = map
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            for key in &doomed {
                map.remove(key);
            }
            doomed
        })
    }

    fn clear(&self) {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "could not clear durable cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Tier;
    use tempfile::TempDir;

    fn entry(key: &str, value: i64) -> CacheEntry {
        CacheEntry {
            key: key.into(),
            value: serde_json::json!(value),
            tier: Tier::Durable,
            expires_at: None,
        }
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache/cache.json");
        FileTier::new(&path).store(&entry("items:me:2025-03-10", 3));

        let reopened = FileTier::new(&path);
        let loaded = reopened.load("items:me:2025-03-10").unwrap();
        assert_eq!(loaded.value, serde_json::json!(3));
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "garbage").unwrap();
        let tier = FileTier::new(&path);
        assert!(tier.load("anything").is_none());

        // and the tier recovers on the next write
        tier.store(&entry("k", 1));
        assert!(tier.load("k").is_some());
    }

    #[test]
    fn remove_prefix_only_touches_matching_keys() {
        let dir = TempDir::new().unwrap();
        let tier = FileTier::new(dir.path().join("cache.json"));
        tier.store(&entry("items:a:1", 1));
        tier.store(&entry("items:a:2", 2));
        tier.store(&entry("items:b:1", 3));

        let mut removed = tier.remove_prefix("items:a:");
        removed.sort();
        assert_eq!(removed, vec!["items:a:1", "items:a:2"]);
        assert!(tier.load("items:b:1").is_some());
    }
}
