//! Two-tier cache for derived views (day item lists, summaries, weekly
//! aggregates, project groupings).
//!
//! Reads check the memory tier, then the durable tier (promoting hits into
//! memory), then fall through to the caller's fetch. Writes go to both tiers.
//! Consistency comes from invalidating keys after confirmed mutations; the
//! TTL only bounds staleness when an invalidation is missed.

pub mod durable;
pub mod invalidation;
pub mod key;
pub mod memory;

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use durable::{DurableTier, FileTier, NullTier};
pub use key::{CacheKey, CacheScope};
pub use memory::MemoryTier;

use crate::model::config::{CacheConfig, MAX_TTL_SECS};

/// Which tier an entry was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Durable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub tier: Tier,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Memory + durable cache. Construct once per session and pass by reference.
pub struct TwoTierCache {
    memory: MemoryTier,
    durable: Box<dyn DurableTier>,
    ttl: Duration,
}

impl TwoTierCache {
    pub fn new(durable: Box<dyn DurableTier>, ttl: Duration) -> Self {
        TwoTierCache {
            memory: MemoryTier::new(),
            durable,
            ttl,
        }
    }

    /// Cache without a durable tier
    pub fn memory_only(ttl: Duration) -> Self {
        Self::new(Box::new(NullTier), ttl)
    }

    /// Build from workspace config, keeping the durable tier under `cache_dir`.
    /// TTLs beyond `MAX_TTL_SECS` are clamped.
    pub fn from_config(config: &CacheConfig, cache_dir: &Path) -> Self {
        let ttl = ttl_from_secs(config.ttl_secs);
        if config.durable {
            Self::new(Box::new(FileTier::new(cache_dir.join("cache.json"))), ttl)
        } else {
            Self::memory_only(ttl)
        }
    }

    /// Look up `key`, promoting durable hits into memory.
    ///
    /// Expired entries and values that do not deserialize as `T` are misses.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let k = key.to_string();
        let now = Utc::now();

        let entry = match self.memory.get(&k) {
            Some(e) if !e.is_expired(now) => Some(e),
            Some(_) => {
                self.memory.remove(&k);
                None
            }
            None => None,
        };

        let entry = match entry {
            Some(e) => e,
            None => {
                let durable = self.durable.load(&k)?;
                if durable.is_expired(now) {
                    self.durable.remove(&k);
                    tracing::debug!(key = %k, "cache miss (expired)");
                    return None;
                }
                let promoted = CacheEntry {
                    tier: Tier::Memory,
                    ..durable
                };
                self.memory.insert(promoted.clone());
                tracing::debug!(key = %k, "cache hit (durable, promoted)");
                promoted
            }
        };

        match serde_json::from_value(entry.value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(key = %k, error = %e, "cached value has wrong shape, evicting");
                self.invalidate(key);
                None
            }
        }
    }

    /// Write `value` to both tiers
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let Some(value) = self.to_value(key, value) else {
            return;
        };
        let expires_at = self.expiry();
        let k = key.to_string();
        self.durable.store(&CacheEntry {
            key: k.clone(),
            value: value.clone(),
            tier: Tier::Durable,
            expires_at,
        });
        self.memory.insert(CacheEntry {
            key: k,
            value,
            tier: Tier::Memory,
            expires_at,
        });
    }

    /// Write `value` to the memory tier only. Used for unconfirmed
    /// (optimistic) state that must not outlive the process.
    pub fn set_memory<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let Some(value) = self.to_value(key, value) else {
            return;
        };
        // drop any durable copy so a restart cannot resurrect older state
        self.durable.remove(&key.to_string());
        self.memory.insert(CacheEntry {
            key: key.to_string(),
            value,
            tier: Tier::Memory,
            expires_at: self.expiry(),
        });
    }

    /// Cached value for `key`, or the result of `fetch` (which is then cached).
    /// Fetch errors are returned and nothing is cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        tracing::debug!(key = %key, "cache miss, fetching");
        let value = fetch().await?;
        self.set(key, &value);
        Ok(value)
    }

    /// Remove one exact key from both tiers
    pub fn invalidate(&self, key: &CacheKey) {
        let k = key.to_string();
        self.memory.remove(&k);
        self.durable.remove(&k);
    }

    /// Remove every key starting with `prefix` from both tiers. Returns the
    /// number of distinct keys removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut removed = self.memory.remove_prefix(prefix);
        removed.extend(self.durable.remove_prefix(prefix));
        removed.sort();
        removed.dedup();
        tracing::debug!(prefix, count = removed.len(), "invalidated cache prefix");
        removed.len()
    }

    pub fn clear(&self) {
        self.memory.clear();
        self.durable.clear();
    }

    /// Whether the memory tier currently holds `key`
    pub fn in_memory(&self, key: &CacheKey) -> bool {
        self.memory.contains(&key.to_string())
    }

    /// `now + ttl`; an unrepresentable instant means the entry never expires
    fn expiry(&self) -> Option<DateTime<Utc>> {
        Utc::now().checked_add_signed(self.ttl)
    }

    fn to_value<T: Serialize>(&self, key: &CacheKey, value: &T) -> Option<serde_json::Value> {
        match serde_json::to_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "could not serialize cache value");
                self.invalidate(key);
                None
            }
        }
    }
}

fn ttl_from_secs(secs: u64) -> Duration {
    let secs = i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or(i64::MAX);
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

impl std::fmt::Debug for TwoTierCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoTierCache")
            .field("memory_entries", &self.memory.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn file_cache(dir: &TempDir) -> TwoTierCache {
        TwoTierCache::new(
            Box::new(FileTier::new(dir.path().join("cache.json"))),
            Duration::minutes(30),
        )
    }

    #[test]
    fn set_then_get_from_memory() {
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::items("me", day(10));
        cache.set(&key, &vec!["a".to_string()]);
        assert_eq!(cache.get::<Vec<String>>(&key), Some(vec!["a".to_string()]));
    }

    #[test]
    fn durable_hit_is_promoted_to_memory() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::summary("me", day(10));
        file_cache(&dir).set(&key, &42u32);

        // new process: empty memory tier, same durable file
        let cache = file_cache(&dir);
        assert!(!cache.in_memory(&key));
        assert_eq!(cache.get::<u32>(&key), Some(42));
        assert!(cache.in_memory(&key));
    }

    #[test]
    fn expired_entries_are_misses() {
        let dir = TempDir::new().unwrap();
        let cache = TwoTierCache::new(
            Box::new(FileTier::new(dir.path().join("cache.json"))),
            Duration::zero(),
        );
        let key = CacheKey::projects("me");
        cache.set(&key, &1u8);
        assert_eq!(cache.get::<u8>(&key), None);
        assert!(!cache.in_memory(&key));
    }

    #[test]
    fn huge_ttl_is_clamped_not_expired() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            durable: true,
            ttl_secs: 10_000_000_000_000,
        };
        let cache = TwoTierCache::from_config(&config, dir.path());
        assert_eq!(cache.ttl, Duration::seconds(MAX_TTL_SECS as i64));

        let key = CacheKey::projects("me");
        cache.set(&key, &7u8);
        assert_eq!(cache.get::<u8>(&key), Some(7));

        let cache = TwoTierCache::from_config(
            &CacheConfig {
                durable: false,
                ttl_secs: u64::MAX,
            },
            dir.path(),
        );
        cache.set_memory(&key, &8u8);
        assert_eq!(cache.get::<u8>(&key), Some(8));
    }

    #[test]
    fn unrepresentable_expiry_never_expires() {
        let cache = TwoTierCache::memory_only(Duration::MAX);
        let key = CacheKey::projects("me");
        cache.set(&key, &1u8);
        assert_eq!(cache.get::<u8>(&key), Some(1));
    }

    #[test]
    fn wrong_shape_is_a_miss_and_evicted() {
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::items("me", day(10));
        cache.set(&key, &"not a list");
        assert_eq!(cache.get::<Vec<u32>>(&key), None);
        assert!(!cache.in_memory(&key));
    }

    #[test]
    fn prefix_invalidation_spares_other_owners_and_scopes() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        let own_a = CacheKey::items("owner1", day(10));
        let own_b = CacheKey::items("owner1", day(11));
        let other_owner = CacheKey::items("owner2", day(10));
        let other_scope = CacheKey::summary("owner1", day(10));
        for key in [&own_a, &own_b, &other_owner, &other_scope] {
            cache.set(key, &1u8);
        }

        let removed = cache.invalidate_prefix("items:owner1:");
        assert_eq!(removed, 2);
        assert_eq!(cache.get::<u8>(&own_a), None);
        assert_eq!(cache.get::<u8>(&own_b), None);
        assert_eq!(cache.get::<u8>(&other_owner), Some(1));
        assert_eq!(cache.get::<u8>(&other_scope), Some(1));
    }

    #[test]
    fn set_memory_does_not_survive_reload() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::items("me", day(10));
        let cache = file_cache(&dir);
        cache.set(&key, &1u8);
        cache.set_memory(&key, &2u8);
        assert_eq!(cache.get::<u8>(&key), Some(2));

        let reloaded = file_cache(&dir);
        assert_eq!(reloaded.get::<u8>(&key), None);
    }

    #[tokio::test]
    async fn get_or_fetch_populates_on_miss_only() {
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::projects("me");
        let mut calls = 0;

        let first: Result<u32, String> = cache
            .get_or_fetch(&key, || {
                calls += 1;
                async { Ok(7) }
            })
            .await;
        assert_eq!(first, Ok(7));

        let second: Result<u32, String> = cache
            .get_or_fetch(&key, || {
                calls += 1;
                async { Ok(8) }
            })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn get_or_fetch_error_caches_nothing() {
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::projects("me");
        let out: Result<u32, String> = cache
            .get_or_fetch(&key, || async { Err("offline".to_string()) })
            .await;
        assert_eq!(out, Err("offline".to_string()));
        assert!(!cache.in_memory(&key));
    }
}
