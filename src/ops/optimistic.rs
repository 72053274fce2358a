use std::future::Future;

use serde::Serialize;

use crate::cache::{CacheKey, TwoTierCache};

/// A cache mutation published before the store confirms it.
///
/// `apply` writes the new value into the memory tier; `rollback` always
/// evicts the key so the next read refetches authoritative data.
#[derive(Debug, Clone)]
pub struct OptimisticUpdate<T> {
    pub key: CacheKey,
    pub value: T,
}

impl<T: Serialize> OptimisticUpdate<T> {
    pub fn new(key: CacheKey, value: T) -> Self {
        OptimisticUpdate { key, value }
    }

    pub fn apply(&self, cache: &TwoTierCache) {
        cache.set_memory(&self.key, &self.value);
    }

    pub fn rollback(&self, cache: &TwoTierCache) {
        tracing::debug!(key = %self.key, "rolling back optimistic update");
        cache.invalidate(&self.key);
    }
}

/// Apply `update`, await `write`, and roll back if the write fails
pub async fn run_optimistic<T, R, E, Fut>(
    cache: &TwoTierCache,
    update: &OptimisticUpdate<T>,
    write: Fut,
) -> Result<R, E>
where
    T: Serialize,
    Fut: Future<Output = Result<R, E>>,
{
    update.apply(cache);
    match write.await {
        Ok(r) => Ok(r),
        Err(e) => {
            update.rollback(cache);
            Err(e)
        }
    }
}
