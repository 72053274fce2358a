use chrono::{Datelike, Days, NaiveDate};

use super::{CacheKey, CacheScope, TwoTierCache};

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_monday() as u64)
}

/// Retire every view derived from `date`'s records: the day's item list and
/// summary, the covering weekly aggregate and the owner's project grouping.
pub fn invalidate_day(cache: &TwoTierCache, owner: &str, date: NaiveDate) {
    cache.invalidate(&CacheKey::items(owner, date));
    cache.invalidate(&CacheKey::summary(owner, date));
    cache.invalidate(&CacheKey::weekly(owner, week_start(date)));
    cache.invalidate_prefix(&CacheKey::scope_prefix(CacheScope::Projects, owner));
}

/// A record moved between days invalidates both days' families
pub fn invalidate_move(cache: &TwoTierCache, owner: &str, from: NaiveDate, to: NaiveDate) {
    invalidate_day(cache, owner, from);
    if from != to {
        invalidate_day(cache, owner, to);
    }
}

/// Drop every cached view of an owner
pub fn invalidate_owner(cache: &TwoTierCache, owner: &str) -> usize {
    CacheScope::ALL
        .iter()
        .map(|scope| cache.invalidate_prefix(&CacheKey::scope_prefix(*scope, owner)))
        .sum()
}
