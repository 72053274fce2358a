//! Applies a reconciliation plan for one owner and day.
//!
//! Deletes, inserts and updates touch disjoint ids, so they are dispatched
//! together and awaited jointly. A failure in one does not undo the others;
//! the day's cached views are always invalidated and, on success, refilled
//! from a fresh read of the store rather than from the local plan.

use chrono::NaiveDate;

use crate::cache::invalidation::invalidate_day;
use crate::cache::{CacheKey, TwoTierCache};
use crate::io::store::{RecordFilter, StatusFilter, StoreError, StoreResult, WorkItemStore};
use crate::model::line_item::LineItem;
use crate::model::record::{NewRecord, WorkItemRecord};
use crate::ops::carry_over::PendingCarryOver;
use crate::ops::progress::calculate_progress;
use crate::ops::reconcile::{ItemMatch, Reconciliation, reconcile};
use crate::parse::parse_lines;

/// Error type for day saves
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not read current records: {0}")]
    Snapshot(StoreError),
    #[error("{failed} of {attempted} write operations failed: {first}")]
    WriteFailed {
        failed: usize,
        attempted: usize,
        first: StoreError,
    },
    #[error("could not re-read records after save: {0}")]
    Refetch(StoreError),
}

/// What a save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub matches: Vec<ItemMatch>,
    /// The day's records as stored after the save
    pub records: Vec<WorkItemRecord>,
}

/// Read a day's records (backlog excluded) through the cache
pub async fn day_records<S: WorkItemStore + ?Sized>(
    store: &S,
    cache: &TwoTierCache,
    owner_id: &str,
    date: NaiveDate,
) -> StoreResult<Vec<WorkItemRecord>> {
    cache
        .get_or_fetch(&CacheKey::items(owner_id, date), || {
            fetch_day(store, owner_id, date)
        })
        .await
}

async fn fetch_day<S: WorkItemStore + ?Sized>(
    store: &S,
    owner_id: &str,
    date: NaiveDate,
) -> StoreResult<Vec<WorkItemRecord>> {
    let filter = RecordFilter::day(owner_id, date).status(StatusFilter::ExcludeBacklog);
    store.query(&filter).await
}

/// Keeps one owner's day of records in sync with its text buffer
pub struct DaySync<'a, S: ?Sized> {
    store: &'a S,
    cache: &'a TwoTierCache,
    owner_id: String,
    date: NaiveDate,
}

impl<'a, S: WorkItemStore + ?Sized> DaySync<'a, S> {
    pub fn new(store: &'a S, cache: &'a TwoTierCache, owner_id: &str, date: NaiveDate) -> Self {
        DaySync {
            store,
            cache,
            owner_id: owner_id.to_string(),
            date,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Current records for the day, cached when possible
    pub async fn snapshot(&self) -> StoreResult<Vec<WorkItemRecord>> {
        day_records(self.store, self.cache, &self.owner_id, self.date).await
    }

    /// Reconcile `text` against the stored day and apply the result.
    ///
    /// Staged carry-over metadata is consumed for every line it creates;
    /// entries whose line is gone from `text` are dropped.
    /// Running this again on the same text changes nothing.
    pub async fn save(
        &self,
        text: &str,
        pending: &mut PendingCarryOver,
    ) -> Result<SaveOutcome, SyncError> {
        let items = parse_lines(text);
        let stale = pending.retain_lines(&items);
        if stale > 0 {
            tracing::debug!(date = %self.date, stale, "dropped staged carry-over without a line");
        }
        let existing = self.snapshot().await.map_err(SyncError::Snapshot)?;
        let plan = reconcile(&items, &existing);

        tracing::debug!(
            date = %self.date,
            insert = plan.to_insert.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            "reconciled day"
        );

        if plan.is_noop() {
            return Ok(SaveOutcome {
                inserted: 0,
                updated: 0,
                deleted: 0,
                matches: plan.matches,
                records: existing,
            });
        }

        let inserts = self.build_inserts(&plan.to_insert, pending);
        self.execute(&plan, inserts).await?;

        for item in &plan.to_insert {
            pending.remove(&item.project_tag, &item.content);
        }

        let records = fetch_day(self.store, &self.owner_id, self.date)
            .await
            .map_err(SyncError::Refetch)?;
        self.cache.set(&CacheKey::items(&self.owner_id, self.date), &records);

        tracing::info!(
            date = %self.date,
            inserted = plan.to_insert.len(),
            updated = plan.to_update.len(),
            deleted = plan.to_delete.len(),
            "saved day"
        );

        Ok(SaveOutcome {
            inserted: plan.to_insert.len(),
            updated: plan.to_update.len(),
            deleted: plan.to_delete.len(),
            matches: plan.matches,
            records,
        })
    }

    /// Turn unmatched lines into insert payloads, carrying forward any
    /// staged metadata for the same `project:content`.
    pub fn build_inserts(&self, items: &[LineItem], pending: &PendingCarryOver) -> Vec<NewRecord> {
        items
            .iter()
            .map(|item| {
                let mut record =
                    NewRecord::new(&self.owner_id, self.date, &item.project_tag, &item.content);
                if let Some(meta) = pending.get(&item.project_tag, &item.content) {
                    record.detail = meta.detail.clone();
                    record.due_date = meta.due_date;
                    record.sub_items = meta.sub_items.clone();
                    record.notes = (!meta.notes.is_empty()).then(|| meta.notes.clone());
                    record.progress = calculate_progress(&meta.sub_items, false, Some(meta.progress));
                }
                record
            })
            .collect()
    }

    /// Dispatch the plan's writes concurrently and invalidate the day's
    /// views whatever the outcome.
    pub async fn execute(
        &self,
        plan: &Reconciliation,
        inserts: Vec<NewRecord>,
    ) -> Result<(), SyncError> {
        let deletes = plan.to_delete.clone();
        let updates = plan.to_update.clone();
        let attempted = [!deletes.is_empty(), !inserts.is_empty(), !updates.is_empty()]
            .iter()
            .filter(|x| **x)
            .count();

        let delete_op = async move {
            if deletes.is_empty() {
                return Ok(());
            }
            self.store.delete(deletes).await
        };
        let insert_op = async move {
            if inserts.is_empty() {
                return Ok(());
            }
            self.store.insert(inserts).await.map(|_| ())
        };
        let update_op = async move {
            if updates.is_empty() {
                return Ok(());
            }
            self.store.update(updates).await.map(|_| ())
        };

        let (deleted, inserted, updated) = tokio::join!(delete_op, insert_op, update_op);

        invalidate_day(self.cache, &self.owner_id, self.date);

        let mut errors: Vec<StoreError> = Vec::new();
        for (op, result) in [("delete", deleted), ("insert", inserted), ("update", updated)] {
            if let Err(e) = result {
                tracing::error!(date = %self.date, op, error = %e, "write failed");
                errors.push(e);
            }
        }

        let failed = errors.len();
        match errors.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(SyncError::WriteFailed {
                failed,
                attempted,
                first,
            }),
        }
    }
}
