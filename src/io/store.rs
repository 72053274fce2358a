//! Persistent-store collaborator.
//!
//! The engine treats the store as an opaque CRUD service keyed by record id
//! and filters. All operations are async so a remote backend fits the same
//! seam as the bundled file and memory stores.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::record::{NewRecord, RecordPatch, WorkItemRecord};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed record data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Status selection for a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    ExcludeBacklog,
    OnlyBacklog,
}

/// Query filter. Every set field must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub owner_id: String,
    /// Inclusive lower bound on `work_date`
    pub from: Option<NaiveDate>,
    /// Exclusive upper bound on `work_date`
    pub until: Option<NaiveDate>,
    pub status: StatusFilter,
    /// Restrict to these ids
    pub ids: Option<Vec<String>>,
}

impl RecordFilter {
    /// All records of an owner
    pub fn owner(owner_id: &str) -> Self {
        RecordFilter {
            owner_id: owner_id.to_string(),
            from: None,
            until: None,
            status: StatusFilter::Any,
            ids: None,
        }
    }

    /// Records of a single day
    pub fn day(owner_id: &str, date: NaiveDate) -> Self {
        Self::owner(owner_id).range(date, date + chrono::Days::new(1))
    }

    /// Restrict to `[from, until)`
    pub fn range(mut self, from: NaiveDate, until: NaiveDate) -> Self {
        self.from = Some(from);
        self.until = Some(until);
        self
    }

    pub fn status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn matches(&self, record: &WorkItemRecord) -> bool {
        if record.owner_id != self.owner_id {
            return false;
        }
        if self.from.is_some_and(|from| record.work_date < from) {
            return false;
        }
        if self.until.is_some_and(|until| record.work_date >= until) {
            return false;
        }
        let status_ok = match self.status {
            StatusFilter::Any => true,
            StatusFilter::ExcludeBacklog => !record.is_backlog(),
            StatusFilter::OnlyBacklog => record.is_backlog(),
        };
        if !status_ok {
            return false;
        }
        match &self.ids {
            Some(ids) => ids.iter().any(|id| *id == record.id),
            None => true,
        }
    }
}

/// CRUD surface the engine needs from persistent storage
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Records matching `filter`, ordered by `work_date` then insertion order
    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<WorkItemRecord>>;

    /// Insert records, returning them with store-assigned ids and timestamps
    async fn insert(&self, records: Vec<NewRecord>) -> StoreResult<Vec<WorkItemRecord>>;

    /// Apply patches by id, returning the updated records
    async fn update(&self, patches: Vec<RecordPatch>) -> StoreResult<Vec<WorkItemRecord>>;

    /// Delete by id. Unknown ids are ignored.
    async fn delete(&self, ids: Vec<String>) -> StoreResult<()>;
}

/// Fetch a single record by id
pub async fn find_record<S: WorkItemStore + ?Sized>(
    store: &S,
    owner_id: &str,
    id: &str,
) -> StoreResult<WorkItemRecord> {
    let filter = RecordFilter::owner(owner_id).ids(vec![id.to_string()]);
    store
        .query(&filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(date: &str, backlog: bool) -> WorkItemRecord {
        serde_json::from_value(serde_json::json!({
            "id": "r1",
            "owner_id": "me",
            "content": "x",
            "work_date": date,
            "status": if backlog { Some("backlog") } else { None },
        }))
        .unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn day_filter_is_half_open() {
        let f = RecordFilter::day("me", d("2025-03-10"));
        assert!(f.matches(&rec("2025-03-10", false)));
        assert!(!f.matches(&rec("2025-03-11", false)));
        assert!(!f.matches(&rec("2025-03-09", false)));
    }

    #[test]
    fn status_filter() {
        let f = RecordFilter::owner("me").status(StatusFilter::ExcludeBacklog);
        assert!(f.matches(&rec("2025-03-10", false)));
        assert!(!f.matches(&rec("2025-03-10", true)));
        let f = RecordFilter::owner("me").status(StatusFilter::OnlyBacklog);
        assert!(f.matches(&rec("2025-03-10", true)));
    }

    #[test]
    fn other_owner_never_matches() {
        let f = RecordFilter::owner("you");
        assert!(!f.matches(&rec("2025-03-10", false)));
    }
}
