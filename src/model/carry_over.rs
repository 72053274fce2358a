use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{Note, SubItem};

/// A past, unfinished record offered for re-entry on a later day.
///
/// Exists only for the duration of one carry-over review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOverCandidate {
    /// Id of the source record
    pub id: String,
    pub content: String,
    pub project: String,
    pub source_date: NaiveDate,
    pub detail: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub sub_items: Vec<SubItem>,
    pub notes: Vec<Note>,
    pub progress: u8,
}

/// Metadata staged for an accepted candidate until the next save creates
/// the new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryOverMeta {
    pub source_id: String,
    pub source_date: NaiveDate,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub sub_items: Vec<SubItem>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub progress: u8,
}

impl From<&CarryOverCandidate> for CarryOverMeta {
    fn from(c: &CarryOverCandidate) -> Self {
        CarryOverMeta {
            source_id: c.id.clone(),
            source_date: c.source_date,
            detail: c.detail.clone(),
            due_date: c.due_date,
            sub_items: c.sub_items.clone(),
            notes: c.notes.clone(),
            progress: c.progress,
        }
    }
}
