use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a record. Absent (`None`) means a regular day item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Parked outside the daily flow; never offered for carry-over
    Backlog,
}

/// A checklist entry belonging to exactly one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItem {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub is_completed: bool,
}

impl SubItem {
    pub fn new(content: String) -> Self {
        SubItem {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            is_completed: false,
        }
    }
}

/// A timestamped free-form note on a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Id given to the note synthesized from a legacy `detail` field
pub const LEGACY_NOTE_ID: &str = "legacy";

impl Note {
    pub fn new(content: String) -> Self {
        Note {
            id: uuid::Uuid::new_v4().to_string(),
            content,
            created_at: Utc::now(),
        }
    }

    /// Convert a legacy single-note `detail` into a note dated at the source day
    pub fn from_legacy_detail(detail: &str, source_date: NaiveDate) -> Self {
        Note {
            id: LEGACY_NOTE_ID.to_string(),
            content: detail.to_string(),
            created_at: source_date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

/// A persisted, individually tracked work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub content: String,
    pub work_date: NaiveDate,
    /// 0 to 100. Derived from sub-items whenever any exist.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub is_completed: bool,
    /// Only the first element is authoritative
    #[serde(default)]
    pub project_tags: Vec<String>,
    /// Legacy single note, superseded by `notes`
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub sub_items: Vec<SubItem>,
    /// `None` on legacy records that predate multi-note support
    #[serde(default)]
    pub notes: Option<Vec<Note>>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkItemRecord {
    /// The authoritative project tag, or `""` for untagged records
    pub fn project_tag(&self) -> &str {
        self.project_tags.first().map(|s| s.as_str()).unwrap_or("")
    }

    pub fn is_backlog(&self) -> bool {
        self.status == Some(RecordStatus::Backlog)
    }
}

/// Insert payload. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub owner_id: String,
    pub content: String,
    pub work_date: NaiveDate,
    pub project_tags: Vec<String>,
    pub progress: u8,
    pub is_completed: bool,
    pub detail: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub sub_items: Vec<SubItem>,
    pub notes: Option<Vec<Note>>,
    pub status: Option<RecordStatus>,
}

impl NewRecord {
    /// A fresh record for a parsed line with defaulted metadata
    pub fn new(owner_id: &str, work_date: NaiveDate, project_tag: &str, content: &str) -> Self {
        NewRecord {
            owner_id: owner_id.to_string(),
            content: content.to_string(),
            work_date,
            project_tags: vec![project_tag.to_string()],
            progress: 0,
            is_completed: false,
            detail: None,
            due_date: None,
            sub_items: Vec::new(),
            notes: None,
            status: None,
        }
    }
}

/// Partial update of one record. `None` fields are left untouched.
///
/// Doubly wrapped options distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub id: String,
    pub content: Option<String>,
    pub project_tags: Option<Vec<String>>,
    pub work_date: Option<NaiveDate>,
    pub progress: Option<u8>,
    pub is_completed: Option<bool>,
    pub detail: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub sub_items: Option<Vec<SubItem>>,
    pub notes: Option<Option<Vec<Note>>>,
    pub status: Option<Option<RecordStatus>>,
}

impl RecordPatch {
    pub fn new(id: &str) -> Self {
        RecordPatch {
            id: id.to_string(),
            ..Default::default()
        }
    }

    /// A patch that overwrites every mutable field with the record's values
    pub fn full(record: &WorkItemRecord) -> Self {
        RecordPatch {
            id: record.id.clone(),
            content: Some(record.content.clone()),
            project_tags: Some(record.project_tags.clone()),
            work_date: Some(record.work_date),
            progress: Some(record.progress),
            is_completed: Some(record.is_completed),
            detail: Some(record.detail.clone()),
            due_date: Some(record.due_date),
            sub_items: Some(record.sub_items.clone()),
            notes: Some(record.notes.clone()),
            status: Some(record.status),
        }
    }

    /// Apply this patch to a record in place
    pub fn apply_to(&self, record: &mut WorkItemRecord) {
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(tags) = &self.project_tags {
            record.project_tags = tags.clone();
        }
        if let Some(date) = self.work_date {
            record.work_date = date;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(done) = self.is_completed {
            record.is_completed = done;
        }
        if let Some(detail) = &self.detail {
            record.detail = detail.clone();
        }
        if let Some(due) = self.due_date {
            record.due_date = due;
        }
        if let Some(subs) = &self.sub_items {
            record.sub_items = subs.clone();
        }
        if let Some(notes) = &self.notes {
            record.notes = notes.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_record_deserializes_with_defaults() {
        let json = r#"{
            "id": "r1",
            "owner_id": "me",
            "content": "write docs",
            "work_date": "2025-03-10"
        }"#;
        let record: WorkItemRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.progress, 0);
        assert!(!record.is_completed);
        assert_eq!(record.project_tag(), "");
        assert!(record.notes.is_none());
        assert!(record.sub_items.is_empty());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&Some(RecordStatus::Backlog)).unwrap();
        assert_eq!(json, "\"backlog\"");
    }

    #[test]
    fn malformed_sub_items_are_rejected() {
        let json = r#"{
            "id": "r1",
            "owner_id": "me",
            "content": "x",
            "work_date": "2025-03-10",
            "sub_items": [{"text": "missing fields"}]
        }"#;
        assert!(serde_json::from_str::<WorkItemRecord>(json).is_err());
    }

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut record: WorkItemRecord = serde_json::from_str(
            r#"{"id":"r1","owner_id":"me","content":"a","work_date":"2025-03-10",
                "progress":40,"project_tags":["Old"],"due_date":"2025-03-12"}"#,
        )
        .unwrap();
        let mut patch = RecordPatch::new("r1");
        patch.content = Some("b".into());
        patch.due_date = Some(None);
        patch.apply_to(&mut record);

        assert_eq!(record.content, "b");
        assert_eq!(record.progress, 40);
        assert_eq!(record.project_tag(), "Old");
        assert_eq!(record.due_date, None);
    }
}
