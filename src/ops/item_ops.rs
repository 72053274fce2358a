use chrono::NaiveDate;

use crate::cache::invalidation::invalidate_move;
use crate::cache::{CacheKey, TwoTierCache};
use crate::io::store::{StoreError, WorkItemStore, find_record};
use crate::model::record::{Note, RecordPatch, RecordStatus, SubItem, WorkItemRecord};
use crate::ops::optimistic::{OptimisticUpdate, run_optimistic};
use crate::ops::progress::derive_progress;

/// Error type for single-item edits
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("item not found: {0}")]
    NotFound(String),
    #[error("sub-item not found: {0}")]
    SubItemNotFound(String),
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("progress is derived from sub-items and cannot be set directly")]
    ProgressDerived,
    #[error("progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(u8),
    #[error("text must not be empty")]
    EmptyText,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ItemError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ItemError::NotFound(id),
            other => ItemError::Store(other),
        }
    }
}

/// A change to one record outside of the text buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEdit {
    ToggleCompleted,
    SetProgress(u8),
    SetDueDate(Option<NaiveDate>),
    SetDetail(Option<String>),
    AddNote(String),
    EditNote { id: String, content: String },
    RemoveNote(String),
    AddSubItem(String),
    ToggleSubItem(String),
    EditSubItem { id: String, content: String },
    RemoveSubItem(String),
    MoveTo(NaiveDate),
    SetBacklog(bool),
}

// ---------------------------------------------------------------------------
// Pure application
// ---------------------------------------------------------------------------

/// Apply `edit` to `record` in place, then re-derive its progress
pub fn apply_edit(record: &mut WorkItemRecord, edit: ItemEdit) -> Result<(), ItemError> {
    match edit {
        ItemEdit::ToggleCompleted => {
            record.is_completed = !record.is_completed;
            if !record.is_completed && record.sub_items.is_empty() {
                record.progress = 0;
            }
        }
        ItemEdit::SetProgress(value) => {
            if !record.sub_items.is_empty() {
                return Err(ItemError::ProgressDerived);
            }
            if value > 100 {
                return Err(ItemError::ProgressOutOfRange(value));
            }
            record.progress = value;
            record.is_completed = value == 100;
        }
        ItemEdit::SetDueDate(due) => record.due_date = due,
        ItemEdit::SetDetail(detail) => {
            record.detail = detail.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        }
        ItemEdit::AddNote(content) => {
            let content = non_empty(content)?;
            notes_mut(record).push(Note::new(content));
        }
        ItemEdit::EditNote { id, content } => {
            let content = non_empty(content)?;
            let note = notes_mut(record)
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or(ItemError::NoteNotFound(id))?;
            note.content = content;
        }
        ItemEdit::RemoveNote(id) => {
            let notes = notes_mut(record);
            let before = notes.len();
            notes.retain(|n| n.id != id);
            if notes.len() == before {
                return Err(ItemError::NoteNotFound(id));
            }
        }
        ItemEdit::AddSubItem(content) => {
            let content = non_empty(content)?;
            record.sub_items.push(SubItem::new(content));
        }
        ItemEdit::ToggleSubItem(id) => {
            let sub = find_sub_item(record, &id)?;
            sub.is_completed = !sub.is_completed;
        }
        ItemEdit::EditSubItem { id, content } => {
            let content = non_empty(content)?;
            find_sub_item(record, &id)?.content = content;
        }
        ItemEdit::RemoveSubItem(id) => {
            let before = record.sub_items.len();
            record.sub_items.retain(|s| s.id != id);
            if record.sub_items.len() == before {
                return Err(ItemError::SubItemNotFound(id));
            }
        }
        ItemEdit::MoveTo(date) => record.work_date = date,
        ItemEdit::SetBacklog(on) => {
            record.status = on.then_some(RecordStatus::Backlog);
        }
    }
    record.progress = derive_progress(record);
    Ok(())
}

fn non_empty(text: String) -> Result<String, ItemError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ItemError::EmptyText);
    }
    Ok(trimmed.to_string())
}

/// The record's note list, migrating a legacy `detail` into it first
fn notes_mut(record: &mut WorkItemRecord) -> &mut Vec<Note> {
    if record.notes.is_none() {
        let seeded = record
            .detail
            .take()
            .map(|d| vec![Note::from_legacy_detail(&d, record.work_date)])
            .unwrap_or_default();
        record.notes = Some(seeded);
    }
    record.notes.get_or_insert_with(Vec::new)
}

fn find_sub_item<'a>(record: &'a mut WorkItemRecord, id: &str) -> Result<&'a mut SubItem, ItemError> {
    record
        .sub_items
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| ItemError::SubItemNotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Store-backed edits
// ---------------------------------------------------------------------------

/// Record state on either side of an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub previous: WorkItemRecord,
    pub record: WorkItemRecord,
}

/// Applies single-item edits for one owner, optimistically updating the
/// cached day list while the write is in flight.
pub struct ItemEditor<'a, S: ?Sized> {
    store: &'a S,
    cache: &'a TwoTierCache,
    owner_id: String,
}

impl<'a, S: WorkItemStore + ?Sized> ItemEditor<'a, S> {
    pub fn new(store: &'a S, cache: &'a TwoTierCache, owner_id: &str) -> Self {
        ItemEditor {
            store,
            cache,
            owner_id: owner_id.to_string(),
        }
    }

    pub async fn edit(&self, id: &str, edit: ItemEdit) -> Result<EditOutcome, ItemError> {
        let previous = find_record(self.store, &self.owner_id, id).await?;
        let mut record = previous.clone();
        apply_edit(&mut record, edit)?;

        let patch = RecordPatch::full(&record);
        let write = async move {
            self.store
                .update(vec![patch])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ItemError::NotFound(id.to_string()))
        };

        let day_key = CacheKey::items(&self.owner_id, previous.work_date);
        let stored = match self.cache.get::<Vec<WorkItemRecord>>(&day_key) {
            Some(list) => {
                let update = OptimisticUpdate::new(day_key, optimistic_list(list, &record));
                run_optimistic(self.cache, &update, write).await?
            }
            None => write.await?,
        };

        invalidate_move(
            self.cache,
            &self.owner_id,
            previous.work_date,
            stored.work_date,
        );
        tracing::info!(id, date = %stored.work_date, "edited item");

        Ok(EditOutcome {
            previous,
            record: stored,
        })
    }
}

/// The cached day list as it will look once `edited` is stored. Records
/// that leave the day (moved or parked) drop out of it.
fn optimistic_list(mut list: Vec<WorkItemRecord>, edited: &WorkItemRecord) -> Vec<WorkItemRecord> {
    let stays = !edited.is_backlog();
    match list.iter().position(|r| r.id == edited.id) {
        Some(pos) if stays && list[pos].work_date == edited.work_date => {
            list[pos] = edited.clone();
        }
        Some(pos) => {
            list.remove(pos);
        }
        None => {}
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_store::MemoryStore;
    use crate::io::store::{RecordFilter, StoreResult};
    use crate::model::record::NewRecord;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record() -> WorkItemRecord {
        serde_json::from_value(serde_json::json!({
            "id": "r1",
            "owner_id": "me",
            "content": "ship release",
            "work_date": "2025-03-10",
            "project_tags": ["Work"],
        }))
        .unwrap()
    }

    #[test]
    fn toggle_without_sub_items() {
        let mut r = record();
        r.progress = 40;
        apply_edit(&mut r, ItemEdit::ToggleCompleted).unwrap();
        assert!(r.is_completed);
        assert_eq!(r.progress, 100);

        apply_edit(&mut r, ItemEdit::ToggleCompleted).unwrap();
        assert!(!r.is_completed);
        assert_eq!(r.progress, 0);
    }

    #[test]
    fn sub_item_edits_rederive_progress() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::AddSubItem("build".into())).unwrap();
        apply_edit(&mut r, ItemEdit::AddSubItem("tag".into())).unwrap();
        assert_eq!(r.progress, 0);

        let first = r.sub_items[0].id.clone();
        apply_edit(&mut r, ItemEdit::ToggleSubItem(first)).unwrap();
        assert_eq!(r.progress, 45);

        apply_edit(&mut r, ItemEdit::ToggleCompleted).unwrap();
        assert_eq!(r.progress, 55);
    }

    #[test]
    fn manual_progress_rejected_with_sub_items() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::AddSubItem("a".into())).unwrap();
        let err = apply_edit(&mut r, ItemEdit::SetProgress(50)).unwrap_err();
        assert!(matches!(err, ItemError::ProgressDerived));
    }

    #[test]
    fn manual_progress_bounds() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::SetProgress(60)).unwrap();
        assert_eq!(r.progress, 60);
        assert!(!r.is_completed);
        apply_edit(&mut r, ItemEdit::SetProgress(100)).unwrap();
        assert!(r.is_completed);
        assert!(matches!(
            apply_edit(&mut r, ItemEdit::SetProgress(101)),
            Err(ItemError::ProgressOutOfRange(101))
        ));
    }

    #[test]
    fn first_note_migrates_legacy_detail() {
        let mut r = record();
        r.detail = Some("old context".into());
        apply_edit(&mut r, ItemEdit::AddNote("new context".into())).unwrap();

        let notes = r.notes.as_ref().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].content, "old context");
        assert_eq!(notes[1].content, "new context");
        assert_eq!(r.detail, None);
    }

    #[test]
    fn set_detail_trims_and_clears() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::SetDetail(Some("  waiting on legal  ".into()))).unwrap();
        assert_eq!(r.detail.as_deref(), Some("waiting on legal"));

        apply_edit(&mut r, ItemEdit::SetDetail(Some("   ".into()))).unwrap();
        assert_eq!(r.detail, None);

        r.detail = Some("x".into());
        apply_edit(&mut r, ItemEdit::SetDetail(None)).unwrap();
        assert_eq!(r.detail, None);
    }

    #[test]
    fn edit_note_replaces_text() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::AddNote("first draft".into())).unwrap();
        let id = r.notes.as_ref().unwrap()[0].id.clone();

        apply_edit(
            &mut r,
            ItemEdit::EditNote {
                id: id.clone(),
                content: " final ".into(),
            },
        )
        .unwrap();
        assert_eq!(r.notes.as_ref().unwrap()[0].content, "final");

        assert!(matches!(
            apply_edit(
                &mut r,
                ItemEdit::EditNote {
                    id: id.clone(),
                    content: "  ".into()
                }
            ),
            Err(ItemError::EmptyText)
        ));
        assert!(matches!(
            apply_edit(
                &mut r,
                ItemEdit::EditNote {
                    id: "nope".into(),
                    content: "text".into()
                }
            ),
            Err(ItemError::NoteNotFound(_))
        ));

        apply_edit(&mut r, ItemEdit::RemoveNote(id)).unwrap();
        assert!(r.notes.as_ref().unwrap().is_empty());
    }

    #[test]
    fn edit_sub_item_keeps_completion() {
        let mut r = record();
        apply_edit(&mut r, ItemEdit::AddSubItem("outline".into())).unwrap();
        let id = r.sub_items[0].id.clone();
        apply_edit(&mut r, ItemEdit::ToggleSubItem(id.clone())).unwrap();

        apply_edit(
            &mut r,
            ItemEdit::EditSubItem {
                id: id.clone(),
                content: "outline v2".into(),
            },
        )
        .unwrap();
        assert_eq!(r.sub_items[0].content, "outline v2");
        assert!(r.sub_items[0].is_completed);
        assert_eq!(r.progress, 90);

        assert!(matches!(
            apply_edit(
                &mut r,
                ItemEdit::EditSubItem {
                    id,
                    content: "".into()
                }
            ),
            Err(ItemError::EmptyText)
        ));
        assert!(matches!(
            apply_edit(
                &mut r,
                ItemEdit::EditSubItem {
                    id: "nope".into(),
                    content: "text".into()
                }
            ),
            Err(ItemError::SubItemNotFound(_))
        ));
    }

    #[test]
    fn unknown_ids_and_empty_text() {
        let mut r = record();
        assert!(matches!(
            apply_edit(&mut r, ItemEdit::ToggleSubItem("nope".into())),
            Err(ItemError::SubItemNotFound(_))
        ));
        assert!(matches!(
            apply_edit(&mut r, ItemEdit::RemoveNote("nope".into())),
            Err(ItemError::NoteNotFound(_))
        ));
        assert!(matches!(
            apply_edit(&mut r, ItemEdit::AddSubItem("   ".into())),
            Err(ItemError::EmptyText)
        ));
    }

    async fn seeded() -> (MemoryStore, String) {
        let store = MemoryStore::new();
        let inserted = store
            .insert(vec![NewRecord::new("me", day(10), "Work", "ship release")])
            .await
            .unwrap();
        (store, inserted[0].id.clone())
    }

    #[tokio::test]
    async fn edit_writes_and_invalidates_day() {
        let (store, id) = seeded().await;
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::items("me", day(10));
        cache.set(&key, &store.all());

        let editor = ItemEditor::new(&store, &cache, "me");
        let out = editor.edit(&id, ItemEdit::ToggleCompleted).await.unwrap();
        assert!(out.record.is_completed);
        assert!(!out.previous.is_completed);
        assert!(store.all()[0].is_completed);
        assert!(!cache.in_memory(&key));
    }

    #[tokio::test]
    async fn move_invalidates_both_days() {
        let (store, id) = seeded().await;
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let to = CacheKey::items("me", day(12));
        cache.set(&to, &Vec::<WorkItemRecord>::new());

        let editor = ItemEditor::new(&store, &cache, "me");
        let out = editor.edit(&id, ItemEdit::MoveTo(day(12))).await.unwrap();
        assert_eq!(out.record.work_date, day(12));
        assert!(!cache.in_memory(&to));
    }

    struct RejectingStore(MemoryStore);

    #[async_trait::async_trait]
    impl WorkItemStore for RejectingStore {
        async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<WorkItemRecord>> {
            self.0.query(filter).await
        }
        async fn insert(&self, records: Vec<NewRecord>) -> StoreResult<Vec<WorkItemRecord>> {
            self.0.insert(records).await
        }
        async fn update(&self, _: Vec<RecordPatch>) -> StoreResult<Vec<WorkItemRecord>> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        async fn delete(&self, ids: Vec<String>) -> StoreResult<()> {
            self.0.delete(ids).await
        }
    }

    #[tokio::test]
    async fn failed_write_evicts_optimistic_list() {
        let (inner, id) = seeded().await;
        let store = RejectingStore(inner);
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let key = CacheKey::items("me", day(10));
        cache.set(&key, &store.0.all());

        let editor = ItemEditor::new(&store, &cache, "me");
        let err = editor.edit(&id, ItemEdit::ToggleCompleted).await.unwrap_err();
        assert!(matches!(err, ItemError::Store(StoreError::Unavailable(_))));
        assert!(!cache.in_memory(&key));
        assert!(!store.0.all()[0].is_completed);
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let store = MemoryStore::new();
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let editor = ItemEditor::new(&store, &cache, "me");
        let err = editor.edit("missing", ItemEdit::ToggleCompleted).await.unwrap_err();
        assert!(matches!(err, ItemError::NotFound(_)));
    }

    #[test]
    fn parked_item_leaves_optimistic_list() {
        let mut edited = record();
        edited.status = Some(RecordStatus::Backlog);
        assert!(optimistic_list(vec![record()], &edited).is_empty());
    }
}
