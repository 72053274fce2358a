//! Surfaces unfinished items from the lookback window and stages accepted
//! ones for the next save.
//!
//! The resolver is read-only: accepting a candidate only appends a line to
//! the buffer and stages its metadata, so the following reconciliation pass
//! creates the new record with the history carried forward.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::store::{RecordFilter, StatusFilter, StoreResult, WorkItemStore};
use crate::model::carry_over::{CarryOverCandidate, CarryOverMeta};
use crate::model::line_item::{LineItem, carry_key};
use crate::model::record::{Note, WorkItemRecord};
use crate::parse::{append_line, parse_lines, render_line};

/// Tag used when a candidate's source record has none, so the rendered
/// line still parses.
pub const UNTAGGED_PROJECT: &str = "misc";

/// Unfinished items from `[target - lookback_days, target)` worth offering
/// on `target`.
///
/// Read failures are logged and yield an empty list.
pub async fn carry_over_candidates<S: WorkItemStore + ?Sized>(
    store: &S,
    owner_id: &str,
    target: NaiveDate,
    lookback_days: u64,
) -> Vec<CarryOverCandidate> {
    match load_candidates(store, owner_id, target, lookback_days).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(%target, error = %e, "carry-over scan failed, offering nothing");
            Vec::new()
        }
    }
}

async fn load_candidates<S: WorkItemStore + ?Sized>(
    store: &S,
    owner_id: &str,
    target: NaiveDate,
    lookback_days: u64,
) -> StoreResult<Vec<CarryOverCandidate>> {
    if lookback_days == 0 {
        return Ok(Vec::new());
    }
    let from = target
        .checked_sub_days(Days::new(lookback_days))
        .unwrap_or(NaiveDate::MIN);
    let window_filter = RecordFilter::owner(owner_id)
        .range(from, target)
        .status(StatusFilter::ExcludeBacklog);

    let window = store.query(&window_filter).await?;
    let on_target = store.query(&RecordFilter::day(owner_id, target)).await?;
    Ok(select_candidates(window, &on_target))
}

/// Pick candidates from window records.
///
/// Excludes contents completed anywhere in the window and contents already
/// present on the target day, then keeps the most recent occurrence of
/// each remaining content.
pub fn select_candidates(
    mut window: Vec<WorkItemRecord>,
    on_target: &[WorkItemRecord],
) -> Vec<CarryOverCandidate> {
    let completed: HashSet<String> = window
        .iter()
        .filter(|r| r.is_completed)
        .map(|r| r.content.clone())
        .collect();
    let present: HashSet<&str> = on_target.iter().map(|r| r.content.as_str()).collect();

    // most recent day first; stable, so same-day order is preserved
    window.sort_by(|a, b| b.work_date.cmp(&a.work_date));

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for record in window {
        if record.is_completed || record.is_backlog() {
            continue;
        }
        if completed.contains(&record.content) || present.contains(record.content.as_str()) {
            continue;
        }
        if !seen.insert(record.content.clone()) {
            continue;
        }
        out.push(to_candidate(record));
    }
    out
}

fn to_candidate(record: WorkItemRecord) -> CarryOverCandidate {
    let project = match record.project_tag() {
        "" => UNTAGGED_PROJECT.to_string(),
        tag => tag.to_string(),
    };
    // a legacy detail moves into the note list and leaves `detail` empty
    let (notes, detail) = match (record.notes, record.detail) {
        (Some(notes), detail) => (notes, detail),
        (None, Some(detail)) if !detail.trim().is_empty() => (
            vec![Note::from_legacy_detail(&detail, record.work_date)],
            None,
        ),
        (None, _) => (Vec::new(), None),
    };

    CarryOverCandidate {
        id: record.id,
        content: record.content,
        project,
        source_date: record.work_date,
        detail,
        due_date: record.due_date,
        sub_items: record.sub_items,
        notes,
        progress: record.progress,
    }
}

/// Accepted carry-overs waiting for the next save, keyed `project:content`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCarryOver {
    #[serde(default)]
    entries: IndexMap<String, CarryOverMeta>,
}

impl PendingCarryOver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `candidate` and append its line to `buffer`.
    ///
    /// Returns false when the buffer already holds the same project/content
    /// line; the metadata is still staged so that line picks it up.
    pub fn accept(&mut self, candidate: &CarryOverCandidate, buffer: &mut String) -> bool {
        self.entries.insert(
            carry_key(&candidate.project, &candidate.content),
            CarryOverMeta::from(candidate),
        );

        let already_listed = parse_lines(buffer)
            .iter()
            .any(|item| item.project_tag == candidate.project && item.content == candidate.content);
        if already_listed {
            return false;
        }
        *buffer = append_line(buffer, &render_line(&candidate.project, &candidate.content));
        true
    }

    /// Accept every candidate, returning how many lines were appended
    pub fn accept_all(&mut self, candidates: &[CarryOverCandidate], buffer: &mut String) -> usize {
        candidates
            .iter()
            .filter(|c| self.accept(c, buffer))
            .count()
    }

    pub fn get(&self, project: &str, content: &str) -> Option<&CarryOverMeta> {
        self.entries.get(&carry_key(project, content))
    }

    pub fn remove(&mut self, project: &str, content: &str) -> Option<CarryOverMeta> {
        self.entries.shift_remove(&carry_key(project, content))
    }

    /// Drop staged entries whose line is no longer in `items`, returning
    /// how many were dropped
    pub fn retain_lines(&mut self, items: &[LineItem]) -> usize {
        let keys: HashSet<String> = items.iter().map(LineItem::carry_key).collect();
        let before = self.entries.len();
        self.entries.retain(|key, _| keys.contains(key));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_store::MemoryStore;
    use crate::io::store::StoreError;
    use crate::model::record::{NewRecord, RecordPatch, RecordStatus};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rec(id: &str, date: &str, content: &str, done: bool) -> WorkItemRecord {
        WorkItemRecord {
            id: id.into(),
            owner_id: "me".into(),
            project_id: None,
            content: content.into(),
            work_date: d(date),
            progress: 0,
            is_completed: done,
            project_tags: vec!["Work".into()],
            detail: None,
            due_date: None,
            sub_items: Vec::new(),
            notes: None,
            status: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn completed_content_is_excluded() {
        let window = vec![
            rec("a", "2025-03-05", "ship release", false),
            rec("b", "2025-03-07", "ship release", true),
            rec("c", "2025-03-07", "write notes", false),
        ];
        let out = select_candidates(window, &[]);
        let contents: Vec<&str> = out.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["write notes"]);
    }

    #[test]
    fn content_present_on_target_is_excluded() {
        let window = vec![rec("a", "2025-03-08", "review PR", false)];
        let mut today = rec("t", "2025-03-10", "review PR", false);
        today.status = Some(RecordStatus::Backlog);
        assert!(select_candidates(window, &[today]).is_empty());
    }

    #[test]
    fn most_recent_occurrence_wins() {
        let mut older = rec("old", "2025-03-04", "draft plan", false);
        older.progress = 10;
        let mut newer = rec("new", "2025-03-08", "draft plan", false);
        newer.progress = 50;
        let out = select_candidates(vec![older, newer], &[]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "new");
        assert_eq!(out[0].progress, 50);
        assert_eq!(out[0].source_date, d("2025-03-08"));
    }

    #[test]
    fn legacy_detail_becomes_note() {
        let mut r = rec("a", "2025-03-08", "call vendor", false);
        r.detail = Some("ask about invoice".into());
        let out = select_candidates(vec![r], &[]);
        assert_eq!(out[0].notes.len(), 1);
        assert_eq!(out[0].notes[0].id, "legacy");
        assert_eq!(out[0].notes[0].content, "ask about invoice");
        assert_eq!(out[0].notes[0].created_at.date_naive(), d("2025-03-08"));
        assert_eq!(out[0].detail, None);
    }

    #[test]
    fn existing_notes_are_not_merged_with_detail() {
        let mut r = rec("a", "2025-03-08", "call vendor", false);
        r.detail = Some("old".into());
        r.notes = Some(Vec::new());
        let out = select_candidates(vec![r], &[]);
        assert!(out[0].notes.is_empty());
    }

    #[test]
    fn untagged_source_gets_placeholder_project() {
        let mut r = rec("a", "2025-03-08", "loose end", false);
        r.project_tags.clear();
        let out = select_candidates(vec![r], &[]);
        assert_eq!(out[0].project, UNTAGGED_PROJECT);
    }

    #[tokio::test]
    async fn window_bounds_and_backlog() {
        let store = MemoryStore::new();
        let target = d("2025-03-10");
        let mut backlog = NewRecord::new("me", d("2025-03-09"), "Work", "someday");
        backlog.status = Some(RecordStatus::Backlog);
        store
            .insert(vec![
                NewRecord::new("me", d("2025-03-02"), "Work", "too old"),
                NewRecord::new("me", d("2025-03-03"), "Work", "oldest in window"),
                NewRecord::new("me", d("2025-03-09"), "Work", "yesterday"),
                NewRecord::new("me", target, "Work", "today"),
                NewRecord::new("you", d("2025-03-09"), "Work", "not mine"),
                backlog,
            ])
            .await
            .unwrap();

        let out = carry_over_candidates(&store, "me", target, 7).await;
        let contents: Vec<&str> = out.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["yesterday", "oldest in window"]);
    }

    #[tokio::test]
    async fn completed_three_days_ago_not_offered() {
        let store = MemoryStore::new();
        let inserted = store
            .insert(vec![NewRecord::new("me", d("2025-03-07"), "Work", "finish audit")])
            .await
            .unwrap();
        let mut patch = RecordPatch::new(&inserted[0].id);
        patch.is_completed = Some(true);
        store.update(vec![patch]).await.unwrap();

        assert!(carry_over_candidates(&store, "me", d("2025-03-10"), 7).await.is_empty());
    }

    struct BrokenStore;

    #[async_trait]
    impl WorkItemStore for BrokenStore {
        async fn query(&self, _: &RecordFilter) -> StoreResult<Vec<WorkItemRecord>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn insert(&self, _: Vec<NewRecord>) -> StoreResult<Vec<WorkItemRecord>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn update(&self, _: Vec<RecordPatch>) -> StoreResult<Vec<WorkItemRecord>> {
            Err(StoreError::Unavailable("offline".into()))
        }
        async fn delete(&self, _: Vec<String>) -> StoreResult<()> {
            Err(StoreError::Unavailable("offline".into()))
        }
    }

    #[tokio::test]
    async fn read_failure_yields_empty_list() {
        assert!(carry_over_candidates(&BrokenStore, "me", d("2025-03-10"), 7).await.is_empty());
    }

    fn candidate(project: &str, content: &str) -> CarryOverCandidate {
        CarryOverCandidate {
            id: "src".into(),
            content: content.into(),
            project: project.into(),
            source_date: d("2025-03-08"),
            detail: None,
            due_date: Some(d("2025-03-20")),
            sub_items: Vec::new(),
            notes: Vec::new(),
            progress: 30,
        }
    }

    #[test]
    fn accept_appends_line_and_stages_metadata() {
        let mut pending = PendingCarryOver::new();
        let mut buffer = "#Work/ existing".to_string();
        assert!(pending.accept(&candidate("Side Project", "fix bug"), &mut buffer));

        assert_eq!(buffer, "#Work/ existing\n#Side Project/ fix bug\n");
        let meta = pending.get("Side Project", "fix bug").unwrap();
        assert_eq!(meta.source_id, "src");
        assert_eq!(meta.progress, 30);
        assert_eq!(meta.due_date, Some(d("2025-03-20")));
    }

    #[test]
    fn accept_does_not_duplicate_listed_line() {
        let mut pending = PendingCarryOver::new();
        let mut buffer = "#Work/ fix bug\n".to_string();
        assert!(!pending.accept(&candidate("Work", "fix bug"), &mut buffer));
        assert_eq!(buffer, "#Work/ fix bug\n");
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn accept_all_counts_appended_lines() {
        let mut pending = PendingCarryOver::new();
        let mut buffer = String::new();
        let n = pending.accept_all(
            &[candidate("Work", "one"), candidate("Work", "two")],
            &mut buffer,
        );
        assert_eq!(n, 2);
        assert_eq!(parse_lines(&buffer).len(), 2);
        assert!(pending.remove("Work", "one").is_some());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn retain_lines_drops_staged_entries_without_a_line() {
        let mut pending = PendingCarryOver::new();
        let mut buffer = String::new();
        pending.accept_all(
            &[candidate("Work", "kept"), candidate("Work", "deleted")],
            &mut buffer,
        );

        let items = parse_lines("#Work/ kept\n#Home/ deleted\n");
        assert_eq!(pending.retain_lines(&items), 1);
        assert!(pending.get("Work", "kept").is_some());
        assert!(pending.get("Work", "deleted").is_none());
    }
}
