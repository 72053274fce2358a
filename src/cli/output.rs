use chrono::NaiveDate;
use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::carry_over::CarryOverCandidate;
use crate::model::record::{Note, SubItem, WorkItemRecord};
use crate::model::views::{DailySummary, ProjectGroup, WeeklyAggregate};
use crate::ops::day_sync::SaveOutcome;
use crate::ops::reconcile::ItemMatch;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemJson {
    pub id: String,
    pub project: String,
    pub content: String,
    pub work_date: NaiveDate,
    pub progress: u8,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<SubItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub backlog: bool,
}

#[derive(Serialize)]
pub struct DayJson {
    pub date: NaiveDate,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct SaveJson {
    pub date: NaiveDate,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub matches: Vec<ItemMatch>,
    pub items: Vec<ItemJson>,
}

#[derive(Serialize)]
pub struct CandidateJson {
    pub number: usize,
    #[serde(flatten)]
    pub candidate: CarryOverCandidate,
}

#[derive(Serialize)]
pub struct CarryJson {
    pub date: NaiveDate,
    pub candidates: Vec<CandidateJson>,
    pub accepted: usize,
    pub staged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SaveJson>,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson {
    pub timestamp: String,
    pub category: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

pub fn item_to_json(record: &WorkItemRecord) -> ItemJson {
    ItemJson {
        id: record.id.clone(),
        project: record.project_tag().to_string(),
        content: record.content.clone(),
        work_date: record.work_date,
        progress: record.progress,
        completed: record.is_completed,
        due_date: record.due_date,
        detail: record.detail.clone(),
        sub_items: record.sub_items.clone(),
        notes: record.notes.clone().unwrap_or_default(),
        backlog: record.is_backlog(),
    }
}

pub fn save_to_json(date: NaiveDate, outcome: &SaveOutcome) -> SaveJson {
    SaveJson {
        date,
        inserted: outcome.inserted,
        updated: outcome.updated,
        deleted: outcome.deleted,
        matches: outcome.matches.clone(),
        items: outcome.records.iter().map(item_to_json).collect(),
    }
}

pub fn candidates_to_json(candidates: &[CarryOverCandidate]) -> Vec<CandidateJson> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateJson {
            number: i + 1,
            candidate: c.clone(),
        })
        .collect()
}

pub fn recovery_to_json(entry: &RecoveryEntry) -> RecoveryEntryJson {
    RecoveryEntryJson {
        timestamp: entry.timestamp.to_rfc3339(),
        category: entry.category.to_string(),
        description: entry.description.clone(),
        fields: entry.fields.clone(),
        body: entry.body.clone(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One line per item: `[x]  45% #Work/ content  (id)`
pub fn format_item_line(record: &WorkItemRecord) -> String {
    let check = if record.is_completed { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {:>3}% #{}/ {}",
        check,
        record.progress,
        record.project_tag(),
        record.content
    );
    if let Some(due) = record.due_date {
        line.push_str(&format!("  due:{}", due));
    }
    line.push_str(&format!("  ({})", record.id));
    line
}

/// Item line followed by its sub-items and notes, indented
pub fn format_item_detail(record: &WorkItemRecord) -> Vec<String> {
    let mut lines = vec![format_item_line(record)];
    for sub in &record.sub_items {
        let check = if sub.is_completed { 'x' } else { ' ' };
        lines.push(format!("    [{}] {}  ({})", check, sub.content, sub.id));
    }
    if let Some(detail) = &record.detail {
        lines.push(format!("    > {}", detail));
    }
    for note in record.notes.iter().flatten() {
        lines.push(format!(
            "    > {} {}  ({})",
            note.created_at.format("%Y-%m-%d"),
            note.content,
            note.id
        ));
    }
    lines
}

pub fn format_candidate(number: usize, candidate: &CarryOverCandidate) -> String {
    let mut line = format!(
        "{:>2}. #{}/ {}  (from {}, {}%)",
        number, candidate.project, candidate.content, candidate.source_date, candidate.progress
    );
    if let Some(due) = candidate.due_date {
        line.push_str(&format!(" due:{}", due));
    }
    line
}

pub fn format_summary(summary: &DailySummary) -> String {
    format!(
        "{}  {}/{} done  avg {}%",
        summary.date, summary.completed, summary.total, summary.average_progress
    )
}

pub fn format_week(week: &WeeklyAggregate) -> Vec<String> {
    let mut lines = vec![format!(
        "week of {}: {}/{} done",
        week.week_start, week.completed, week.total
    )];
    for day in &week.days {
        lines.push(format!(
            "  {} {}",
            day.date.format("%a"),
            format_summary(day)
        ));
    }
    lines
}

pub fn format_project(group: &ProjectGroup) -> Vec<String> {
    let mut lines = vec![format!(
        "{}  {}/{} done",
        group.project, group.completed, group.total
    )];
    for item in &group.open_items {
        lines.push(format!("  - {}", item));
    }
    lines
}

pub fn format_save(date: NaiveDate, outcome: &SaveOutcome) -> String {
    format!(
        "saved {}: {} inserted, {} updated, {} deleted",
        date, outcome.inserted, outcome.updated, outcome.deleted
    )
}
