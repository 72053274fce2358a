use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-day totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
    /// Mean progress across the day's items (0 when empty)
    pub average_progress: u8,
}

/// Monday-to-Sunday aggregate of daily summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub days: Vec<DailySummary>,
    pub total: usize,
    pub completed: usize,
}

/// All of an owner's items under one project tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub project: String,
    pub total: usize,
    pub completed: usize,
    /// Contents of unfinished items, most recent first
    pub open_items: Vec<String>,
}
