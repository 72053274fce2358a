use chrono::{Days, NaiveDate};
use indexmap::IndexMap;

use crate::cache::invalidation::week_start;
use crate::cache::{CacheKey, TwoTierCache};
use crate::io::store::{RecordFilter, StatusFilter, StoreResult, WorkItemStore};
use crate::model::record::WorkItemRecord;
use crate::model::views::{DailySummary, ProjectGroup, WeeklyAggregate};
use crate::ops::carry_over::UNTAGGED_PROJECT;

// ---------------------------------------------------------------------------
// Pure aggregation
// ---------------------------------------------------------------------------

/// Totals for `date`. Records on other days and backlog records are ignored.
pub fn daily_summary(date: NaiveDate, records: &[WorkItemRecord]) -> DailySummary {
    let day: Vec<&WorkItemRecord> = records
        .iter()
        .filter(|r| r.work_date == date && !r.is_backlog())
        .collect();
    let total = day.len();
    let completed = day.iter().filter(|r| r.is_completed).count();
    let average_progress = if total == 0 {
        0
    } else {
        let sum: u32 = day.iter().map(|r| r.progress as u32).sum();
        (sum as f64 / total as f64).round() as u8
    };
    DailySummary {
        date,
        total,
        completed,
        average_progress,
    }
}

/// Seven daily summaries starting at `week_start`
pub fn weekly_aggregate(week_start: NaiveDate, records: &[WorkItemRecord]) -> WeeklyAggregate {
    let days: Vec<DailySummary> = (0..7)
        .map(|offset| daily_summary(week_start + Days::new(offset), records))
        .collect();
    WeeklyAggregate {
        week_start,
        total: days.iter().map(|d| d.total).sum(),
        completed: days.iter().map(|d| d.completed).sum(),
        days,
    }
}

/// Group non-backlog records by project tag, sorted by project name
pub fn project_groups(records: &[WorkItemRecord]) -> Vec<ProjectGroup> {
    let mut groups: IndexMap<String, ProjectGroup> = IndexMap::new();

    // newest first so open_items reads most recent first
    let mut ordered: Vec<&WorkItemRecord> = records.iter().filter(|r| !r.is_backlog()).collect();
    ordered.sort_by(|a, b| b.work_date.cmp(&a.work_date));

    for record in ordered {
        let project = match record.project_tag() {
            "" => UNTAGGED_PROJECT,
            tag => tag,
        };
        let group = groups
            .entry(project.to_string())
            .or_insert_with(|| ProjectGroup {
                project: project.to_string(),
                total: 0,
                completed: 0,
                open_items: Vec::new(),
            });
        group.total += 1;
        if record.is_completed {
            group.completed += 1;
        } else {
            group.open_items.push(record.content.clone());
        }
    }

    groups.sort_keys();
    groups.into_values().collect()
}

// ---------------------------------------------------------------------------
// Cached views
// ---------------------------------------------------------------------------

/// Read-side views for one owner, each cached under its own scope
pub struct Views<'a, S: ?Sized> {
    store: &'a S,
    cache: &'a TwoTierCache,
    owner_id: String,
}

impl<'a, S: WorkItemStore + ?Sized> Views<'a, S> {
    pub fn new(store: &'a S, cache: &'a TwoTierCache, owner_id: &str) -> Self {
        Views {
            store,
            cache,
            owner_id: owner_id.to_string(),
        }
    }

    pub async fn summary(&self, date: NaiveDate) -> StoreResult<DailySummary> {
        let key = CacheKey::summary(&self.owner_id, date);
        self.cache
            .get_or_fetch(&key, || async move {
                let records = self.fetch(RecordFilter::day(&self.owner_id, date)).await?;
                Ok(daily_summary(date, &records))
            })
            .await
    }

    /// Aggregate for the Monday-start week containing `date`
    pub async fn weekly(&self, date: NaiveDate) -> StoreResult<WeeklyAggregate> {
        let start = week_start(date);
        let key = CacheKey::weekly(&self.owner_id, start);
        self.cache
            .get_or_fetch(&key, || async move {
                let filter = RecordFilter::owner(&self.owner_id).range(start, start + Days::new(7));
                let records = self.fetch(filter).await?;
                Ok(weekly_aggregate(start, &records))
            })
            .await
    }

    pub async fn projects(&self) -> StoreResult<Vec<ProjectGroup>> {
        let key = CacheKey::projects(&self.owner_id);
        self.cache
            .get_or_fetch(&key, || async move {
                let records = self.fetch(RecordFilter::owner(&self.owner_id)).await?;
                Ok(project_groups(&records))
            })
            .await
    }

    async fn fetch(&self, filter: RecordFilter) -> StoreResult<Vec<WorkItemRecord>> {
        self.store
            .query(&filter.status(StatusFilter::ExcludeBacklog))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::invalidation::invalidate_day;
    use crate::io::memory_store::MemoryStore;
    use crate::model::record::NewRecord;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rec(id: &str, date: &str, tag: &str, progress: u8, done: bool) -> WorkItemRecord {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "owner_id": "me",
            "content": format!("item {}", id),
            "work_date": date,
            "project_tags": [tag],
            "progress": progress,
            "is_completed": done,
        }))
        .unwrap()
    }

    #[test]
    fn summary_counts_and_average() {
        let records = vec![
            rec("a", "2025-03-10", "Work", 100, true),
            rec("b", "2025-03-10", "Work", 45, false),
            rec("c", "2025-03-11", "Work", 0, false),
        ];
        let summary = daily_summary(d("2025-03-10"), &records);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        // (100 + 45) / 2 = 72.5
        assert_eq!(summary.average_progress, 73);
    }

    #[test]
    fn empty_day_has_zero_average() {
        assert_eq!(daily_summary(d("2025-03-10"), &[]).average_progress, 0);
    }

    #[test]
    fn weekly_covers_seven_days() {
        let records = vec![
            rec("a", "2025-03-10", "Work", 100, true),
            rec("b", "2025-03-16", "Home", 0, false),
            rec("c", "2025-03-17", "Home", 0, false),
        ];
        let week = weekly_aggregate(d("2025-03-10"), &records);
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.total, 2);
        assert_eq!(week.completed, 1);
        assert_eq!(week.days[6].date, d("2025-03-16"));
    }

    #[test]
    fn projects_grouped_and_sorted() {
        let mut parked = rec("p", "2025-03-12", "Work", 0, false);
        parked.status = Some(crate::model::RecordStatus::Backlog);
        let records = vec![
            rec("a", "2025-03-10", "Work", 100, true),
            rec("b", "2025-03-11", "Work", 0, false),
            rec("c", "2025-03-12", "Work", 0, false),
            rec("d", "2025-03-10", "", 0, false),
            parked,
        ];
        let groups = project_groups(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].project, "Work");
        assert_eq!(groups[0].total, 3);
        assert_eq!(groups[0].open_items, vec!["item c", "item b"]);
        assert_eq!(groups[1].project, UNTAGGED_PROJECT);
    }

    #[tokio::test]
    async fn cached_until_invalidated() {
        let store = MemoryStore::new();
        let cache = TwoTierCache::memory_only(Duration::minutes(5));
        let day = d("2025-03-12");
        store
            .insert(vec![NewRecord::new("me", day, "Work", "one")])
            .await
            .unwrap();

        let views = Views::new(&store, &cache, "me");
        assert_eq!(views.weekly(day).await.unwrap().total, 1);

        store
            .insert(vec![NewRecord::new("me", day, "Work", "two")])
            .await
            .unwrap();
        // stale until the day is invalidated
        assert_eq!(views.weekly(day).await.unwrap().total, 1);

        invalidate_day(&cache, "me", day);
        assert_eq!(views.weekly(day).await.unwrap().total, 2);
        assert_eq!(views.projects().await.unwrap()[0].total, 2);
        assert_eq!(views.summary(day).await.unwrap().total, 2);
    }
}
