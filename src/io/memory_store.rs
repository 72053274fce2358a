use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::io::store::{RecordFilter, StoreError, StoreResult, WorkItemStore};
use crate::model::record::{NewRecord, RecordPatch, WorkItemRecord};

/// Plain list of records with the CRUD semantics every bundled store shares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordTable {
    #[serde(default)]
    pub records: Vec<WorkItemRecord>,
}

impl RecordTable {
    pub fn query(&self, filter: &RecordFilter) -> Vec<WorkItemRecord> {
        let mut out: Vec<WorkItemRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        // stable: same-day records keep insertion order
        out.sort_by_key(|r| r.work_date);
        out
    }

    pub fn insert(&mut self, new_records: Vec<NewRecord>) -> Vec<WorkItemRecord> {
        let now = Utc::now();
        let inserted: Vec<WorkItemRecord> = new_records
            .into_iter()
            .map(|n| WorkItemRecord {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: n.owner_id,
                project_id: None,
                content: n.content,
                work_date: n.work_date,
                progress: n.progress,
                is_completed: n.is_completed,
                project_tags: n.project_tags,
                detail: n.detail,
                due_date: n.due_date,
                sub_items: n.sub_items,
                notes: n.notes,
                status: n.status,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .collect();
        self.records.extend(inserted.iter().cloned());
        inserted
    }

    /// Apply every patch or none: unknown ids fail the whole batch
    pub fn update(&mut self, patches: &[RecordPatch]) -> StoreResult<Vec<WorkItemRecord>> {
        if let Some(missing) = patches
            .iter()
            .find(|p| !self.records.iter().any(|r| r.id == p.id))
        {
            return Err(StoreError::NotFound(missing.id.clone()));
        }

        let now = Utc::now();
        let mut updated = Vec::with_capacity(patches.len());
        for patch in patches {
            if let Some(record) = self.records.iter_mut().find(|r| r.id == patch.id) {
                patch.apply_to(record);
                record.updated_at = Some(now);
                updated.push(record.clone());
            }
        }
        Ok(updated)
    }

    pub fn delete(&mut self, ids: &[String]) {
        self.records.retain(|r| !ids.contains(&r.id));
    }
}

/// In-process store, used for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<RecordTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record
    pub fn all(&self) -> Vec<WorkItemRecord> {
        self.lock().map(|t| t.records.clone()).unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, RecordTable>> {
        self.table
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl WorkItemStore for MemoryStore {
    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<WorkItemRecord>> {
        Ok(self.lock()?.query(filter))
    }

    async fn insert(&self, records: Vec<NewRecord>) -> StoreResult<Vec<WorkItemRecord>> {
        Ok(self.lock()?.insert(records))
    }

    async fn update(&self, patches: Vec<RecordPatch>) -> StoreResult<Vec<WorkItemRecord>> {
        self.lock()?.update(&patches)
    }

    async fn delete(&self, ids: Vec<String>) -> StoreResult<()> {
        self.lock()?.delete(&ids);
        Ok(())
    }
}
