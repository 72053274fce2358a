use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::io::memory_store::RecordTable;
use crate::io::recovery::atomic_write;
use crate::io::store::{RecordFilter, StoreError, StoreResult, WorkItemStore};
use crate::model::record::{NewRecord, RecordPatch, WorkItemRecord};

/// Record store backed by a single JSON file.
///
/// Every call reads the file and every mutation rewrites it atomically, so
/// concurrent `dl` processes see each other's writes (callers serialize
/// writers with the workspace lock). Within a process, mutations are
/// serialized so a load/modify/save cycle never interleaves with another.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    writes: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<RecordTable> {
        if !self.path.exists() {
            return Ok(RecordTable::default());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        if text.trim().is_empty() {
            return Ok(RecordTable::default());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, table: &RecordTable) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(table)?;
        atomic_write(&self.path, json.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }
}

#[async_trait]
impl WorkItemStore for JsonFileStore {
    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<WorkItemRecord>> {
        Ok(self.load()?.query(filter))
    }

    async fn insert(&self, records: Vec<NewRecord>) -> StoreResult<Vec<WorkItemRecord>> {
        let _guard = self.writes.lock().await;
        let mut table = self.load()?;
        let inserted = table.insert(records);
        self.save(&table)?;
        Ok(inserted)
    }

    async fn update(&self, patches: Vec<RecordPatch>) -> StoreResult<Vec<WorkItemRecord>> {
        let _guard = self.writes.lock().await;
        let mut table = self.load()?;
        let updated = table.update(&patches)?;
        self.save(&table)?;
        Ok(updated)
    }

    async fn delete(&self, ids: Vec<String>) -> StoreResult<()> {
        let _guard = self.writes.lock().await;
        let mut table = self.load()?;
        table.delete(&ids);
        self.save(&table)
    }
}
