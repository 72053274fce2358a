use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::io::config_io::read_config;
use crate::io::recovery::atomic_write;
use crate::model::config::Config;
use crate::ops::carry_over::PendingCarryOver;

/// Name of the workspace directory
pub const DAYLOG_DIR: &str = ".daylog";

/// Error type for workspace I/O
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("not a daylog workspace: no .daylog/ directory found (run `dl init`)")]
    NotAWorkspace,
    #[error("daylog workspace already exists at {0}")]
    AlreadyExists(PathBuf),
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
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("invalid config.toml: {0}")]
    InvalidConfig(String),
    #[error("could not parse staged carry-over: {0}")]
    PendingParseError(#[from] serde_json::Error),
}

/// Walk up from `start` looking for a directory containing `.daylog/`
pub fn discover_workspace(start: &Path) -> Result<PathBuf, WorkspaceError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DAYLOG_DIR).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(WorkspaceError::NotAWorkspace);
        }
    }
}

/// An opened workspace: its root, `.daylog/` directory and loaded config.
///
/// ```text
/// .daylog/
///   config.toml
///   records.json        JSON-file record store
///   cache/cache.json    durable cache tier
///   days/<date>.txt     the last saved buffer per day
///   pending/<date>.json carry-over metadata staged for a day
///   recovery.log
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    dir: PathBuf,
    config: Config,
}

impl Workspace {
    /// Discover the workspace from `start` and load its config
    pub fn discover(start: &Path) -> Result<Self, WorkspaceError> {
        let root = discover_workspace(start)?;
        Self::open(&root)
    }

    pub fn open(root: &Path) -> Result<Self, WorkspaceError> {
        let dir = root.join(DAYLOG_DIR);
        if !dir.is_dir() {
            return Err(WorkspaceError::NotAWorkspace);
        }
        let config = read_config(&dir)?;
        Ok(Workspace {
            root: root.to_path_buf(),
            dir,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.daylog/` directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn owner_id(&self) -> &str {
        &self.config.owner.id
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join("records.json")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.join("cache")
    }

    pub fn buffer_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join("days").join(format!("{}.txt", date))
    }

    pub fn pending_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join("pending").join(format!("{}.json", date))
    }

    /// The day's buffer text, empty when the day has never been saved
    pub fn read_buffer(&self, date: NaiveDate) -> Result<String, WorkspaceError> {
        read_optional(&self.buffer_path(date))
    }

    pub fn write_buffer(&self, date: NaiveDate, text: &str) -> Result<(), WorkspaceError> {
        write_file(&self.buffer_path(date), text.as_bytes())
    }

    pub fn load_pending(&self, date: NaiveDate) -> Result<PendingCarryOver, WorkspaceError> {
        let text = read_optional(&self.pending_path(date))?;
        if text.trim().is_empty() {
            return Ok(PendingCarryOver::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Persist staged carry-over, removing the file once nothing is staged
    pub fn save_pending(
        &self,
        date: NaiveDate,
        pending: &PendingCarryOver,
    ) -> Result<(), WorkspaceError> {
        let path = self.pending_path(date);
        if pending.is_empty() {
            return match fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    Err(WorkspaceError::WriteError { path, source: e })
                }
                _ => Ok(()),
            };
        }
        let json = serde_json::to_string_pretty(pending)?;
        write_file(&path, json.as_bytes())
    }
}

fn read_optional(path: &Path) -> Result<String, WorkspaceError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(WorkspaceError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<(), WorkspaceError> {
    let to_err = |e| WorkspaceError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    atomic_write(path, content).map_err(to_err)
}
