pub mod config_io;
pub mod json_store;
pub mod lock;
pub mod memory_store;
pub mod recovery;
pub mod store;
pub mod workspace;

pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;
pub use store::{RecordFilter, StatusFilter, StoreError, StoreResult, WorkItemStore};
pub use workspace::{Workspace, WorkspaceError};
