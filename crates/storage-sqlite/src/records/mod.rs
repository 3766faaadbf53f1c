//! SQLite persistence for entity records, custom fields, the Sync Log and
//! Sync Conflicts.

mod model;
mod repository;

pub use model::{CustomFieldDB, RecordDB, SyncConflictDB, SyncLogDB};
pub use repository::SqliteRecordStore;
