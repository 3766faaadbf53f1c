//! SQLite storage for the field operations sync core.
//!
//! Records are stored as JSON documents keyed by `(entity_type, name)`, with
//! `modified` lifted into its own indexed column for incremental pulls.

pub mod db;
pub mod errors;
pub mod records;
pub mod schema;

pub use db::{create_pool, create_pool_with_size, get_connection, init, run_migrations};
pub use db::{DbConnection, DbPool};
pub use errors::StorageError;
pub use records::SqliteRecordStore;
