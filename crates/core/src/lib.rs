//! Offline sync core for field operations.
//!
//! Reconciles records captured on disconnected mobile devices with a central
//! record store, keeps input requests in step with their dispatches, and
//! derives plot geometry from GPS-surveyed boundaries.

pub mod documents;
pub mod errors;
pub mod fulfillment;
pub mod geo;
pub mod identity;
pub mod mapping;
pub mod records;
pub mod schema;
pub mod sync;
pub mod utils;

pub use errors::{Error, Result};
pub use records::{Filter, MemoryRecordStore, Record, RecordExt, RecordStore};
pub use schema::EntityType;
