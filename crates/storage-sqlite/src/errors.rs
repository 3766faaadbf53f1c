//! Storage error type and its conversion into the core error taxonomy.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use fieldops_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Query failed: {0}")]
    Query(#[from] DieselError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        let database = match err {
            StorageError::Query(DieselError::NotFound) => {
                DatabaseError::NotFound("query returned no rows".to_string())
            }
            StorageError::Query(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            )) => DatabaseError::UniqueViolation(info.message().to_string()),
            StorageError::Pool(err) => DatabaseError::ConnectionFailed(err.to_string()),
            StorageError::Connection(err) => DatabaseError::ConnectionFailed(err.to_string()),
            StorageError::Json(err) => return Error::Json(err),
            other => DatabaseError::Internal(other.to_string()),
        };
        Error::Database(database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_lookup_miss() {
        let err = Error::from(StorageError::from(DieselError::NotFound));
        assert!(err.is_not_found());
    }

    #[test]
    fn migration_failures_are_internal() {
        let err = Error::from(StorageError::Migration("bad sql".to_string()));
        assert!(matches!(err, Error::Database(DatabaseError::Internal(_))));
        assert!(err.to_string().contains("bad sql"));
    }
}
