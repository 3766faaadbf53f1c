//! Error types for the field operations core.

use thiserror::Error;

/// Result type alias used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Unexpected storage failure
    #[error("Internal database error: {0}")]
    Internal(String),

    /// A row expected to exist was not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Primary key or unique index violation
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Pool could not be built
    #[error("Failed to create connection pool: {0}")]
    PoolCreationFailed(String),

    /// A connection could not be checked out of the pool
    #[error("Failed to get database connection: {0}")]
    ConnectionFailed(String),
}

/// Validation failures raised by lifecycle hooks and request envelopes.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown entity type or store: {0}")]
    UnknownEntity(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors that can occur in the core services.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence error
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Input or document validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist
    #[error("{entity} {name} not found")]
    NotFound { entity: String, name: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timestamp could not be parsed
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),
}

impl Error {
    /// Create a not-found error for an entity record.
    pub fn not_found(entity: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            name: name.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::InvalidInput(message.into()))
    }

    /// Create an internal database error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Database(DatabaseError::Internal(message.into()))
    }

    /// Returns true for lookup misses (record or entity type not found).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Database(DatabaseError::NotFound(_))
                | Self::Validation(ValidationError::UnknownEntity(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_record() {
        let err = Error::not_found("Farm Plot", "PLOT-001");
        assert_eq!(err.to_string(), "Farm Plot PLOT-001 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_entity_counts_as_lookup_miss() {
        let err = Error::from(ValidationError::UnknownEntity("widgets".to_string()));
        assert!(err.is_not_found());
        assert!(!Error::invalid_input("bad").is_not_found());
    }
}
