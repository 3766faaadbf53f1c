//! Entity records and the persistence contract the sync core runs against.
//!
//! Records are JSON objects keyed by canonical field names. Child tables are
//! nested arrays of objects under their table field (e.g. `polygon`, `photos`).

mod filter;
mod memory;

pub use filter::{Condition, Filter};
pub use memory::MemoryRecordStore;

use std::collections::HashSet;

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::schema::EntityType;
use crate::sync::{ConflictStatus, SyncConflict, SyncLogEntry};

/// A canonical entity record.
pub type Record = Map<String, Value>;

/// Primary key field present on every record.
pub const NAME_FIELD: &str = "name";
/// Server-assigned last modification timestamp.
pub const MODIFIED_FIELD: &str = "modified";
/// Server-assigned creation timestamp.
pub const CREATION_FIELD: &str = "creation";
/// User that created the record.
pub const OWNER_FIELD: &str = "owner";
/// Entity type tag carried inside a record.
pub const DOCTYPE_FIELD: &str = "doctype";

/// Typed accessors over loosely-typed record fields.
pub trait RecordExt {
    /// Non-empty string value. Numbers are not coerced.
    fn get_str(&self, key: &str) -> Option<&str>;
    /// Numeric value; numeric strings are accepted.
    fn get_f64(&self, key: &str) -> Option<f64>;
    /// Decimal value; numeric strings are accepted.
    fn get_decimal(&self, key: &str) -> Option<Decimal>;
    fn get_array(&self, key: &str) -> Option<&Vec<Value>>;
    /// True when the key is absent, null, or an empty string.
    fn is_blank(&self, key: &str) -> bool;
    fn record_name(&self) -> Option<&str>;
}

impl RecordExt for Record {
    fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::String(v)) if !v.trim().is_empty() => Some(v.as_str()),
            _ => None,
        }
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        value_as_f64(self.get(key)?)
    }

    fn get_decimal(&self, key: &str) -> Option<Decimal> {
        value_as_decimal(self.get(key)?)
    }

    fn get_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.get(key).and_then(Value::as_array)
    }

    fn is_blank(&self, key: &str) -> bool {
        match self.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(v)) => v.trim().is_empty(),
            _ => false,
        }
    }

    fn record_name(&self) -> Option<&str> {
        self.get_str(NAME_FIELD)
    }
}

/// Coerces a JSON scalar into `f64`.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Coerces a JSON scalar into a `Decimal`.
pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        Value::String(s) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    }
}

/// Stores a decimal as a JSON number, integral values without a fraction.
pub fn decimal_to_value(value: Decimal) -> Value {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Some(integer) = normalized.to_i64() {
            return Value::from(integer);
        }
    }
    normalized.to_f64().map(Value::from).unwrap_or(Value::Null)
}

/// Renders a scalar as the string used for identifiers and comparisons.
pub fn value_as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Persistence collaborator: create/read/update/delete, field introspection,
/// a `modified` timestamp per record, and a transaction boundary.
///
/// Methods take `&mut self` so implementations can hold a single connection.
/// Writes are raw: lifecycle hooks run in [`crate::documents`], not here.
pub trait RecordStore {
    /// Fields declared on an entity type (static declarations plus custom fields).
    fn declared_fields(&mut self, entity: EntityType) -> Result<HashSet<String>>;

    fn get(&mut self, entity: EntityType, name: &str) -> Result<Option<Record>>;

    fn exists(&mut self, entity: EntityType, name: &str) -> Result<bool> {
        Ok(self.get(entity, name)?.is_some())
    }

    /// Full records matching every filter, ordered by `modified` ascending.
    fn list(&mut self, entity: EntityType, filters: &[Filter]) -> Result<Vec<Record>>;

    /// Inserts a fully stamped record. Fails if the name is taken.
    fn insert(&mut self, entity: EntityType, record: &Record) -> Result<()>;

    /// Replaces a stored record by name.
    fn update(&mut self, entity: EntityType, record: &Record) -> Result<()>;

    /// Deletes a record; returns whether a row was removed.
    fn delete(&mut self, entity: EntityType, name: &str) -> Result<bool>;

    fn append_sync_log(&mut self, entry: &SyncLogEntry) -> Result<()>;

    fn list_sync_log(&mut self) -> Result<Vec<SyncLogEntry>>;

    fn insert_sync_conflict(&mut self, conflict: &SyncConflict) -> Result<()>;

    fn list_sync_conflicts(&mut self, status: Option<ConflictStatus>)
        -> Result<Vec<SyncConflict>>;

    /// Runs `f` atomically. An `Err` rolls back every write made inside `f`.
    /// Nested calls behave as savepoints.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn accessors_coerce_numeric_strings() {
        let r = record(json!({ "qty": "12.5", "n": 3, "blank": "  ", "name": "A" }));
        assert_eq!(r.get_f64("qty"), Some(12.5));
        assert_eq!(r.get_decimal("qty"), Some(dec!(12.5)));
        assert_eq!(r.get_decimal("n"), Some(dec!(3)));
        assert!(r.is_blank("blank"));
        assert!(r.is_blank("missing"));
        assert_eq!(r.get_str("blank"), None);
        assert_eq!(r.record_name(), Some("A"));
    }

    #[test]
    fn keys_render_numbers_and_trim_strings() {
        assert_eq!(value_as_key(&json!(" OG-1 ")), Some("OG-1".to_string()));
        assert_eq!(value_as_key(&json!(42)), Some("42".to_string()));
        assert_eq!(value_as_key(&json!(null)), None);
    }

    #[test]
    fn decimals_store_as_plain_numbers() {
        assert_eq!(decimal_to_value(dec!(20.00)), json!(20));
        assert_eq!(decimal_to_value(dec!(-5)), json!(-5));
        assert_eq!(decimal_to_value(dec!(2.5)), json!(2.5));
    }
}
