//! In-memory `RecordStore` used for embedding and tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::{DatabaseError, Error, Result};
use crate::schema::EntityType;
use crate::sync::{ConflictStatus, SyncConflict, SyncLogEntry};

use super::{Filter, Record, RecordExt, RecordStore, MODIFIED_FIELD};

#[derive(Debug, Clone, Default)]
struct State {
    records: HashMap<EntityType, BTreeMap<String, Record>>,
    custom_fields: HashMap<EntityType, HashSet<String>>,
    sync_log: Vec<SyncLogEntry>,
    sync_conflicts: Vec<SyncConflict>,
}

/// Transactions snapshot the whole state and restore it on error.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: State,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an extra field on an entity type, like a custom field patch.
    pub fn add_custom_field(&mut self, entity: EntityType, fieldname: &str) {
        self.state
            .custom_fields
            .entry(entity)
            .or_default()
            .insert(fieldname.to_string());
    }

    /// Number of stored records of one entity type.
    pub fn count(&self, entity: EntityType) -> usize {
        self.state.records.get(&entity).map_or(0, BTreeMap::len)
    }
}

impl RecordStore for MemoryRecordStore {
    fn declared_fields(&mut self, entity: EntityType) -> Result<HashSet<String>> {
        let mut fields = entity.declared_fields();
        if let Some(custom) = self.state.custom_fields.get(&entity) {
            fields.extend(custom.iter().cloned());
        }
        Ok(fields)
    }

    fn get(&mut self, entity: EntityType, name: &str) -> Result<Option<Record>> {
        Ok(self
            .state
            .records
            .get(&entity)
            .and_then(|table| table.get(name))
            .cloned())
    }

    fn list(&mut self, entity: EntityType, filters: &[Filter]) -> Result<Vec<Record>> {
        let mut rows: Vec<Record> = self
            .state
            .records
            .get(&entity)
            .map(|table| {
                table
                    .values()
                    .filter(|record| filters.iter().all(|f| f.matches(record)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            a.get_str(MODIFIED_FIELD)
                .unwrap_or_default()
                .cmp(b.get_str(MODIFIED_FIELD).unwrap_or_default())
        });
        Ok(rows)
    }

    fn insert(&mut self, entity: EntityType, record: &Record) -> Result<()> {
        let name = record
            .record_name()
            .ok_or_else(|| Error::internal("Cannot insert a record without a name"))?
            .to_string();
        let table = self.state.records.entry(entity).or_default();
        if table.contains_key(&name) {
            return Err(Error::Database(DatabaseError::UniqueViolation(format!(
                "{} {}",
                entity, name
            ))));
        }
        table.insert(name, record.clone());
        Ok(())
    }

    fn update(&mut self, entity: EntityType, record: &Record) -> Result<()> {
        let name = record
            .record_name()
            .ok_or_else(|| Error::internal("Cannot update a record without a name"))?;
        let slot = self
            .state
            .records
            .get_mut(&entity)
            .and_then(|table| table.get_mut(name))
            .ok_or_else(|| Error::not_found(entity.as_str(), name))?;
        *slot = record.clone();
        Ok(())
    }

    fn delete(&mut self, entity: EntityType, name: &str) -> Result<bool> {
        Ok(self
            .state
            .records
            .get_mut(&entity)
            .and_then(|table| table.remove(name))
            .is_some())
    }

    fn append_sync_log(&mut self, entry: &SyncLogEntry) -> Result<()> {
        self.state.sync_log.push(entry.clone());
        Ok(())
    }

    fn list_sync_log(&mut self) -> Result<Vec<SyncLogEntry>> {
        Ok(self.state.sync_log.clone())
    }

    fn insert_sync_conflict(&mut self, conflict: &SyncConflict) -> Result<()> {
        self.state.sync_conflicts.push(conflict.clone());
        Ok(())
    }

    fn list_sync_conflicts(
        &mut self,
        status: Option<ConflictStatus>,
    ) -> Result<Vec<SyncConflict>> {
        Ok(self
            .state
            .sync_conflicts
            .iter()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn failed_transaction_restores_previous_state() {
        let mut store = MemoryRecordStore::new();
        store
            .insert(EntityType::Region, &record(json!({ "name": "Central" })))
            .unwrap();

        let result: Result<()> = store.transaction(|tx| {
            tx.insert(EntityType::Region, &record(json!({ "name": "North" })))?;
            tx.insert(EntityType::Region, &record(json!({ "name": "Central" })))
        });

        assert!(result.is_err());
        assert_eq!(store.count(EntityType::Region), 1);
        assert!(!store.exists(EntityType::Region, "North").unwrap());
    }

    #[test]
    fn list_orders_by_modified() {
        let mut store = MemoryRecordStore::new();
        store
            .insert(
                EntityType::Crop,
                &record(json!({ "name": "b", "modified": "2026-01-02T00:00:00.000000Z" })),
            )
            .unwrap();
        store
            .insert(
                EntityType::Crop,
                &record(json!({ "name": "a", "modified": "2026-01-03T00:00:00.000000Z" })),
            )
            .unwrap();
        let names: Vec<_> = store
            .list(EntityType::Crop, &[])
            .unwrap()
            .iter()
            .map(|r| r.record_name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn custom_fields_extend_declarations() {
        let mut store = MemoryRecordStore::new();
        assert!(!store
            .declared_fields(EntityType::Outgrower)
            .unwrap()
            .contains("nickname"));
        store.add_custom_field(EntityType::Outgrower, "nickname");
        assert!(store
            .declared_fields(EntityType::Outgrower)
            .unwrap()
            .contains("nickname"));
    }
}
