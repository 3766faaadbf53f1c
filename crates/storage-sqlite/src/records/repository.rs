use std::collections::{HashMap, HashSet};

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use serde_json::Value;

use fieldops_core::errors::{Error, Result};
use fieldops_core::records::{Condition, Filter, Record, RecordExt, RecordStore, MODIFIED_FIELD};
use fieldops_core::schema::EntityType;
use fieldops_core::sync::{ConflictStatus, SyncConflict, SyncLogEntry};

use super::model::{CustomFieldDB, RecordDB, SyncConflictDB, SyncLogDB};
use crate::errors::StorageError;
use crate::schema::{custom_fields, records, sync_conflicts, sync_log};

/// `RecordStore` over one SQLite connection.
///
/// Declared fields are cached per entity type for the lifetime of the store
/// and dropped whenever a custom field is added or a transaction rolls back.
pub struct SqliteRecordStore<'c> {
    conn: &'c mut SqliteConnection,
    field_cache: HashMap<EntityType, HashSet<String>>,
}

impl<'c> SqliteRecordStore<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self {
            conn,
            field_cache: HashMap::new(),
        }
    }

    /// Declares an extra field on an entity type. Idempotent.
    pub fn add_custom_field(&mut self, entity: EntityType, fieldname: &str) -> Result<()> {
        diesel::insert_or_ignore_into(custom_fields::table)
            .values(CustomFieldDB {
                entity_type: entity.as_str().to_string(),
                fieldname: fieldname.to_string(),
            })
            .execute(self.conn)
            .map_err(StorageError::from)?;
        self.field_cache.remove(&entity);
        debug!("Declared custom field {}.{}", entity, fieldname);
        Ok(())
    }

    fn load_custom_fields(&mut self, entity: EntityType) -> Result<Vec<String>> {
        Ok(custom_fields::table
            .filter(custom_fields::entity_type.eq(entity.as_str()))
            .select(custom_fields::fieldname)
            .load::<String>(self.conn)
            .map_err(StorageError::from)?)
    }
}

/// Lower bound on `modified` that can be pushed down into SQL.
fn modified_lower_bound(filters: &[Filter]) -> Option<&str> {
    filters.iter().find_map(|filter| match &filter.condition {
        Condition::Gt(Value::String(bound)) if filter.field == MODIFIED_FIELD => {
            Some(bound.as_str())
        }
        _ => None,
    })
}

fn record_name(record: &Record, action: &str) -> Result<String> {
    record
        .record_name()
        .map(str::to_string)
        .ok_or_else(|| Error::internal(format!("Cannot {} a record without a name", action)))
}

impl RecordStore for SqliteRecordStore<'_> {
    fn declared_fields(&mut self, entity: EntityType) -> Result<HashSet<String>> {
        if let Some(fields) = self.field_cache.get(&entity) {
            return Ok(fields.clone());
        }
        let mut fields = entity.declared_fields();
        fields.extend(self.load_custom_fields(entity)?);
        self.field_cache.insert(entity, fields.clone());
        Ok(fields)
    }

    fn get(&mut self, entity: EntityType, name: &str) -> Result<Option<Record>> {
        let row = records::table
            .find((entity.as_str(), name))
            .select(RecordDB::as_select())
            .first::<RecordDB>(self.conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(RecordDB::into_record).transpose()
    }

    fn exists(&mut self, entity: EntityType, name: &str) -> Result<bool> {
        let count: i64 = records::table
            .filter(records::entity_type.eq(entity.as_str()))
            .filter(records::name.eq(name))
            .count()
            .get_result(self.conn)
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn list(&mut self, entity: EntityType, filters: &[Filter]) -> Result<Vec<Record>> {
        let mut query = records::table
            .filter(records::entity_type.eq(entity.as_str()))
            .select(RecordDB::as_select())
            .order((records::modified.asc(), records::name.asc()))
            .into_boxed();
        if let Some(bound) = modified_lower_bound(filters) {
            query = query.filter(records::modified.gt(bound.to_string()));
        }
        let rows = query.load::<RecordDB>(self.conn).map_err(StorageError::from)?;

        let mut matched = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            if filters.iter().all(|filter| filter.matches(&record)) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    fn insert(&mut self, entity: EntityType, record: &Record) -> Result<()> {
        let name = record_name(record, "insert")?;
        let row = RecordDB::from_record(entity, &name, record)?;
        diesel::insert_into(records::table)
            .values(&row)
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn update(&mut self, entity: EntityType, record: &Record) -> Result<()> {
        let name = record_name(record, "update")?;
        let row = RecordDB::from_record(entity, &name, record)?;
        let affected = diesel::update(records::table.find((entity.as_str(), name.as_str())))
            .set((
                records::owner.eq(&row.owner),
                records::creation.eq(&row.creation),
                records::modified.eq(&row.modified),
                records::data.eq(&row.data),
            ))
            .execute(self.conn)
            .map_err(StorageError::from)?;
        if affected == 0 {
            return Err(Error::not_found(entity.as_str(), name));
        }
        Ok(())
    }

    fn delete(&mut self, entity: EntityType, name: &str) -> Result<bool> {
        let affected = diesel::delete(records::table.find((entity.as_str(), name)))
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(affected > 0)
    }

    fn append_sync_log(&mut self, entry: &SyncLogEntry) -> Result<()> {
        diesel::insert_into(sync_log::table)
            .values(SyncLogDB::from(entry))
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn list_sync_log(&mut self) -> Result<Vec<SyncLogEntry>> {
        sync_log::table
            .select(SyncLogDB::as_select())
            .order((sync_log::timestamp.asc(), sync_log::id.asc()))
            .load::<SyncLogDB>(self.conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(SyncLogEntry::try_from)
            .collect()
    }

    fn insert_sync_conflict(&mut self, conflict: &SyncConflict) -> Result<()> {
        diesel::insert_into(sync_conflicts::table)
            .values(SyncConflictDB::from_conflict(conflict)?)
            .execute(self.conn)
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn list_sync_conflicts(
        &mut self,
        status: Option<ConflictStatus>,
    ) -> Result<Vec<SyncConflict>> {
        let mut query = sync_conflicts::table
            .select(SyncConflictDB::as_select())
            .order((sync_conflicts::creation.asc(), sync_conflicts::id.asc()))
            .into_boxed();
        if let Some(status) = status {
            query = query.filter(sync_conflicts::status.eq(status.as_str()));
        }
        query
            .load::<SyncConflictDB>(self.conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(SyncConflict::try_from)
            .collect()
    }

    /// Nested calls become savepoints through diesel's transaction manager.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        AnsiTransactionManager::begin_transaction(self.conn).map_err(StorageError::from)?;
        match f(self) {
            Ok(value) => {
                if let Err(err) = AnsiTransactionManager::commit_transaction(self.conn) {
                    if let Err(rollback) = AnsiTransactionManager::rollback_transaction(self.conn)
                    {
                        warn!("Rollback after failed commit also failed: {}", rollback);
                    }
                    self.field_cache.clear();
                    return Err(StorageError::from(err).into());
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = AnsiTransactionManager::rollback_transaction(self.conn) {
                    warn!("Transaction rollback failed: {}", rollback);
                }
                self.field_cache.clear();
                Err(err)
            }
        }
    }
}
