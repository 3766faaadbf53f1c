//! Database models for records, custom fields, Sync Log and Sync Conflicts.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use fieldops_core::errors::{Error, Result};
use fieldops_core::records::{Record, RecordExt, CREATION_FIELD, MODIFIED_FIELD, OWNER_FIELD};
use fieldops_core::schema::EntityType;
use fieldops_core::sync::{ConflictStatus, SyncConflict, SyncLogEntry, SyncLogStatus};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(entity_type, name))]
#[diesel(table_name = crate::schema::records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RecordDB {
    pub entity_type: String,
    pub name: String,
    pub owner: Option<String>,
    pub creation: String,
    pub modified: String,
    pub data: String,
}

impl RecordDB {
    pub fn from_record(entity: EntityType, name: &str, record: &Record) -> Result<Self> {
        Ok(Self {
            entity_type: entity.as_str().to_string(),
            name: name.to_string(),
            owner: record.get_str(OWNER_FIELD).map(str::to_string),
            creation: record.get_str(CREATION_FIELD).unwrap_or_default().to_string(),
            modified: record.get_str(MODIFIED_FIELD).unwrap_or_default().to_string(),
            data: serde_json::to_string(record)?,
        })
    }

    pub fn into_record(self) -> Result<Record> {
        Ok(serde_json::from_str(&self.data)?)
    }
}

#[derive(Queryable, Insertable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::custom_fields)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CustomFieldDB {
    pub entity_type: String,
    pub fieldname: String,
}

#[derive(Queryable, Insertable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::sync_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncLogDB {
    pub id: String,
    pub user: String,
    pub entity_type: String,
    pub record_id: Option<String>,
    pub operation: String,
    pub status: String,
    pub error_message: Option<String>,
    pub timestamp: String,
}

impl From<&SyncLogEntry> for SyncLogDB {
    fn from(entry: &SyncLogEntry) -> Self {
        Self {
            id: entry.name.clone(),
            user: entry.user.clone(),
            entity_type: entry.entity_type.clone(),
            record_id: entry.record_id.clone(),
            operation: entry.operation.clone(),
            status: entry.status.as_str().to_string(),
            error_message: entry.error_message.clone(),
            timestamp: entry.timestamp.clone(),
        }
    }
}

impl TryFrom<SyncLogDB> for SyncLogEntry {
    type Error = Error;

    fn try_from(row: SyncLogDB) -> Result<Self> {
        let status = SyncLogStatus::parse(&row.status).ok_or_else(|| {
            Error::internal(format!("Unknown sync log status '{}'", row.status))
        })?;
        Ok(SyncLogEntry {
            name: row.id,
            user: row.user,
            entity_type: row.entity_type,
            record_id: row.record_id,
            operation: row.operation,
            status,
            error_message: row.error_message,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Queryable, Insertable, Selectable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::sync_conflicts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncConflictDB {
    pub id: String,
    pub entity_type: String,
    pub record_id: String,
    pub user: String,
    pub client_data: String,
    pub server_data: String,
    pub client_modified: Option<String>,
    pub server_modified: Option<String>,
    pub status: String,
    pub creation: String,
}

impl SyncConflictDB {
    pub fn from_conflict(conflict: &SyncConflict) -> Result<Self> {
        Ok(Self {
            id: conflict.name.clone(),
            entity_type: conflict.entity_type.clone(),
            record_id: conflict.record_id.clone(),
            user: conflict.user.clone(),
            client_data: serde_json::to_string(&conflict.client_data)?,
            server_data: serde_json::to_string(&conflict.server_data)?,
            client_modified: conflict.client_modified.clone(),
            server_modified: conflict.server_modified.clone(),
            status: conflict.status.as_str().to_string(),
            creation: conflict.creation.clone(),
        })
    }
}

impl TryFrom<SyncConflictDB> for SyncConflict {
    type Error = Error;

    fn try_from(row: SyncConflictDB) -> Result<Self> {
        let status = ConflictStatus::parse(&row.status).ok_or_else(|| {
            Error::internal(format!("Unknown conflict status '{}'", row.status))
        })?;
        Ok(SyncConflict {
            name: row.id,
            entity_type: row.entity_type,
            record_id: row.record_id,
            user: row.user,
            client_data: serde_json::from_str(&row.client_data)?,
            server_data: serde_json::from_str(&row.server_data)?,
            client_modified: row.client_modified,
            server_modified: row.server_modified,
            status,
            creation: row.creation,
        })
    }
}
