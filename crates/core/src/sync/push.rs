//! Push path: mobile `pushSyncData` and the legacy `bulkSync`.

use log::{debug, error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::documents;
use crate::errors::{Error, Result, ValidationError};
use crate::mapping::{self, SERVER_OWNED_FIELDS};
use crate::records::{value_as_key, Record, RecordExt, RecordStore, MODIFIED_FIELD, NAME_FIELD};
use crate::schema::{resolve_entity, EntityType};
use crate::utils::time_utils::{format_timestamp, now_timestamp, parse_timestamp, parse_timestamp_value};

use super::model::{
    BatchResponse, BulkSyncItem, BulkSyncResponse, BulkSyncResult, BulkSyncStatus, ConflictStatus,
    PushItem, PushItemResult, PushResponse, PushStatus, SyncConflict, SyncLogEntry, SyncLogStatus,
    SyncOperation,
};
use super::SyncEngine;

/// Payload keys that carry the client's last-known modification time.
const CLIENT_MODIFIED_KEYS: &[&str] = &["updatedAt", "updated_at", "modified", "lastModified"];

/// What a single pushed record did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    Saved(String),
    Unchanged(String),
    Deleted(String),
    Conflict(String),
}

impl Applied {
    fn name(&self) -> &str {
        match self {
            Applied::Saved(name)
            | Applied::Unchanged(name)
            | Applied::Deleted(name)
            | Applied::Conflict(name) => name,
        }
    }
}

/// Unwraps the batch envelope: `{"data": [...]}`, a bare list, or either as a JSON string.
fn batch_items(data: &Value) -> Result<Vec<Value>> {
    let data = match data {
        Value::String(raw) => serde_json::from_str::<Value>(raw)?,
        other => other.clone(),
    };
    let items = match data {
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::String(raw)) => serde_json::from_str::<Value>(&raw)?,
            Some(inner) => inner,
            None => return Err(ValidationError::MissingField("data".to_string()).into()),
        },
        other => other,
    };
    match items {
        Value::Array(items) => Ok(items),
        _ => Err(Error::invalid_input("sync data must be a list of records")),
    }
}

fn payload_object(payload: Option<&Value>) -> Result<Record> {
    match payload {
        None | Some(Value::Null) => Ok(Record::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err(Error::invalid_input("payload must be an object")),
    }
}

fn log_entry(
    user: &str,
    entity_type: &str,
    record_id: Option<String>,
    operation: &str,
    status: SyncLogStatus,
    error_message: Option<String>,
) -> SyncLogEntry {
    SyncLogEntry {
        name: Uuid::now_v7().to_string(),
        user: user.to_string(),
        entity_type: entity_type.to_string(),
        record_id,
        operation: operation.to_string(),
        status,
        error_message,
        timestamp: now_timestamp(),
    }
}

fn append_log<S: RecordStore>(store: &mut S, entry: &SyncLogEntry) {
    if let Err(err) = store.append_sync_log(entry) {
        warn!(
            "Failed to write sync log for {} {:?}: {}",
            entry.entity_type, entry.record_id, err
        );
    }
}

/// Target record id: explicit record id, else the payload's identifier field, else `name`.
fn target_id(entity: EntityType, item: &PushItem, mapped: &Record) -> Option<String> {
    item.record_id
        .as_ref()
        .and_then(value_as_key)
        .or_else(|| {
            entity
                .id_field()
                .and_then(|field| mapped.get(field))
                .and_then(value_as_key)
        })
        .or_else(|| mapped.get(NAME_FIELD).and_then(value_as_key))
}

fn client_modified(item: &PushItem, payload: &Record) -> Option<chrono::DateTime<chrono::Utc>> {
    item.last_modified
        .as_ref()
        .and_then(parse_timestamp_value)
        .or_else(|| {
            CLIENT_MODIFIED_KEYS
                .iter()
                .find_map(|key| payload.get(*key).and_then(parse_timestamp_value))
        })
}

fn apply_push(store: &mut dyn RecordStore, user: &str, item: &PushItem) -> Result<Applied> {
    let store_name = item
        .store_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ValidationError::MissingField("storeName".to_string()))?;
    let entity = resolve_entity(store_name)?;
    let operation = match item.operation.as_deref() {
        None => SyncOperation::Sync,
        Some(raw) => SyncOperation::parse(raw).ok_or_else(|| ValidationError::InvalidValue {
            field: "operation".to_string(),
            message: format!("unsupported operation '{raw}'"),
        })?,
    };
    let payload = payload_object(item.payload.as_ref())?;

    if operation == SyncOperation::Delete {
        let mapped = mapping::map_inbound(entity, &payload);
        let name = target_id(entity, item, &mapped)
            .ok_or_else(|| ValidationError::MissingField("recordId".to_string()))?;
        if !documents::delete(store, entity, &name)? {
            debug!("{} {} already absent", entity, name);
        }
        return Ok(Applied::Deleted(name));
    }

    let mut mapped = mapping::to_canonical(store, entity, &payload)?;
    let target = target_id(entity, item, &mapped);

    if let Some(name) = target.as_deref() {
        if let Some(existing) = store.get(entity, name)? {
            mapped.remove(NAME_FIELD);
            let merged = documents::merge(&existing, &mapped);
            // Compare in stored form so hook-derived fields do not count as changes.
            if documents::normalize(store, entity, &existing, merged.clone())? == existing {
                return Ok(Applied::Unchanged(name.to_string()));
            }

            let server_modified = existing.get_str(MODIFIED_FIELD).map(str::to_string);
            let client_modified = client_modified(item, &payload);
            if let (Some(client), Some(server), false) = (
                client_modified,
                server_modified.as_deref().and_then(|raw| parse_timestamp(raw).ok()),
                item.force,
            ) {
                if server > client {
                    let conflict = SyncConflict {
                        name: Uuid::now_v7().to_string(),
                        entity_type: entity.as_str().to_string(),
                        record_id: name.to_string(),
                        user: user.to_string(),
                        client_data: Value::Object(payload),
                        server_data: Value::Object(existing),
                        client_modified: Some(format_timestamp(client)),
                        server_modified,
                        status: ConflictStatus::Pending,
                        creation: now_timestamp(),
                    };
                    store.insert_sync_conflict(&conflict)?;
                    info!("Conflict on {} {}: server copy is newer", entity, name);
                    return Ok(Applied::Conflict(name.to_string()));
                }
            }

            let saved = documents::save(store, entity, merged)?;
            return Ok(Applied::Saved(
                saved.record_name().unwrap_or(name).to_string(),
            ));
        }
        mapped.insert(NAME_FIELD.to_string(), Value::String(name.to_string()));
    }

    let inserted = documents::insert(store, entity, mapped, user)?;
    Ok(Applied::Saved(
        inserted.record_name().unwrap_or_default().to_string(),
    ))
}

fn apply_bulk(
    store: &mut dyn RecordStore,
    user: &str,
    item: &BulkSyncItem,
) -> Result<(BulkSyncStatus, Option<String>, Option<String>)> {
    let doctype = item
        .doctype
        .as_deref()
        .ok_or_else(|| ValidationError::MissingField("doctype".to_string()))?;
    let entity = resolve_entity(doctype)?;
    let doc = payload_object(item.doc.as_ref())?;
    let name = doc.get(NAME_FIELD).and_then(value_as_key);

    let declared = store.declared_fields(entity)?;
    let fields: Record = doc
        .into_iter()
        .filter(|(key, _)| {
            key == NAME_FIELD
                || (!SERVER_OWNED_FIELDS.contains(&key.as_str()) && declared.contains(key))
        })
        .collect();

    match item.operation.as_deref().and_then(SyncOperation::parse) {
        Some(SyncOperation::Create) => {
            let stored = documents::insert(store, entity, fields, user)?;
            Ok((BulkSyncStatus::Success, stored.record_name().map(str::to_string), None))
        }
        Some(SyncOperation::Update) => {
            let existing = match name.as_deref() {
                Some(name) => store.get(entity, name)?,
                None => None,
            };
            let stored = match existing {
                Some(existing) => {
                    documents::save(store, entity, documents::merge(&existing, &fields))?
                }
                None => documents::insert(store, entity, fields, user)?,
            };
            Ok((BulkSyncStatus::Success, stored.record_name().map(str::to_string), None))
        }
        Some(SyncOperation::Delete) => {
            let name = name.ok_or_else(|| ValidationError::MissingField("name".to_string()))?;
            if documents::delete(store, entity, &name)? {
                Ok((BulkSyncStatus::Success, Some(name), None))
            } else {
                let message = format!("Document {} {} not found", entity, name);
                Ok((BulkSyncStatus::NotFound, None, Some(message)))
            }
        }
        _ => Err(ValidationError::InvalidValue {
            field: "operation".to_string(),
            message: format!(
                "unsupported operation '{}'",
                item.operation.as_deref().unwrap_or_default()
            ),
        }
        .into()),
    }
}

impl<'s, S: RecordStore> SyncEngine<'s, S> {
    /// `pushSyncData`: create-or-update or delete each record independently.
    ///
    /// Per-record failures are reported in-band; only envelope or transaction
    /// failures roll the whole batch back.
    pub fn push(&mut self, data: &Value) -> PushResponse {
        let items = match batch_items(data) {
            Ok(items) => items,
            Err(err) => {
                error!("Push rejected: {}", err);
                return BatchResponse::failed(err.to_string());
            }
        };
        let user = self.session.user.clone();

        let outcome = self.store.transaction(|tx| {
            let mut results = Vec::with_capacity(items.len());
            for raw in &items {
                let (result, entry) = push_one(tx, &user, raw);
                append_log(tx, &entry);
                results.push(result);
            }
            Ok(results)
        });

        match outcome {
            Ok(results) => {
                info!("Push by {}: {} record(s) processed", user, results.len());
                BatchResponse::completed(results)
            }
            Err(err) => {
                error!("Push batch rolled back: {}", err);
                BatchResponse::failed(err.to_string())
            }
        }
    }

    /// Legacy `bulkSync` over canonical documents.
    pub fn bulk_sync(&mut self, data: &Value) -> BulkSyncResponse {
        let items = match batch_items(data) {
            Ok(items) => items,
            Err(err) => {
                error!("Bulk sync rejected: {}", err);
                return BatchResponse::failed(err.to_string());
            }
        };
        let user = self.session.user.clone();

        let outcome = self.store.transaction(|tx| {
            let mut results = Vec::with_capacity(items.len());
            for raw in &items {
                let (result, entry) = bulk_one(tx, &user, raw);
                append_log(tx, &entry);
                results.push(result);
            }
            Ok(results)
        });

        match outcome {
            Ok(results) => BatchResponse::completed(results),
            Err(err) => {
                error!("Bulk sync rolled back: {}", err);
                BatchResponse::failed(err.to_string())
            }
        }
    }
}

fn push_one<S: RecordStore>(tx: &mut S, user: &str, raw: &Value) -> (PushItemResult, SyncLogEntry) {
    let parsed: Result<PushItem> = serde_json::from_value(raw.clone()).map_err(Error::from);
    let (doctype, operation, fallback_id) = match &parsed {
        Ok(item) => (
            item.store_name
                .as_deref()
                .map(|store| {
                    resolve_entity(store)
                        .map(|entity| entity.as_str().to_string())
                        .unwrap_or_else(|_| store.to_string())
                })
                .unwrap_or_default(),
            item.operation
                .as_deref()
                .and_then(SyncOperation::parse)
                .unwrap_or(SyncOperation::Sync)
                .as_str(),
            item.record_id.as_ref().and_then(value_as_key).or_else(|| {
                item.payload
                    .as_ref()
                    .and_then(|payload| payload.get(NAME_FIELD))
                    .and_then(value_as_key)
            }),
        ),
        Err(_) => (String::new(), SyncOperation::Sync.as_str(), None),
    };

    let outcome = parsed.and_then(|item| tx.transaction(|sp| apply_push(sp, user, &item)));
    match outcome {
        Ok(applied) => {
            let (status, log_status) = match &applied {
                Applied::Saved(_) | Applied::Unchanged(_) => {
                    (PushStatus::Success, SyncLogStatus::Success)
                }
                Applied::Deleted(_) => (PushStatus::Deleted, SyncLogStatus::Success),
                Applied::Conflict(_) => (PushStatus::Conflict, SyncLogStatus::Conflict),
            };
            let name = applied.name().to_string();
            let error = (status == PushStatus::Conflict)
                .then(|| "Server record was modified after the client copy".to_string());
            (
                PushItemResult {
                    status,
                    doctype: doctype.clone(),
                    name: Some(name.clone()),
                    error: error.clone(),
                },
                log_entry(user, &doctype, Some(name), operation, log_status, error),
            )
        }
        Err(err) => {
            warn!("Push of {} {:?} failed: {}", doctype, fallback_id, err);
            let message = err.to_string();
            (
                PushItemResult {
                    status: PushStatus::Error,
                    doctype: doctype.clone(),
                    name: fallback_id.clone(),
                    error: Some(message.clone()),
                },
                log_entry(
                    user,
                    &doctype,
                    fallback_id,
                    operation,
                    SyncLogStatus::Failed,
                    Some(message),
                ),
            )
        }
    }
}

fn bulk_one<S: RecordStore>(tx: &mut S, user: &str, raw: &Value) -> (BulkSyncResult, SyncLogEntry) {
    let parsed: Result<BulkSyncItem> = serde_json::from_value(raw.clone()).map_err(Error::from);
    let (doctype, operation, doc_name) = match &parsed {
        Ok(item) => (
            item.doctype.clone(),
            item.operation.clone(),
            item.doc
                .as_ref()
                .and_then(|doc| doc.get(NAME_FIELD))
                .and_then(value_as_key),
        ),
        Err(_) => (None, None, None),
    };
    let log_doctype = doctype.clone().unwrap_or_default();
    let log_operation = operation.clone().unwrap_or_default();

    let outcome = parsed.and_then(|item| tx.transaction(|sp| apply_bulk(sp, user, &item)));
    match outcome {
        Ok((status, name, message)) => {
            let record_id = name.clone().or_else(|| doc_name.clone());
            (
                BulkSyncResult {
                    doctype,
                    operation,
                    status,
                    name,
                    message,
                },
                log_entry(
                    user,
                    &log_doctype,
                    record_id,
                    &log_operation,
                    SyncLogStatus::Success,
                    None,
                ),
            )
        }
        Err(err) => {
            warn!("Bulk sync of {} {:?} failed: {}", log_doctype, doc_name, err);
            let message = err.to_string();
            (
                BulkSyncResult {
                    doctype,
                    operation,
                    status: BulkSyncStatus::Error,
                    name: None,
                    message: Some(message.clone()),
                },
                log_entry(
                    user,
                    &log_doctype,
                    doc_name,
                    &log_operation,
                    SyncLogStatus::Failed,
                    Some(message),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_accepts_object_list_and_string() {
        assert_eq!(batch_items(&json!({ "data": [1, 2] })).unwrap().len(), 2);
        assert_eq!(batch_items(&json!([1])).unwrap().len(), 1);
        assert_eq!(batch_items(&json!("{\"data\": [1, 2, 3]}")).unwrap().len(), 3);
        assert_eq!(batch_items(&json!({ "data": "[1]" })).unwrap().len(), 1);
    }

    #[test]
    fn malformed_envelopes_are_batch_errors() {
        assert!(batch_items(&json!({ "records": [] })).is_err());
        assert!(batch_items(&json!({ "data": { "storeName": "outgrowers" } })).is_err());
        assert!(batch_items(&json!("not json")).is_err());
    }
}
