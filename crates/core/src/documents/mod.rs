//! Record lifecycle: naming, server stamps and per-entity hooks around every
//! insert, update and delete.
//!
//! Writes made by the sync engine, the fulfillment cascade and administrative
//! callers all go through [`insert`], [`save`] and [`delete`]. Raw
//! [`RecordStore`] writes skip hooks and are reserved for derived-field
//! updates that must not recurse.

mod hooks;

pub use hooks::{CropCycleHook, CropRecipeHook, OutgrowerHook};

use log::debug;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::fulfillment::{DispatchHook, RequestHook};
use crate::geo::{FarmPlotHook, FieldVisitHook};
use crate::records::{
    value_as_key, Record, RecordExt, RecordStore, CREATION_FIELD, DOCTYPE_FIELD, MODIFIED_FIELD,
    NAME_FIELD, OWNER_FIELD,
};
use crate::schema::EntityType;
use crate::utils::time_utils::now_timestamp;

/// Per-entity lifecycle callbacks. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait RecordHook: Sync {
    fn before_insert(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        Ok(())
    }

    /// Runs before `before_save` when an existing record is overwritten.
    fn before_update(
        &self,
        store: &mut dyn RecordStore,
        previous: &Record,
        record: &mut Record,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs before every persist, insert and update alike.
    fn before_save(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        Ok(())
    }

    fn after_insert(&self, store: &mut dyn RecordStore, record: &Record) -> Result<()> {
        Ok(())
    }

    fn on_update(
        &self,
        store: &mut dyn RecordStore,
        previous: &Record,
        record: &Record,
    ) -> Result<()> {
        Ok(())
    }

    fn on_trash(&self, store: &mut dyn RecordStore, record: &Record) -> Result<()> {
        Ok(())
    }

    fn after_delete(&self, store: &mut dyn RecordStore, record: &Record) -> Result<()> {
        Ok(())
    }
}

static HOOK_REGISTRY: &[(EntityType, &dyn RecordHook)] = &[
    (EntityType::Outgrower, &OutgrowerHook),
    (EntityType::FarmPlot, &FarmPlotHook),
    (EntityType::CropCycle, &CropCycleHook),
    (EntityType::FieldVisit, &FieldVisitHook),
    (EntityType::CropRecipe, &CropRecipeHook),
    (EntityType::StageInputRequest, &RequestHook),
    (EntityType::StageInputDispatch, &DispatchHook),
];

fn hooks_for(entity: EntityType) -> impl Iterator<Item = &'static dyn RecordHook> {
    HOOK_REGISTRY
        .iter()
        .filter(move |(registered, _)| *registered == entity)
        .map(|(_, hook)| *hook)
}

/// Name for a new record: explicit `name`, else the identifier field, else a UUID v7.
pub fn assign_name(entity: EntityType, record: &Record) -> String {
    record
        .get(NAME_FIELD)
        .and_then(value_as_key)
        .or_else(|| {
            entity
                .id_field()
                .and_then(|field| record.get(field))
                .and_then(value_as_key)
        })
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

/// Inserts a new record and runs the insert hooks. Returns the stored record.
pub fn insert(
    store: &mut dyn RecordStore,
    entity: EntityType,
    mut record: Record,
    user: &str,
) -> Result<Record> {
    let name = assign_name(entity, &record);
    if let Some(id_field) = entity.id_field() {
        if record.is_blank(id_field) {
            record.insert(id_field.to_string(), Value::String(name.clone()));
        }
    }
    let now = now_timestamp();
    record.insert(NAME_FIELD.to_string(), Value::String(name));
    record.insert(DOCTYPE_FIELD.to_string(), Value::from(entity.as_str()));
    record.insert(CREATION_FIELD.to_string(), Value::String(now.clone()));
    record.insert(MODIFIED_FIELD.to_string(), Value::String(now));
    record.insert(OWNER_FIELD.to_string(), Value::from(user));
    record.insert("docstatus".to_string(), Value::from(0));

    for hook in hooks_for(entity) {
        hook.before_insert(store, &mut record)?;
    }
    for hook in hooks_for(entity) {
        hook.before_save(store, &mut record)?;
    }
    store.insert(entity, &record)?;
    for hook in hooks_for(entity) {
        hook.after_insert(store, &record)?;
    }
    debug!("Inserted {} {}", entity, record.record_name().unwrap_or_default());

    // after_insert hooks may have rewritten derived fields in place.
    let name = record.record_name().unwrap_or_default().to_string();
    Ok(store.get(entity, &name)?.unwrap_or(record))
}

/// Persists a full record over an existing one and runs the update hooks.
///
/// Server stamps (`creation`, `owner`, `doctype`) are carried over from the
/// stored version; `modified` is refreshed.
pub fn save(store: &mut dyn RecordStore, entity: EntityType, mut record: Record) -> Result<Record> {
    let name = record
        .record_name()
        .ok_or_else(|| Error::invalid_input(format!("{entity} record has no name")))?
        .to_string();
    let previous = store
        .get(entity, &name)?
        .ok_or_else(|| Error::not_found(entity.as_str(), &name))?;

    for field in [CREATION_FIELD, OWNER_FIELD, DOCTYPE_FIELD, "docstatus"] {
        if let Some(value) = previous.get(field) {
            record.insert(field.to_string(), value.clone());
        }
    }
    record.insert(MODIFIED_FIELD.to_string(), Value::String(now_timestamp()));

    let record = normalize(store, entity, &previous, record)?;
    store.update(entity, &record)?;
    for hook in hooks_for(entity) {
        hook.on_update(store, &previous, &record)?;
    }
    debug!("Updated {} {}", entity, name);

    Ok(store.get(entity, &name)?.unwrap_or(record))
}

/// Applies the update hooks to `record` without persisting it.
///
/// The result is what [`save`] would store, apart from the refreshed
/// `modified` stamp.
pub fn normalize(
    store: &mut dyn RecordStore,
    entity: EntityType,
    previous: &Record,
    mut record: Record,
) -> Result<Record> {
    for hook in hooks_for(entity) {
        hook.before_update(store, previous, &mut record)?;
    }
    for hook in hooks_for(entity) {
        hook.before_save(store, &mut record)?;
    }
    Ok(record)
}

/// Deletes a record with its hooks. Returns `false` when nothing was stored.
pub fn delete(store: &mut dyn RecordStore, entity: EntityType, name: &str) -> Result<bool> {
    let Some(record) = store.get(entity, name)? else {
        return Ok(false);
    };
    for hook in hooks_for(entity) {
        hook.on_trash(store, &record)?;
    }
    let removed = store.delete(entity, name)?;
    for hook in hooks_for(entity) {
        hook.after_delete(store, &record)?;
    }
    debug!("Deleted {} {}", entity, name);
    Ok(removed)
}

/// Overlays `changes` onto `existing`. Keys absent from `changes` are kept.
pub fn merge(existing: &Record, changes: &Record) -> Record {
    let mut merged = existing.clone();
    for (key, value) in changes {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MemoryRecordStore;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_names_from_identifier_field() {
        let mut store = MemoryRecordStore::new();
        let stored = insert(
            &mut store,
            EntityType::Outgrower,
            record(json!({ "outgrower_id": "OG-7", "full_name": "Yaw" })),
            "officer@example.com",
        )
        .unwrap();
        assert_eq!(stored["name"], json!("OG-7"));
        assert_eq!(stored["owner"], json!("officer@example.com"));
        assert_eq!(stored["doctype"], json!("Outgrower"));
        assert_eq!(stored["creation"], stored["modified"]);
    }

    #[test]
    fn insert_generates_name_and_fills_identifier() {
        let mut store = MemoryRecordStore::new();
        let stored = insert(
            &mut store,
            EntityType::StageActivity,
            record(json!({ "activity_type": "Weeding" })),
            "Administrator",
        )
        .unwrap();
        let name = stored.record_name().unwrap().to_string();
        assert!(Uuid::parse_str(&name).is_ok());
        assert_eq!(stored["activity_id"], json!(name));
    }

    #[test]
    fn save_keeps_server_stamps_and_refreshes_modified() {
        let mut store = MemoryRecordStore::new();
        let stored = insert(
            &mut store,
            EntityType::Region,
            record(json!({ "name": "North", "region_name": "North" })),
            "admin@example.com",
        )
        .unwrap();

        let mut changed = merge(&stored, &record(json!({ "region_name": "Northern" })));
        changed.insert("owner".to_string(), json!("someone-else"));
        changed.insert("modified".to_string(), json!("2000-01-01T00:00:00.000000Z"));
        let saved = save(&mut store, EntityType::Region, changed).unwrap();

        assert_eq!(saved["owner"], json!("admin@example.com"));
        assert_eq!(saved["region_name"], json!("Northern"));
        assert!(saved.get_str("modified") >= stored.get_str("modified"));
    }

    #[test]
    fn normalize_matches_the_stored_form_without_writing() {
        let mut store = MemoryRecordStore::new();
        let stored = insert(
            &mut store,
            EntityType::CropCycle,
            record(json!({ "crop_cycle_id": "CC-1", "status": "active", "start_date": "2020-01-01" })),
            "officer",
        )
        .unwrap();

        let resent = merge(&stored, &record(json!({ "status": "active" })));
        assert_ne!(resent, stored);
        let normalized = normalize(&mut store, EntityType::CropCycle, &stored, resent).unwrap();

        assert_eq!(normalized, stored);
        assert_eq!(
            store.get(EntityType::CropCycle, "CC-1").unwrap().unwrap()["modified"],
            stored["modified"]
        );
    }

    #[test]
    fn save_requires_an_existing_record() {
        let mut store = MemoryRecordStore::new();
        let err = save(&mut store, EntityType::Region, record(json!({ "name": "Nowhere" })))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_reports_missing_records() {
        let mut store = MemoryRecordStore::new();
        assert!(!delete(&mut store, EntityType::Crop, "Cassava").unwrap());
        insert(
            &mut store,
            EntityType::Crop,
            record(json!({ "name": "Cassava" })),
            "admin",
        )
        .unwrap();
        assert!(delete(&mut store, EntityType::Crop, "Cassava").unwrap());
        assert_eq!(store.count(EntityType::Crop), 0);
    }
}
