//! Schema mapping between the mobile client shape (camelCase, store-scoped)
//! and the canonical record shape (snake_case, entity-scoped).

mod transforms;

pub use transforms::{rules_for, ChildRows, NestedRule, NestedTransform, PhotoList, PolygonVertices};

use std::collections::HashSet;

use log::debug;
use serde_json::Value;

use crate::errors::Result;
use crate::identity;
use crate::records::{Record, RecordExt, RecordStore, DOCTYPE_FIELD, NAME_FIELD};
use crate::schema::{field_aliases, field_map, EntityType};

/// Fields the server owns; never accepted from a client.
pub const SERVER_OWNED_FIELDS: &[&str] = &[
    "creation",
    "modified",
    "owner",
    "docstatus",
    "parent",
    "parenttype",
    "parentfield",
    "idx",
    "doctype",
    "createdAt",
    "updatedAt",
];

/// Timestamp renames applied on the way out.
const TIMESTAMP_RENAMES: &[(&str, &str)] = &[("createdAt", "creation"), ("updatedAt", "modified")];

const USER_HINT_KEYS: &[&str] = &["userId", "user_id", "userEmail", "user_email", "email"];

/// Maps a client payload to canonical fields declared on `entity`.
///
/// Unknown fields are dropped silently. The only store access is the
/// single-user employee lookup for entity types with an `employee` link.
pub fn to_canonical<S>(store: &mut S, entity: EntityType, payload: &Record) -> Result<Record>
where
    S: RecordStore + ?Sized,
{
    let declared = store.declared_fields(entity)?;
    let mut record = map_inbound(entity, payload);

    if declared.contains("employee") && record.is_blank("employee") {
        let hint = USER_HINT_KEYS
            .iter()
            .find_map(|key| payload.get_str(key).or_else(|| record.get_str(key)))
            .map(str::to_string);
        if let Some(user) = hint {
            if let Some(employee) = identity::resolve_employee_for_user(store, &user)? {
                record.insert("employee".to_string(), Value::String(employee));
            } else {
                debug!("No employee linked to user {} for {}", user, entity);
            }
        }
    }

    Ok(retain_declared(record, &declared))
}

/// Store-free part of the inbound mapping: strip, nested transforms, field
/// map, per-entity normalization. Does not filter undeclared fields.
pub fn map_inbound(entity: EntityType, payload: &Record) -> Record {
    let mut source: Record = payload
        .iter()
        .filter(|(key, _)| !SERVER_OWNED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut record = Record::new();
    for rule in rules_for(entity) {
        if let Some(value) = source.remove(rule.mobile_key) {
            record.insert(rule.canonical_key.to_string(), rule.transform.inbound(&value));
        }
    }

    let map = field_map(entity);
    // Explicit canonical keys win over their mobile spelling.
    for (key, value) in &source {
        let renamed = map
            .iter()
            .any(|(mobile, canonical)| *mobile == key.as_str() && *canonical != key.as_str());
        if !renamed {
            record.insert(key.clone(), value.clone());
        }
    }
    for (mobile, canonical) in map {
        if let Some(value) = source.get(*mobile) {
            if !record.contains_key(*canonical) {
                record.insert(canonical.to_string(), value.clone());
            }
        }
    }

    normalize(entity, &mut record, payload);
    record
}

fn normalize(entity: EntityType, record: &mut Record, payload: &Record) {
    match entity {
        EntityType::StageInputRequest | EntityType::StageInputDispatch => {
            if record.is_blank("input_name") {
                if let Some(input_type) = record.get("input_type").cloned() {
                    record.insert("input_name".to_string(), input_type);
                }
            }
            let quantity_field = if entity == EntityType::StageInputRequest {
                "quantity_needed"
            } else {
                "quantity_dispatched"
            };
            if record.is_blank(quantity_field) {
                if let Some(quantity) = payload.get("quantity").filter(|v| !v.is_null()) {
                    record.insert(quantity_field.to_string(), quantity.clone());
                }
            }
            if entity == EntityType::StageInputDispatch && record.is_blank("input_request") {
                if let Some(request) = ["requestId", "request_id"]
                    .iter()
                    .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
                {
                    record.insert("input_request".to_string(), request.clone());
                }
            }
        }
        EntityType::FieldVisit => {
            if let Some(status) = payload.get_str("status") {
                let visit_status = if status.trim().eq_ignore_ascii_case("completed") {
                    "Submitted"
                } else {
                    "Draft"
                };
                record.insert("visit_status".to_string(), Value::from(visit_status));
            }
        }
        _ => {}
    }
}

fn retain_declared(record: Record, declared: &HashSet<String>) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| {
            key == NAME_FIELD || key == DOCTYPE_FIELD || declared.contains(key.as_str())
        })
        .collect()
}

/// Maps a canonical record to the shape a mobile client stores.
pub fn to_mobile(entity: EntityType, record: &Record) -> Record {
    let mut source = record.clone();
    let mut out = Record::new();

    for (mobile, canonical) in TIMESTAMP_RENAMES {
        if let Some(value) = source.remove(*canonical) {
            out.insert(mobile.to_string(), value);
        }
    }
    for rule in rules_for(entity) {
        let value = source.remove(rule.canonical_key).unwrap_or(Value::Null);
        out.insert(rule.mobile_key.to_string(), rule.transform.outbound(&value));
    }

    let map = field_map(entity);
    let aliases = field_aliases(entity);
    for (key, value) in source {
        if SERVER_OWNED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match map.iter().find(|(_, canonical)| *canonical == key) {
            Some((mobile, _)) => {
                if aliases.iter().any(|(_, alias)| *alias == key) {
                    out.insert(key.clone(), value.clone());
                }
                out.insert(mobile.to_string(), value);
            }
            None => {
                out.entry(key).or_insert(value);
            }
        }
    }

    if entity == EntityType::FieldVisit && out.is_blank("status") {
        if let Some(visit_status) = out.get_str("visit_status") {
            let status = if visit_status == "Submitted" {
                "completed"
            } else {
                "draft"
            };
            out.insert("status".to_string(), Value::from(status));
        }
    }

    out
}

/// Adds the mobile spelling of aliased fields to a canonical record.
pub fn with_aliases(entity: EntityType, mut record: Record) -> Record {
    for (mobile, canonical) in field_aliases(entity) {
        if let Some(value) = record.get(*canonical).cloned() {
            record.insert(mobile.to_string(), value);
        }
    }
    record
}
