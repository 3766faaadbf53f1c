//! Pull path: `getSyncData`, `getModifiedRecords`, `getReferenceData` and
//! `checkConflicts`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, warn};
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::identity::{self, IdentityHints};
use crate::mapping;
use crate::records::{value_as_f64, Filter, Record, RecordExt, RecordStore, MODIFIED_FIELD};
use crate::schema::{canonical_store, resolve_entity, EntityType};
use crate::utils::time_utils::{format_timestamp, month_bounds, now_timestamp, parse_timestamp};

use super::model::{
    ConflictCheck, ConflictStatus, ModifiedRecordsRequest, ModifiedRecordsResponse, PullRequest,
    PullResponse, ReferenceDataResponse, SyncConflict,
};
use super::SyncEngine;

fn parse_watermark(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty() && *raw != "null") {
        Some(raw) => parse_timestamp(raw).map(Some),
        None => Ok(None),
    }
}

/// `[first day, first day of next month)` for the requested month.
fn month_window(month: Option<&Value>, year: Option<&Value>) -> Option<(NaiveDate, NaiveDate)> {
    let month = month.and_then(value_as_f64)? as u32;
    let year = year.and_then(value_as_f64)? as i32;
    let (first, last) = month_bounds(year, month)?;
    Some((first, last.succ_opt()?))
}

fn window_filters(field: &str, (start, end): (NaiveDate, NaiveDate)) -> [Filter; 2] {
    [
        Filter::gte(field, start.to_string()),
        Filter::lt(field, end.to_string()),
    ]
}

/// Parses the `doctypes` parameter: a list, a JSON-encoded list, or one name.
fn requested_entities(request: &ModifiedRecordsRequest) -> Result<Vec<EntityType>> {
    let names: Vec<String> = match (&request.doctypes, &request.doctype) {
        (Some(Value::Array(items)), _) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        (Some(Value::String(raw)), _) if raw.trim_start().starts_with('[') => {
            serde_json::from_str(raw)?
        }
        (Some(Value::String(raw)), _) => vec![raw.clone()],
        (_, Some(single)) => vec![single.clone()],
        _ => return Ok(EntityType::MODIFIED_DEFAULT.to_vec()),
    };

    let mut entities = Vec::with_capacity(names.len());
    for name in names {
        match resolve_entity(&name) {
            Ok(entity) => entities.push(entity),
            Err(err) => warn!("Skipping unknown doctype {}: {}", name, err),
        }
    }
    Ok(entities)
}

impl<'s, S: RecordStore> SyncEngine<'s, S> {
    /// `getSyncData`: changed records per synced entity type plus the full
    /// reference data, mobile-shaped and keyed by canonical store name.
    pub fn pull(&mut self, request: &PullRequest) -> Result<PullResponse> {
        let watermark = parse_watermark(request.last_sync.as_deref())?;
        let entities = match request.doctype.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(doctype) => vec![resolve_entity(doctype)?],
            None => EntityType::SYNCED.to_vec(),
        };
        let region_outgrowers = match request.officer_region.as_deref() {
            Some(region) if !region.trim().is_empty() => Some(self.outgrowers_in_region(region)?),
            _ => None,
        };

        let mut data = BTreeMap::new();
        for entity in entities {
            let outgrowers = region_outgrowers.as_deref();
            let rows = match self.pull_entity(entity, watermark, request, outgrowers) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("Pull of {} failed, returning no rows: {}", entity, err);
                    Vec::new()
                }
            };
            data.insert(
                canonical_store(entity).to_string(),
                rows.iter().map(|row| mapping::to_mobile(entity, row)).collect(),
            );
        }

        for entity in EntityType::REFERENCE {
            let rows = match self.store.list(entity, &[]) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("Reference data {} unavailable: {}", entity, err);
                    Vec::new()
                }
            };
            data.insert(
                canonical_store(entity).to_string(),
                rows.iter().map(|row| mapping::to_mobile(entity, row)).collect(),
            );
        }

        Ok(PullResponse {
            data,
            server_time: now_timestamp(),
            last_sync: request.last_sync.clone(),
        })
    }

    fn outgrowers_in_region(&mut self, region: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .list(EntityType::Outgrower, &[Filter::eq("region", region)])?
            .iter()
            .filter_map(|row| row.record_name().map(str::to_string))
            .collect())
    }

    fn pull_entity(
        &mut self,
        entity: EntityType,
        watermark: Option<DateTime<Utc>>,
        request: &PullRequest,
        region_outgrowers: Option<&[String]>,
    ) -> Result<Vec<Record>> {
        let mut filters = Vec::new();
        match entity {
            EntityType::Attendance => {
                let Some(window) = month_window(request.month.as_ref(), request.year.as_ref())
                else {
                    debug!("Attendance pull without a month window");
                    return Ok(Vec::new());
                };
                let hints =
                    IdentityHints::from_params(&request.hints, Some(self.session.user.as_str()));
                let employees = identity::resolve_employee_ids(&mut *self.store, &hints)?;
                if employees.is_empty() {
                    return Ok(Vec::new());
                }
                filters.push(Filter::is_in("employee", employees));
                filters.extend(window_filters("attendance_date", window));
            }
            EntityType::EmployeeCheckin => {
                let Some(window) = month_window(request.month.as_ref(), request.year.as_ref())
                else {
                    debug!("Checkin pull without a month window");
                    return Ok(Vec::new());
                };
                let hints =
                    IdentityHints::from_params(&request.hints, Some(self.session.user.as_str()));
                let users = identity::resolve_identity_emails(&hints);
                if users.is_empty() {
                    return Ok(Vec::new());
                }
                let declared = self.store.declared_fields(entity)?;
                filters.push(Filter::is_in(identity::user_key_field(&declared), users));
                filters.extend(window_filters("time", window));
            }
            _ => {
                if let Some(watermark) = watermark {
                    filters.push(Filter::gt(MODIFIED_FIELD, format_timestamp(watermark)));
                }
            }
        }

        if let Some(outgrowers) = region_outgrowers {
            match entity {
                EntityType::Outgrower => {
                    filters.push(Filter::is_in("name", outgrowers.iter().cloned()));
                }
                EntityType::FarmPlot => {
                    filters.push(Filter::is_in("outgrower", outgrowers.iter().cloned()));
                }
                _ => {}
            }
        }

        self.store.list(entity, &filters)
    }

    /// `getModifiedRecords`: canonical records changed since the watermark,
    /// keyed by entity type. Empty types are omitted.
    pub fn modified_records(&mut self, request: &ModifiedRecordsRequest) -> ModifiedRecordsResponse {
        match self.try_modified_records(request) {
            Ok(records) => ModifiedRecordsResponse {
                success: true,
                modified_records: Some(records),
                sync_timestamp: Some(now_timestamp()),
                error: None,
            },
            Err(err) => {
                error!("getModifiedRecords failed: {}", err);
                ModifiedRecordsResponse {
                    success: false,
                    modified_records: None,
                    sync_timestamp: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn try_modified_records(
        &mut self,
        request: &ModifiedRecordsRequest,
    ) -> Result<BTreeMap<String, Vec<Record>>> {
        let since = parse_watermark(request.last_sync_timestamp.as_deref())?
            .ok_or_else(|| Error::invalid_input("last_sync_timestamp is required"))?;
        let filters = [Filter::gt(MODIFIED_FIELD, format_timestamp(since))];

        let mut modified = BTreeMap::new();
        for entity in requested_entities(request)? {
            match self.store.list(entity, &filters) {
                Ok(rows) if rows.is_empty() => {}
                Ok(rows) => {
                    let rows = rows
                        .into_iter()
                        .map(|row| mapping::with_aliases(entity, row))
                        .collect();
                    modified.insert(entity.as_str().to_string(), rows);
                }
                Err(err) => warn!("Fetching modified {} failed: {}", entity, err),
            }
        }
        Ok(modified)
    }

    /// `getReferenceData`: every reference record, unfiltered.
    pub fn reference_data(&mut self) -> ReferenceDataResponse {
        let mut reference = BTreeMap::new();
        for entity in EntityType::REFERENCE {
            match self.store.list(entity, &[]) {
                Ok(rows) => {
                    reference.insert(entity.as_str().to_string(), rows);
                }
                Err(err) => warn!("Fetching reference {} failed: {}", entity, err),
            }
        }
        ReferenceDataResponse {
            success: true,
            reference_data: Some(reference),
            timestamp: Some(now_timestamp()),
            error: None,
        }
    }

    /// `checkConflicts`: is the server copy newer than the client's?
    pub fn check_conflicts(
        &mut self,
        entity_type: &str,
        record_id: &str,
        mobile_modified: &str,
    ) -> ConflictCheck {
        match self.try_check_conflicts(entity_type, record_id, mobile_modified) {
            Ok(check) => check,
            Err(err) => {
                error!("checkConflicts failed for {} {}: {}", entity_type, record_id, err);
                ConflictCheck {
                    error: Some(err.to_string()),
                    ..ConflictCheck::default()
                }
            }
        }
    }

    fn try_check_conflicts(
        &mut self,
        entity_type: &str,
        record_id: &str,
        mobile_modified: &str,
    ) -> Result<ConflictCheck> {
        let entity = resolve_entity(entity_type)?;
        let Some(server) = self.store.get(entity, record_id)? else {
            return Ok(ConflictCheck {
                reason: Some("not_found".to_string()),
                ..ConflictCheck::default()
            });
        };
        let mobile = parse_timestamp(mobile_modified)?;
        let server_modified = server.get_str(MODIFIED_FIELD).map(str::to_string);
        let newer = server_modified
            .as_deref()
            .and_then(|raw| parse_timestamp(raw).ok())
            .is_some_and(|modified| modified > mobile);

        if newer {
            return Ok(ConflictCheck {
                has_conflict: true,
                server_data: Some(server),
                server_modified,
                ..ConflictCheck::default()
            });
        }
        Ok(ConflictCheck::default())
    }

    /// Stored Sync Conflicts, optionally narrowed to one status.
    pub fn list_conflicts(&mut self, status: Option<ConflictStatus>) -> Result<Vec<SyncConflict>> {
        self.store.list_sync_conflicts(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn month_window_spans_the_calendar_month() {
        let (start, end) = month_window(Some(&json!("12")), Some(&json!(2025))).unwrap();
        assert_eq!(start.to_string(), "2025-12-01");
        assert_eq!(end.to_string(), "2026-01-01");
        assert!(month_window(Some(&json!(2)), None).is_none());
        assert!(month_window(None, Some(&json!(2026))).is_none());
    }

    #[test]
    fn watermark_treats_blank_as_absent() {
        assert!(parse_watermark(None).unwrap().is_none());
        assert!(parse_watermark(Some(" ")).unwrap().is_none());
        assert!(parse_watermark(Some("2026-01-01T00:00:00Z")).unwrap().is_some());
        assert!(parse_watermark(Some("last tuesday")).is_err());
    }

    #[test]
    fn doctypes_parameter_shapes() {
        let from_list = ModifiedRecordsRequest {
            doctypes: Some(json!(["Outgrower", "farm_plots", "Spaceship"])),
            ..Default::default()
        };
        assert_eq!(
            requested_entities(&from_list).unwrap(),
            vec![EntityType::Outgrower, EntityType::FarmPlot]
        );

        let from_json = ModifiedRecordsRequest {
            doctypes: Some(json!("[\"Crop Cycle\"]")),
            ..Default::default()
        };
        assert_eq!(requested_entities(&from_json).unwrap(), vec![EntityType::CropCycle]);

        let single = ModifiedRecordsRequest {
            doctype: Some("Attendance".to_string()),
            ..Default::default()
        };
        assert_eq!(requested_entities(&single).unwrap(), vec![EntityType::Attendance]);

        assert_eq!(
            requested_entities(&ModifiedRecordsRequest::default()).unwrap(),
            EntityType::MODIFIED_DEFAULT.to_vec()
        );
    }
}
