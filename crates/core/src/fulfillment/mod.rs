//! Fulfillment cascade between stage input requests and their dispatches.
//!
//! A request's `quantity_dispatched`, `quantity_remaining` and `status` are
//! re-aggregated from the live set of linked dispatches on every dispatch
//! change. There is no running counter.

use std::fmt;

use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::RecordHook;
use crate::errors::{Error, Result};
use crate::records::{decimal_to_value, Filter, Record, RecordExt, RecordStore};
use crate::schema::EntityType;

/// Request status, derived purely from quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentStatus {
    Pending,
    #[serde(rename = "Partially Fulfilled")]
    PartiallyFulfilled,
    Fulfilled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "Pending",
            FulfillmentStatus::PartiallyFulfilled => "Partially Fulfilled",
            FulfillmentStatus::Fulfilled => "Fulfilled",
        }
    }

    /// Status implied by the aggregate, or `None` to keep the current one.
    pub fn derive(dispatched: Decimal, remaining: Decimal) -> Option<Self> {
        if remaining <= Decimal::ZERO {
            Some(FulfillmentStatus::Fulfilled)
        } else if dispatched > Decimal::ZERO {
            Some(FulfillmentStatus::PartiallyFulfilled)
        } else {
            None
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate over the dispatches linked to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fulfillment {
    pub needed: Decimal,
    pub dispatched: Decimal,
    pub remaining: Decimal,
}

/// Sums the dispatches currently linked to `request_name`.
pub fn aggregate(
    store: &mut dyn RecordStore,
    request_name: &str,
    needed: Decimal,
) -> Result<Fulfillment> {
    let dispatched: Decimal = store
        .list(
            EntityType::StageInputDispatch,
            &[Filter::eq("input_request", request_name)],
        )?
        .iter()
        .map(|dispatch| dispatch.get_decimal("quantity_dispatched").unwrap_or_default())
        .sum();
    Ok(Fulfillment {
        needed,
        dispatched,
        remaining: needed - dispatched,
    })
}

/// Re-aggregates one request and writes the derived fields back without
/// running hooks. Returns the updated request.
pub fn recompute_request(store: &mut dyn RecordStore, request_name: &str) -> Result<Record> {
    let mut request = store
        .get(EntityType::StageInputRequest, request_name)?
        .ok_or_else(|| Error::not_found(EntityType::StageInputRequest.as_str(), request_name))?;

    let needed = request.get_decimal("quantity_needed").unwrap_or_default();
    let totals = aggregate(store, request_name, needed)?;
    apply(&mut request, &totals);
    store.update(EntityType::StageInputRequest, &request)?;
    debug!(
        "Request {} dispatched {} of {} ({})",
        request_name,
        totals.dispatched,
        totals.needed,
        request.get_str("status").unwrap_or_default()
    );
    Ok(request)
}

fn apply(request: &mut Record, totals: &Fulfillment) {
    request.insert(
        "quantity_dispatched".to_string(),
        decimal_to_value(totals.dispatched),
    );
    request.insert(
        "quantity_remaining".to_string(),
        decimal_to_value(totals.remaining),
    );
    if let Some(status) = FulfillmentStatus::derive(totals.dispatched, totals.remaining) {
        request.insert("status".to_string(), Value::from(status.as_str()));
    }
}

/// Initializes the aggregate on new requests and re-derives it on update.
pub struct RequestHook;

impl RecordHook for RequestHook {
    fn before_insert(&self, _store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let needed = record.get_decimal("quantity_needed").unwrap_or_default();
        record.insert("quantity_dispatched".to_string(), Value::from(0));
        record.insert("quantity_remaining".to_string(), decimal_to_value(needed));
        if record.is_blank("status") {
            record.insert(
                "status".to_string(),
                Value::from(FulfillmentStatus::Pending.as_str()),
            );
        }
        Ok(())
    }

    fn on_update(
        &self,
        store: &mut dyn RecordStore,
        _previous: &Record,
        record: &Record,
    ) -> Result<()> {
        if let Some(name) = record.record_name() {
            recompute_request(store, name)?;
        }
        Ok(())
    }
}

/// Request fields copied onto a dispatch when it is linked.
const SNAPSHOT_FIELDS: [&str; 3] = ["crop_cycle", "stage", "input_name"];

/// Snapshots request fields onto new dispatches and cascades every change.
pub struct DispatchHook;

impl DispatchHook {
    fn cascade(store: &mut dyn RecordStore, request_name: Option<&str>) -> Result<()> {
        match request_name {
            Some(name) => recompute_request(store, name).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl RecordHook for DispatchHook {
    fn before_insert(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let Some(request_name) = record.get_str("input_request").map(str::to_string) else {
            return Ok(());
        };
        let request = store
            .get(EntityType::StageInputRequest, &request_name)?
            .ok_or_else(|| Error::not_found(EntityType::StageInputRequest.as_str(), &request_name))?;
        for field in SNAPSHOT_FIELDS {
            let value = request.get(field).cloned().unwrap_or(Value::Null);
            record.insert(field.to_string(), value);
        }
        Ok(())
    }

    fn before_update(
        &self,
        _store: &mut dyn RecordStore,
        previous: &Record,
        record: &mut Record,
    ) -> Result<()> {
        // The snapshot only moves with the request link.
        if previous.get_str("input_request") != record.get_str("input_request") {
            return Ok(());
        }
        for field in SNAPSHOT_FIELDS {
            let value = previous.get(field).cloned().unwrap_or(Value::Null);
            record.insert(field.to_string(), value);
        }
        Ok(())
    }

    fn after_insert(&self, store: &mut dyn RecordStore, record: &Record) -> Result<()> {
        Self::cascade(store, record.get_str("input_request"))
    }

    fn on_update(
        &self,
        store: &mut dyn RecordStore,
        previous: &Record,
        record: &Record,
    ) -> Result<()> {
        let current = record.get_str("input_request");
        Self::cascade(store, current)?;
        let old = previous.get_str("input_request");
        if old != current {
            Self::cascade(store, old)?;
        }
        Ok(())
    }

    fn after_delete(&self, store: &mut dyn RecordStore, record: &Record) -> Result<()> {
        match Self::cascade(store, record.get_str("input_request")) {
            Err(err) if err.is_not_found() => {
                warn!(
                    "Dispatch {} referenced a missing request: {}",
                    record.record_name().unwrap_or_default(),
                    err
                );
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::records::MemoryRecordStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn new_request(store: &mut MemoryRecordStore, needed: i64) -> Record {
        documents::insert(
            store,
            EntityType::StageInputRequest,
            record(json!({
                "request_id": "REQ-1",
                "crop_cycle": "CC-1",
                "stage": "Planting",
                "input_name": "NPK",
                "quantity_needed": needed
            })),
            "officer",
        )
        .unwrap()
    }

    fn dispatch(store: &mut MemoryRecordStore, id: &str, quantity: i64) {
        documents::insert(
            store,
            EntityType::StageInputDispatch,
            record(json!({
                "dispatch_id": id,
                "input_request": "REQ-1",
                "quantity_dispatched": quantity
            })),
            "storekeeper",
        )
        .unwrap();
    }

    fn request(store: &mut MemoryRecordStore) -> Record {
        store
            .get(EntityType::StageInputRequest, "REQ-1")
            .unwrap()
            .unwrap()
    }

    #[test]
    fn new_request_starts_pending() {
        let mut store = MemoryRecordStore::new();
        let created = new_request(&mut store, 100);
        assert_eq!(created["status"], json!("Pending"));
        assert_eq!(created.get_decimal("quantity_dispatched"), Some(dec!(0)));
        assert_eq!(created.get_decimal("quantity_remaining"), Some(dec!(100)));
    }

    #[test]
    fn dispatches_drive_the_request_status() {
        let mut store = MemoryRecordStore::new();
        new_request(&mut store, 100);

        dispatch(&mut store, "D-1", 30);
        dispatch(&mut store, "D-2", 50);
        let current = request(&mut store);
        assert_eq!(current["status"], json!("Partially Fulfilled"));
        assert_eq!(current.get_decimal("quantity_remaining"), Some(dec!(20)));

        dispatch(&mut store, "D-3", 20);
        let current = request(&mut store);
        assert_eq!(current["status"], json!("Fulfilled"));
        assert_eq!(current.get_decimal("quantity_remaining"), Some(dec!(0)));

        assert!(documents::delete(&mut store, EntityType::StageInputDispatch, "D-2").unwrap());
        let current = request(&mut store);
        assert_eq!(current["status"], json!("Partially Fulfilled"));
        assert_eq!(current.get_decimal("quantity_remaining"), Some(dec!(50)));
        assert_eq!(current.get_decimal("quantity_dispatched"), Some(dec!(50)));
    }

    #[test]
    fn dispatch_snapshots_request_fields() {
        let mut store = MemoryRecordStore::new();
        new_request(&mut store, 10);
        dispatch(&mut store, "D-1", 4);
        let stored = store
            .get(EntityType::StageInputDispatch, "D-1")
            .unwrap()
            .unwrap();
        assert_eq!(stored["crop_cycle"], json!("CC-1"));
        assert_eq!(stored["stage"], json!("Planting"));
        assert_eq!(stored["input_name"], json!("NPK"));
    }

    #[test]
    fn dispatch_against_missing_request_fails() {
        let mut store = MemoryRecordStore::new();
        let err = documents::insert(
            &mut store,
            EntityType::StageInputDispatch,
            record(json!({ "dispatch_id": "D-9", "input_request": "REQ-404" })),
            "storekeeper",
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn editing_a_dispatch_quantity_reaggregates() {
        let mut store = MemoryRecordStore::new();
        new_request(&mut store, 100);
        dispatch(&mut store, "D-1", 30);

        let existing = store
            .get(EntityType::StageInputDispatch, "D-1")
            .unwrap()
            .unwrap();
        let changed = documents::merge(&existing, &record(json!({ "quantity_dispatched": 100 })));
        documents::save(&mut store, EntityType::StageInputDispatch, changed).unwrap();

        let current = request(&mut store);
        assert_eq!(current["status"], json!("Fulfilled"));
        assert_eq!(current.get_decimal("quantity_remaining"), Some(dec!(0)));
    }

    #[test]
    fn dispatch_updates_keep_the_request_snapshot() {
        let mut store = MemoryRecordStore::new();
        new_request(&mut store, 100);
        dispatch(&mut store, "D-1", 30);

        let existing = store
            .get(EntityType::StageInputDispatch, "D-1")
            .unwrap()
            .unwrap();
        let changed = documents::merge(
            &existing,
            &record(json!({ "input_name": "Urea", "stage": "Harvest", "quantity_dispatched": 40 })),
        );
        let saved = documents::save(&mut store, EntityType::StageInputDispatch, changed).unwrap();

        assert_eq!(saved["input_name"], json!("NPK"));
        assert_eq!(saved["stage"], json!("Planting"));
        assert_eq!(saved.get_decimal("quantity_dispatched"), Some(dec!(40)));
        assert_eq!(
            request(&mut store).get_decimal("quantity_remaining"),
            Some(dec!(60))
        );
    }

    #[test]
    fn status_stays_when_all_dispatches_are_removed() {
        let mut store = MemoryRecordStore::new();
        new_request(&mut store, 10);
        dispatch(&mut store, "D-1", 4);
        documents::delete(&mut store, EntityType::StageInputDispatch, "D-1").unwrap();
        let current = request(&mut store);
        assert_eq!(current["status"], json!("Partially Fulfilled"));
        assert_eq!(current.get_decimal("quantity_remaining"), Some(dec!(10)));
    }
}
