//! Derived-field hooks for outgrowers, crop cycles and crop recipes.

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::errors::Result;
use crate::records::{Record, RecordExt, RecordStore};
use crate::utils::round_to;
use crate::utils::time_utils::parse_date;

use super::RecordHook;

/// Keeps `years_since_registration` and `farmer_status` in step with `registration_date`.
pub struct OutgrowerHook;

/// Years between two dates at 365.25 days per year, rounded to 1 decimal.
pub fn years_since(registered: NaiveDate, today: NaiveDate) -> f64 {
    let days = (today - registered).num_days() as f64;
    round_to(days / 365.25, 1)
}

pub fn farmer_status(years: f64) -> &'static str {
    if years < 1.0 {
        "Beginner"
    } else if years < 2.0 {
        "Intermediate"
    } else if years < 5.0 {
        "Experienced"
    } else {
        "Expert"
    }
}

impl RecordHook for OutgrowerHook {
    fn before_save(&self, _store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let Some(registered) = record.get_str("registration_date").and_then(parse_date) else {
            return Ok(());
        };
        let years = years_since(registered, Utc::now().date_naive());
        record.insert("years_since_registration".to_string(), Value::from(years));
        record.insert(
            "farmer_status".to_string(),
            Value::from(farmer_status(years)),
        );
        Ok(())
    }
}

/// Derives the crop cycle status from its dates.
pub struct CropCycleHook;

pub fn crop_cycle_status(record: &Record, today: NaiveDate) -> &'static str {
    if !record.is_blank("actual_harvest_date") {
        return "COMPLETED";
    }
    match record.get_str("start_date").and_then(parse_date) {
        Some(start) if start <= today => "ACTIVE",
        _ => "PLANNED",
    }
}

impl RecordHook for CropCycleHook {
    fn before_save(&self, _store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let status = crop_cycle_status(record, Utc::now().date_naive());
        record.insert("status".to_string(), Value::from(status));
        Ok(())
    }
}

/// Links recipe input items to their enclosing stage.
pub struct CropRecipeHook;

impl RecordHook for CropRecipeHook {
    fn before_save(&self, _store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let Some(Value::Array(stages)) = record.get_mut("stages") else {
            return Ok(());
        };
        for (position, stage) in stages.iter_mut().enumerate() {
            let Some(stage) = stage.as_object_mut() else {
                continue;
            };
            if stage.is_blank("order_index") {
                stage.insert("order_index".to_string(), Value::from(position as u64 + 1));
            }
            let stage_name = stage.get("stage_name").cloned().unwrap_or(Value::Null);
            let order_index = stage.get("order_index").cloned().unwrap_or(Value::Null);
            if let Some(Value::Array(inputs)) = stage.get_mut("inputs") {
                for input in inputs.iter_mut().filter_map(Value::as_object_mut) {
                    link_input(input, &stage_name, &order_index);
                }
            }
        }
        Ok(())
    }
}

fn link_input(input: &mut Map<String, Value>, stage_name: &Value, order_index: &Value) {
    if !stage_name.is_null() {
        input.insert("recipe_stage".to_string(), stage_name.clone());
    }
    input.insert("stage_index".to_string(), order_index.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::records::MemoryRecordStore;
    use crate::schema::EntityType;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn date(raw: &str) -> NaiveDate {
        parse_date(raw).unwrap()
    }

    #[test]
    fn farmer_status_thresholds() {
        assert_eq!(farmer_status(0.9), "Beginner");
        assert_eq!(farmer_status(1.0), "Intermediate");
        assert_eq!(farmer_status(4.9), "Experienced");
        assert_eq!(farmer_status(5.0), "Expert");
    }

    #[test]
    fn years_are_rounded_to_one_decimal() {
        assert_eq!(years_since(date("2020-01-01"), date("2023-01-01")), 3.0);
        assert_eq!(years_since(date("2025-01-01"), date("2025-07-02")), 0.5);
    }

    #[test]
    fn crop_cycle_status_follows_dates() {
        let today = date("2026-03-01");
        assert_eq!(
            crop_cycle_status(&record(json!({ "actual_harvest_date": "2026-02-01" })), today),
            "COMPLETED"
        );
        assert_eq!(
            crop_cycle_status(&record(json!({ "start_date": "2026-04-01" })), today),
            "PLANNED"
        );
        assert_eq!(
            crop_cycle_status(&record(json!({ "start_date": "2026-03-01" })), today),
            "ACTIVE"
        );
        assert_eq!(crop_cycle_status(&record(json!({})), today), "PLANNED");
    }

    #[test]
    fn outgrower_insert_derives_status() {
        let mut store = MemoryRecordStore::new();
        let stored = documents::insert(
            &mut store,
            EntityType::Outgrower,
            record(json!({ "outgrower_id": "OG-1", "registration_date": "2000-01-01" })),
            "admin",
        )
        .unwrap();
        assert_eq!(stored["farmer_status"], json!("Expert"));
        assert!(stored.get_f64("years_since_registration").unwrap() > 20.0);
    }

    #[test]
    fn recipe_inputs_are_linked_to_their_stage() {
        let mut store = MemoryRecordStore::new();
        let stored = documents::insert(
            &mut store,
            EntityType::CropRecipe,
            record(json!({
                "recipe_id": "R-1",
                "stages": [
                    { "stage_name": "Nursery", "inputs": [{ "input_name": "NPK" }] },
                    { "stage_name": "Planting", "order_index": 5, "inputs": [{ "input_name": "Urea" }] }
                ]
            })),
            "admin",
        )
        .unwrap();
        let stages = stored.get_array("stages").unwrap();
        assert_eq!(stages[0]["order_index"], json!(1));
        assert_eq!(stages[0]["inputs"][0]["recipe_stage"], json!("Nursery"));
        assert_eq!(stages[0]["inputs"][0]["stage_index"], json!(1));
        assert_eq!(stages[1]["inputs"][0]["stage_index"], json!(5));
    }
}
