use log::warn;
use serde_json::Value;

use crate::documents::RecordHook;
use crate::errors::Result;
use crate::records::{Record, RecordExt, RecordStore};
use crate::schema::EntityType;
use crate::utils::round_to;

use super::{geojson_feature, haversine_distance, plot_metrics, vertices_from_rows, GeoPoint};

/// Visits farther than this from the plot centroid are flagged in the log.
pub const MAX_VISIT_DISTANCE_KM: f64 = 5.0;

/// Recomputes area, perimeter, centroid and GeoJSON before every plot persist.
pub struct FarmPlotHook;

impl RecordHook for FarmPlotHook {
    fn before_save(&self, _store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let points = record
            .get_array("polygon")
            .map(|rows| vertices_from_rows(rows))
            .unwrap_or_default();
        let Some(metrics) = plot_metrics(&points) else {
            return Ok(());
        };

        let feature = geojson_feature(
            &points,
            record.get_str("plot_id"),
            record.get_str("plot_name"),
            &metrics,
        );
        let geojson = serde_json::to_string_pretty(&feature)?;

        record.insert("area_acres".to_string(), Value::from(metrics.area_acres));
        record.insert(
            "perimeter_meters".to_string(),
            Value::from(metrics.perimeter_meters),
        );
        record.insert("centroid_lat".to_string(), Value::from(metrics.centroid.lat));
        record.insert("centroid_lng".to_string(), Value::from(metrics.centroid.lng));
        record.insert("geojson".to_string(), Value::String(geojson));
        Ok(())
    }
}

/// Fills `distance_from_plot` (km) from the visit GPS fix and the plot centroid.
pub struct FieldVisitHook;

impl RecordHook for FieldVisitHook {
    fn before_save(&self, store: &mut dyn RecordStore, record: &mut Record) -> Result<()> {
        let (Some(plot_name), Some(lat), Some(lng)) = (
            record.get_str("plot").map(str::to_string),
            record.get_f64("gps_lat"),
            record.get_f64("gps_lng"),
        ) else {
            return Ok(());
        };
        let Some(plot) = store.get(EntityType::FarmPlot, &plot_name)? else {
            return Ok(());
        };
        let (Some(centroid_lat), Some(centroid_lng)) =
            (plot.get_f64("centroid_lat"), plot.get_f64("centroid_lng"))
        else {
            return Ok(());
        };

        let meters = haversine_distance(
            GeoPoint::new(lat, lng),
            GeoPoint::new(centroid_lat, centroid_lng),
        );
        let km = round_to(meters / 1000.0, 2);
        record.insert("distance_from_plot".to_string(), Value::from(km));
        if km > MAX_VISIT_DISTANCE_KM {
            warn!(
                "Field visit {} is {} km from the centroid of plot {}",
                record.record_name().unwrap_or_default(),
                km,
                plot_name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::records::MemoryRecordStore;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn insert_plot(store: &mut MemoryRecordStore) -> Record {
        documents::insert(
            store,
            EntityType::FarmPlot,
            record(json!({
                "plot_id": "PLOT-1",
                "plot_name": "River field",
                "polygon": [
                    { "latitude": 0.001, "longitude": 0.0, "order_index": 4 },
                    { "latitude": 0.0, "longitude": 0.0, "order_index": 1 },
                    { "latitude": 0.0, "longitude": 0.001, "order_index": 2 },
                    { "latitude": 0.001, "longitude": 0.001, "order_index": 3 }
                ]
            })),
            "officer",
        )
        .unwrap()
    }

    #[test]
    fn plot_save_derives_geometry() {
        let mut store = MemoryRecordStore::new();
        let plot = insert_plot(&mut store);
        assert!(plot.get_f64("area_acres").unwrap() > 3.0);
        assert!(plot.get_f64("perimeter_meters").unwrap() > 440.0);
        assert_eq!(plot.get_f64("centroid_lat"), Some(0.0005));

        let geojson: Value = serde_json::from_str(plot.get_str("geojson").unwrap()).unwrap();
        assert_eq!(geojson["properties"]["plot_name"], json!("River field"));
        assert_eq!(geojson["geometry"]["coordinates"][0][0], json!([0.0, 0.0]));
    }

    #[test]
    fn plot_with_two_vertices_keeps_client_values() {
        let mut store = MemoryRecordStore::new();
        let plot = documents::insert(
            &mut store,
            EntityType::FarmPlot,
            record(json!({
                "plot_id": "PLOT-2",
                "area_acres": 9.5,
                "polygon": [
                    { "latitude": 0.0, "longitude": 0.0, "order_index": 1 },
                    { "latitude": 0.0, "longitude": 0.001, "order_index": 2 }
                ]
            })),
            "officer",
        )
        .unwrap();
        assert_eq!(plot.get_f64("area_acres"), Some(9.5));
        assert!(plot.get("geojson").is_none());
    }

    #[test]
    fn changing_a_vertex_recomputes_on_save() {
        let mut store = MemoryRecordStore::new();
        let plot = insert_plot(&mut store);
        let before = plot.get_f64("area_acres").unwrap();

        let mut changed = plot.clone();
        changed.insert(
            "polygon".to_string(),
            json!([
                { "latitude": 0.0, "longitude": 0.0, "order_index": 1 },
                { "latitude": 0.0, "longitude": 0.002, "order_index": 2 },
                { "latitude": 0.002, "longitude": 0.002, "order_index": 3 },
                { "latitude": 0.002, "longitude": 0.0, "order_index": 4 }
            ]),
        );
        let saved = documents::save(&mut store, EntityType::FarmPlot, changed).unwrap();
        let after = saved.get_f64("area_acres").unwrap();
        assert!(after > 3.9 * before, "{before} -> {after}");
    }

    #[test]
    fn visit_distance_is_measured_from_the_plot_centroid() {
        let mut store = MemoryRecordStore::new();
        insert_plot(&mut store);
        let visit = documents::insert(
            &mut store,
            EntityType::FieldVisit,
            record(json!({
                "visit_id": "V-1",
                "plot": "PLOT-1",
                "gps_lat": 0.1,
                "gps_lng": 0.0005
            })),
            "officer",
        )
        .unwrap();
        // ~0.0995 degrees of latitude.
        assert_eq!(visit.get_f64("distance_from_plot"), Some(11.06));
    }

    #[test]
    fn visit_without_gps_is_left_alone() {
        let mut store = MemoryRecordStore::new();
        insert_plot(&mut store);
        let visit = documents::insert(
            &mut store,
            EntityType::FieldVisit,
            record(json!({ "visit_id": "V-2", "plot": "PLOT-1" })),
            "officer",
        )
        .unwrap();
        assert!(visit.get("distance_from_plot").is_none());
    }
}
