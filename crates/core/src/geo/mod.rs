//! Spherical geometry for GPS-surveyed farm plots.
//!
//! All functions are pure over an ordered vertex sequence. Angles are taken in
//! degrees and converted internally.

mod hooks;

pub use hooks::{FarmPlotHook, FieldVisitHook, MAX_VISIT_DISTANCE_KM};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::records::value_as_f64;
use crate::utils::round_to;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const SQUARE_METERS_PER_ACRE: f64 = 4046.86;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Derived plot fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotMetrics {
    pub area_acres: f64,
    pub perimeter_meters: f64,
    pub centroid: GeoPoint,
}

/// Reads Plot Vertex rows in `order_index` order. Rows without numeric
/// coordinates are skipped; rows without an order keep their position.
pub fn vertices_from_rows(rows: &[Value]) -> Vec<GeoPoint> {
    let mut ordered: Vec<(f64, usize, GeoPoint)> = rows
        .iter()
        .enumerate()
        .filter_map(|(position, row)| {
            let row = row.as_object()?;
            let lat = row.get("latitude").and_then(value_as_f64)?;
            let lng = row.get("longitude").and_then(value_as_f64)?;
            let order = row
                .get("order_index")
                .and_then(value_as_f64)
                .unwrap_or(position as f64 + 1.0);
            Some((order, position, GeoPoint::new(lat, lng)))
        })
        .collect();
    ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    ordered.into_iter().map(|(_, _, point)| point).collect()
}

/// Great-circle distance in meters.
pub fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlng = (to.lng - from.lng).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Consecutive vertex pairs, wrapping last -> first.
fn edges(points: &[GeoPoint]) -> impl Iterator<Item = (GeoPoint, GeoPoint)> + '_ {
    points
        .iter()
        .enumerate()
        .map(move |(i, point)| (*point, points[(i + 1) % points.len()]))
}

/// Spherical-excess area in acres, rounded to 2 decimals. Zero below 3 vertices.
pub fn area_acres(points: &[GeoPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let sum: f64 = edges(points)
        .map(|(a, b)| {
            (b.lng - a.lng).to_radians()
                * (2.0 + a.lat.to_radians().sin() + b.lat.to_radians().sin())
        })
        .sum();
    let square_meters = (sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs();
    round_to(square_meters / SQUARE_METERS_PER_ACRE, 2)
}

/// Closed-ring perimeter in meters, rounded to 2 decimals.
pub fn perimeter_meters(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: f64 = edges(points).map(|(a, b)| haversine_distance(a, b)).sum();
    round_to(total, 2)
}

/// Spherical mean direction of the vertices, rounded to 6 decimals.
pub fn centroid(points: &[GeoPoint]) -> GeoPoint {
    if points.is_empty() {
        return GeoPoint::new(0.0, 0.0);
    }
    let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
    for point in points {
        let lat = point.lat.to_radians();
        let lng = point.lng.to_radians();
        x += lat.cos() * lng.cos();
        y += lat.cos() * lng.sin();
        z += lat.sin();
    }
    let n = points.len() as f64;
    let (x, y, z) = (x / n, y / n, z / n);

    let lng = y.atan2(x);
    let lat = z.atan2((x * x + y * y).sqrt());
    GeoPoint::new(round_to(lat.to_degrees(), 6), round_to(lng.to_degrees(), 6))
}

/// Area, perimeter and centroid, or `None` below 3 vertices.
pub fn plot_metrics(points: &[GeoPoint]) -> Option<PlotMetrics> {
    if points.len() < 3 {
        return None;
    }
    Some(PlotMetrics {
        area_acres: area_acres(points),
        perimeter_meters: perimeter_meters(points),
        centroid: centroid(points),
    })
}

/// Polygon Feature with a closed `[lng, lat]` ring.
pub fn geojson_feature(
    points: &[GeoPoint],
    plot_id: Option<&str>,
    plot_name: Option<&str>,
    metrics: &PlotMetrics,
) -> Value {
    let mut ring: Vec<[f64; 2]> = points.iter().map(|p| [p.lng, p.lat]).collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring]
        },
        "properties": {
            "plot_id": plot_id,
            "plot_name": plot_name.unwrap_or_default(),
            "area_acres": metrics.area_acres,
            "perimeter_meters": metrics.perimeter_meters
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.001, 0.001),
            GeoPoint::new(0.001, 0.0),
        ]
    }

    #[test]
    fn square_has_positive_area_and_four_equal_sides() {
        let points = square();
        let area = area_acres(&points);
        // 0.001 degrees is ~111.2 m, so the square is ~12,364 m2 (~3.06 acres).
        assert!(area > 3.0 && area < 3.1, "area {area}");

        let edge = haversine_distance(points[0], points[1]);
        let perimeter = perimeter_meters(&points);
        assert!((perimeter - 4.0 * edge).abs() < 0.05, "perimeter {perimeter}");
    }

    #[test]
    fn centroid_lies_inside_the_square() {
        let c = centroid(&square());
        assert!(c.lat > 0.0 && c.lat < 0.001);
        assert!(c.lng > 0.0 && c.lng < 0.001);
        assert_eq!(c, GeoPoint::new(0.0005, 0.0005));
    }

    #[test]
    fn area_ignores_winding_direction() {
        let mut points = vec![
            GeoPoint::new(-1.2921, 36.8219),
            GeoPoint::new(-1.2921, 36.8249),
            GeoPoint::new(-1.2941, 36.8259),
            GeoPoint::new(-1.2961, 36.8239),
            GeoPoint::new(-1.2951, 36.8214),
        ];
        let forward = area_acres(&points);
        points.reverse();
        assert_eq!(forward, area_acres(&points));
        assert!(forward > 0.0);
    }

    #[test]
    fn centroid_handles_the_antimeridian() {
        let c = centroid(&[
            GeoPoint::new(0.0, 179.0),
            GeoPoint::new(0.0, -179.0),
            GeoPoint::new(1.0, 179.0),
            GeoPoint::new(1.0, -179.0),
        ]);
        assert!(c.lng.abs() > 179.9, "lng {}", c.lng);
    }

    #[test]
    fn degenerate_polygons_have_no_metrics() {
        assert!(plot_metrics(&square()[..2]).is_none());
        assert_eq!(area_acres(&[]), 0.0);
        assert_eq!(centroid(&[]), GeoPoint::new(0.0, 0.0));
    }

    #[test]
    fn vertices_follow_order_index() {
        let rows = vec![
            json!({ "latitude": 2.0, "longitude": 2.0, "order_index": 2 }),
            json!({ "latitude": "1.0", "longitude": 1.0, "order_index": 1 }),
            json!({ "latitude": null, "longitude": 3.0, "order_index": 3 }),
        ];
        assert_eq!(
            vertices_from_rows(&rows),
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)]
        );
    }

    #[test]
    fn geojson_ring_is_closed_in_lng_lat_order() {
        let points = square();
        let metrics = plot_metrics(&points).unwrap();
        let feature = geojson_feature(&points, Some("PLOT-1"), None, &metrics);
        let ring = feature["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[1], json!([0.001, 0.0]));
        assert_eq!(feature["properties"]["plot_id"], json!("PLOT-1"));
        assert_eq!(feature["properties"]["plot_name"], json!(""));
    }
}
