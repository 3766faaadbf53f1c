//! Named nested-collection transforms, keyed by `(entity type, field)`.

use serde_json::{Map, Value};

use crate::records::{value_as_f64, Record};
use crate::schema::{EntityType, FieldMap};

use super::SERVER_OWNED_FIELDS;

/// Converts one nested collection between its mobile and canonical shapes.
pub trait NestedTransform: Sync {
    /// Mobile value -> canonical child rows. Null and absent become `[]`.
    fn inbound(&self, value: &Value) -> Value;
    /// Canonical child rows -> mobile value.
    fn outbound(&self, value: &Value) -> Value;
}

/// A transform bound to the field it handles on one entity type.
pub struct NestedRule {
    pub entity: EntityType,
    pub mobile_key: &'static str,
    pub canonical_key: &'static str,
    pub transform: &'static dyn NestedTransform,
}

/// Flat list of URLs on the client, one child row per URL on the server.
pub struct PhotoList {
    pub child_field: &'static str,
}

/// `{lat, lng, orderIndex}` vertices on the client, Plot Vertex rows on the server.
pub struct PolygonVertices;

/// Child rows renamed with a field map, optionally with one nested grandchild table.
pub struct ChildRows {
    pub map: FieldMap,
    pub nested: Option<(&'static str, &'static str, &'static ChildRows)>,
}

const RECIPE_INPUT_MAP: FieldMap = &[
    ("inputName", "input_name"),
    ("inputType", "input_type"),
    ("quantity", "quantity"),
    ("unit", "unit"),
    ("applicationDay", "application_day"),
    ("recipeStage", "recipe_stage"),
    ("stageIndex", "stage_index"),
];

const RECIPE_STAGE_MAP: FieldMap = &[
    ("stageName", "stage_name"),
    ("orderIndex", "order_index"),
    ("durationDays", "duration_days"),
    ("description", "description"),
];

const FINDING_MAP: FieldMap = &[
    ("attribute", "attribute"),
    ("value", "value"),
    ("unit", "unit"),
    ("remarks", "remarks"),
];

static RECIPE_INPUTS: ChildRows = ChildRows {
    map: RECIPE_INPUT_MAP,
    nested: None,
};

static RECIPE_STAGES: ChildRows = ChildRows {
    map: RECIPE_STAGE_MAP,
    nested: Some(("inputs", "inputs", &RECIPE_INPUTS)),
};

static FINDINGS: ChildRows = ChildRows {
    map: FINDING_MAP,
    nested: None,
};

static PHOTO: PhotoList = PhotoList {
    child_field: "photo",
};
static VISIT_PHOTO: PhotoList = PhotoList {
    child_field: "image",
};
static ACTIVITY_PHOTO: PhotoList = PhotoList {
    child_field: "photo_url",
};
static POLYGON: PolygonVertices = PolygonVertices;

pub static NESTED_RULES: &[NestedRule] = &[
    NestedRule {
        entity: EntityType::Outgrower,
        mobile_key: "photos",
        canonical_key: "photos",
        transform: &PHOTO,
    },
    NestedRule {
        entity: EntityType::FarmPlot,
        mobile_key: "polygon",
        canonical_key: "polygon",
        transform: &POLYGON,
    },
    NestedRule {
        entity: EntityType::FarmPlot,
        mobile_key: "photos",
        canonical_key: "photos",
        transform: &PHOTO,
    },
    NestedRule {
        entity: EntityType::FieldVisit,
        mobile_key: "photos",
        canonical_key: "photos",
        transform: &VISIT_PHOTO,
    },
    NestedRule {
        entity: EntityType::FieldVisit,
        mobile_key: "findings",
        canonical_key: "findings",
        transform: &FINDINGS,
    },
    NestedRule {
        entity: EntityType::StageActivity,
        mobile_key: "photos",
        canonical_key: "photos",
        transform: &ACTIVITY_PHOTO,
    },
    NestedRule {
        entity: EntityType::CropRecipe,
        mobile_key: "stages",
        canonical_key: "stages",
        transform: &RECIPE_STAGES,
    },
];

/// Transforms registered for an entity type.
pub fn rules_for(entity: EntityType) -> impl Iterator<Item = &'static NestedRule> {
    NESTED_RULES.iter().filter(move |rule| rule.entity == entity)
}

fn rows(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

/// Drops row bookkeeping (`name`, `parent`, `idx`, ...) from a child row.
fn strip_row(row: &Map<String, Value>) -> Record {
    row.iter()
        .filter(|(key, _)| key.as_str() != "name" && !SERVER_OWNED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl NestedTransform for PhotoList {
    fn inbound(&self, value: &Value) -> Value {
        let converted = rows(value)
            .iter()
            .filter_map(|item| match item {
                Value::String(url) if !url.trim().is_empty() => Some(url.clone()),
                Value::Object(row) => ["url", self.child_field, "uri"]
                    .iter()
                    .find_map(|key| row.get(*key).and_then(Value::as_str))
                    .map(str::to_string),
                _ => None,
            })
            .map(|url| {
                let mut row = Map::new();
                row.insert(self.child_field.to_string(), Value::String(url));
                Value::Object(row)
            })
            .collect();
        Value::Array(converted)
    }

    fn outbound(&self, value: &Value) -> Value {
        Value::Array(
            rows(value)
                .iter()
                .filter_map(|row| row.get(self.child_field).and_then(Value::as_str))
                .filter(|url| !url.trim().is_empty())
                .map(|url| Value::String(url.to_string()))
                .collect(),
        )
    }
}

impl NestedTransform for PolygonVertices {
    fn inbound(&self, value: &Value) -> Value {
        let converted = rows(value)
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                let point = item.as_object()?;
                let pick = |keys: &[&str]| keys.iter().find_map(|k| point.get(*k)).cloned();
                let mut row = Map::new();
                row.insert(
                    "latitude".to_string(),
                    pick(&["lat", "latitude"]).unwrap_or(Value::Null),
                );
                row.insert(
                    "longitude".to_string(),
                    pick(&["lng", "lon", "longitude"]).unwrap_or(Value::Null),
                );
                let order = pick(&["orderIndex", "order_index"])
                    .filter(|v| !v.is_null())
                    .unwrap_or_else(|| Value::from(position as u64 + 1));
                row.insert("order_index".to_string(), order);
                Some(Value::Object(row))
            })
            .collect();
        Value::Array(converted)
    }

    fn outbound(&self, value: &Value) -> Value {
        let mut vertices: Vec<&Map<String, Value>> =
            rows(value).iter().filter_map(Value::as_object).collect();
        vertices.sort_by(|a, b| {
            let order = |row: &Map<String, Value>| {
                row.get("order_index").and_then(value_as_f64).unwrap_or(0.0)
            };
            order(a).total_cmp(&order(b))
        });
        Value::Array(
            vertices
                .into_iter()
                .map(|row| {
                    let mut point = Map::new();
                    let field = |key: &str| row.get(key).cloned().unwrap_or(Value::Null);
                    point.insert("lat".to_string(), field("latitude"));
                    point.insert("lng".to_string(), field("longitude"));
                    point.insert("orderIndex".to_string(), field("order_index"));
                    Value::Object(point)
                })
                .collect(),
        )
    }
}

impl ChildRows {
    fn map_row(&self, row: &Map<String, Value>, inbound: bool) -> Value {
        let mut source = strip_row(row);
        let mut out = Map::new();

        if let Some((mobile_key, canonical_key, child)) = self.nested {
            let (from, to) = if inbound {
                (mobile_key, canonical_key)
            } else {
                (canonical_key, mobile_key)
            };
            let nested = source.remove(from).unwrap_or(Value::Null);
            let mapped = if inbound {
                child.inbound(&nested)
            } else {
                child.outbound(&nested)
            };
            out.insert(to.to_string(), mapped);
        }

        for (key, value) in source {
            let renamed = self
                .map
                .iter()
                .find(|(mobile, canonical)| {
                    if inbound {
                        *mobile == key
                    } else {
                        *canonical == key
                    }
                })
                .map(|(mobile, canonical)| if inbound { *canonical } else { *mobile })
                .unwrap_or(key.as_str())
                .to_string();
            out.entry(renamed).or_insert(value);
        }
        Value::Object(out)
    }
}

impl NestedTransform for ChildRows {
    fn inbound(&self, value: &Value) -> Value {
        Value::Array(
            rows(value)
                .iter()
                .filter_map(Value::as_object)
                .map(|row| self.map_row(row, true))
                .collect(),
        )
    }

    fn outbound(&self, value: &Value) -> Value {
        Value::Array(
            rows(value)
                .iter()
                .filter_map(Value::as_object)
                .map(|row| self.map_row(row, false))
                .collect(),
        )
    }
}
