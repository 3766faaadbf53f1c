//! Static schema configuration: entity types, client store names, field
//! mapping tables and declared fields.
//!
//! Everything here is immutable lookup data. Control flow elsewhere consults
//! these tables instead of branching on entity names.

mod fields;
mod stores;

pub use fields::{field_aliases, field_map, FieldMap};
pub use stores::{canonical_store, resolve_entity, STORE_ENTITY_MAP};

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};

/// Canonical entity types known to the sync core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Outgrower,
    #[serde(rename = "Farm Plot")]
    FarmPlot,
    #[serde(rename = "Crop Cycle")]
    CropCycle,
    #[serde(rename = "Crop Cycle Stage")]
    CropCycleStage,
    #[serde(rename = "Field Visit")]
    FieldVisit,
    #[serde(rename = "Stage Activity")]
    StageActivity,
    #[serde(rename = "Stage Input Request")]
    StageInputRequest,
    #[serde(rename = "Stage Input Dispatch")]
    StageInputDispatch,
    #[serde(rename = "Plot Crop Assignment")]
    PlotCropAssignment,
    #[serde(rename = "Crop Recipe")]
    CropRecipe,
    Crop,
    #[serde(rename = "Crop Variety")]
    CropVariety,
    Season,
    #[serde(rename = "Visit Type")]
    VisitType,
    Region,
    Unit,
    #[serde(rename = "Inspection Attribute")]
    InspectionAttribute,
    Employee,
    Attendance,
    #[serde(rename = "Employee Checkin")]
    EmployeeCheckin,
    #[serde(rename = "Leave Application")]
    LeaveApplication,
    #[serde(rename = "Employee Advance")]
    EmployeeAdvance,
    #[serde(rename = "Expense Claim")]
    ExpenseClaim,
}

impl EntityType {
    pub const ALL: [EntityType; 23] = [
        EntityType::Outgrower,
        EntityType::FarmPlot,
        EntityType::CropCycle,
        EntityType::CropCycleStage,
        EntityType::FieldVisit,
        EntityType::StageActivity,
        EntityType::StageInputRequest,
        EntityType::StageInputDispatch,
        EntityType::PlotCropAssignment,
        EntityType::CropRecipe,
        EntityType::Crop,
        EntityType::CropVariety,
        EntityType::Season,
        EntityType::VisitType,
        EntityType::Region,
        EntityType::Unit,
        EntityType::InspectionAttribute,
        EntityType::Employee,
        EntityType::Attendance,
        EntityType::EmployeeCheckin,
        EntityType::LeaveApplication,
        EntityType::EmployeeAdvance,
        EntityType::ExpenseClaim,
    ];

    /// Entity types returned by pull, in response order.
    pub const SYNCED: [EntityType; 14] = [
        EntityType::Outgrower,
        EntityType::FarmPlot,
        EntityType::CropCycle,
        EntityType::CropCycleStage,
        EntityType::FieldVisit,
        EntityType::StageActivity,
        EntityType::StageInputRequest,
        EntityType::StageInputDispatch,
        EntityType::PlotCropAssignment,
        EntityType::Attendance,
        EntityType::EmployeeCheckin,
        EntityType::LeaveApplication,
        EntityType::EmployeeAdvance,
        EntityType::ExpenseClaim,
    ];

    /// Reference data always shipped in full to clients.
    pub const REFERENCE: [EntityType; 8] = [
        EntityType::Crop,
        EntityType::CropVariety,
        EntityType::Season,
        EntityType::CropRecipe,
        EntityType::VisitType,
        EntityType::Region,
        EntityType::Unit,
        EntityType::InspectionAttribute,
    ];

    /// Default entity types for `getModifiedRecords`.
    pub const MODIFIED_DEFAULT: [EntityType; 11] = [
        EntityType::Outgrower,
        EntityType::FarmPlot,
        EntityType::CropCycle,
        EntityType::CropCycleStage,
        EntityType::FieldVisit,
        EntityType::StageInputRequest,
        EntityType::StageInputDispatch,
        EntityType::Attendance,
        EntityType::LeaveApplication,
        EntityType::EmployeeAdvance,
        EntityType::ExpenseClaim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Outgrower => "Outgrower",
            EntityType::FarmPlot => "Farm Plot",
            EntityType::CropCycle => "Crop Cycle",
            EntityType::CropCycleStage => "Crop Cycle Stage",
            EntityType::FieldVisit => "Field Visit",
            EntityType::StageActivity => "Stage Activity",
            EntityType::StageInputRequest => "Stage Input Request",
            EntityType::StageInputDispatch => "Stage Input Dispatch",
            EntityType::PlotCropAssignment => "Plot Crop Assignment",
            EntityType::CropRecipe => "Crop Recipe",
            EntityType::Crop => "Crop",
            EntityType::CropVariety => "Crop Variety",
            EntityType::Season => "Season",
            EntityType::VisitType => "Visit Type",
            EntityType::Region => "Region",
            EntityType::Unit => "Unit",
            EntityType::InspectionAttribute => "Inspection Attribute",
            EntityType::Employee => "Employee",
            EntityType::Attendance => "Attendance",
            EntityType::EmployeeCheckin => "Employee Checkin",
            EntityType::LeaveApplication => "Leave Application",
            EntityType::EmployeeAdvance => "Employee Advance",
            EntityType::ExpenseClaim => "Expense Claim",
        }
    }

    /// Looks up an entity type by its canonical name ("Farm Plot").
    pub fn from_name(name: &str) -> Option<EntityType> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|entity| entity.as_str().eq_ignore_ascii_case(trimmed))
    }

    /// Like [`EntityType::from_name`] but reports unknown names as validation errors.
    pub fn parse(name: &str) -> Result<EntityType> {
        Self::from_name(name).ok_or_else(|| ValidationError::UnknownEntity(name.to_string()).into())
    }

    /// Field holding the client-supplied identifier that doubles as the record name.
    pub fn id_field(&self) -> Option<&'static str> {
        fields::id_field(*self)
    }

    /// Statically declared canonical fields, including child table fields.
    pub fn declared_fields(&self) -> HashSet<String> {
        fields::declared_fields(*self)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
