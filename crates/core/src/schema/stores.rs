//! Client store name <-> canonical entity type association.

use super::EntityType;
use crate::errors::{Result, ValidationError};

/// Client -> server direction. Several store names may alias one entity type;
/// the first entry for each entity type is its canonical store name.
pub const STORE_ENTITY_MAP: &[(&str, EntityType)] = &[
    ("outgrowers", EntityType::Outgrower),
    ("farm_plots", EntityType::FarmPlot),
    ("plots", EntityType::FarmPlot),
    ("crop_cycles", EntityType::CropCycle),
    ("cycles", EntityType::CropCycle),
    ("crop_cycle_stages", EntityType::CropCycleStage),
    ("cycle_stages", EntityType::CropCycleStage),
    ("field_visits", EntityType::FieldVisit),
    ("visits", EntityType::FieldVisit),
    ("stage_activities", EntityType::StageActivity),
    ("activities", EntityType::StageActivity),
    ("input_requests", EntityType::StageInputRequest),
    ("stage_input_requests", EntityType::StageInputRequest),
    ("input_dispatches", EntityType::StageInputDispatch),
    ("stage_input_dispatches", EntityType::StageInputDispatch),
    ("plot_crop_assignments", EntityType::PlotCropAssignment),
    ("plot_assignments", EntityType::PlotCropAssignment),
    ("recipes", EntityType::CropRecipe),
    ("crop_recipes", EntityType::CropRecipe),
    ("crops", EntityType::Crop),
    ("varieties", EntityType::CropVariety),
    ("crop_varieties", EntityType::CropVariety),
    ("seasons", EntityType::Season),
    ("visit_types", EntityType::VisitType),
    ("regions", EntityType::Region),
    ("units", EntityType::Unit),
    ("inspection_attributes", EntityType::InspectionAttribute),
    ("employees", EntityType::Employee),
    ("attendance", EntityType::Attendance),
    ("attendances", EntityType::Attendance),
    ("checkins", EntityType::EmployeeCheckin),
    ("employee_checkins", EntityType::EmployeeCheckin),
    ("leave_applications", EntityType::LeaveApplication),
    ("leaves", EntityType::LeaveApplication),
    ("employee_advances", EntityType::EmployeeAdvance),
    ("advances", EntityType::EmployeeAdvance),
    ("expense_claims", EntityType::ExpenseClaim),
    ("expenses", EntityType::ExpenseClaim),
];

/// Server -> client direction: the one canonical store name per entity type.
pub fn canonical_store(entity: EntityType) -> &'static str {
    STORE_ENTITY_MAP
        .iter()
        .find(|(_, mapped)| *mapped == entity)
        .map(|(store, _)| *store)
        .unwrap_or_else(|| entity.as_str())
}

/// Resolves a store name, or failing that a canonical entity name.
pub fn resolve_entity(store_or_entity: &str) -> Result<EntityType> {
    let key = store_or_entity.trim();
    STORE_ENTITY_MAP
        .iter()
        .find(|(store, _)| store.eq_ignore_ascii_case(key))
        .map(|(_, entity)| *entity)
        .or_else(|| EntityType::from_name(key))
        .ok_or_else(|| ValidationError::UnknownEntity(key.to_string()).into())
}
