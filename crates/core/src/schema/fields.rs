//! Field mapping tables (mobile camelCase -> canonical snake_case) and field
//! declarations per entity type.

use std::collections::HashSet;

use super::EntityType;

/// `(mobile field, canonical field)` pairs. Invertible: no name repeats on either side.
pub type FieldMap = &'static [(&'static str, &'static str)];

const OUTGROWER_MAP: FieldMap = &[
    ("outgrowerId", "outgrower_id"),
    ("fullName", "full_name"),
    ("phone", "phone"),
    ("email", "email"),
    ("nationalId", "national_id"),
    ("gender", "gender"),
    ("dateOfBirth", "date_of_birth"),
    ("village", "village"),
    ("region", "region"),
    ("status", "status"),
    ("registrationDate", "registration_date"),
    ("assignedSupervisor", "assigned_supervisor"),
    ("bankAccount", "bank_account"),
    ("outgrowerType", "outgrower_type"),
    ("yearsSinceRegistration", "years_since_registration"),
    ("farmerStatus", "farmer_status"),
];

const FARM_PLOT_MAP: FieldMap = &[
    ("plotId", "plot_id"),
    ("outgrowerId", "outgrower"),
    ("plotName", "plot_name"),
    ("plotType", "plot_type"),
    ("soilType", "soil_type"),
    ("status", "status"),
    ("areaAcres", "area_acres"),
    ("perimeterMeters", "perimeter_meters"),
    ("centroidLat", "centroid_lat"),
    ("centroidLng", "centroid_lng"),
    ("geojson", "geojson"),
    ("mapImage", "map_image"),
    ("mapImageBase64", "map_image_base64"),
];

const CROP_CYCLE_MAP: FieldMap = &[
    ("cropCycleId", "crop_cycle_id"),
    ("plotId", "plot"),
    ("crop", "crop"),
    ("variety", "variety"),
    ("season", "season"),
    ("recipeId", "recipe"),
    ("startDate", "start_date"),
    ("expectedHarvestDate", "expected_harvest_date"),
    ("actualHarvestDate", "actual_harvest_date"),
    ("currentStage", "current_stage"),
    ("status", "status"),
];

const CROP_CYCLE_STAGE_MAP: FieldMap = &[
    ("stageId", "stage_id"),
    ("cropCycleId", "crop_cycle"),
    ("stageName", "stage_name"),
    ("orderIndex", "order_index"),
    ("startDate", "start_date"),
    ("endDate", "end_date"),
    ("status", "status"),
];

const FIELD_VISIT_MAP: FieldMap = &[
    ("visitId", "visit_id"),
    ("plotId", "plot"),
    ("cropCycleId", "crop_cycle"),
    ("visitType", "visit_type"),
    ("timestamp", "timestamp"),
    ("gpsLat", "gps_lat"),
    ("gpsLng", "gps_lng"),
    ("distanceFromPlot", "distance_from_plot"),
    ("officerId", "officer"),
    ("notes", "notes"),
];

const STAGE_ACTIVITY_MAP: FieldMap = &[
    ("activityId", "activity_id"),
    ("cropCycleId", "crop_cycle"),
    ("stage", "stage"),
    ("activityType", "activity_type"),
    ("activityDate", "activity_date"),
    ("status", "status"),
    ("notes", "notes"),
];

const STAGE_INPUT_REQUEST_MAP: FieldMap = &[
    ("requestId", "request_id"),
    ("cropCycleId", "crop_cycle"),
    ("stage", "stage"),
    ("inputName", "input_name"),
    ("inputType", "input_type"),
    ("quantityNeeded", "quantity_needed"),
    ("quantityDispatched", "quantity_dispatched"),
    ("quantityRemaining", "quantity_remaining"),
    ("unit", "unit"),
    ("requestDate", "request_date"),
    ("status", "status"),
    ("notes", "notes"),
];

const STAGE_INPUT_DISPATCH_MAP: FieldMap = &[
    ("dispatchId", "dispatch_id"),
    ("inputRequestId", "input_request"),
    ("cropCycleId", "crop_cycle"),
    ("stage", "stage"),
    ("inputName", "input_name"),
    ("inputType", "input_type"),
    ("quantityDispatched", "quantity_dispatched"),
    ("unit", "unit"),
    ("dispatchDate", "dispatch_date"),
    ("dispatchedBy", "dispatched_by"),
    ("notes", "notes"),
];

const PLOT_CROP_ASSIGNMENT_MAP: FieldMap = &[
    ("assignmentId", "assignment_id"),
    ("plotId", "plot"),
    ("crop", "crop"),
    ("variety", "variety"),
    ("season", "season"),
    ("assignedDate", "assigned_date"),
    ("status", "status"),
];

const CROP_RECIPE_MAP: FieldMap = &[
    ("recipeId", "recipe_id"),
    ("recipeName", "recipe_name"),
    ("crop", "crop"),
    ("variety", "variety"),
    ("description", "description"),
];

const CROP_MAP: FieldMap = &[("cropName", "crop_name")];

const CROP_VARIETY_MAP: FieldMap = &[
    ("varietyName", "variety_name"),
    ("crop", "crop"),
    ("maturityDays", "maturity_days"),
];

const SEASON_MAP: FieldMap = &[
    ("seasonName", "season_name"),
    ("startDate", "start_date"),
    ("endDate", "end_date"),
];

const VISIT_TYPE_MAP: FieldMap = &[("typeName", "type_name")];

const REGION_MAP: FieldMap = &[("regionName", "region_name")];

const UNIT_MAP: FieldMap = &[("unitName", "unit_name")];

const INSPECTION_ATTRIBUTE_MAP: FieldMap = &[
    ("attributeName", "attribute_name"),
    ("dataType", "data_type"),
    ("unit", "unit"),
];

const EMPLOYEE_MAP: FieldMap = &[
    ("employeeId", "employee"),
    ("employeeName", "employee_name"),
    ("userId", "user_id"),
    ("companyEmail", "company_email"),
    ("status", "status"),
];

const ATTENDANCE_MAP: FieldMap = &[
    ("attendanceId", "attendance_id"),
    ("mobileId", "mobile_id"),
    ("employeeId", "employee"),
    ("employeeName", "employee_name"),
    ("date", "attendance_date"),
    ("status", "status"),
    ("checkInTime", "check_in_time"),
    ("checkOutTime", "check_out_time"),
    ("lateEntry", "late_entry"),
    ("earlyExit", "early_exit"),
    ("totalDistanceKm", "total_distance_km"),
    ("checkInLat", "check_in_lat"),
    ("checkInLng", "check_in_lng"),
    ("checkOutLat", "check_out_lat"),
    ("checkOutLng", "check_out_lng"),
];

const EMPLOYEE_CHECKIN_MAP: FieldMap = &[
    ("checkinId", "checkin_id"),
    ("employeeId", "employee"),
    ("userId", "user_id"),
    ("userEmail", "user_email"),
    ("logType", "log_type"),
    ("time", "time"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("deviceId", "device_id"),
    ("synced", "synced"),
];

const LEAVE_APPLICATION_MAP: FieldMap = &[
    ("applicationId", "application_id"),
    ("mobileId", "mobile_id"),
    ("employeeId", "employee"),
    ("leaveType", "leave_type"),
    ("fromDate", "from_date"),
    ("toDate", "to_date"),
    ("halfDay", "half_day"),
    ("reason", "description"),
    ("status", "status"),
    ("approverEmail", "approver_email"),
    ("approverName", "approver_name"),
    ("attachmentsJson", "attachments_json"),
];

const EMPLOYEE_ADVANCE_MAP: FieldMap = &[
    ("advanceId", "advance_id"),
    ("mobileId", "mobile_id"),
    ("employeeId", "employee"),
    ("purpose", "purpose"),
    ("advanceAmount", "advance_amount"),
    ("postingDate", "posting_date"),
    ("repayFromSalary", "repay_from_salary"),
    ("status", "status"),
    ("attachmentsJson", "attachments_json"),
];

const EXPENSE_CLAIM_MAP: FieldMap = &[
    ("expenseId", "expense_id"),
    ("mobileId", "mobile_id"),
    ("employeeId", "employee"),
    ("category", "category"),
    ("amount", "total_claimed_amount"),
    ("dateSubmitted", "date_submitted"),
    ("description", "remark"),
    ("status", "status"),
];

/// Field mapping table for an entity type.
pub fn field_map(entity: EntityType) -> FieldMap {
    match entity {
        EntityType::Outgrower => OUTGROWER_MAP,
        EntityType::FarmPlot => FARM_PLOT_MAP,
        EntityType::CropCycle => CROP_CYCLE_MAP,
        EntityType::CropCycleStage => CROP_CYCLE_STAGE_MAP,
        EntityType::FieldVisit => FIELD_VISIT_MAP,
        EntityType::StageActivity => STAGE_ACTIVITY_MAP,
        EntityType::StageInputRequest => STAGE_INPUT_REQUEST_MAP,
        EntityType::StageInputDispatch => STAGE_INPUT_DISPATCH_MAP,
        EntityType::PlotCropAssignment => PLOT_CROP_ASSIGNMENT_MAP,
        EntityType::CropRecipe => CROP_RECIPE_MAP,
        EntityType::Crop => CROP_MAP,
        EntityType::CropVariety => CROP_VARIETY_MAP,
        EntityType::Season => SEASON_MAP,
        EntityType::VisitType => VISIT_TYPE_MAP,
        EntityType::Region => REGION_MAP,
        EntityType::Unit => UNIT_MAP,
        EntityType::InspectionAttribute => INSPECTION_ATTRIBUTE_MAP,
        EntityType::Employee => EMPLOYEE_MAP,
        EntityType::Attendance => ATTENDANCE_MAP,
        EntityType::EmployeeCheckin => EMPLOYEE_CHECKIN_MAP,
        EntityType::LeaveApplication => LEAVE_APPLICATION_MAP,
        EntityType::EmployeeAdvance => EMPLOYEE_ADVANCE_MAP,
        EntityType::ExpenseClaim => EXPENSE_CLAIM_MAP,
    }
}

/// Ambiguous client keys kept in sync in both shapes. `(mobile, canonical)`.
pub fn field_aliases(entity: EntityType) -> FieldMap {
    match entity {
        EntityType::Outgrower => &[
            ("bankAccount", "bank_account"),
            ("outgrowerType", "outgrower_type"),
        ],
        _ => &[],
    }
}

pub(super) fn id_field(entity: EntityType) -> Option<&'static str> {
    match entity {
        EntityType::Outgrower => Some("outgrower_id"),
        EntityType::FarmPlot => Some("plot_id"),
        EntityType::CropCycle => Some("crop_cycle_id"),
        EntityType::CropCycleStage => Some("stage_id"),
        EntityType::FieldVisit => Some("visit_id"),
        EntityType::StageActivity => Some("activity_id"),
        EntityType::StageInputRequest => Some("request_id"),
        EntityType::StageInputDispatch => Some("dispatch_id"),
        EntityType::PlotCropAssignment => Some("assignment_id"),
        EntityType::CropRecipe => Some("recipe_id"),
        EntityType::Attendance => Some("attendance_id"),
        EntityType::EmployeeCheckin => Some("checkin_id"),
        EntityType::LeaveApplication => Some("application_id"),
        EntityType::EmployeeAdvance => Some("advance_id"),
        EntityType::ExpenseClaim => Some("expense_id"),
        EntityType::Crop
        | EntityType::CropVariety
        | EntityType::Season
        | EntityType::VisitType
        | EntityType::Region
        | EntityType::Unit
        | EntityType::InspectionAttribute
        | EntityType::Employee => None,
    }
}

/// Child table fields stored as nested row lists on their parent.
fn child_table_fields(entity: EntityType) -> &'static [&'static str] {
    match entity {
        EntityType::Outgrower => &["photos"],
        EntityType::FarmPlot => &["polygon", "photos"],
        EntityType::FieldVisit => &["findings", "photos"],
        EntityType::StageActivity => &["photos"],
        EntityType::CropRecipe => &["stages"],
        _ => &[],
    }
}

/// Declared fields with no mobile counterpart (server-derived or server-side only).
fn extra_fields(entity: EntityType) -> &'static [&'static str] {
    match entity {
        EntityType::FieldVisit => &["visit_status"],
        EntityType::Employee => &["personal_email", "department", "designation"],
        EntityType::StageInputDispatch => &["received_by"],
        EntityType::Attendance => &["company", "shift"],
        _ => &[],
    }
}

pub(super) fn declared_fields(entity: EntityType) -> HashSet<String> {
    field_map(entity)
        .iter()
        .map(|(_, canonical)| *canonical)
        .chain(extra_fields(entity).iter().copied())
        .chain(child_table_fields(entity).iter().copied())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_maps_are_invertible() {
        for entity in EntityType::ALL {
            let map = field_map(entity);
            let mobile: HashSet<_> = map.iter().map(|(m, _)| *m).collect();
            let canonical: HashSet<_> = map.iter().map(|(_, c)| *c).collect();
            assert_eq!(mobile.len(), map.len(), "{entity}: duplicate mobile key");
            assert_eq!(canonical.len(), map.len(), "{entity}: duplicate canonical key");
        }
    }

    #[test]
    fn aliases_point_at_declared_fields() {
        for entity in EntityType::ALL {
            let declared = declared_fields(entity);
            for (_, canonical) in field_aliases(entity) {
                assert!(declared.contains(*canonical));
            }
        }
    }

    #[test]
    fn plot_declares_polygon_and_photos() {
        let declared = declared_fields(EntityType::FarmPlot);
        assert!(declared.contains("polygon"));
        assert!(declared.contains("photos"));
        assert!(declared.contains("area_acres"));
        assert!(!declared.contains("modified"));
    }
}
