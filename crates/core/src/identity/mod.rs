//! Identity resolution for attendance-like queries.
//!
//! Client requests carry free-form identity hints. Each hint group is resolved
//! to employee ids on its own and the groups are intersected, so contradictory
//! hints narrow the scope to nothing instead of widening it.

use std::collections::{BTreeSet, HashSet};

use log::debug;
use serde_json::Value;

use crate::errors::Result;
use crate::records::{value_as_key, Filter, Record, RecordExt, RecordStore};
use crate::schema::EntityType;

/// Sessions that never scope a query on their own.
const UNSCOPED_SESSIONS: &[&str] = &["Guest", "Administrator"];

const EMPLOYEE_ID_KEYS: &[&str] = &["employee", "employee_id", "employeeId", "employee_ids"];
const ATTENDANCE_USER_KEYS: &[&str] = &["attendance_user_email", "attendance_user_id"];
const LEGACY_USER_KEYS: &[&str] = &["user_email", "email", "user_id", "userId"];
const ASSIGNED_TO_KEYS: &[&str] = &["assigned_to", "assignedTo"];
const NAME_KEYS: &[&str] = &["employee_name", "full_name", "employeeName"];

/// Identity hints collected from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityHints {
    pub employee_ids: Vec<String>,
    pub attendance_users: Vec<String>,
    pub legacy_users: Vec<String>,
    pub assigned_to: Vec<String>,
    pub names: Vec<String>,
    pub session_user: Option<String>,
}

impl IdentityHints {
    /// Reads hints from request parameters. Values may be strings,
    /// comma-separated lists, or JSON arrays.
    pub fn from_params(params: &Record, session_user: Option<&str>) -> Self {
        Self {
            employee_ids: collect(params, EMPLOYEE_ID_KEYS),
            attendance_users: collect(params, ATTENDANCE_USER_KEYS),
            legacy_users: collect(params, LEGACY_USER_KEYS),
            assigned_to: collect(params, ASSIGNED_TO_KEYS),
            names: collect(params, NAME_KEYS),
            session_user: session_user
                .map(str::trim)
                .filter(|user| !user.is_empty())
                .map(str::to_string),
        }
    }

    /// User email/id hints: attendance-specific first, then legacy fields,
    /// then `assigned_to` only when no email or id field was supplied.
    pub fn user_hints(&self) -> &[String] {
        if !self.attendance_users.is_empty() {
            &self.attendance_users
        } else if !self.legacy_users.is_empty() {
            &self.legacy_users
        } else {
            &self.assigned_to
        }
    }

    /// True when the request carried no hint at all (the session is not a hint).
    pub fn is_empty(&self) -> bool {
        self.employee_ids.is_empty() && self.user_hints().is_empty() && self.names.is_empty()
    }

    /// The session identity, unless it is anonymous or administrative.
    pub fn scoped_session_user(&self) -> Option<&str> {
        self.session_user
            .as_deref()
            .filter(|user| !UNSCOPED_SESSIONS.contains(user))
    }
}

fn collect(params: &Record, keys: &[&str]) -> Vec<String> {
    let mut values = Vec::new();
    for key in keys {
        match params.get(*key) {
            Some(Value::Array(items)) => values.extend(items.iter().filter_map(value_as_key)),
            Some(Value::String(raw)) => values.extend(
                raw.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            ),
            Some(other) => values.extend(value_as_key(other)),
            None => {}
        }
    }
    let mut seen = HashSet::new();
    values.retain(|value| seen.insert(value.clone()));
    values
}

fn employee_names<S>(store: &mut S, filter: Filter) -> Result<BTreeSet<String>>
where
    S: RecordStore + ?Sized,
{
    Ok(store
        .list(EntityType::Employee, &[filter])?
        .iter()
        .filter_map(|employee| employee.record_name().map(str::to_string))
        .collect())
}

/// Resolves hints to the set of employee ids they jointly identify.
///
/// An empty result means "no scope": callers must return nothing rather than
/// skip filtering.
pub fn resolve_employee_ids<S>(store: &mut S, hints: &IdentityHints) -> Result<BTreeSet<String>>
where
    S: RecordStore + ?Sized,
{
    let mut candidates: Vec<BTreeSet<String>> = Vec::new();

    if !hints.employee_ids.is_empty() {
        let mut valid = BTreeSet::new();
        for id in &hints.employee_ids {
            if store.exists(EntityType::Employee, id)? {
                valid.insert(id.clone());
            }
        }
        candidates.push(valid);
    }

    let users = hints.user_hints();
    if !users.is_empty() {
        candidates.push(employee_names(
            store,
            Filter::is_in("user_id", users.iter().cloned()),
        )?);
    }

    if !hints.names.is_empty() {
        candidates.push(employee_names(
            store,
            Filter::is_in("employee_name", hints.names.iter().cloned()),
        )?);
    }

    if hints.is_empty() {
        if let Some(user) = hints.scoped_session_user() {
            candidates.push(employee_names(store, Filter::eq("user_id", user))?);
        }
    }

    let mut nonempty = candidates.into_iter().filter(|group| !group.is_empty());
    let Some(first) = nonempty.next() else {
        debug!("Identity hints resolved to no employee");
        return Ok(BTreeSet::new());
    };
    Ok(nonempty.fold(first, |acc, group| {
        acc.intersection(&group).cloned().collect()
    }))
}

/// Raw user identifiers for entity types keyed on the user rather than an
/// employee link. Falls back to the scoped session user.
pub fn resolve_identity_emails(hints: &IdentityHints) -> Vec<String> {
    let users = hints.user_hints();
    if !users.is_empty() {
        return users.to_vec();
    }
    hints
        .scoped_session_user()
        .map(|user| vec![user.to_string()])
        .unwrap_or_default()
}

/// Field a user-keyed entity type is filtered on: `user_id` when declared,
/// otherwise `user_email`.
pub fn user_key_field(declared: &HashSet<String>) -> &'static str {
    if declared.contains("user_id") {
        "user_id"
    } else {
        "user_email"
    }
}

/// Single-user lookup: exact match on `user_id`, falling back to `company_email`.
pub fn resolve_employee_for_user<S>(store: &mut S, user: &str) -> Result<Option<String>>
where
    S: RecordStore + ?Sized,
{
    let user = user.trim();
    if user.is_empty() {
        return Ok(None);
    }
    for field in ["user_id", "company_email"] {
        let matches = employee_names(store, Filter::eq(field, user))?;
        if let Some(name) = matches.into_iter().next() {
            return Ok(Some(name));
        }
    }
    Ok(None)
}
