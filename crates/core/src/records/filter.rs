//! Minimal query model for record listing.

use std::cmp::Ordering;

use serde_json::Value;

use super::{value_as_f64, Record};

/// Comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

/// A single `field <condition>` predicate. Filters in a list are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub condition: Condition,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        }
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Gt(value.into()),
        }
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Gte(value.into()),
        }
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Lt(value.into()),
        }
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            condition: Condition::Lte(value.into()),
        }
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            field: field.into(),
            condition: Condition::In(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Evaluates the predicate against a record. Missing fields only match `Eq(null)`.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match &self.condition {
            Condition::Eq(expected) => {
                if expected.is_null() {
                    return actual.is_null();
                }
                compare(actual, expected) == Some(Ordering::Equal)
            }
            Condition::Gt(bound) => compare(actual, bound) == Some(Ordering::Greater),
            Condition::Gte(bound) => matches!(
                compare(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::Lt(bound) => compare(actual, bound) == Some(Ordering::Less),
            Condition::Lte(bound) => matches!(
                compare(actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Condition::In(values) => values
                .iter()
                .any(|candidate| compare(actual, candidate) == Some(Ordering::Equal)),
        }
    }
}

/// Orders two scalars: numerically when both are numeric, otherwise as strings.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    if let (Value::Number(_), _) | (_, Value::Number(_)) = (left, right) {
        let l = value_as_f64(left)?;
        let r = value_as_f64(right)?;
        return l.partial_cmp(&r);
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.as_str().cmp(r.as_str())),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
