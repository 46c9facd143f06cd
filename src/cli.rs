//! CLI utilities for roster.
//!
//! Helpers used by `roster_cli` to turn command-line text into request values.
use thiserror::Error;

use crate::storage::{FieldMap, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("expected 'key=value', got '{0}'")]
    Malformed(String),

    #[error("missing column name in '{0}'")]
    MissingKey(String),
}

/// Parses `key=value` assignments separated by commas.
///
/// Values that read as an integer are sent as integers, all others as text.
/// `team` is accepted as a shorthand for `team_id`. An empty input yields an
/// empty map.
pub fn parse_assignments(input: &str) -> Result<FieldMap, AssignmentError> {
    let mut fields = FieldMap::new();

    for assignment in input.split(',').map(str::trim) {
        if assignment.is_empty() {
            continue;
        }
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| AssignmentError::Malformed(assignment.to_string()))?;

        let key = match key.trim() {
            "" => return Err(AssignmentError::MissingKey(assignment.to_string())),
            "team" => "team_id",
            k => k,
        };
        fields.insert(key, parse_value(value.trim()));
    }

    Ok(fields)
}

fn parse_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Integer(n),
        Err(_) => Value::Text(raw.to_string()),
    }
}
