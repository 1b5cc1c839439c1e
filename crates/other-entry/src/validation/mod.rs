//! Checks annotated values against a JSON value dictionary.
//!
//! The dictionary maps a column name to the mapping of codes it accepts,
//! e.g. `{"color": {"1": "red", "2": "blue"}}`. The mapping's *values* are
//! the allowed set. A plain JSON array is accepted as well.
//!
//! Every failed check is logged; callers get a single pass/fail answer.

use crate::error::{OtherEntryError, Result};
use crate::template::AnnotationTemplate;
use crate::types::{CellValue, NewColumnAssignment};
use crate::utils::{cast_value, ensure_exists};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ValueDictionary {
    allowed: HashMap<String, Vec<Value>>,
}

impl ValueDictionary {
    pub fn from_path(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let content = fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&content)?;
        let dictionary = Self::from_json(json)?;
        info!(
            "Loaded value dictionary with {} columns from {}",
            dictionary.allowed.len(),
            path.display()
        );
        Ok(dictionary)
    }

    pub fn from_json(json: Value) -> Result<Self> {
        let Value::Object(columns) = json else {
            return Err(OtherEntryError::InvalidConfig(
                "value dictionary must be a JSON object".to_string(),
            ));
        };

        let mut allowed = HashMap::with_capacity(columns.len());
        for (column, mapping) in columns {
            let values = match mapping {
                Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                Value::Array(values) => values,
                _ => {
                    return Err(OtherEntryError::InvalidConfig(format!(
                        "value dictionary entry for '{}' must be an object or array",
                        column
                    )));
                }
            };
            allowed.insert(column, values);
        }
        Ok(Self { allowed })
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.allowed.contains_key(column)
    }

    /// Allowed values for a column.
    pub fn allowed_values(&self, column: &str) -> Option<&[Value]> {
        self.allowed.get(column).map(Vec::as_slice)
    }
}

fn matches_json(cell: &CellValue, value: &Value) -> bool {
    match (cell, value) {
        (CellValue::Bool(a), Value::Bool(b)) => a == b,
        (CellValue::Int(a), Value::Number(n)) => match n.as_i64() {
            Some(b) => *a == b,
            None => n.as_f64() == Some(*a as f64),
        },
        (CellValue::Float(a), Value::Number(n)) => n.as_f64() == Some(*a),
        (CellValue::Str(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// Check one raw value against the dictionary entry of `column`.
///
/// A column without an entry cannot be checked and passes.
pub fn validate(dictionary: &ValueDictionary, column: &str, value: &str) -> bool {
    let Some(allowed) = dictionary.allowed_values(column) else {
        warn!(
            "Column '{}' not in the dictionary, unable to check entry",
            column
        );
        return true;
    };

    let cast = cast_value(value);
    if allowed.iter().any(|candidate| matches_json(&cast, candidate)) {
        true
    } else {
        warn!(
            "Value '{}' not in the dictionary for column '{}', please check your entry",
            cast, column
        );
        false
    }
}

/// Check every annotated value of a template.
///
/// Replacement values are checked against their reviewed column and new
/// column values against their new column. Delete targets must be columns of
/// the dataset. All rows are checked even after the first failure.
pub fn check_template(
    dictionary: &ValueDictionary,
    template: &AnnotationTemplate,
    dataset_columns: &[String],
) -> bool {
    let mut success = true;

    for row in &template.rows {
        if let Some(replacement) = row.replacement_value.as_deref() {
            success &= validate(dictionary, &row.column_name, replacement);
        }

        for (column, value) in row.new_columns.iter().filter_map(NewColumnAssignment::complete) {
            success &= validate(dictionary, column, value);
        }

        for target in &row.delete_columns {
            if !dataset_columns.iter().any(|c| c == target) {
                warn!(
                    "Delete target '{}' (template row {}) is not a dataset column",
                    target,
                    row.index + 1
                );
                success = false;
            }
        }
    }

    if !success {
        warn!("Please check the entries in the annotation template");
    }
    success
}
