use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Cell values
// ============================================================================

/// A single dataset value, detached from any polars dtype.
///
/// Annotation values are cast into this shape before being written, and
/// dataset cells are read into it for matching and diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Textual content, only for string cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Equality that treats `Int(n)` and `Float(n)` as the same number.
    pub fn same_value(&self, other: &CellValue) -> bool {
        match (self, other) {
            (CellValue::Int(a), CellValue::Float(b)) | (CellValue::Float(b), CellValue::Int(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Render the value as text, `None` for null.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Convert a polars value into a cell.
    pub fn from_any_value(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => CellValue::Null,
            AnyValue::Boolean(b) => CellValue::Bool(*b),
            AnyValue::String(s) => CellValue::Str((*s).to_string()),
            AnyValue::StringOwned(s) => CellValue::Str(s.to_string()),
            AnyValue::Int8(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int16(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int32(v) => CellValue::Int(i64::from(*v)),
            AnyValue::Int64(v) => CellValue::Int(*v),
            AnyValue::UInt8(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt16(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt32(v) => CellValue::Int(i64::from(*v)),
            AnyValue::UInt64(v) => match i64::try_from(*v) {
                Ok(v) => CellValue::Int(v),
                Err(_) => CellValue::Float(*v as f64),
            },
            AnyValue::Float32(v) => CellValue::Float(f64::from(*v)),
            AnyValue::Float64(v) => CellValue::Float(*v),
            other => CellValue::Str(other.to_string()),
        }
    }

    /// JSON form used in patch files.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::Int(i) => serde_json::Value::from(*i),
            CellValue::Float(f) => serde_json::Value::from(*f),
            CellValue::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Str(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// Record keys
// ============================================================================

/// Rendered identifier values of one record, in identifier-column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(pub Vec<String>);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

// ============================================================================
// Annotation rows
// ============================================================================

/// One repeated new-column group of a row. Either half may be blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewColumnAssignment {
    pub column: Option<String>,
    pub value: Option<String>,
}

impl NewColumnAssignment {
    /// A group with both halves filled.
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            value: Some(value.into()),
        }
    }

    /// `(column, value)` when both halves are filled.
    pub fn complete(&self) -> Option<(&str, &str)> {
        Some((self.column.as_deref()?, self.value.as_deref()?))
    }
}

/// One human-reviewed instruction from the annotation template.
///
/// All text fields are already trimmed; blank cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRow {
    /// Position of the row in the template (0-based, header excluded).
    pub index: usize,
    pub column_name: String,
    pub unique_value: Option<String>,
    pub replacement_value: Option<String>,
    pub suggested_value: Option<String>,
    pub delete_value: bool,
    /// One entry per new-column group, in group order. A named group
    /// creates its column; only complete groups write a value.
    pub new_columns: Vec<NewColumnAssignment>,
    pub delete_columns: Vec<String>,
}

impl AnnotationRow {
    /// Create a row with no actions, as the workbook generator emits it.
    pub fn blank(index: usize, column_name: impl Into<String>, unique_value: impl Into<String>) -> Self {
        Self {
            index,
            column_name: column_name.into(),
            unique_value: Some(unique_value.into()),
            replacement_value: None,
            suggested_value: None,
            delete_value: false,
            new_columns: Vec::new(),
            delete_columns: Vec::new(),
        }
    }

    /// The action applied to `column_name` itself, if any.
    pub fn primary_action(&self) -> PrimaryAction<'_> {
        if self.delete_value {
            PrimaryAction::Delete
        } else if let Some(replacement) = self.replacement_value.as_deref() {
            PrimaryAction::Replace(replacement)
        } else {
            PrimaryAction::None
        }
    }
}

/// What happens to the reviewed column on matched records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction<'a> {
    /// Clear the value. Takes precedence over a replacement.
    Delete,
    /// Overwrite with the (cast) replacement.
    Replace(&'a str),
    /// Only cascading actions apply.
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_value_crosses_numeric_types() {
        assert!(CellValue::Int(3).same_value(&CellValue::Float(3.0)));
        assert!(CellValue::Float(3.0).same_value(&CellValue::Int(3)));
        assert!(!CellValue::Int(3).same_value(&CellValue::Str("3".to_string())));
        assert!(CellValue::Null.same_value(&CellValue::Null));
    }

    #[test]
    fn test_from_any_value() {
        assert_eq!(CellValue::from_any_value(&AnyValue::Null), CellValue::Null);
        assert_eq!(
            CellValue::from_any_value(&AnyValue::Int32(7)),
            CellValue::Int(7)
        );
        assert_eq!(
            CellValue::from_any_value(&AnyValue::String("red")),
            CellValue::Str("red".to_string())
        );
    }

    #[test]
    fn test_to_json() {
        assert_eq!(CellValue::Null.to_json(), serde_json::Value::Null);
        assert_eq!(CellValue::Int(42).to_json(), serde_json::json!(42));
        assert_eq!(
            CellValue::Str("crimson".to_string()).to_json(),
            serde_json::json!("crimson")
        );
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey(vec!["H1".to_string(), "baseline".to_string()]);
        assert_eq!(key.to_string(), "(H1, baseline)");
    }

    #[test]
    fn test_delete_wins_over_replacement() {
        let mut row = AnnotationRow::blank(0, "color", "red");
        row.replacement_value = Some("crimson".to_string());
        assert_eq!(row.primary_action(), PrimaryAction::Replace("crimson"));

        row.delete_value = true;
        assert_eq!(row.primary_action(), PrimaryAction::Delete);
    }

    #[test]
    fn test_blank_row_has_no_action() {
        let row = AnnotationRow::blank(0, "color", "red");
        assert_eq!(row.primary_action(), PrimaryAction::None);
        assert!(row.new_columns.is_empty());
    }
}
