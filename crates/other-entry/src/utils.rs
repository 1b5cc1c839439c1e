//! Shared utilities for the workbook generator and the reconciler.
//!
//! Value casting, trimming, conversions between polars columns and
//! [`CellValue`]s, and small filesystem helpers live here so both
//! components treat values the same way.

use crate::error::{OtherEntryError, Result};
use crate::types::CellValue;
use chrono::Local;
use polars::prelude::*;
use std::path::Path;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for review purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

/// Whether a column holds free text a human might need to review.
#[inline]
pub fn is_textual_dtype(dtype: &DataType) -> bool {
    get_dtype_category(dtype) == DtypeCategory::String
}

// =============================================================================
// Value Casting
// =============================================================================

/// Infer the intended type of a raw annotation value.
///
/// `"true"`/`"false"` (any case) become booleans, then integers and floats
/// are tried in that order, and anything else stays a string.
///
/// # Example
///
/// ```rust
/// use other_entry::types::CellValue;
/// use other_entry::utils::cast_value;
///
/// assert_eq!(cast_value("FALSE"), CellValue::Bool(false));
/// assert_eq!(cast_value("42"), CellValue::Int(42));
/// assert_eq!(cast_value("3.14"), CellValue::Float(3.14));
/// assert_eq!(cast_value("hello"), CellValue::Str("hello".to_string()));
/// ```
pub fn cast_value(raw: &str) -> CellValue {
    let lower = raw.to_ascii_lowercase();
    if lower == "true" {
        return CellValue::Bool(true);
    }
    if lower == "false" {
        return CellValue::Bool(false);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return CellValue::Int(int_val);
    }
    if let Ok(float_val) = raw.parse::<f64>() {
        return CellValue::Float(float_val);
    }
    CellValue::Str(raw.to_string())
}

/// Whether a raw flag cell means "yes" (casts to boolean `true`).
pub fn is_truthy_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(cast_value), Some(CellValue::Bool(true)))
}

// =============================================================================
// Trimming Utilities
// =============================================================================

/// Trim a raw cell and turn blank text into `None`.
pub fn trim_to_option(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trim surrounding whitespace in a string column in place.
///
/// Non-string columns are left untouched. Returns the number of values that
/// changed.
pub fn trim_string_column(df: &mut DataFrame, column: &str) -> Result<usize> {
    let col = df
        .column(column)
        .map_err(|_| OtherEntryError::ColumnNotFound(column.to_string()))?;
    if !is_textual_dtype(col.dtype()) {
        return Ok(0);
    }

    let str_series = col.str()?;
    let mut changed = 0;
    let mut trimmed_values = Vec::with_capacity(str_series.len());

    for opt_val in str_series.into_iter() {
        match opt_val {
            Some(val) => {
                let trimmed = val.trim();
                if trimmed.len() != val.len() {
                    changed += 1;
                }
                trimmed_values.push(Some(trimmed.to_string()));
            }
            None => trimmed_values.push(None),
        }
    }

    if changed > 0 {
        let trimmed_series = Series::new(column.into(), trimmed_values);
        df.replace(column, trimmed_series)?;
    }
    Ok(changed)
}

// =============================================================================
// Series <-> CellValue Conversion
// =============================================================================

/// Read every value of a column as [`CellValue`]s.
pub fn column_cells(df: &DataFrame, column: &str) -> Result<Vec<CellValue>> {
    let col = df
        .column(column)
        .map_err(|_| OtherEntryError::ColumnNotFound(column.to_string()))?;
    let series = col.as_materialized_series();

    let mut cells = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        cells.push(CellValue::from_any_value(&series.get(i)?));
    }
    Ok(cells)
}

/// Every column of a frame as `(name, cells)`, in frame order.
pub fn frame_cells(df: &DataFrame) -> Result<Vec<(String, Vec<CellValue>)>> {
    df.get_column_names()
        .into_iter()
        .map(|name| Ok((name.to_string(), column_cells(df, name)?)))
        .collect()
}

/// Read a single value as a [`CellValue`].
pub fn cell_at(df: &DataFrame, column: &str, row: usize) -> Result<CellValue> {
    let col = df
        .column(column)
        .map_err(|_| OtherEntryError::ColumnNotFound(column.to_string()))?;
    let value = col.as_materialized_series().get(row)?;
    Ok(CellValue::from_any_value(&value))
}

/// The narrowest dtype able to hold every non-null cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Int,
    Float,
    Text,
}

fn infer_cell_kind(cells: &[CellValue]) -> Option<CellKind> {
    let mut kind: Option<CellKind> = None;
    for cell in cells {
        let next = match cell {
            CellValue::Null => continue,
            CellValue::Bool(_) => CellKind::Bool,
            CellValue::Int(_) => CellKind::Int,
            CellValue::Float(_) => CellKind::Float,
            CellValue::Str(_) => return Some(CellKind::Text),
        };
        kind = Some(match (kind, next) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(CellKind::Int), CellKind::Float) | (Some(CellKind::Float), CellKind::Int) => {
                CellKind::Float
            }
            // bool mixed with numbers has no common numeric dtype
            _ => CellKind::Text,
        });
    }
    kind
}

/// Build a series from cells, picking the dtype from the values.
///
/// All-null input keeps `fallback` so an emptied column does not change type.
pub fn cells_to_series(name: &str, cells: &[CellValue], fallback: &DataType) -> Series {
    match infer_cell_kind(cells) {
        None => Series::full_null(name.into(), cells.len(), fallback),
        Some(CellKind::Bool) => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        Some(CellKind::Int) => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Int(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        Some(CellKind::Float) => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|c| match c {
                    CellValue::Int(i) => Some(*i as f64),
                    CellValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        Some(CellKind::Text) => {
            let values: Vec<Option<String>> = cells.iter().map(CellValue::to_text).collect();
            Series::new(name.into(), values)
        }
    }
}

// =============================================================================
// Filesystem Utilities
// =============================================================================

/// Timestamp used in patch file names, e.g. `16-10-2026-14:03:59`.
pub fn generate_timestamp() -> String {
    Local::now().format("%d-%m-%Y-%H:%M:%S").to_string()
}

/// Fail if `path` exists and overwriting is not allowed.
pub fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(OtherEntryError::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

/// Fail with [`OtherEntryError::InputNotFound`] if `path` does not exist.
pub fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(OtherEntryError::InputNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Read a plain-text list, one trimmed entry per line, blank lines skipped.
pub fn read_name_list(path: &Path) -> Result<Vec<String>> {
    ensure_exists(path)?;
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
