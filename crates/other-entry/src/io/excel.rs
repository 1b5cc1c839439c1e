//! Excel import via calamine.
//!
//! Only the first worksheet is read; its first row is the header.

use crate::error::{OtherEntryError, Result};
use crate::types::CellValue;
use crate::utils::cells_to_series;
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

pub(crate) fn read_first_sheet(path: &Path, as_text: bool) -> Result<DataFrame> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| {
            OtherEntryError::InvalidConfig(format!(
                "Excel file '{}' contains no sheets",
                path.display()
            ))
        })?;
    debug!("Reading sheet '{}'", sheet_name);

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let header = match rows.next() {
        Some(header) => header_names(header),
        None => return Ok(DataFrame::empty()),
    };

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); header.len()];
    for row in rows {
        for (col_idx, cells) in columns.iter_mut().enumerate() {
            let cell = row.get(col_idx).unwrap_or(&Data::Empty);
            cells.push(convert_cell(cell, as_text));
        }
    }

    let series: Vec<Column> = header
        .iter()
        .zip(columns.iter())
        .map(|(name, cells)| cells_to_series(name, cells, &DataType::String).into_column())
        .collect();

    Ok(DataFrame::new(series)?)
}

/// Header names, with blanks and duplicates made unique.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let mut name = cell.to_string().trim().to_string();
            if name.is_empty() {
                name = format!("column_{}", idx + 1);
            }
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", name, idx + 1);
            }
            name
        })
        .collect()
}

fn convert_cell(cell: &Data, as_text: bool) -> CellValue {
    let value = match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Str(s.clone()),
        Data::Float(n) => {
            // Excel stores every number as a float; integral values are ints
            if n.fract() == 0.0 && n.abs() < 1e15 {
                CellValue::Int(*n as i64)
            } else {
                CellValue::Float(*n)
            }
        }
        Data::Int(n) => CellValue::Int(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Str(other.to_string()),
    };

    if as_text {
        match value.to_text() {
            Some(text) => CellValue::Str(text),
            None => CellValue::Null,
        }
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_cell_numbers() {
        assert_eq!(convert_cell(&Data::Float(3.0), false), CellValue::Int(3));
        assert_eq!(convert_cell(&Data::Float(2.5), false), CellValue::Float(2.5));
        assert_eq!(
            convert_cell(&Data::Float(3.0), true),
            CellValue::Str("3".to_string())
        );
    }

    #[test]
    fn test_convert_cell_text_mode_keeps_booleans_readable() {
        assert_eq!(
            convert_cell(&Data::Bool(true), true),
            CellValue::Str("true".to_string())
        );
        assert_eq!(convert_cell(&Data::Empty, true), CellValue::Null);
        assert_eq!(
            convert_cell(&Data::String(String::new()), false),
            CellValue::Null
        );
    }

    #[test]
    fn test_header_names_unique() {
        let header = vec![
            Data::String("hhid".to_string()),
            Data::Empty,
            Data::String("hhid".to_string()),
        ];
        assert_eq!(header_names(&header), vec!["hhid", "column_2", "hhid_3"]);
    }
}
