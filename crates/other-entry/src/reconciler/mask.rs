//! Row matching and cell writes during reconciliation.

use crate::error::{OtherEntryError, Result};
use crate::types::CellValue;
use crate::utils::{cells_to_series, column_cells, is_textual_dtype};
use polars::prelude::*;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::warn;

/// Rows where `column` equals `value` exactly.
///
/// Only string cells can match. A non-string column or a missing value yields
/// an all-false mask.
pub(crate) fn match_mask(df: &DataFrame, column: &str, value: Option<&str>) -> Result<BooleanChunked> {
    let col = df
        .column(column)
        .map_err(|_| OtherEntryError::ColumnNotFound(column.to_string()))?;

    let Some(value) = value else {
        return Ok(BooleanChunked::full("mask".into(), false, df.height()));
    };

    if !is_textual_dtype(col.dtype()) {
        warn!(
            "Column '{}' has dtype {} and cannot match '{}'",
            column,
            col.dtype(),
            value
        );
        return Ok(BooleanChunked::full("mask".into(), false, df.height()));
    }

    Ok(col.str()?.equal(value))
}

/// Positions of the rows selected by a mask. Null counts as not selected.
pub(crate) fn matched_positions(mask: &BooleanChunked) -> Vec<usize> {
    mask.into_iter()
        .enumerate()
        .filter_map(|(idx, selected)| (selected == Some(true)).then_some(idx))
        .collect()
}

/// Typed cells of every column written so far.
///
/// Writes land here rather than in the frame, so each written cell keeps the
/// type it was cast to and unwritten cells keep their original value, even
/// when a column ends up holding mixed types.
#[derive(Debug, Default)]
pub(crate) struct WorkingCells {
    columns: HashMap<String, Vec<CellValue>>,
}

impl WorkingCells {
    /// Positions whose current value in `column` is the string `value`.
    pub(crate) fn matching(&self, df: &DataFrame, column: &str, value: Option<&str>) -> Result<Vec<usize>> {
        match self.columns.get(column) {
            Some(cells) => {
                let Some(value) = value else {
                    return Ok(Vec::new());
                };
                Ok(cells
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, cell)| (cell.as_str() == Some(value)).then_some(idx))
                    .collect())
            }
            None => Ok(matched_positions(&match_mask(df, column, value)?)),
        }
    }

    /// Write `value` into `column` at every position.
    pub(crate) fn write(
        &mut self,
        df: &DataFrame,
        column: &str,
        positions: &[usize],
        value: &CellValue,
    ) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }

        let cells = match self.columns.entry(column.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(column_cells(df, column)?),
        };
        for &pos in positions {
            cells[pos] = value.clone();
        }
        Ok(())
    }

    /// Current values of `column` at `rows`.
    pub(crate) fn values(&self, df: &DataFrame, column: &str, rows: &[usize]) -> Result<Vec<CellValue>> {
        let original;
        let cells = match self.columns.get(column) {
            Some(cells) => cells,
            None => {
                original = column_cells(df, column)?;
                &original
            }
        };
        Ok(rows.iter().map(|&row| cells[row].clone()).collect())
    }

    /// Rebuild every written column of `df` from its cells.
    ///
    /// The dtype follows the values the column holds afterwards; a column
    /// mixing text with other types becomes text.
    pub(crate) fn apply_to(&self, df: &mut DataFrame) -> Result<()> {
        for (column, cells) in &self.columns {
            let previous_dtype = df
                .column(column)
                .map_err(|_| OtherEntryError::ColumnNotFound(column.clone()))?
                .dtype()
                .clone();
            df.replace(column, cells_to_series(column, cells, &previous_dtype))?;
        }
        Ok(())
    }
}

/// Add `column` as an all-null string column if absent. Returns whether it was added.
pub(crate) fn ensure_column(df: &mut DataFrame, column: &str) -> Result<bool> {
    if df.column(column).is_ok() {
        return Ok(false);
    }
    let height = df.height();
    df.with_column(Series::full_null(column.into(), height, &DataType::String))?;
    Ok(true)
}
