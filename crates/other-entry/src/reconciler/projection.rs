//! Record keys and the before/after projections.

use crate::error::{OtherEntryError, Result};
use crate::types::{CellValue, RecordKey};
use crate::utils::column_cells;
use polars::prelude::*;
use std::collections::HashSet;

/// Identifier cells of every record, read once from the unmodified frame.
pub(crate) struct KeyIndex {
    id_columns: Vec<String>,
    cells: Vec<Vec<CellValue>>,
}

impl KeyIndex {
    pub(crate) fn new(df: &DataFrame, id_columns: &[String]) -> Result<Self> {
        let cells = id_columns
            .iter()
            .map(|id| column_cells(df, id))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id_columns: id_columns.to_vec(),
            cells,
        })
    }

    /// Key of the record at `row`, if every identifier part is present.
    pub(crate) fn get(&self, row: usize) -> Option<RecordKey> {
        self.cells
            .iter()
            .map(|column| column[row].to_text())
            .collect::<Option<Vec<_>>>()
            .map(RecordKey)
    }

    /// Key of a matched record; a missing identifier part is an error.
    pub(crate) fn require(&self, row: usize) -> Result<RecordKey> {
        let mut parts = Vec::with_capacity(self.cells.len());
        for (column, cells) in self.id_columns.iter().zip(&self.cells) {
            let part = cells[row]
                .to_text()
                .ok_or_else(|| OtherEntryError::MalformedIdentifier {
                    row,
                    column: column.clone(),
                })?;
            parts.push(part);
        }
        Ok(RecordKey(parts))
    }

    /// Mask selecting every record whose key is in `keys`.
    pub(crate) fn mask_for(&self, keys: &HashSet<&RecordKey>) -> BooleanChunked {
        let height = self.cells.first().map_or(0, Vec::len);
        let selected: Vec<bool> = (0..height)
            .map(|row| self.get(row).is_some_and(|key| keys.contains(&key)))
            .collect();
        BooleanChunked::from_slice("edited".into(), &selected)
    }
}

/// Identifier columns first, then touched columns in frame order.
pub(crate) fn projection_columns(
    df: &DataFrame,
    id_columns: &[String],
    touched: &HashSet<&str>,
) -> Vec<String> {
    let mut columns = id_columns.to_vec();
    columns.extend(
        df.get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .filter(|name| touched.contains(name) && !id_columns.iter().any(|id| id.as_str() == *name))
            .map(str::to_string),
    );
    columns
}

/// Restrict a frame to `columns` and the rows selected by `mask`.
pub(crate) fn project(df: &DataFrame, columns: &[String], mask: &BooleanChunked) -> Result<DataFrame> {
    let selected = df.select(columns.iter().map(String::as_str))?;
    Ok(selected.filter(mask)?)
}
