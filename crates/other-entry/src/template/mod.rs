//! Annotation template model and parser.
//!
//! The template has a fixed set of headers plus any number of repeated
//! groups. Repeated groups are recognised by header prefix:
//!
//! - `new_column_name<suffix>` pairs with `new_column_value<suffix>`
//! - every `delete_column_value<suffix>` header is one delete group
//!
//! so `new_column_name_2` goes with `new_column_value_2` and a bare
//! `new_column_name` with a bare `new_column_value`.

use crate::error::{OtherEntryError, Result, ResultExt};
use crate::io;
use crate::types::{AnnotationRow, NewColumnAssignment};
use crate::utils::{cell_at, is_truthy_flag, trim_to_option};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

pub const COLUMN_NAME: &str = "column_name";
pub const UNIQUE_VALUE: &str = "unique_value";
pub const REPLACEMENT_VALUE: &str = "replacement_value";
pub const SUGGESTED_VALUE: &str = "suggested_value";
pub const DELETE_VALUE: &str = "delete_value";
pub const NEW_COLUMN_NAME: &str = "new_column_name";
pub const NEW_COLUMN_VALUE: &str = "new_column_value";
pub const DELETE_COLUMN_VALUE: &str = "delete_column_value";

static GROUP_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(new_column_name|new_column_value|delete_column_value)(.*)$")
        .expect("Invalid regex: group header")
});

/// A (name header, value header) pair for one new-column group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewColumnGroup {
    pub name_header: String,
    pub value_header: String,
}

/// Repeated header groups discovered in a template, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroups {
    pub new_columns: Vec<NewColumnGroup>,
    pub delete_columns: Vec<String>,
}

impl Default for ColumnGroups {
    /// One group of each kind, with bare header names.
    fn default() -> Self {
        Self {
            new_columns: vec![NewColumnGroup {
                name_header: NEW_COLUMN_NAME.to_string(),
                value_header: NEW_COLUMN_VALUE.to_string(),
            }],
            delete_columns: vec![DELETE_COLUMN_VALUE.to_string()],
        }
    }
}

impl ColumnGroups {
    /// Classify headers into repeated groups.
    pub fn discover<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let mut names: Vec<(String, String)> = Vec::new();
        let mut values: Vec<(String, String)> = Vec::new();
        let mut delete_columns = Vec::new();

        for header in headers {
            let header = header.as_ref();
            let Some(caps) = GROUP_HEADER.captures(header) else {
                continue;
            };
            let suffix = caps[2].to_string();
            match &caps[1] {
                NEW_COLUMN_NAME => names.push((suffix, header.to_string())),
                NEW_COLUMN_VALUE => values.push((suffix, header.to_string())),
                _ => delete_columns.push(header.to_string()),
            }
        }

        let mut new_columns = Vec::with_capacity(names.len());
        for (suffix, name_header) in &names {
            let value_header = values
                .iter()
                .find(|(s, _)| s == suffix)
                .map(|(_, h)| h.clone())
                .ok_or_else(|| {
                    OtherEntryError::InvalidTemplate(format!(
                        "'{}' has no matching '{}{}' column",
                        name_header, NEW_COLUMN_VALUE, suffix
                    ))
                })?;
            new_columns.push(NewColumnGroup {
                name_header: name_header.clone(),
                value_header,
            });
        }

        if let Some((suffix, header)) = values
            .iter()
            .find(|(s, _)| !names.iter().any(|(n, _)| n == s))
        {
            return Err(OtherEntryError::InvalidTemplate(format!(
                "'{}' has no matching '{}{}' column",
                header, NEW_COLUMN_NAME, suffix
            )));
        }

        Ok(Self {
            new_columns,
            delete_columns,
        })
    }
}

/// A parsed annotation template.
#[derive(Debug, Clone)]
pub struct AnnotationTemplate {
    pub rows: Vec<AnnotationRow>,
    pub groups: ColumnGroups,
}

impl AnnotationTemplate {
    /// Load and parse a template file (`.xlsx`, `.csv` or `.tsv`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let df = io::load_text_table(path)?;
        Self::from_frame(&df).context(format!("In template '{}'", path.display()))
    }

    /// Parse a template from a frame whose cells are text.
    ///
    /// Every text field is trimmed; blank cells become `None`. Rows that are
    /// entirely blank are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let headers: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for required in [COLUMN_NAME, UNIQUE_VALUE] {
            if !headers.iter().any(|h| h == required) {
                return Err(OtherEntryError::InvalidTemplate(format!(
                    "missing required column '{}'",
                    required
                )));
            }
        }

        let groups = ColumnGroups::discover(headers.as_slice())?;
        debug!(
            "Template groups: {} new-column, {} delete-column",
            groups.new_columns.len(),
            groups.delete_columns.len()
        );

        let reader = CellReader {
            df,
            headers: headers.iter().map(String::as_str).collect(),
        };

        let mut rows = Vec::with_capacity(df.height());
        for index in 0..df.height() {
            if let Some(row) = reader.parse_row(index, &groups)? {
                rows.push(row);
            }
        }

        info!("Parsed {} annotation rows", rows.len());
        Ok(Self { rows, groups })
    }

    /// Distinct reviewed columns, in first-seen order.
    pub fn to_fix_columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|row| seen.insert(row.column_name.as_str()))
            .map(|row| row.column_name.clone())
            .collect()
    }

    /// Distinct column names of all new-column groups, in first-seen order.
    ///
    /// A name counts even when its value cell is blank.
    pub fn new_column_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .flat_map(|row| row.new_columns.iter())
            .filter_map(|assignment| assignment.column.as_deref())
            .filter(|column| seen.insert(*column))
            .map(str::to_string)
            .collect()
    }

    /// Render the template as a text frame using this template's groups.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::new();

        let text_column = |name: &str, values: Vec<Option<String>>| -> Column {
            Series::new(name.into(), values).into_column()
        };

        columns.push(text_column(
            COLUMN_NAME,
            self.rows.iter().map(|r| Some(r.column_name.clone())).collect(),
        ));
        columns.push(text_column(
            UNIQUE_VALUE,
            self.rows.iter().map(|r| r.unique_value.clone()).collect(),
        ));
        columns.push(text_column(
            REPLACEMENT_VALUE,
            self.rows.iter().map(|r| r.replacement_value.clone()).collect(),
        ));
        columns.push(text_column(
            SUGGESTED_VALUE,
            self.rows.iter().map(|r| r.suggested_value.clone()).collect(),
        ));
        columns.push(text_column(
            DELETE_VALUE,
            self.rows
                .iter()
                .map(|r| Some(if r.delete_value { "True" } else { "False" }.to_string()))
                .collect(),
        ));

        for (idx, group) in self.groups.new_columns.iter().enumerate() {
            let slot = |r: &AnnotationRow| r.new_columns.get(idx).cloned().unwrap_or_default();
            columns.push(text_column(
                &group.name_header,
                self.rows.iter().map(|r| slot(r).column).collect(),
            ));
            columns.push(text_column(
                &group.value_header,
                self.rows.iter().map(|r| slot(r).value).collect(),
            ));
        }

        for (idx, header) in self.groups.delete_columns.iter().enumerate() {
            columns.push(text_column(
                header,
                self.rows
                    .iter()
                    .map(|r| r.delete_columns.get(idx).cloned())
                    .collect(),
            ));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Reads trimmed text cells from a template frame.
struct CellReader<'a> {
    df: &'a DataFrame,
    headers: Vec<&'a str>,
}

impl CellReader<'_> {
    /// Trimmed text of a cell, `None` when blank or the header is absent.
    fn text(&self, header: &str, row: usize) -> Result<Option<String>> {
        if !self.headers.contains(&header) {
            return Ok(None);
        }
        let cell = cell_at(self.df, header, row)?;
        Ok(trim_to_option(cell.to_text().as_deref()))
    }

    fn is_blank_row(&self, row: usize) -> Result<bool> {
        for header in &self.headers {
            if self.text(header, row)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn parse_row(&self, index: usize, groups: &ColumnGroups) -> Result<Option<AnnotationRow>> {
        if self.is_blank_row(index)? {
            return Ok(None);
        }

        let Some(column_name) = self.text(COLUMN_NAME, index)? else {
            return Err(OtherEntryError::InvalidTemplate(format!(
                "row {} has no '{}'",
                index + 1,
                COLUMN_NAME
            )));
        };

        // One slot per group, so positions line up with `groups.new_columns`
        let mut new_columns = Vec::with_capacity(groups.new_columns.len());
        for group in &groups.new_columns {
            new_columns.push(NewColumnAssignment {
                column: self.text(&group.name_header, index)?,
                value: self.text(&group.value_header, index)?,
            });
        }

        let mut delete_columns = Vec::new();
        for header in &groups.delete_columns {
            if let Some(column) = self.text(header, index)? {
                delete_columns.push(column);
            }
        }

        Ok(Some(AnnotationRow {
            index,
            column_name,
            unique_value: self.text(UNIQUE_VALUE, index)?,
            replacement_value: self.text(REPLACEMENT_VALUE, index)?,
            suggested_value: self.text(SUGGESTED_VALUE, index)?,
            delete_value: is_truthy_flag(self.text(DELETE_VALUE, index)?.as_deref()),
            new_columns,
            delete_columns,
        }))
    }
}
