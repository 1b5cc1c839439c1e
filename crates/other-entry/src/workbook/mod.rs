//! Workbook generation: turns a dataset into a blank annotation template.
//!
//! Every textual column that is not ignored contributes one template row per
//! distinct trimmed value. Columns are visited in dataset order and values
//! are sorted, so the same dataset always yields the same template.

use crate::config::WorkbookConfig;
use crate::error::{OtherEntryError, Result};
use crate::io::{self, FileFormat};
use crate::template::{AnnotationTemplate, ColumnGroups};
use crate::types::AnnotationRow;
use crate::utils::{ensure_writable, is_textual_dtype, read_name_list};
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Builds annotation templates from datasets.
pub struct WorkbookGenerator {
    config: WorkbookConfig,
}

impl WorkbookGenerator {
    pub fn new(config: WorkbookConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkbookConfig {
        &self.config
    }

    /// Collect one blank annotation row per (textual column, distinct value).
    pub fn generate(&self, df: &DataFrame, ignore: &[String]) -> Result<Vec<AnnotationRow>> {
        let ignore: HashSet<&str> = ignore.iter().map(String::as_str).collect();
        let mut rows = Vec::new();

        for column in df.get_columns() {
            let name = column.name().as_str();
            if ignore.contains(name) {
                debug!("Skipping ignored column '{}'", name);
                continue;
            }
            if !is_textual_dtype(column.dtype()) {
                continue;
            }

            let values: BTreeSet<&str> = column
                .str()?
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .collect();

            debug!("Column '{}': {} distinct values", name, values.len());
            for value in values {
                rows.push(AnnotationRow::blank(rows.len(), name, value));
            }
        }

        info!(
            "Generated {} annotation rows from {} columns",
            rows.len(),
            df.width()
        );
        Ok(rows)
    }

    /// Write rows as a template TSV at the configured output path.
    pub fn write(&self, rows: Vec<AnnotationRow>) -> Result<(PathBuf, Vec<AnnotationRow>)> {
        let path = self.config.output_path();
        ensure_writable(&path, self.config.overwrite)?;

        let template = AnnotationTemplate {
            rows,
            groups: ColumnGroups::default(),
        };
        let mut frame = template.to_frame()?;
        io::write_tsv(&mut frame, &path)?;
        Ok((path, template.rows))
    }

    /// Load a dataset and an optional ignore list, then write the template.
    ///
    /// Nothing is written when the dataset cannot be read or the output
    /// already exists.
    pub fn generate_file(
        &self,
        data_path: &Path,
        ignore_path: Option<&Path>,
    ) -> Result<(PathBuf, Vec<AnnotationRow>)> {
        FileFormat::from_path(data_path)?;
        ensure_writable(&self.config.output_path(), self.config.overwrite)?;

        let df = io::load_dataset(data_path)?;
        let ignore = match ignore_path {
            Some(path) => read_name_list(path).map_err(|e| {
                e.with_context(format!("Failed to read ignore list '{}'", path.display()))
            })?,
            None => Vec::new(),
        };
        info!("Ignoring {} columns", ignore.len());

        let rows = self.generate(&df, &ignore)?;
        if rows.is_empty() {
            info!("No textual values found; writing an empty template");
        }
        self.write(rows)
    }
}

impl Default for WorkbookGenerator {
    fn default() -> Self {
        Self::new(WorkbookConfig::default())
    }
}

// Rejects configs whose validation would fail at build time.
impl TryFrom<WorkbookConfig> for WorkbookGenerator {
    type Error = OtherEntryError;

    fn try_from(config: WorkbookConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }
}
