//! Applies a completed annotation template back onto its dataset.
//!
//! The reconciler keeps one live, typed copy of every written column.
//! Annotation rows are processed in template order; each row matches the records whose reviewed column holds
//! the annotated value, then writes its cascading new-column values, clears
//! its delete-column targets and finally applies the primary delete or
//! replacement. Later rows see the effect of earlier ones.
//!
//! Only records matched by at least one row end up in the output, and only
//! the identifier columns plus the columns an annotation could have touched.
//!
//! # Example
//!
//! ```rust,ignore
//! use other_entry::{AnnotationTemplate, ReconcileConfig, Reconciler};
//!
//! let reconciler = Reconciler::new(ReconcileConfig::default());
//! let outcome = reconciler.reconcile_files("data.tsv".as_ref(), "suggestions.xlsx".as_ref())?;
//! println!("{} records patched", outcome.patch.len());
//! ```

mod mask;
mod projection;

use crate::config::ReconcileConfig;
use crate::error::{OtherEntryError, Result};
use crate::io::{self, FileFormat};
use crate::patch::{PatchFile, replacement_notes};
use crate::template::AnnotationTemplate;
use crate::types::{CellValue, NewColumnAssignment, PrimaryAction, RecordKey};
use crate::utils::{cast_value, ensure_writable, frame_cells, generate_timestamp, trim_string_column};
use mask::{WorkingCells, ensure_column, matched_positions};
use polars::prelude::*;
use projection::{KeyIndex, project, projection_columns};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-memory result of applying a template, before anything is written.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Backup projection: the touched records before any annotation applied.
    pub before: DataFrame,
    /// Final projection, row-aligned with `before`.
    pub after: DataFrame,
    /// Final values of the projected cells, column by column, with the type
    /// each cell was written as. A column of `after` holding mixed types is
    /// rendered as text, these are not.
    pub after_values: Vec<(String, Vec<CellValue>)>,
    /// Distinct keys of every matched record, in first-match order.
    pub edited_ids: Vec<RecordKey>,
    /// Projection columns, identifier columns first.
    pub columns: Vec<String>,
    /// New-column targets that did not exist in the dataset.
    pub created_columns: Vec<String>,
    pub rows_processed: usize,
}

/// Everything a reconcile run produced.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub patch_path: PathBuf,
    /// `None` when the diff export is disabled.
    pub diff_path: Option<PathBuf>,
    pub patch: PatchFile,
    pub before: DataFrame,
    pub after: DataFrame,
    pub edited_ids: Vec<RecordKey>,
    pub touched_columns: Vec<String>,
    pub rows_processed: usize,
}

/// Applies annotation templates to datasets and writes patches.
pub struct Reconciler {
    config: ReconcileConfig,
}

static_assertions::assert_impl_all!(Reconciler: Send, Sync);

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Load both inputs, reconcile, and write the outputs.
    pub fn reconcile_files(&self, data_path: &Path, template_path: &Path) -> Result<ReconcileOutcome> {
        // Both extensions are checked before either file is read
        FileFormat::from_path(data_path)?;
        FileFormat::from_path(template_path)?;

        let dataset = io::load_dataset(data_path)?;
        let template = AnnotationTemplate::from_path(template_path)?;
        self.reconcile(dataset, &template)
    }

    /// Reconcile and write the diff export and the patch file.
    ///
    /// Every output path is checked before the dataset is touched, so a
    /// refused or failed run writes nothing.
    pub fn reconcile(&self, dataset: DataFrame, template: &AnnotationTemplate) -> Result<ReconcileOutcome> {
        let timestamp = generate_timestamp();
        let patch_path = self.config.patch_path(&timestamp);
        let diff_path = self.config.write_diff.then(|| self.config.diff_path());

        ensure_writable(&patch_path, self.config.overwrite)?;
        if let Some(path) = &diff_path {
            ensure_writable(path, self.config.overwrite)?;
        }

        let Reconciliation {
            before,
            mut after,
            after_values,
            edited_ids,
            columns,
            rows_processed,
            ..
        } = self.apply(dataset, template)?;

        info!("Step 8: Generating patch...");
        let patch = PatchFile::from_cells(
            &frame_cells(&before)?,
            &after_values,
            &self.config.id_columns,
            replacement_notes(&columns),
            Some(timestamp),
        )?;

        if let Some(path) = &diff_path {
            io::write_tsv(&mut after, path)?;
        }
        patch.write_to(&patch_path)?;

        info!(
            "Reconciliation complete: {} records edited, {} patched",
            edited_ids.len(),
            patch.len()
        );

        Ok(ReconcileOutcome {
            patch_path,
            diff_path,
            patch,
            before,
            after,
            edited_ids,
            touched_columns: columns,
            rows_processed,
        })
    }

    /// Apply a template to a dataset in memory.
    pub fn apply(&self, mut df: DataFrame, template: &AnnotationTemplate) -> Result<Reconciliation> {
        let id_columns = &self.config.id_columns;
        for id in id_columns {
            require_column(&df, id)?;
        }

        // Template fields are trimmed while parsing
        info!("Step 1: {} annotation rows to apply", template.rows.len());

        info!("Step 2: Trimming reviewed columns...");
        let to_fix = template.to_fix_columns();
        for column in &to_fix {
            require_column(&df, column)?;
            let trimmed = trim_string_column(&mut df, column)?;
            if trimmed > 0 {
                debug!("Trimmed {} values in '{}'", trimmed, column);
            }
        }

        info!("Step 3: Creating new columns...");
        let new_columns = template.new_column_names();
        let mut created_columns = Vec::new();
        for column in &new_columns {
            if ensure_column(&mut df, column)? {
                debug!("Created column '{}'", column);
                created_columns.push(column.clone());
            }
        }

        for row in &template.rows {
            for target in &row.delete_columns {
                require_column(&df, target)?;
            }
        }

        // Writes go to `cells`; `df` stays the backup, created columns included
        let keys = KeyIndex::new(&df, id_columns)?;
        let mut cells = WorkingCells::default();

        info!("Step 4: Applying annotations...");
        let mut edited_ids: Vec<RecordKey> = Vec::new();
        let mut seen_ids: HashSet<RecordKey> = HashSet::new();
        let mut to_delete: Vec<String> = Vec::new();

        for row in &template.rows {
            let positions = cells.matching(&df, &row.column_name, row.unique_value.as_deref())?;
            debug!(
                "Row {}: '{}' = {:?} matched {} records",
                row.index,
                row.column_name,
                row.unique_value,
                positions.len()
            );
            if positions.is_empty() {
                continue;
            }

            for &pos in &positions {
                let key = keys.require(pos)?;
                if seen_ids.insert(key.clone()) {
                    edited_ids.push(key);
                }
            }

            for (column, value) in row.new_columns.iter().filter_map(NewColumnAssignment::complete) {
                debug!("Row {}: setting '{}' = {}", row.index, column, value);
                cells.write(&df, column, &positions, &cast_value(value))?;
            }

            for target in &row.delete_columns {
                debug!("Row {}: clearing '{}'", row.index, target);
                cells.write(&df, target, &positions, &CellValue::Null)?;
                if !to_delete.contains(target) {
                    to_delete.push(target.clone());
                }
            }

            match row.primary_action() {
                PrimaryAction::Delete => {
                    debug!("Row {}: deleting value in '{}'", row.index, row.column_name);
                    cells.write(&df, &row.column_name, &positions, &CellValue::Null)?;
                }
                PrimaryAction::Replace(replacement) => {
                    debug!(
                        "Row {}: replacing with {} in '{}'",
                        row.index, replacement, row.column_name
                    );
                    cells.write(&df, &row.column_name, &positions, &cast_value(replacement))?;
                }
                PrimaryAction::None => {}
            }
        }

        info!("Step 5: {} records to edit", edited_ids.len());

        info!("Step 6: Building projections...");
        let touched: HashSet<&str> = to_fix
            .iter()
            .chain(&new_columns)
            .chain(&to_delete)
            .map(String::as_str)
            .collect();
        let columns = projection_columns(&df, id_columns, &touched);
        debug!("Columns to generate patches on: {:?}", columns);

        let edited: HashSet<&RecordKey> = edited_ids.iter().collect();
        let rows_mask = keys.mask_for(&edited);
        let rows = matched_positions(&rows_mask);
        let after_values = columns
            .iter()
            .map(|column| Ok((column.clone(), cells.values(&df, column, &rows)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut edited_df = df.clone();
        cells.apply_to(&mut edited_df)?;
        let after = project(&edited_df, &columns, &rows_mask)?;

        info!("Step 7: Building backup projection...");
        let before = project(&df, &columns, &rows_mask)?;

        Ok(Reconciliation {
            before,
            after,
            after_values,
            edited_ids,
            columns,
            created_columns,
            rows_processed: template.rows.len(),
        })
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

fn require_column(df: &DataFrame, column: &str) -> Result<()> {
    if df.column(column).is_err() {
        return Err(OtherEntryError::ColumnNotFound(column.to_string()));
    }
    Ok(())
}
