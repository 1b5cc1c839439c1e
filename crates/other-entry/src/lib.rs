//! Other-Entry Reconciliation Library
//!
//! Human-in-the-loop cleanup of free-text ("other") survey entries, built on
//! Polars.
//!
//! # Overview
//!
//! The workflow has two halves that run independently:
//!
//! - **Workbook generation**: every textual column of a dataset is reduced to
//!   its distinct values, one blank annotation row per value
//! - **Reconciliation**: the annotated template is applied back onto the
//!   dataset, and the changed records are written as a diff export and a
//!   JSON patch
//!
//! Each annotation row can replace or delete the reviewed value, set values
//! in (possibly new) follow-up columns and clear other columns, for every
//! record holding that value.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use other_entry::{ReconcileConfig, Reconciler, WorkbookConfig, WorkbookGenerator};
//! use std::path::Path;
//!
//! // 1. Produce a template for a human to fill in
//! let generator = WorkbookGenerator::new(WorkbookConfig::default());
//! let (template_path, rows) =
//!     generator.generate_file(Path::new("survey.tsv"), Some(Path::new("other_ignore_list.txt")))?;
//! println!("{} values to review in {}", rows.len(), template_path.display());
//!
//! // 2. Apply the completed template
//! let config = ReconcileConfig::builder()
//!     .id_columns(["hhid", "redcap_event_name"])
//!     .output_dir("patches")
//!     .build()?;
//!
//! let outcome = Reconciler::new(config)
//!     .reconcile_files(Path::new("survey.tsv"), Path::new("human_entry_suggestions.xlsx"))?;
//! println!("Patch written to {}", outcome.patch_path.display());
//! ```
//!
//! # Dictionary checks
//!
//! Annotated values can be checked against a JSON value dictionary before
//! anything is applied, see [`validation::check_template`].

pub mod config;
pub mod error;
pub mod io;
pub mod patch;
pub mod reconciler;
pub mod template;
pub mod types;
pub mod utils;
pub mod validation;
pub mod workbook;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, ReconcileConfig, ReconcileConfigBuilder, WorkbookConfig,
    WorkbookConfigBuilder,
};
pub use error::{ErrorCategory, OtherEntryError, Result as OtherEntryResult, ResultExt};
pub use io::{FileFormat, load_dataset, load_text_table, write_tsv};
pub use patch::{PatchFile, PatchMeta, RecordPatch};
pub use reconciler::{ReconcileOutcome, Reconciler, Reconciliation};
pub use template::{AnnotationTemplate, ColumnGroups, NewColumnGroup};
pub use types::{AnnotationRow, CellValue, NewColumnAssignment, PrimaryAction, RecordKey};
pub use utils::{cast_value, generate_timestamp};
pub use validation::{ValueDictionary, check_template, validate};
pub use workbook::WorkbookGenerator;
