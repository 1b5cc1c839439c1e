//! Custom error types for the other-entry workflow.
//!
//! This module provides a single error hierarchy using `thiserror`.
//! Every failure the library can hit is a named variant so the CLI can turn
//! it into an exit code instead of the library terminating the process.
//!
//! Errors are serializable, so a caller can hand them to a UI or log them
//! as structured JSON.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of an error, used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad inputs or settings: unsupported extension, missing file, bad template.
    Configuration,
    /// The dataset does not fit the annotations: missing columns, bad identifiers.
    Data,
    /// Annotated values rejected by the value dictionary.
    Validation,
    /// Anything else (I/O, polars, serialization).
    Internal,
}

/// The main error type for the other-entry workflow.
#[derive(Error, Debug)]
pub enum OtherEntryError {
    /// Input file has an extension we cannot read.
    #[error("Unsupported file extension for '{}' (expected .xlsx, .csv or .tsv)", .0.display())]
    UnsupportedExtension(PathBuf),

    /// A required input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The annotation template is structurally broken.
    #[error("Invalid annotation template: {0}")]
    InvalidTemplate(String),

    /// A patch file could not be interpreted.
    #[error("Invalid patch file: {0}")]
    InvalidPatch(String),

    /// Refusing to replace an output left over from a previous run.
    #[error("Output file already exists: {} (pass --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// A matched record has no usable value in one of its identifier columns.
    #[error("Record at row {row} has no value in identifier column '{column}'")]
    MalformedIdentifier { row: usize, column: String },

    /// Dictionary validation rejected one or more annotated values.
    #[error("Dictionary validation failed: {0}")]
    ValidationFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet reader error.
    #[error("Excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<OtherEntryError>,
    },
}

impl OtherEntryError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        OtherEntryError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedExtension(_) => "UNSUPPORTED_EXTENSION",
            Self::InputNotFound(_) => "INPUT_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::InvalidPatch(_) => "INVALID_PATCH",
            Self::OutputExists(_) => "OUTPUT_EXISTS",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MalformedIdentifier { .. } => "MALFORMED_IDENTIFIER",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Excel(_) => "EXCEL_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Classify the error for exit-code selection.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedExtension(_)
            | Self::InputNotFound(_)
            | Self::InvalidConfig(_)
            | Self::InvalidTemplate(_)
            | Self::InvalidPatch(_)
            | Self::OutputExists(_) => ErrorCategory::Configuration,
            Self::ColumnNotFound(_) | Self::MalformedIdentifier { .. } => ErrorCategory::Data,
            Self::ValidationFailed(_) => ErrorCategory::Validation,
            Self::Io(_) | Self::Polars(_) | Self::Json(_) | Self::Excel(_) => {
                ErrorCategory::Internal
            }
            Self::WithContext { source, .. } => source.category(),
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for OtherEntryError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("OtherEntryError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for other-entry operations.
pub type Result<T> = std::result::Result<T, OtherEntryError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| OtherEntryError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| OtherEntryError::Io(e).with_context(context))
    }
}
