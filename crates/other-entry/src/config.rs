//! Configuration types for the workbook generator and the reconciler.
//!
//! Both configs follow the same builder pattern: every field has a default,
//! the builder only overrides what was set, and `build()` validates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Default file name of the annotation template.
pub const DEFAULT_TEMPLATE_FILE_NAME: &str = "human_entry_suggestions.tsv";

/// Default file name of the diff export.
pub const DEFAULT_DIFF_FILE_NAME: &str = "others_diff.tsv";

/// Default prefix of the patch file name (a timestamp is appended).
pub const DEFAULT_PATCH_PREFIX: &str = "other_entry_replacement";

/// Default composite identifier: entity id plus event id.
pub const DEFAULT_ID_COLUMNS: [&str; 2] = ["hhid", "redcap_event_name"];

/// Configuration for the workbook generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookConfig {
    /// Directory the template is written into.
    /// Default: "./"
    pub output_dir: PathBuf,

    /// File name of the template.
    /// Default: "human_entry_suggestions.tsv"
    pub file_name: String,

    /// Replace an existing template instead of failing.
    /// Default: false
    pub overwrite: bool,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./"),
            file_name: DEFAULT_TEMPLATE_FILE_NAME.to_string(),
            overwrite: false,
        }
    }
}

impl WorkbookConfig {
    /// Create a new configuration builder.
    pub fn builder() -> WorkbookConfigBuilder {
        WorkbookConfigBuilder::default()
    }

    /// Full path of the template this config writes.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.file_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyFileName("file_name".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`WorkbookConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct WorkbookConfigBuilder {
    output_dir: Option<PathBuf>,
    file_name: Option<String>,
    overwrite: Option<bool>,
}

impl WorkbookConfigBuilder {
    /// Set the directory the template is written into.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the template file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Allow replacing an existing template.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<WorkbookConfig, ConfigValidationError> {
        let defaults = WorkbookConfig::default();
        let config = WorkbookConfig {
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            file_name: self.file_name.unwrap_or(defaults.file_name),
            overwrite: self.overwrite.unwrap_or(defaults.overwrite),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the reconciler.
///
/// # Example
///
/// ```rust,ignore
/// use other_entry::config::ReconcileConfig;
///
/// let config = ReconcileConfig::builder()
///     .id_columns(["record_id", "visit"])
///     .output_dir("patches")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Columns forming the composite record identifier.
    /// Default: ["hhid", "redcap_event_name"]
    pub id_columns: Vec<String>,

    /// Directory the diff export and patch file are written into.
    /// Default: "./"
    pub output_dir: PathBuf,

    /// File name of the diff export.
    /// Default: "others_diff.tsv"
    pub diff_file_name: String,

    /// Prefix of the patch file name; the run timestamp is appended.
    /// Default: "other_entry_replacement"
    pub patch_prefix: String,

    /// Whether to write the diff export next to the patch.
    /// Default: true
    pub write_diff: bool,

    /// Replace existing outputs instead of failing.
    /// Default: false
    pub overwrite: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            id_columns: DEFAULT_ID_COLUMNS.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("./"),
            diff_file_name: DEFAULT_DIFF_FILE_NAME.to_string(),
            patch_prefix: DEFAULT_PATCH_PREFIX.to_string(),
            write_diff: true,
            overwrite: false,
        }
    }
}

impl ReconcileConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ReconcileConfigBuilder {
        ReconcileConfigBuilder::default()
    }

    /// Full path of the diff export.
    pub fn diff_path(&self) -> PathBuf {
        self.output_dir.join(&self.diff_file_name)
    }

    /// Full path of the patch file for a given run timestamp.
    pub fn patch_path(&self, timestamp: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.json", self.patch_prefix, timestamp))
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.id_columns.is_empty() {
            return Err(ConfigValidationError::NoIdColumns);
        }

        let mut seen = HashSet::new();
        for column in &self.id_columns {
            if column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyIdColumn);
            }
            if !seen.insert(column.as_str()) {
                return Err(ConfigValidationError::DuplicateIdColumn(column.clone()));
            }
        }

        if self.diff_file_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyFileName(
                "diff_file_name".to_string(),
            ));
        }
        if self.patch_prefix.trim().is_empty() {
            return Err(ConfigValidationError::EmptyFileName("patch_prefix".to_string()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("At least one identifier column is required")]
    NoIdColumns,

    #[error("Identifier column names must not be empty")]
    EmptyIdColumn,

    #[error("Identifier column '{0}' is listed more than once")]
    DuplicateIdColumn(String),

    #[error("'{0}' must not be empty")]
    EmptyFileName(String),
}

impl From<ConfigValidationError> for crate::error::OtherEntryError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::OtherEntryError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`ReconcileConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ReconcileConfigBuilder {
    id_columns: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    diff_file_name: Option<String>,
    patch_prefix: Option<String>,
    write_diff: Option<bool>,
    overwrite: Option<bool>,
}

impl ReconcileConfigBuilder {
    /// Set the composite identifier columns.
    pub fn id_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.id_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Set the directory outputs are written into.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the diff export file name.
    pub fn diff_file_name(mut self, name: impl Into<String>) -> Self {
        self.diff_file_name = Some(name.into());
        self
    }

    /// Set the patch file name prefix.
    pub fn patch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.patch_prefix = Some(prefix.into());
        self
    }

    /// Enable or disable the diff export.
    pub fn write_diff(mut self, write: bool) -> Self {
        self.write_diff = Some(write);
        self
    }

    /// Allow replacing existing outputs.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ReconcileConfig` or an error if validation fails.
    pub fn build(self) -> Result<ReconcileConfig, ConfigValidationError> {
        let defaults = ReconcileConfig::default();
        let config = ReconcileConfig {
            id_columns: self.id_columns.unwrap_or(defaults.id_columns),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            diff_file_name: self.diff_file_name.unwrap_or(defaults.diff_file_name),
            patch_prefix: self.patch_prefix.unwrap_or(defaults.patch_prefix),
            write_diff: self.write_diff.unwrap_or(defaults.write_diff),
            overwrite: self.overwrite.unwrap_or(defaults.overwrite),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconcile_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.id_columns, vec!["hhid", "redcap_event_name"]);
        assert_eq!(config.diff_file_name, "others_diff.tsv");
        assert!(config.write_diff);
        assert!(!config.overwrite);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = ReconcileConfig::builder()
            .id_columns(["record_id"])
            .output_dir("out")
            .patch_prefix("fixes")
            .overwrite(true)
            .build()
            .unwrap();

        assert_eq!(config.id_columns, vec!["record_id"]);
        assert!(config.overwrite);
        assert_eq!(
            config.patch_path("01-02-2026-10:11:12"),
            PathBuf::from("out").join("fixes_01-02-2026-10:11:12.json")
        );
    }

    #[test]
    fn test_validation_no_id_columns() {
        let result = ReconcileConfig::builder()
            .id_columns(Vec::<String>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoIdColumns
        ));
    }

    #[test]
    fn test_validation_duplicate_id_column() {
        let result = ReconcileConfig::builder()
            .id_columns(["hhid", "hhid"])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateIdColumn(ref c) if c == "hhid"
        ));
    }

    #[test]
    fn test_workbook_config_output_path() {
        let config = WorkbookConfig::builder().output_dir("work").build().unwrap();
        assert_eq!(
            config.output_path(),
            PathBuf::from("work").join("human_entry_suggestions.tsv")
        );
    }

    #[test]
    fn test_workbook_config_rejects_empty_name() {
        assert!(WorkbookConfig::builder().file_name("  ").build().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "id_columns": ["record_id", "visit"],
            "output_dir": "patches",
            "diff_file_name": "diff.tsv",
            "patch_prefix": "fix",
            "write_diff": false,
            "overwrite": true
        }"#;

        let config: ReconcileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.id_columns, vec!["record_id", "visit"]);
        assert!(!config.write_diff);
        assert!(config.validate().is_ok());
    }
}
