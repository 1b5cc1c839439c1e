//! Record-level patch files.
//!
//! A patch lists, for every record whose touched fields changed, the record's
//! identifier values (`target`) and the new value of each changed field
//! (`deltas`). Cleared fields appear as JSON `null`.

use crate::error::{OtherEntryError, Result, ResultExt};
use crate::types::CellValue;
use crate::utils::{ensure_exists, frame_cells};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Current patch format version.
pub const PATCH_VERSION: u32 = 1;

/// Changes for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Identifier column -> identifier value.
    pub target: BTreeMap<String, Value>,
    /// Changed column -> new value.
    pub deltas: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMeta {
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// A complete patch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchFile {
    pub patches: Vec<RecordPatch>,
    pub version: u32,
    pub meta: PatchMeta,
}

/// Comment attached to patches produced by the reconciler.
pub fn replacement_notes(columns: &[String]) -> String {
    format!("Other Entry Replacement for columns: {:?}", columns)
}

impl PatchFile {
    /// Diff two row-aligned projections.
    ///
    /// Row `i` of `before` and row `i` of `after` must describe the same
    /// record. See [`PatchFile::from_cells`].
    pub fn from_projections(
        before: &DataFrame,
        after: &DataFrame,
        id_columns: &[String],
        notes: impl Into<String>,
        generated_at: Option<String>,
    ) -> Result<Self> {
        Self::from_cells(
            &frame_cells(before)?,
            &frame_cells(after)?,
            id_columns,
            notes,
            generated_at,
        )
    }

    /// Diff two row-aligned sets of `(column, cells)`.
    ///
    /// Every column of `after` is compared; a column missing from `before`
    /// counts as all-null there. Targets are read from `before`.
    pub fn from_cells(
        before: &[(String, Vec<CellValue>)],
        after: &[(String, Vec<CellValue>)],
        id_columns: &[String],
        notes: impl Into<String>,
        generated_at: Option<String>,
    ) -> Result<Self> {
        let height = after.first().map_or(0, |(_, cells)| cells.len());
        if let Some((name, cells)) = before
            .iter()
            .chain(after)
            .find(|(_, cells)| cells.len() != height)
        {
            return Err(OtherEntryError::InvalidPatch(format!(
                "column '{}' has {} rows, expected {}",
                name,
                cells.len(),
                height
            )));
        }

        let lookup = |name: &str| {
            before
                .iter()
                .find(|(column, _)| column == name)
                .map(|(_, cells)| cells)
        };

        let targets: Vec<&Vec<CellValue>> = id_columns
            .iter()
            .map(|id| lookup(id.as_str()).ok_or_else(|| OtherEntryError::ColumnNotFound(id.clone())))
            .collect::<Result<_>>()?;

        let nulls = vec![CellValue::Null; height];
        let compared: Vec<(&String, &Vec<CellValue>, &Vec<CellValue>)> = after
            .iter()
            .map(|(name, new)| (name, lookup(name.as_str()).unwrap_or(&nulls), new))
            .collect();

        let mut patches = Vec::new();
        for row in 0..height {
            let deltas: BTreeMap<String, Value> = compared
                .iter()
                .filter(|(_, old, new)| !old[row].same_value(&new[row]))
                .map(|(name, _, new)| ((*name).clone(), new[row].to_json()))
                .collect();

            if deltas.is_empty() {
                continue;
            }

            let target = id_columns
                .iter()
                .zip(&targets)
                .map(|(id, cells)| (id.clone(), cells[row].to_json()))
                .collect();
            patches.push(RecordPatch { target, deltas });
        }

        debug!(
            "Diffed {} records, {} with changes",
            height,
            patches.len()
        );

        Ok(Self {
            patches,
            version: PATCH_VERSION,
            meta: PatchMeta {
                notes: notes.into(),
                generated_at,
            },
        })
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Write the patch as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context(format!("Failed to write patch '{}'", path.display()))?;
        info!("Wrote patch with {} records to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a patch file back.
    pub fn from_path(path: &Path) -> Result<Self> {
        ensure_exists(path)?;
        let content = fs::read_to_string(path)?;
        let patch: PatchFile = serde_json::from_str(&content)
            .map_err(|e| OtherEntryError::InvalidPatch(format!("{}: {}", path.display(), e)))?;

        if patch.version != PATCH_VERSION {
            return Err(OtherEntryError::InvalidPatch(format!(
                "{}: unsupported version {}",
                path.display(),
                patch.version
            )));
        }
        Ok(patch)
    }

    /// Whether two patches describe the same changes, ignoring metadata.
    pub fn same_changes(&self, other: &PatchFile) -> bool {
        self.version == other.version && self.patches == other.patches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ids() -> Vec<String> {
        vec!["hhid".to_string(), "redcap_event_name".to_string()]
    }

    #[test]
    fn test_only_changed_fields_are_recorded() {
        let before = df![
            "hhid" => ["H1", "H2", "H3"],
            "redcap_event_name" => ["baseline", "baseline", "baseline"],
            "color" => [Some("red"), Some("red"), Some("blue")],
            "status" => [None::<&str>, None, None],
        ]
        .unwrap();
        let after = df![
            "hhid" => ["H1", "H2", "H3"],
            "redcap_event_name" => ["baseline", "baseline", "baseline"],
            "color" => [Some("crimson"), None, Some("blue")],
            "status" => [Some("reviewed"), None, None],
        ]
        .unwrap();

        let patch =
            PatchFile::from_projections(&before, &after, &ids(), "notes", None).unwrap();

        assert_eq!(patch.len(), 2);
        assert_eq!(
            serde_json::to_value(&patch.patches[0]).unwrap(),
            json!({
                "target": {"hhid": "H1", "redcap_event_name": "baseline"},
                "deltas": {"color": "crimson", "status": "reviewed"}
            })
        );
        assert_eq!(patch.patches[1].deltas.get("color"), Some(&Value::Null));
    }

    #[test]
    fn test_numeric_equality_across_dtypes() {
        let before = df!["hhid" => ["H1"], "redcap_event_name" => ["b"], "n" => [3i64]].unwrap();
        let after = df!["hhid" => ["H1"], "redcap_event_name" => ["b"], "n" => [3.0f64]].unwrap();

        let patch = PatchFile::from_projections(&before, &after, &ids(), "", None).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_unchanged_cells_never_become_deltas() {
        let before = vec![
            ("hhid".to_string(), vec![CellValue::Str("H1".to_string()), CellValue::Str("H2".to_string())]),
            ("redcap_event_name".to_string(), vec![CellValue::Str("b".to_string()); 2]),
            ("rooms".to_string(), vec![CellValue::Int(1), CellValue::Int(2)]),
        ];
        let mut after = before.clone();
        after[2].1[0] = CellValue::Str("many".to_string());

        let patch = PatchFile::from_cells(&before, &after, &ids(), "", None).unwrap();

        assert_eq!(patch.len(), 1);
        assert_eq!(
            serde_json::to_value(&patch.patches[0].deltas).unwrap(),
            json!({"rooms": "many"})
        );
    }

    #[test]
    fn test_height_mismatch_is_rejected() {
        let before = df!["hhid" => ["H1"], "redcap_event_name" => ["b"]].unwrap();
        let after = df!["hhid" => ["H1", "H2"], "redcap_event_name" => ["b", "b"]].unwrap();

        let err = PatchFile::from_projections(&before, &after, &ids(), "", None).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PATCH");
    }

    #[test]
    fn test_write_read_and_compare_ignoring_meta() {
        let before = df!["hhid" => ["H1"], "redcap_event_name" => ["b"], "c" => ["x"]].unwrap();
        let after = df!["hhid" => ["H1"], "redcap_event_name" => ["b"], "c" => ["y"]].unwrap();

        let first = PatchFile::from_projections(
            &before,
            &after,
            &ids(),
            replacement_notes(&["c".to_string()]),
            Some("01-01-2026-00:00:00".to_string()),
        )
        .unwrap();
        let second = PatchFile::from_projections(
            &before,
            &after,
            &ids(),
            "other notes",
            Some("02-01-2026-00:00:00".to_string()),
        )
        .unwrap();
        assert!(first.same_changes(&second));
        assert_ne!(first, second);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        first.write_to(&path).unwrap();

        let loaded = PatchFile::from_path(&path).unwrap();
        assert_eq!(loaded, first);
        assert_eq!(loaded.meta.notes, "Other Entry Replacement for columns: [\"c\"]");
    }

    #[test]
    fn test_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        fs::write(
            &path,
            r#"{"patches": [], "version": 2, "meta": {"notes": ""}}"#,
        )
        .unwrap();

        let err = PatchFile::from_path(&path).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PATCH");
    }
}
