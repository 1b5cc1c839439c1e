//! Integration tests for the other-entry workflow.
//!
//! These tests drive the public API against fixture files and write their
//! outputs into temporary directories.

use other_entry::utils::column_cells;
use other_entry::{
    AnnotationRow, AnnotationTemplate, CellValue, ColumnGroups, NewColumnAssignment,
    OtherEntryError, PatchFile, ReconcileConfig, Reconciler, WorkbookConfig, WorkbookGenerator,
    load_dataset,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> PathBuf {
    fixtures_path().join(name)
}

fn reconciler_in(dir: &Path) -> Reconciler {
    Reconciler::new(
        ReconcileConfig::builder()
            .output_dir(dir)
            .build()
            .expect("valid config"),
    )
}

fn survey() -> DataFrame {
    df![
        "hhid" => ["H1", "H2", "H3"],
        "redcap_event_name" => ["baseline", "baseline", "baseline"],
        "color" => ["red", "red", "blue"],
    ]
    .unwrap()
}

fn template(rows: Vec<AnnotationRow>) -> AnnotationTemplate {
    AnnotationTemplate {
        rows,
        groups: ColumnGroups::default(),
    }
}

fn text(value: &str) -> CellValue {
    CellValue::Str(value.to_string())
}

/// Run one fixture case and compare the patch with the expected one.
fn assert_case(dataset: &str, suggestions: &str, expected: &str) {
    let dir = TempDir::new().unwrap();
    let outcome = reconciler_in(dir.path())
        .reconcile_files(&fixture(dataset), &fixture(suggestions))
        .expect("reconcile should succeed");

    let written = PatchFile::from_path(&outcome.patch_path).unwrap();
    let expected = PatchFile::from_path(&fixture(expected)).unwrap();

    assert_eq!(written.patches, expected.patches);
    assert!(written.same_changes(&expected));
    assert!(written.meta.generated_at.is_some());
}

// ============================================================================
// Fixture Cases
// ============================================================================

#[test]
fn test_case_delete() {
    assert_case(
        "dataset_case_delete.csv",
        "suggestions_delete_case1.tsv",
        "expected_delete_case1.json",
    );
}

#[test]
fn test_case_delete_plus_create() {
    assert_case(
        "dataset_case_delete.csv",
        "suggestions_delete_case2.tsv",
        "expected_delete_case2.json",
    );
}

#[test]
fn test_case_delete_plus_update() {
    assert_case(
        "dataset_case_delete_with_delete.csv",
        "suggestions_delete_case3.tsv",
        "expected_delete_case3.json",
    );
}

#[test]
fn test_case_delete_plus_update_plus_create() {
    assert_case(
        "dataset_case_delete_with_delete.csv",
        "suggestions_delete_case4.tsv",
        "expected_delete_case4.json",
    );
}

#[test]
fn test_case_delete_plus_update_plus_create_plus_delete() {
    assert_case(
        "dataset_case_delete_with_delete.csv",
        "suggestions_delete_case5.tsv",
        "expected_delete_case5.json",
    );
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_replace_scenario() {
    let dir = TempDir::new().unwrap();
    let mut row = AnnotationRow::blank(0, "color", "red");
    row.replacement_value = Some("crimson".to_string());

    let outcome = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap();

    let patches = serde_json::to_value(&outcome.patch.patches).unwrap();
    assert_eq!(
        patches,
        json!([
            {"target": {"hhid": "H1", "redcap_event_name": "baseline"}, "deltas": {"color": "crimson"}},
            {"target": {"hhid": "H2", "redcap_event_name": "baseline"}, "deltas": {"color": "crimson"}},
        ])
    );

    let diff = fs::read_to_string(outcome.diff_path.unwrap()).unwrap();
    assert_eq!(
        diff.lines().collect::<Vec<_>>(),
        vec![
            "hhid\tredcap_event_name\tcolor",
            "H1\tbaseline\tcrimson",
            "H2\tbaseline\tcrimson",
        ]
    );
}

#[test]
fn test_delete_scenario_yields_null_delta() {
    let dir = TempDir::new().unwrap();
    let mut row = AnnotationRow::blank(0, "color", "blue");
    row.delete_value = true;

    let outcome = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap();

    assert_eq!(outcome.patch.len(), 1);
    assert_eq!(
        outcome.patch.patches[0].deltas.get("color"),
        Some(&serde_json::Value::Null)
    );
}

#[test]
fn test_delete_takes_precedence_over_replacement() {
    let dir = TempDir::new().unwrap();
    let mut row = AnnotationRow::blank(0, "color", "blue");
    row.delete_value = true;
    row.replacement_value = Some("navy".to_string());

    let outcome = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap();

    assert_eq!(column_cells(&outcome.after, "color").unwrap(), vec![CellValue::Null]);
}

#[test]
fn test_status_group_without_primary_action() {
    let dir = TempDir::new().unwrap();
    let mut row = AnnotationRow::blank(0, "color", "red");
    row.new_columns.push(NewColumnAssignment::new("status", "reviewed"));

    let outcome = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap();

    assert_eq!(
        outcome.touched_columns,
        vec!["hhid", "redcap_event_name", "color", "status"]
    );
    assert_eq!(
        column_cells(&outcome.after, "status").unwrap(),
        vec![text("reviewed"), text("reviewed")]
    );
    assert_eq!(
        column_cells(&outcome.after, "color").unwrap(),
        vec![text("red"), text("red")]
    );
    for patch in &outcome.patch.patches {
        assert_eq!(patch.deltas.len(), 1);
        assert_eq!(patch.deltas.get("status"), Some(&json!("reviewed")));
    }
}

#[test]
fn test_typed_writes() {
    let dir = TempDir::new().unwrap();
    let mut row = AnnotationRow::blank(0, "color", "blue");
    row.new_columns.push(NewColumnAssignment::new("shade", "3.5"));
    row.new_columns.push(NewColumnAssignment::new("checked", "false"));

    let outcome = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap();

    assert_eq!(outcome.after.column("shade").unwrap().dtype(), &DataType::Float64);
    assert_eq!(outcome.after.column("checked").unwrap().dtype(), &DataType::Boolean);
    assert_eq!(
        outcome.patch.patches[0].deltas.get("checked"),
        Some(&json!(false))
    );
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_reconcile_is_idempotent() {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let data = fixture("dataset_case_delete_with_delete.csv");
    let suggestions = fixture("suggestions_delete_case5.tsv");

    let first = reconciler_in(first_dir.path())
        .reconcile_files(&data, &suggestions)
        .unwrap();
    let second = reconciler_in(second_dir.path())
        .reconcile_files(&data, &suggestions)
        .unwrap();

    assert!(first.patch.same_changes(&second.patch));
    assert_eq!(first.edited_ids, second.edited_ids);
}

#[test]
fn test_projection_covers_exactly_the_matched_records() {
    let dir = TempDir::new().unwrap();
    let outcome = reconciler_in(dir.path())
        .reconcile_files(
            &fixture("dataset_case_delete.csv"),
            &fixture("suggestions_delete_case1.tsv"),
        )
        .unwrap();

    // 'none' matches hhid-0005, 'river' matches hhid-0004 without changing it
    let edited: HashSet<String> = outcome.edited_ids.iter().map(|k| k.0[0].clone()).collect();
    let expected: HashSet<String> = ["hhid-0004", "hhid-0005"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(edited, expected);

    let projected: HashSet<String> = column_cells(&outcome.after, "hhid")
        .unwrap()
        .into_iter()
        .filter_map(|cell| cell.to_text())
        .collect();
    assert_eq!(projected, expected);
    assert_eq!(outcome.before.height(), outcome.after.height());
    assert_eq!(outcome.patch.len(), 1);
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn test_missing_column_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let row = AnnotationRow::blank(0, "colour", "red");

    let err = reconciler_in(dir.path())
        .reconcile(survey(), &template(vec![row]))
        .unwrap_err();

    assert!(matches!(err, OtherEntryError::ColumnNotFound(ref c) if c == "colour"));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_existing_output_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let config = ReconcileConfig::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();
    fs::write(config.diff_path(), "keep me").unwrap();

    let err = Reconciler::new(config.clone())
        .reconcile(survey(), &template(vec![AnnotationRow::blank(0, "color", "red")]))
        .unwrap_err();
    assert_eq!(err.error_code(), "OUTPUT_EXISTS");
    assert_eq!(fs::read_to_string(config.diff_path()).unwrap(), "keep me");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

    let forced = ReconcileConfig::builder()
        .output_dir(dir.path())
        .overwrite(true)
        .build()
        .unwrap();
    assert!(
        Reconciler::new(forced)
            .reconcile(survey(), &template(vec![AnnotationRow::blank(0, "color", "red")]))
            .is_ok()
    );
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let err = reconciler_in(dir.path())
        .reconcile_files(&fixture("dataset_case_delete.csv"), Path::new("suggestions.ods"))
        .unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_EXTENSION");

    let err = load_dataset(Path::new("survey.parquet")).unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_EXTENSION");
}

// ============================================================================
// Workbook Generation
// ============================================================================

#[test]
fn test_generated_template_round_trips_through_reconciler() {
    let dir = TempDir::new().unwrap();
    let config = WorkbookConfig::builder()
        .output_dir(dir.path())
        .build()
        .unwrap();

    let (path, rows) = WorkbookGenerator::new(config)
        .generate_file(
            &fixture("dataset_case_delete.csv"),
            Some(&fixture("ignore_list.txt")),
        )
        .unwrap();

    let pairs: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.column_name.clone(), r.unique_value.clone().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("water_source".to_string(), "other".to_string()),
            ("water_source".to_string(), "well".to_string()),
            ("water_source_other".to_string(), "none".to_string()),
            ("water_source_other".to_string(), "river".to_string()),
            ("water_source_other".to_string(), "tap water".to_string()),
        ]
    );

    // A blank template parses back and changes nothing
    let parsed = AnnotationTemplate::from_path(&path).unwrap();
    assert_eq!(parsed.rows, rows);

    let outcome = reconciler_in(dir.path())
        .reconcile_files(&fixture("dataset_case_delete.csv"), &path)
        .unwrap();
    assert!(outcome.patch.is_empty());
    assert_eq!(outcome.rows_processed, 5);
}
