//! Loading and writing tabular files.
//!
//! Datasets and annotation templates may be `.xlsx`, `.csv` or `.tsv`. Any
//! other extension is rejected before a single byte is read.
//!
//! Datasets are loaded with full schema inference so numeric and boolean
//! columns keep their types. Templates are loaded as text: every cell a human
//! typed is interpreted later by the template parser.

mod excel;

use crate::error::{OtherEntryError, Result, ResultExt};
use crate::utils::ensure_exists;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supported tabular file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Csv,
    Tsv,
}

impl FileFormat {
    /// Pick the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("xlsx") => Ok(FileFormat::Xlsx),
            Some("csv") => Ok(FileFormat::Csv),
            Some("tsv") => Ok(FileFormat::Tsv),
            _ => Err(OtherEntryError::UnsupportedExtension(path.to_path_buf())),
        }
    }

    fn separator(self) -> u8 {
        match self {
            FileFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// How cell types are decided while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaMode {
    /// Infer dtypes from the data.
    Inferred,
    /// Read every column as text.
    Text,
}

/// Load a dataset with inferred column types.
pub fn load_dataset(path: &Path) -> Result<DataFrame> {
    load_table(path, SchemaMode::Inferred)
        .context(format!("Failed to load dataset '{}'", path.display()))
}

/// Load a table with every column read as text.
pub fn load_text_table(path: &Path) -> Result<DataFrame> {
    load_table(path, SchemaMode::Text)
        .context(format!("Failed to load table '{}'", path.display()))
}

fn load_table(path: &Path, schema: SchemaMode) -> Result<DataFrame> {
    // Extension is checked first so a bad name fails even if the file is missing
    let format = FileFormat::from_path(path)?;
    ensure_exists(path)?;

    info!("Loading {:?} file: {}", format, path.display());
    let df = match format {
        FileFormat::Xlsx => excel::read_first_sheet(path, schema == SchemaMode::Text)?,
        FileFormat::Csv | FileFormat::Tsv => read_delimited(path, format.separator(), schema)?,
    };
    debug!("Loaded {} rows x {} columns", df.height(), df.width());
    Ok(df)
}

fn read_delimited(path: &Path, separator: u8, schema: SchemaMode) -> Result<DataFrame> {
    // Some(0) reads every column as String, None scans the whole file
    let infer_length = match schema {
        SchemaMode::Inferred => None,
        SchemaMode::Text => Some(0),
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(infer_length)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"')),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()?;
    Ok(df)
}

/// Write a frame as tab-separated text with a header row.
pub fn write_tsv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .with_quote_char(b'"')
        .finish(df)?;

    info!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;
    use crate::utils::column_cells;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("data.tsv")).unwrap(),
            FileFormat::Tsv
        );
        assert_eq!(
            FileFormat::from_path(Path::new("DATA.CSV")).unwrap(),
            FileFormat::Csv
        );
        assert_eq!(
            FileFormat::from_path(Path::new("book.xlsx")).unwrap(),
            FileFormat::Xlsx
        );
        assert!(matches!(
            FileFormat::from_path(Path::new("data.parquet")),
            Err(OtherEntryError::UnsupportedExtension(_))
        ));
        assert!(FileFormat::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_unsupported_extension_wins_over_missing_file() {
        let err = load_dataset(Path::new("does/not/exist.json")).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_EXTENSION");
    }

    #[test]
    fn test_missing_file() {
        let err = load_dataset(Path::new("does/not/exist.csv")).unwrap_err();
        assert_eq!(err.error_code(), "INPUT_NOT_FOUND");
    }

    #[test]
    fn test_load_tsv_inferred_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        fs::write(&path, "hhid\tage\tcolor\nH1\t31\tred\nH2\t\tblue\n").unwrap();

        let df = load_dataset(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("age").unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            column_cells(&df, "age").unwrap(),
            vec![CellValue::Int(31), CellValue::Null]
        );

        let text = load_text_table(&path).unwrap();
        assert_eq!(text.column("age").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_write_tsv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.tsv");
        let mut df = df![
            "hhid" => ["H1", "H2"],
            "color" => [Some("crimson"), None],
        ]
        .unwrap();

        write_tsv(&mut df, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("hhid\tcolor\n"));
        assert!(content.contains("H1\tcrimson"));
    }
}
