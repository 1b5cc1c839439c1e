//! CLI entry point for the other-entry workflow.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use other_entry::utils::ensure_exists;
use other_entry::{
    AnnotationTemplate, ErrorCategory, FileFormat, OtherEntryError, ReconcileConfig, Reconciler,
    ValueDictionary, WorkbookConfig, WorkbookGenerator, check_template, load_dataset,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Review and reconcile free-text survey entries",
    long_about = "Extracts free-text values from a dataset into an annotation template, \
                  then applies the completed template back as a record patch.\n\n\
                  EXAMPLES:\n  \
                  # Build the review template\n  \
                  other-entry process-human-entered-fields survey.tsv other_ignore_list.txt\n\n  \
                  # Apply the reviewed template\n  \
                  other-entry process-human-suggestions survey.tsv human_entry_suggestions.xlsx\n\n  \
                  # Check annotated values against a dictionary first\n  \
                  other-entry process-human-suggestions survey.tsv suggestions.xlsx fields.json --validate"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory outputs are written into
    #[arg(long, global = true, default_value = "./")]
    output_dir: PathBuf,

    /// Overwrite outputs left over from a previous run
    #[arg(long, global = true)]
    force: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a blank annotation template listing every free-text value
    ProcessHumanEnteredFields {
        /// Dataset to scan (.xlsx, .csv or .tsv)
        data_in: PathBuf,

        /// Column names to leave out, one per line
        #[arg(default_value = "./other_ignore_list.txt")]
        ignore_list: PathBuf,
    },

    /// Apply a completed annotation template and write the patch
    ProcessHumanSuggestions {
        /// Dataset the template was generated from
        data_in: PathBuf,

        /// Completed annotation template
        #[arg(default_value = "./human_entry_suggestions.xlsx")]
        replacement_list: PathBuf,

        /// JSON value dictionary, only read with --validate
        #[arg(default_value = "./lookup-table/JSON_fields.json")]
        input_dictionary: PathBuf,

        /// Identifier column (repeat for a composite identifier)
        #[arg(long = "id-column", default_values = ["hhid", "redcap_event_name"])]
        id_columns: Vec<String>,

        /// Check annotated values against the dictionary before applying
        #[arg(long)]
        validate: bool,
    },
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load environment variables from .env file
    dotenv().ok();

    init_logging(&cli.log_level, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 0 success, 1 internal, 2 configuration, 3 data, 4 validation.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err
        .downcast_ref::<OtherEntryError>()
        .map(OtherEntryError::category)
    {
        Some(ErrorCategory::Configuration) => 2,
        Some(ErrorCategory::Data) => 3,
        Some(ErrorCategory::Validation) => 4,
        Some(ErrorCategory::Internal) | None => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::ProcessHumanEnteredFields {
            ref data_in,
            ref ignore_list,
        } => process_human_entered_fields(&cli, data_in, ignore_list),
        Command::ProcessHumanSuggestions {
            ref data_in,
            ref replacement_list,
            ref input_dictionary,
            ref id_columns,
            validate,
        } => {
            let dictionary = validate.then_some(input_dictionary.as_path());
            process_human_suggestions(&cli, data_in, replacement_list, dictionary, id_columns)
        }
    }
}

/// Reject unreadable extensions first, then missing files.
fn check_table_input(path: &Path) -> Result<(), OtherEntryError> {
    FileFormat::from_path(path)?;
    ensure_exists(path)
}

fn process_human_entered_fields(cli: &Cli, data_in: &Path, ignore_list: &Path) -> Result<()> {
    check_table_input(data_in)?;
    ensure_exists(ignore_list)?;

    let config = WorkbookConfig::builder()
        .output_dir(cli.output_dir.clone())
        .overwrite(cli.force)
        .build()
        .map_err(OtherEntryError::from)?;

    let generator = WorkbookGenerator::try_from(config)?;
    let (path, rows) = generator.generate_file(data_in, Some(ignore_list))?;

    println!("Wrote {} values to review to {}", rows.len(), path.display());
    Ok(())
}

fn process_human_suggestions(
    cli: &Cli,
    data_in: &Path,
    replacement_list: &Path,
    dictionary: Option<&Path>,
    id_columns: &[String],
) -> Result<()> {
    check_table_input(data_in)?;
    check_table_input(replacement_list)?;
    if let Some(path) = dictionary {
        ensure_exists(path)?;
    }

    let config = ReconcileConfig::builder()
        .id_columns(id_columns.iter().cloned())
        .output_dir(cli.output_dir.clone())
        .overwrite(cli.force)
        .build()
        .map_err(OtherEntryError::from)?;
    let reconciler = Reconciler::new(config);

    let outcome = match dictionary {
        Some(dictionary_path) => {
            let dataset = load_dataset(data_in)?;
            let template = AnnotationTemplate::from_path(replacement_list)?;
            let dictionary = ValueDictionary::from_path(dictionary_path)?;

            let columns: Vec<String> = dataset
                .get_column_names()
                .into_iter()
                .map(|s| s.to_string())
                .collect();

            info!("Checking annotated values against {}", dictionary_path.display());
            if !check_template(&dictionary, &template, &columns) {
                return Err(OtherEntryError::ValidationFailed(format!(
                    "entries in '{}' do not match '{}'",
                    replacement_list.display(),
                    dictionary_path.display()
                ))
                .into());
            }
            reconciler.reconcile(dataset, &template)?
        }
        None => reconciler.reconcile_files(data_in, replacement_list)?,
    };

    if let Some(diff_path) = &outcome.diff_path {
        println!("Diff written to {}", diff_path.display());
    }
    println!(
        "Patch with {} records written to {}",
        outcome.patch.len(),
        outcome.patch_path.display()
    );
    Ok(())
}
