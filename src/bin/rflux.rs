//! rflux CLI - Command-line interface for retention-flux
//!
//! Commands:
//! - build: Turn interaction logs into a dataset view
//! - validate: Validate interaction log records
//! - schema: Describe the input record schema

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use retention_flux::corpus::{AllowList, Corpus};
use retention_flux::schema::RecordAdapter;
use retention_flux::{
    ClickCounting, DatasetView, Message, Projection, RetentionConfig, RetentionError,
    FLUX_VERSION, PRODUCER_NAME,
};

/// rflux - Build vocabulary retention datasets from interaction logs
#[derive(Parser)]
#[command(name = "rflux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn interaction logs into retention-curve datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dataset from interaction logs
    Build {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Rows to build for each entity
        #[arg(long, default_value = "training")]
        view: ViewKind,

        /// Feature columns of the events and snapshot views
        #[arg(long, default_value = "all")]
        projection: ProjectionArg,

        /// Let highlights and reads carry click outcomes in the events view
        #[arg(long)]
        text_as_clicks: bool,

        /// Only keep logs of these users (comma separated)
        #[arg(long, value_delimiter = ',')]
        users: Vec<String>,

        /// Load parameters from a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the ingestion and assembly report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate interaction log records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the input record schema
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum ViewKind {
    /// Bucketed rows labeled with the inferred retention rate
    Training,
    /// One row per outcome-carrying event, labeled by CLICKED
    Events,
    /// One row per entity after all of its events
    Snapshot,
    /// Unlabeled rows at a fixed interval for drawing curves
    Plotting,
    /// Sorted, normalized messages per entity
    Messages,
    /// Growing prefixes of each entity's training rows
    Prefixes,
}

#[derive(Clone, ValueEnum)]
enum ProjectionArg {
    Common,
    Reading,
    Revision,
    All,
}

impl From<ProjectionArg> for Projection {
    fn from(arg: ProjectionArg) -> Self {
        match arg {
            ProjectionArg::Common => Projection::Common,
            ProjectionArg::Reading => Projection::Reading,
            ProjectionArg::Revision => Projection::Revision,
            ProjectionArg::All => Projection::All,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), RflxCliError> {
    match cli.command {
        Commands::Build {
            input,
            output,
            input_format,
            output_format,
            view,
            projection,
            text_as_clicks,
            users,
            config,
            report,
        } => {
            let counting = if text_as_clicks {
                ClickCounting::TextAsClicks
            } else {
                ClickCounting::ExercisesOnly
            };
            let allow = (!users.is_empty()).then(|| AllowList::users(users));
            cmd_build(BuildArgs {
                input: &input,
                output: &output,
                input_format,
                output_format,
                view,
                projection: projection.into(),
                counting,
                allow,
                config: config.as_deref(),
                report: report.as_deref(),
            })
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

struct BuildArgs<'a> {
    input: &'a Path,
    output: &'a Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    view: ViewKind,
    projection: Projection,
    counting: ClickCounting,
    allow: Option<AllowList>,
    config: Option<&'a Path>,
    report: Option<&'a Path>,
}

fn cmd_build(args: BuildArgs<'_>) -> Result<(), RflxCliError> {
    let config = match args.config {
        Some(path) => RetentionConfig::from_json(&fs::read_to_string(path)?)?,
        None => RetentionConfig::default(),
    };

    let records = read_records(args.input, &args.input_format)?;
    if records.is_empty() {
        return Err(RflxCliError::NoRecords);
    }

    let mut corpus = Corpus::with_config(config.clone());
    let ingest = corpus.add_records(&records, args.allow.as_ref());

    let (output_data, assembly) = match args.view {
        ViewKind::Messages => {
            let sequences = corpus.message_sequences()?;
            (format_output(&sequences, &args.output_format)?, None)
        }
        ViewKind::Prefixes => {
            let prefixes = corpus.training_prefixes()?;
            (format_output(&prefixes, &args.output_format)?, None)
        }
        kind => {
            let view = match kind {
                ViewKind::Events => DatasetView::Events {
                    projection: args.projection,
                    counting: args.counting,
                },
                ViewKind::Snapshot => DatasetView::Flattened {
                    projection: args.projection,
                },
                ViewKind::Plotting => DatasetView::plotting(&config),
                _ => DatasetView::Training,
            };
            let dataset = corpus.build_dataset(view)?;
            (format_output(&dataset.rows, &args.output_format)?, Some(dataset.report))
        }
    };

    if let Some(path) = args.report {
        let report = BuildReport {
            producer: PRODUCER_NAME,
            version: FLUX_VERSION,
            accepted: ingest.accepted,
            rejected: ingest.rejected.len(),
            excluded: ingest.excluded,
            earliest: ingest.earliest.map(|t| t.to_rfc3339()),
            latest: ingest.latest.map(|t| t.to_rfc3339()),
            assembly,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }

    if args.output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(args.output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), RflxCliError> {
    let records = read_records(input, &input_format)?;

    // Validate each record
    let rejections = RecordAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - rejections.len(),
        invalid_records: rejections.len(),
        errors: rejections
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                user: r.user.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Record {} (user {}): {}",
                    err.index,
                    err.user.as_deref().unwrap_or("unknown"),
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        return Err(RflxCliError::ValidationFailed(report.invalid_records));
    }
    Ok(())
}

fn cmd_schema(json_schema: bool) -> Result<(), RflxCliError> {
    if json_schema {
        println!("{}", serde_json::to_string_pretty(&input_json_schema())?);
        return Ok(());
    }

    println!("Input Schema: interaction log record");
    println!();
    println!("Each record is one interaction of a user with a vocabulary item:");
    println!();
    println!("- user: string");
    println!("- item: string (legacy name: lemma)");
    println!("- timestamp: integer seconds");
    println!("- message: one of");
    for message in Message::ALL {
        let class = if message.is_click() {
            "click"
        } else if message.is_recall() {
            "recall"
        } else {
            "continuation"
        };
        println!("    {:<26} {}", message.as_str(), class);
    }
    Ok(())
}

fn input_json_schema() -> serde_json::Value {
    let messages: Vec<&str> = Message::ALL.iter().map(Message::as_str).collect();
    serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Interaction log record",
        "type": "object",
        "required": ["user", "item", "timestamp", "message"],
        "properties": {
            "user": { "type": "string" },
            "item": { "type": "string" },
            "timestamp": { "type": "integer" },
            "message": { "type": "string", "enum": messages }
        }
    })
}

fn read_records(
    input: &Path,
    format: &InputFormat,
) -> Result<Vec<serde_json::Value>, RflxCliError> {
    let data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            tracing::warn!("reading records from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    Ok(match format {
        InputFormat::Ndjson => RecordAdapter::parse_ndjson(&data)?,
        InputFormat::Json => RecordAdapter::parse_array(&data)?,
    })
}

fn format_output<T: Serialize>(items: &[T], format: &OutputFormat) -> Result<String, RflxCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for item in items {
                lines.push(serde_json::to_string(item)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(items)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(items)?),
    }
}

// Error handling

#[derive(Debug)]
enum RflxCliError {
    Io(io::Error),
    Retention(RetentionError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
}

impl From<io::Error> for RflxCliError {
    fn from(e: io::Error) -> Self {
        RflxCliError::Io(e)
    }
}

impl From<RetentionError> for RflxCliError {
    fn from(e: RetentionError) -> Self {
        RflxCliError::Retention(e)
    }
}

impl From<serde_json::Error> for RflxCliError {
    fn from(e: serde_json::Error) -> Self {
        RflxCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RflxCliError> for CliError {
    fn from(e: RflxCliError) -> Self {
        match e {
            RflxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RflxCliError::Retention(e) => {
                let (code, hint) = match &e {
                    RetentionError::InsufficientData(_) => {
                        ("INSUFFICIENT_DATA", "Provide at least two valid records")
                    }
                    RetentionError::InvalidParameter(_) => {
                        ("INVALID_PARAMETER", "Check the config file values")
                    }
                    RetentionError::Validation(_) => {
                        ("VALIDATION_ERROR", "Run 'rflux validate' for details")
                    }
                    _ => ("PARSE_ERROR", "Ensure input matches the interaction log schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            RflxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RflxCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Check that the input file is not empty".to_string()),
            },
            RflxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(Serialize)]
struct ValidationErrorDetail {
    index: usize,
    user: Option<String>,
    error: String,
}

#[derive(Serialize)]
struct BuildReport {
    producer: &'static str,
    version: &'static str,
    accepted: usize,
    rejected: usize,
    excluded: usize,
    earliest: Option<String>,
    latest: Option<String>,
    assembly: Option<retention_flux::AssemblyReport>,
}
