use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use wi_core::validation::validate_batch;
use wi_core::{BatchOutcome, DrawingRequest, IndexStorage, RegistryConfig, TransactionJournal};
use wi_storage::{existing_drawings, open_index_store, register_drawings, verify_integrity};

const DEFAULT_LOG_FILTER: &str = "wi_cli=info,wi_storage=info,wi_core=info";

/// Input was refused before any transaction started.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "wi_cli")]
#[command(about = "Registers machining drawings and their work instructions", long_about = None)]
struct Cli {
    /// Data root holding companies.json, search-index.json and work-instructions/.
    /// Falls back to DATA_ROOT_PATH / DEV_DATA_ROOT_PATH.
    #[arg(long, global = true, env = "WI_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Do not serialize index writers (historical behavior).
    #[arg(long, global = true)]
    no_lock: bool,

    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Register one drawing request (object) or a batch (array) from a JSON file
    Register { input: PathBuf },
    /// Print the drawing numbers that already have a directory
    Check {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// Check directories, instruction files and both indices
    Verify {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// Flag a drawing's PDF as present in the search index
    AttachDrawing { number: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegisterInput {
    Batch(Vec<DrawingRequest>),
    Single(Box<DrawingRequest>),
}

impl RegisterInput {
    fn into_requests(self) -> Vec<DrawingRequest> {
        match self {
            RegisterInput::Batch(v) => v,
            RegisterInput::Single(r) => vec![*r],
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = RegistryConfig::from_env();
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    if cli.no_lock {
        config.serialize_index_writes = false;
    }
    tracing::debug!(
        root = %config.data_root.display(),
        serialize = config.serialize_index_writes,
        "configuration"
    );

    match cli.command {
        Commands::Register { input } => register(&config, &input, cli.format),
        Commands::Check { numbers } => {
            let existing = existing_drawings(&config.data_root, &numbers);
            match cli.format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&existing)?),
                Format::Text => existing.iter().for_each(|n| println!("{n}")),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { numbers } => verify(&config, &numbers, cli.format),
        Commands::AttachDrawing { number } => attach_drawing(&config, &number),
    }
}

fn register(config: &RegistryConfig, input: &Path, format: Format) -> Result<ExitCode> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let requests = match serde_json::from_str::<RegisterInput>(&raw) {
        Ok(parsed) => parsed.into_requests(),
        Err(e) => return Ok(reject(format, vec![format!("malformed request: {e}")])),
    };

    let problems = validate_batch(&requests);
    if !problems.is_empty() {
        return Ok(reject(format, problems));
    }

    let numbers: Vec<&str> = requests.iter().map(|r| r.drawing_number.as_str()).collect();
    let taken = existing_drawings(&config.data_root, &numbers);
    if !taken.is_empty() {
        let errors = taken
            .iter()
            .map(|n| format!("drawing {n} is already registered"))
            .collect();
        return Ok(reject(format, errors));
    }

    let outcome = register_drawings(config, &requests);
    print_outcome(&outcome, format)?;

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn reject(format: Format, errors: Vec<String>) -> ExitCode {
    tracing::warn!(count = errors.len(), "request rejected");
    match format {
        Format::Json => println!("{:#}", json!({ "success": false, "errors": errors })),
        Format::Text => {
            println!("rejected:");
            for e in &errors {
                println!("  - {e}");
            }
        }
    }
    ExitCode::from(EXIT_REJECTED)
}

fn print_outcome(outcome: &BatchOutcome, format: Format) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    if outcome.success {
        for d in &outcome.processed {
            println!(
                "registered {} ({} / {})",
                d.drawing_number, d.company_id, d.product_id
            );
        }
    } else {
        println!("registration failed, all changes rolled back:");
        for e in &outcome.errors {
            println!("  - {e}");
        }
        for f in &outcome.rollback_failures {
            println!("  ! rollback left behind: {f}");
        }
    }

    for entry in &outcome.logs {
        let status = if entry.success { "ok" } else { "FAILED" };
        println!(
            "  {} {:<24} {:<6} {}",
            entry.timestamp.with_timezone(&Local).format("%H:%M:%S%.3f"),
            entry.operation.as_str(),
            status,
            entry.path
        );
    }
    Ok(())
}

fn verify(config: &RegistryConfig, numbers: &[String], format: Format) -> Result<ExitCode> {
    let reports = numbers
        .iter()
        .map(|n| verify_integrity(&config.data_root, n))
        .collect::<wi_core::Result<Vec<_>>>()
        .context("integrity check aborted")?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Text => {
            for r in &reports {
                if r.is_valid {
                    println!("{}: ok", r.drawing_number);
                } else {
                    println!("{}: invalid", r.drawing_number);
                    for issue in &r.issues {
                        println!("  - {issue}");
                    }
                }
            }
        }
    }

    Ok(if reports.iter().all(|r| r.is_valid) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn attach_drawing(config: &RegistryConfig, number: &str) -> Result<ExitCode> {
    let mut store = open_index_store(config);
    let mut journal = TransactionJournal::new();

    if let Err(e) = store.mark_drawing_attached(number, &mut journal) {
        for f in store.rollback(&mut journal) {
            tracing::warn!(failure = %f, "rollback left residue");
        }
        return Err(e).with_context(|| format!("cannot attach drawing to {number}"));
    }
    store.commit(&mut journal);

    println!("{number}: drawing attached");
    Ok(ExitCode::SUCCESS)
}
