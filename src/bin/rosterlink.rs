//! rosterlink command line
//!
//! Links the rows of an input CSV to the rows of a destination CSV that
//! denote the same people, asking about entities it cannot match itself.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rosterlink::config::{LinkConfig, TableSource};
use rosterlink::error::ConfigError;
use rosterlink::job;
use rosterlink::{ExactLabelMatcher, LinkResult, PromptMatcher};

#[derive(Parser)]
#[command(name = "rosterlink")]
#[command(about = "Link rows of two CSV exports that refer to the same people")]
#[command(version)]
#[command(after_help = "\
Examples:
  rosterlink --config job.json
  rosterlink --input grades.csv --input-key username --input-candidates @key \\
      --destination gradebook.csv --destination-candidates 'Student,SIS Login ID' \\
      --output linked.csv --report report.json")]
struct Cli {
    /// JSON job config; other flags override its fields
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Input CSV
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Input key column (rows are numbered when omitted)
    #[arg(long)]
    input_key: Option<String>,

    /// Input candidate columns in priority order; `@key` is the row key
    #[arg(long, value_delimiter = ',')]
    input_candidates: Vec<String>,

    /// Destination CSV
    #[arg(long, short = 'd')]
    destination: Option<PathBuf>,

    /// Destination key column
    #[arg(long)]
    destination_key: Option<String>,

    /// Destination candidate columns in priority order
    #[arg(long, value_delimiter = ',')]
    destination_candidates: Vec<String>,

    /// Destination candidate used to label output rows
    #[arg(long)]
    label_column: Option<String>,

    /// Output CSV
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write a JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Pair only labels that match exactly instead of prompting
    #[arg(long, env = "ROSTERLINK_NON_INTERACTIVE")]
    non_interactive: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn missing(flag: &str) -> ConfigError {
    ConfigError::Invalid {
        section: flag.to_string(),
        reason: "required when no --config is given".to_string(),
    }
}

fn source(
    path: Option<PathBuf>,
    key: Option<String>,
    candidates: Vec<String>,
    flag: &str,
) -> Result<TableSource, ConfigError> {
    let mut source = TableSource::new(path.ok_or_else(|| missing(flag))?, candidates);
    source.key_column = key;
    Ok(source)
}

fn override_source(
    source: &mut TableSource,
    path: Option<PathBuf>,
    key: Option<String>,
    candidates: Vec<String>,
) {
    if let Some(path) = path {
        source.path = path;
    }
    if key.is_some() {
        source.key_column = key;
    }
    if !candidates.is_empty() {
        source.candidates = candidates;
    }
}

fn build_config(cli: Cli) -> LinkResult<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = LinkConfig::load(path)?;
            override_source(&mut config.input, cli.input, cli.input_key, cli.input_candidates);
            override_source(
                &mut config.destination,
                cli.destination,
                cli.destination_key,
                cli.destination_candidates,
            );
            if let Some(output) = cli.output {
                config.output = output;
            }
            config
        }
        None => LinkConfig {
            input: source(cli.input, cli.input_key, cli.input_candidates, "--input")?,
            destination: source(
                cli.destination,
                cli.destination_key,
                cli.destination_candidates,
                "--destination",
            )?,
            output: cli.output.ok_or_else(|| missing("--output"))?,
            interactive: true,
            report: None,
            label_column: None,
        },
    };

    if cli.report.is_some() {
        config.report = cli.report;
    }
    if cli.label_column.is_some() {
        config.label_column = cli.label_column;
    }
    if cli.non_interactive {
        config.interactive = false;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> LinkResult<()> {
    let config = build_config(cli)?;

    let outcome = if config.interactive {
        let mut matcher = PromptMatcher::new(io::stdin().lock(), io::stderr());
        job::run(&config, &mut matcher)?
    } else {
        job::run(&config, &mut ExactLabelMatcher)?
    };

    println!(
        "{} rows written to {} ({} reconciled, {} unplaced)",
        outcome.rows_written,
        config.output.display(),
        outcome.reconciliation.applied.len(),
        outcome.unplaced.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
