use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use memento::catalog;
use memento::config::ConfigLoader;
use memento::error::MementoError;
use memento::fetch::HttpFetcher;
use memento::ledger::FileLedger;
use memento::output::{self, ConsoleOutput};
use memento::pipeline::{Pipeline, RunOptions};
use memento::video::{FfmpegTagger, VideoTagger};

#[derive(Parser)]
#[command(name = "memento")]
#[command(
    about = "Download a memories HTML export and embed capture time and location into each file"
)]
#[command(version, author)]
struct Cli {
    /// Path to params.json (defaults to ./params.json)
    #[arg(long)]
    config: Option<String>,

    /// Catalog HTML file; overrides the config value
    #[arg(long)]
    catalog: Option<Utf8PathBuf>,

    /// Output directory; overrides the config value
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// First catalog index to process; overrides the config value
    #[arg(long)]
    start_index: Option<usize>,

    /// Exit without waiting for a keypress
    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MementoError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MementoError) -> u8 {
    match error {
        MementoError::MissingConfig
        | MementoError::ConfigRead(_)
        | MementoError::ConfigParse(_)
        | MementoError::CatalogRead(_) => 2,
        MementoError::TlsExhausted { .. }
        | MementoError::Transport { .. }
        | MementoError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (catalog_path, out_dir, starting_index) = resolve_inputs(&cli).into_diagnostic()?;

    fs::create_dir_all(out_dir.as_std_path()).into_diagnostic()?;
    let rows = catalog::load(&catalog_path).into_diagnostic()?;
    // First table row is the column header, not a file.
    println!("Number of files: {}", rows.len().saturating_sub(1));

    let fetcher = HttpFetcher::new().into_diagnostic()?;
    let video = FfmpegTagger::new();
    if !video.available() {
        tracing::info!("ffmpeg not found on PATH; videos will get sidecars instead of tags");
    }
    let ledger = FileLedger::new(&out_dir);
    let pipeline = Pipeline::new(out_dir, fetcher, video, ledger);

    let run_result = pipeline.run(&rows, RunOptions { starting_index }, &ConsoleOutput);
    if let Ok(summary) = &run_result {
        output::print_summary(summary);
    }
    if !cli.non_interactive {
        output::wait_for_ack().into_diagnostic()?;
    }
    run_result.map(|_| ()).into_diagnostic()
}

fn resolve_inputs(cli: &Cli) -> Result<(Utf8PathBuf, Utf8PathBuf, usize), MementoError> {
    // With both paths on the command line the config file is optional.
    if let (Some(catalog), Some(out_dir)) = (&cli.catalog, &cli.out_dir) {
        return Ok((
            catalog.clone(),
            out_dir.clone(),
            cli.start_index.unwrap_or(0),
        ));
    }
    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    Ok((
        cli.catalog.clone().unwrap_or(resolved.catalog_path),
        cli.out_dir.clone().unwrap_or(resolved.output_dir),
        cli.start_index.unwrap_or(resolved.starting_index),
    ))
}
