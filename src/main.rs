//! tabula - classic map series converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tabula::compose::LayoutStyle;
use tabula::pipeline::EntryOutcome;
use tabula::publish::{DirectoryPlatform, MemoryPlatform, Platform};
use tabula::{ConversionReport, ConvertOptions, Converter, LegacyDocument, theme};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(version, about = "Classic map series converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    tabula inspect series.json                 Show series settings and entries
    tabula convert series.json --out stories   Convert into ./stories
    tabula convert series.json --dry-run       Convert without writing anything")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show series settings without converting
    Inspect {
        /// Classic series item data (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Convert a series into stories and a collection
    Convert {
        /// Classic series item data (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", required_unless_present = "dry_run")]
        out: Option<PathBuf>,

        /// Conversion options (TOML)
        #[arg(short, long, value_name = "TOML")]
        config: Option<PathBuf>,

        /// Seconds to wait for each story's validation
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Item id of the classic series
        #[arg(long, value_name = "ID")]
        item_id: Option<String>,

        /// Convert in memory only
        #[arg(long)]
        dry_run: bool,

        /// Write the conversion report as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let result = match cli.command {
        Command::Inspect { input } => inspect(&input),
        Command::Convert {
            input,
            out,
            config,
            timeout,
            item_id,
            dry_run,
            report,
        } => {
            let args = ConvertArgs {
                input,
                out,
                config,
                timeout,
                item_id,
                dry_run,
                report,
            };
            convert(args, cli.quiet).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> tabula::Result<LegacyDocument> {
    LegacyDocument::from_slice(&std::fs::read(path)?)
}

fn inspect(path: &Path) -> tabula::Result<()> {
    let legacy = load(path)?;
    let summary = legacy.summary();

    println!("File: {}", path.display());
    println!("Title: {}", summary.title);
    if let Some(ref subtitle) = summary.subtitle {
        println!("Subtitle: {subtitle}");
    }
    match LayoutStyle::from_legacy(&summary.layout) {
        Ok(style) => println!("Layout: {} -> {style}", summary.layout),
        Err(e) => println!("Layout: {} ({e})", summary.layout),
    }
    if let Some(ref position) = summary.panel_position {
        println!("Panel: {position}");
    }
    let name = summary.theme_name.as_deref().unwrap_or("unnamed");
    match theme::resolve(&summary.theme_group) {
        Ok(t) => println!("Theme: {name} ({}) -> {t}", summary.theme_group),
        Err(e) => println!("Theme: {name} ({e})"),
    }
    if legacy.maps_sync {
        println!("Maps: synced");
    }
    println!("Entries: {}", summary.entries.len());
    for (i, entry) in summary.entries.iter().enumerate() {
        let hidden = if entry.hidden { " [hidden]" } else { "" };
        println!("  {:>3}. {} ({}){hidden}", i + 1, entry.title, entry.media_kind);
    }

    Ok(())
}

struct ConvertArgs {
    input: PathBuf,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
    timeout: Option<u64>,
    item_id: Option<String>,
    dry_run: bool,
    report: Option<PathBuf>,
}

async fn convert(args: ConvertArgs, quiet: bool) -> tabula::Result<()> {
    let mut options = match &args.config {
        Some(path) => ConvertOptions::load(path)?,
        None => ConvertOptions::default(),
    };
    if let Some(secs) = args.timeout {
        options.verify_timeout_secs = secs;
    }
    options.validate()?;

    let mut legacy = load(&args.input)?;
    if let Some(item_id) = args.item_id {
        legacy = legacy.with_item_id(item_id);
    }

    let platform: Arc<dyn Platform> = match (&args.out, args.dry_run) {
        (Some(out), false) => Arc::new(DirectoryPlatform::new(out)),
        _ => Arc::new(MemoryPlatform::new()),
    };
    let report = Converter::new(platform, options).run(&legacy).await?;

    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_vec_pretty(&report)?)?;
    }
    if !quiet {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ConversionReport) {
    println!("{} ({}, {})", report.title, report.theme, report.layout);
    for entry in &report.entries {
        let status = match &entry.outcome {
            EntryOutcome::Published { record } => record.status.to_string(),
            EntryOutcome::BuildFailed { stage, error } => {
                format!("not built ({stage}: {error})")
            }
        };
        println!("  {:>3}. {} - {status}", entry.index + 1, entry.title);
        for warning in &entry.warnings {
            println!("       warning: {warning}");
        }
    }
    println!(
        "Collection {}: {} of {} stories, {} warning(s)",
        report.aggregate_id,
        report.verified_count(),
        report.entries.len(),
        report.warning_count()
    );
}
