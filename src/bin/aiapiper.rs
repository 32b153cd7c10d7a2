use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use aia_piper::archive::MedocHttpClient;
use aia_piper::config::ConfigLoader;
use aia_piper::domain::{Cadence, NamingScheme};
use aia_piper::error::PiperError;
use aia_piper::fetch::{FetchOptions, FetchReport, Fetcher};
use aia_piper::output::{JsonOutput, OutputMode, print_fetch_summary};
use aia_piper::progress::{SilentProgress, TerminalProgress};
use aia_piper::request::FetchRequest;

#[derive(Parser)]
#[command(name = "aiapiper")]
#[command(about = "Fetch SDO/AIA images from the MEDOC archive, one per cadence step")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download one file per sample between START and END")]
    Fetch(FetchArgs),
    #[command(about = "List archive records for the range without downloading")]
    List(ListArgs),
}

#[derive(Args, Clone)]
struct RangeArgs {
    /// Start time, e.g. 2023-02-05T00:00:00.000
    start: String,

    /// End time, inclusive
    end: String,

    /// AIA passband in angstroms
    #[arg(long, short)]
    wavelength: u32,

    /// Sampling cadence, e.g. 12min, 1h, 1day
    #[arg(long, short)]
    cadence: Cadence,
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[command(flatten)]
    range: RangeArgs,

    #[arg(long, short)]
    output_dir: Option<String>,

    #[arg(long, value_enum, default_value_t = NamingScheme::Sample)]
    naming: NamingScheme,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone)]
struct ListArgs {
    #[command(flatten)]
    range: RangeArgs,

    #[arg(long, default_value_t = 1)]
    page: u32,

    #[arg(long)]
    limit: Option<u32>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<PiperError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &PiperError) -> u8 {
    match error {
        PiperError::ArchiveUnreachable(_) | PiperError::ArchiveAccessDenied(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let archive = MedocHttpClient::new(&config)?;
    let fetcher = Fetcher::new(archive, config);

    match cli.command {
        Commands::Fetch(args) => run_fetch(args, &fetcher, output_mode),
        Commands::List(args) => run_list(args, &fetcher),
    }
}

fn build_request(range: &RangeArgs, output_dir: Option<&str>) -> Result<FetchRequest, PiperError> {
    FetchRequest::parse(
        &range.start,
        &range.end,
        range.wavelength,
        range.cadence,
        output_dir,
    )
}

fn run_fetch(
    args: FetchArgs,
    fetcher: &Fetcher<MedocHttpClient>,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let request = build_request(&args.range, args.output_dir.as_deref())?;
    let options = FetchOptions {
        naming: args.naming,
        dry_run: args.dry_run,
    };

    let report = match output_mode {
        OutputMode::NonInteractive => {
            let report = fetcher.fetch(&request, &options, &SilentProgress)?;
            JsonOutput::print_fetch(&report).into_diagnostic()?;
            report
        }
        OutputMode::Interactive => {
            let sink = TerminalProgress::new("Downloading SDO files");
            let report = fetcher.fetch(&request, &options, &sink)?;
            if options.dry_run {
                print_plan(&report);
            } else {
                print_fetch_summary(&report);
            }
            report
        }
    };

    if options.dry_run || report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

fn print_plan(report: &FetchReport) {
    println!("{} samples planned:", report.results.len());
    for result in &report.results {
        println!(
            "  {} -> {}",
            result.timestamp,
            result.path.as_deref().unwrap_or("-")
        );
    }
}

fn run_list(args: ListArgs, fetcher: &Fetcher<MedocHttpClient>) -> miette::Result<ExitCode> {
    let request = build_request(&args.range, None)?;
    let records = fetcher.list(&request, args.page, args.limit)?;
    tracing::info!(count = records.len(), "records listed");
    JsonOutput::print_records(&records).into_diagnostic()?;
    Ok(ExitCode::SUCCESS)
}
