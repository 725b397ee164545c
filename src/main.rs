//! upkeep - self-update CLI for independently versioned application bundles
//!
//! Subcommands:
//! - `update`: check configured targets and install newer archives
//! - `bump`: odometer-bump a version file at release time
//! - `show`: print a recorded version

use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use upkeep::cli::{BumpArgs, CliArgs, Command, ShowArgs, UpdateArgs};
use upkeep::config::Config;
use upkeep::domain::UpdateTarget;
use upkeep::error::AppError;
use upkeep::logging::init_logging_stderr;
use upkeep::orchestrator::Orchestrator;
use upkeep::output::{create_formatter, OutputConfig};
use upkeep::progress::Progress;
use upkeep::version_store;

/// Exit code when at least one target failed
const EXIT_TARGET_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let verbose = matches!(&args.command, Command::Update(update) if update.verbose);
    init_logging_stderr(verbose);

    // Run the main logic and handle errors
    match run(args.command).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main application logic
async fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Update(args) => update(args).await,
        Command::Bump(args) => Ok(bump(args)?),
        Command::Show(args) => {
            show(args);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn update(args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let (config, targets) = load_targets(&args)?;

    if args.verbose {
        eprintln!("upkeep v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Config: {}", args.config.display());
        if args.dry_run {
            eprintln!("Mode: check only");
        }
    }

    let progress = Arc::new(Progress::new(args.show_progress()));
    let orchestrator = Orchestrator::new(config.orchestrator_config(args.dry_run))
        .map_err(AppError::from)?
        .with_events(progress.sink());
    let report = orchestrator.check_and_update(&targets).await;

    let formatter = create_formatter(OutputConfig::from_cli(
        args.json,
        args.verbose,
        args.quiet,
        args.dry_run,
    ));
    let mut stdout = io::stdout().lock();
    formatter.format(&report, &mut stdout)?;
    stdout.flush()?;

    if report.has_failures() {
        Ok(ExitCode::from(EXIT_TARGET_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn load_targets(args: &UpdateArgs) -> Result<(Config, Vec<UpdateTarget>), AppError> {
    let config = Config::load(&args.config)?;
    let targets = config.select(&args.only)?;
    Ok((config, targets))
}

fn bump(args: BumpArgs) -> Result<ExitCode, AppError> {
    if args.dry_run {
        let (new, old) = version_store::plan_bump(&args.version_file)?;
        println!("{} -> {} (dry-run)", old, new);
    } else {
        let (new, old) = version_store::bump_file(&args.version_file)?;
        println!("{} -> {}", old, new);
    }
    Ok(ExitCode::SUCCESS)
}

fn show(args: ShowArgs) {
    match version_store::read_raw(&args.version_file) {
        Some(version) => println!("{}", version),
        None => println!("absent"),
    }
}
