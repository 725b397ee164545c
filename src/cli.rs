//! CLI argument parsing module for upkeep

use crate::config::DEFAULT_CONFIG_FILE;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Self-update engine for independently versioned application bundles
#[derive(Parser, Debug, Clone)]
#[command(name = "upkeep", version, about = "Keep installed bundles in sync with their published versions")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check every configured target and install newer archives
    Update(UpdateArgs),
    /// Apply the release-time odometer bump to a version file
    Bump(BumpArgs),
    /// Print the version recorded in a version file
    Show(ShowArgs),
}

/// Options for `upkeep update`
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Process only these target ids (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Check only - report available updates without downloading
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable quiet mode - failures and summary only
    #[arg(short, long)]
    pub quiet: bool,
}

impl UpdateArgs {
    /// Whether to draw progress bars
    pub fn show_progress(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Options for `upkeep bump`
#[derive(Args, Debug, Clone)]
pub struct BumpArgs {
    /// Plain-text version file (missing or malformed content counts as 1.0.0)
    pub version_file: PathBuf,

    /// Print the bumped version without writing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Options for `upkeep show`
#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Plain-text version file
    pub version_file: PathBuf,
}
