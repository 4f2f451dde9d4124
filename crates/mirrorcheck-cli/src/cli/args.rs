//! Command-line argument definitions using clap.

use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Package mirror consistency checker
///
/// Fingerprints recently changed files on the source repository and checks
/// that every mirror and CDN edge node serves the same content.
#[derive(Parser, Debug)]
#[command(name = "mirrorcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "MIRRORCHECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check mirrors against the source repository
    Run(RunArgs),

    /// Show files changed on the source within the scan window
    Changes(ChangesArgs),

    /// List mirrors from the target list
    Mirrors,

    /// Fingerprint one file on a URL prefix
    Fingerprint(FingerprintArgs),

    /// Discover the edge nodes serving a CDN host
    Vantage(VantageArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

// ============================================================================
// Run command
// ============================================================================

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Check only the mirror with this id
    #[arg(short, long)]
    pub mirror: Option<String>,

    /// Write per-target text reports into this directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Skip hidden mirrors (negative weight)
    #[arg(long)]
    pub exclude_hidden: bool,

    /// Override the retry budget
    #[arg(long)]
    pub max_retries: Option<u32>,
}

// ============================================================================
// Changes command
// ============================================================================

#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Scan window in days (overrides the config)
    #[arg(short, long)]
    pub days: Option<u32>,

    /// Show the sampled probe set instead of every changed file
    #[arg(long, conflicts_with = "current")]
    pub sample: bool,

    /// Show the source's `current.json` manifest
    #[arg(long)]
    pub current: bool,
}

// ============================================================================
// Fingerprint command
// ============================================================================

#[derive(Args, Debug)]
pub struct FingerprintArgs {
    /// File path relative to the repository root
    pub path: String,

    /// URL prefix to probe (defaults to the source repository)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Probe through this CDN edge node, keeping the prefix host as Host
    #[arg(long)]
    pub node: Option<String>,

    /// Also fingerprint the source and compare
    #[arg(long)]
    pub compare: bool,
}

// ============================================================================
// Vantage command
// ============================================================================

#[derive(Args, Debug)]
pub struct VantageArgs {
    /// CDN host (defaults to the configured default host)
    pub host: Option<String>,

    /// Fall back to configured nodes when discovery fails
    #[arg(long)]
    pub fallback: bool,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
