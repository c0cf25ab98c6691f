//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ddlsort - order schema-diff DDL into versioned migrations
#[derive(Parser, Debug)]
#[command(name = "ddlsort")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "ddlsort - order schema-diff DDL into versioned migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "DDLSORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the execution plan for a schema diff
    Plan(PlanArgs),

    /// Write versioned migration files for a schema diff
    Generate(GenerateArgs),

    /// Check migration files before they are applied
    Validate(ValidateArgs),

    /// Diff the configured databases, generate, validate and apply
    Migrate(MigrateArgs),

    /// Create a ddlsort.toml in the current directory
    Init(InitArgs),

    /// Display version information
    Version,
}

/// Where the diff text comes from
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Read the diff from a file
    #[arg(short, long, conflicts_with = "stdin")]
    pub input: Option<PathBuf>,

    /// Read the diff from standard input
    #[arg(long)]
    pub stdin: bool,
}

// =============================================================================
// Plan Command
// =============================================================================

/// Arguments for the `plan` command
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output formats for `plan`
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// =============================================================================
// Generate Command
// =============================================================================

/// Arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output directory (defaults to migrations.directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// First version number (defaults to the next free version)
    #[arg(long)]
    pub start_version: Option<u32>,
}

// =============================================================================
// Validate Command
// =============================================================================

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Files to validate
    pub files: Vec<PathBuf>,

    /// Validate every versioned file in this directory
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Apply without running validation
    #[arg(long)]
    pub skip_validation: bool,

    /// Show the plan only
    #[arg(long)]
    pub dry_run: bool,
}

// =============================================================================
// Init Command
// =============================================================================

/// Arguments for the `init` command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Source database URL
    #[arg(long)]
    pub source_url: Option<String>,

    /// Target database URL
    #[arg(long)]
    pub target_url: Option<String>,

    /// Overwrite an existing ddlsort.toml
    #[arg(short, long)]
    pub force: bool,
}
