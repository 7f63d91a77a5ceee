//! CLI argument definitions for talentsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Sync one source or every active source |
//! | `sources` | List the source catalog with live status |
//! | `health` | Health-check every source once |
//! | `stats` | Fleet statistics and warehouse totals |
//! | `monitor` | Run the health monitor until interrupted |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings and errors as failures |
//! | `--catalog` | `<home>/sources.toml` | Source catalog path |
//! | `--memory` | `false` | Keep records in memory instead of the warehouse |
//!
//! # Examples
//!
//! ```bash
//! talentsync sync --pretty
//! talentsync sync --source qiwa
//! talentsync sync --deadline-ms 60000 --strict
//! talentsync sources --status active --format table
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Multi-platform recruitment sync client.
#[derive(Debug, Parser)]
#[command(
    name = "talentsync",
    author,
    version,
    about = "Multi-platform recruitment sync client",
    long_about = "talentsync pulls job and candidate listings from many recruitment platforms \
into a local DuckDB warehouse, with per-source rate limiting, retries, response caching and \
health monitoring.\n\
\n\
Use 'talentsync <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Path to the TOML source catalog.
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Keep synced records in memory instead of writing the DuckDB warehouse.
    #[arg(long, global = true, default_value_t = false)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary for terminal display.
    Table,
    /// Single JSON object output.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync one source, or every active source in batches.
    ///
    /// # Examples
    ///
    ///   talentsync sync
    ///   talentsync sync --source bayt
    ///   talentsync sync --deadline-ms 30000
    Sync(SyncArgs),

    /// List configured sources with status and counters.
    Sources(SourcesArgs),

    /// Check every source's base URL once and apply the result.
    Health,

    /// Fleet statistics plus warehouse row counts.
    Stats,

    /// Run the periodic health monitor until Ctrl-C.
    Monitor(MonitorArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Sync only this source id.
    #[arg(long)]
    pub source: Option<String>,

    /// Stop starting new batches after this many milliseconds.
    #[arg(long, conflicts_with = "source")]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Only list sources in this status (active, maintenance, error).
    #[arg(long)]
    pub status: Option<String>,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Override the health check interval in milliseconds.
    #[arg(long)]
    pub interval_ms: Option<u64>,
}
