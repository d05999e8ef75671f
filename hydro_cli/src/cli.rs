//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Keeps the non-blocking file writer alive for the whole process.
pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "hydroctl", version, about = "Hydroponic control loop CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/hydro_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduled control loops until interrupted
    Run,
    /// Run a single read-and-correct cycle, then exit
    Cycle {
        /// Override the primary acquisition budget (ms)
        #[arg(long, value_name = "MS")]
        primary_budget_ms: Option<u64>,
        /// Override the retry budget (ms)
        #[arg(long, value_name = "MS")]
        retry_budget_ms: Option<u64>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
