//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },

    /// Timing report commands
    Report {
        #[command(subcommand)]
        report_cmd: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (defaults to env-only configuration)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output file path (prints to stdout when omitted)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Print every report document in a file as a per-phase summary
    Show {
        /// Path to the multi-document report file
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Re-apply the variance gate to the latest report document
    Gate {
        /// Path to the multi-document report file
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// Phase the gate compares across runs
        #[arg(long, value_name = "PHASE", default_value = "scheduled")]
        phase: String,

        /// Run keys ending with this suffix are the baseline
        #[arg(long, value_name = "SUFFIX", default_value = "baseline")]
        baseline_suffix: String,

        /// Allowed elapsed-time overhead over the baseline (0.10 = 10%)
        #[arg(long, value_name = "FRACTION", default_value = "0.10")]
        allowed_overhead: f64,
    },
}
