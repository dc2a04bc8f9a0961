use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "merchant-eval")]
#[command(about = "Evaluate merchant profiles for missing required fields")]
#[command(long_about = "merchant-eval counts the required merchant fields a profile is missing. \
                       Evaluations run in the background; if you stop watching one, its result \
                       is still reported when it finishes.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count missing required fields immediately, without running an evaluation
    Check {
        /// Field values as key=value pairs
        #[arg(long = "field", short = 'f', value_parser = commands::parse_field, help = "Field value, e.g. --field merchantName=Acme")]
        fields: Vec<(String, String)>,
        /// Load the merchant profile from a JSON file
        #[arg(long, help = "Path to a merchant profile JSON file")]
        profile: Option<PathBuf>,
        /// Emit machine-readable output
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },
    /// Run an evaluation through the asynchronous workflow
    Evaluate {
        /// Field values as key=value pairs
        #[arg(long = "field", short = 'f', value_parser = commands::parse_field, help = "Field value, e.g. --field merchantName=Acme")]
        fields: Vec<(String, String)>,
        /// Load the merchant profile from a JSON file
        #[arg(long, help = "Path to a merchant profile JSON file")]
        profile: Option<PathBuf>,
        /// Stop observing the run after this many milliseconds
        #[arg(long, help = "Close the evaluation window after N ms and let the run finish in the background")]
        detach_after_ms: Option<u64>,
        /// Emit machine-readable output
        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },
    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default merchant-eval.toml
    Init {
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite merchant-eval.toml if it already exists")]
        force: bool,
    },
}
