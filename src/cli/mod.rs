//! CLI interface for perp-sentinel
//!
//! Provides subcommands for:
//! - `run`: Replay a candle file through the engine
//! - `check`: Validate the configuration file
//! - `config`: Show effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "perp-sentinel")]
#[command(about = "Adaptive position and risk management engine for crypto perpetuals")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a candle file through the engine
    Run(RunArgs),
    /// Validate the configuration file
    Check,
    /// Show effective configuration
    Config,
}
