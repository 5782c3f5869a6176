//! glbridge CLI - run and inspect WASM guests headlessly
//!
//! # Commands
//!
//! - `glbridge run` - Run a guest against the recording backend
//! - `glbridge inspect` - Audit a guest's imports and exports
//! - `glbridge config` - Print or write the configuration
//!
//! # Usage
//!
//! ```bash
//! # Run 10 seconds of a guest at 60 Hz and dump every GL call
//! glbridge run scene.wasm --frames 600 --trace calls.json
//!
//! # Fixed-step scheduling with scripted key presses
//! glbridge run scene.wasm --mode fixed-step --input keys.toml
//!
//! # Check a guest before running it
//! glbridge inspect scene.wasm
//! ```

mod config_cmd;
mod inspect;
mod run;
mod script;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// glbridge CLI - run and inspect WASM guests headlessly
#[derive(Parser)]
#[command(name = "glbridge")]
#[command(about = "Run and inspect WASM guests written against a WebGL-style import surface")]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guest headlessly against the recording backend
    Run(run::RunArgs),

    /// Audit a guest's imports and exports without running it
    Inspect(inspect::InspectArgs),

    /// Print or write the configuration
    Config(config_cmd::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run(args) => run::execute(args),
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Config(args) => config_cmd::execute(args),
    }
}
