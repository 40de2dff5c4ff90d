//! Char-Graph CLI - sample an LLM many times and study the shape of its answers.
//!
//! `cgc collect` gathers samples into a resumable snapshot; the other
//! commands post-process snapshots offline.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::collect::CollectArgs;
use commands::config as config_cmd;
use config::Config;

/// Char-Graph CLI - Character prefix graphs of sampled LLM outputs.
#[derive(Parser, Debug)]
#[command(
    name = "cgc",
    author,
    version,
    about = "Char-Graph: collect LLM samples into a character prefix graph",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample a prompt repeatedly, resuming a previous run when possible.
    Collect(CollectArgs),

    /// Replace a snapshot's graph with its path-compressed form.
    Compress {
        /// Snapshot to read.
        input: PathBuf,

        /// Where to write the compressed snapshot.
        output: PathBuf,
    },

    /// Print totals, graph size and per-depth statistics of a snapshot.
    Inspect {
        /// Snapshot to inspect.
        snapshot: PathBuf,
    },

    /// Render a snapshot's graph as a Mermaid flowchart.
    Mermaid {
        /// Snapshot to render.
        snapshot: PathBuf,

        /// Output file (defaults to stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity; RUST_LOG wins when set
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Collect(args) => {
            commands::collect::execute(&config, args).await?;
        }

        Commands::Compress { input, output } => {
            commands::compress::execute(&input, &output)?;
        }

        Commands::Inspect { snapshot } => {
            commands::inspect::execute(&snapshot)?;
        }

        Commands::Mermaid { snapshot, output } => {
            commands::mermaid::execute(&snapshot, output.as_deref())?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => {
                config_cmd::show(&config)?;
            }
            ConfigCommands::Set { key, value } => {
                config_cmd::set(&key, &value)?;
            }
            ConfigCommands::Reset => {
                config_cmd::reset()?;
            }
            ConfigCommands::Path => {
                if let Some(path) = Config::config_file_path() {
                    println!("{}", path.display());
                } else {
                    println!("(no config file path available)");
                }
            }
        },
    }

    Ok(())
}
