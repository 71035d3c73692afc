//! RustedClaw CLI entry point.
//!
//! Commands:
//! - `inspect`  Classify a snapshot without building anything
//! - `load`     Rebuild a snapshot against the built-in registry
//! - `config`   Show the effective loader configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "rustedclaw",
    about = "RustedClaw: inspect and load component snapshots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List constructors, secrets, and unsupported nodes in a snapshot
    Inspect {
        /// Snapshot file (JSON)
        file: PathBuf,
    },

    /// Rebuild a snapshot and print the result (secrets redacted)
    Load {
        /// Snapshot file (JSON)
        file: PathBuf,

        /// Supply a secret, e.g. `--secret OPENAI_API_KEY=sk-...`
        #[arg(short, long = "secret", value_parser = commands::load::parse_secret)]
        secrets: Vec<(String, String)>,

        /// Never read secrets from the environment
        #[arg(long)]
        no_env: bool,

        /// Override the maximum nesting depth
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Show the effective loader configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { file } => commands::inspect::run(&file).await?,
        Commands::Load {
            file,
            secrets,
            no_env,
            max_depth,
        } => commands::load::run(&file, secrets, no_env, max_depth).await?,
        Commands::Config { path } => {
            if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show().await?
            }
        }
    }

    Ok(())
}
