mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{bindings, check, known_types, lists, Workspace};

#[derive(Parser)]
#[command(name = "anchorage")]
#[command(about = "Inspect declarative component manifests")]
#[command(version)]
struct Cli {
    /// Environment tag to register for (repeatable, overrides ANCHORAGE_ENVIRONMENT_TAGS)
    #[arg(long = "tag", global = true)]
    tags: Vec<String>,

    /// Registry configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a manifest and run registration against it
    Check {
        /// Path to the manifest file
        manifest: PathBuf,
    },

    /// Show the winning binding for every contract
    Bindings {
        /// Path to the manifest file
        manifest: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show list members per list contract
    Lists {
        /// Path to the manifest file
        manifest: PathBuf,
    },

    /// Show the serializable types known under a contract
    KnownTypes {
        /// Path to the manifest file
        manifest: PathBuf,

        /// Contract to look up
        contract: String,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    // Diagnostics go to stderr so stdout stays machine readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Workspace::load_config(cli.config.as_deref(), &cli.tags)
        .context("Failed to load registry configuration")?;
    init_tracing(&config.log_level);

    match cli.command {
        Commands::Check { manifest } => {
            check::run(&Workspace::open(&manifest, config)?)?;
        }
        Commands::Bindings { manifest, json } => {
            bindings::run(&Workspace::open(&manifest, config)?, json)?;
        }
        Commands::Lists { manifest } => {
            lists::run(&Workspace::open(&manifest, config)?)?;
        }
        Commands::KnownTypes { manifest, contract } => {
            known_types::run(&Workspace::open(&manifest, config)?, &contract)?;
        }
    }

    Ok(())
}
