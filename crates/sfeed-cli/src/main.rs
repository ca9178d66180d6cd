//! # sfeed CLI entry point
//!
//! Parses command-line arguments, installs logging and dispatches to the
//! subcommand handlers in the `sfeed_cli` library.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sfeed_cli::collection::{run_collection, CollectionArgs};
use sfeed_cli::config::Config;
use sfeed_cli::keys::{run_keys, KeysArgs};
use sfeed_cli::sign::{run_sign, run_verify, SignArgs, VerifyArgs};
use sfeed_cli::validate::{run_validate, ValidateArgs};

/// signedfeed toolchain.
///
/// Manages author signing keys, validates feed documents, and signs and
/// verifies them.
#[derive(Parser, Debug)]
#[command(name = "sfeed", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key directory. Overrides `key_dir` from the configuration.
    #[arg(long, global = true)]
    key_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, rotate, inspect, back up and rekey signing keys.
    Keys(KeysArgs),

    /// Validate feed and item documents.
    Validate(ValidateArgs),

    /// Sign a document with a key family's active key.
    Sign(SignArgs),

    /// Verify document and item signatures.
    Verify(VerifyArgs),

    /// Export and import document collections.
    Collection(CollectionArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(&cli).and_then(|config| match &cli.command {
        Commands::Keys(args) => run_keys(args, &config),
        Commands::Validate(args) => run_validate(args),
        Commands::Sign(args) => run_sign(args, &config),
        Commands::Verify(args) => run_verify(args),
        Commands::Collection(args) => run_collection(args),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.key_dir {
        config.key_dir = dir.clone();
    }
    Ok(config)
}
