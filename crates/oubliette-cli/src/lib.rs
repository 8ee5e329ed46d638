//! Oubliette command-line interface.

pub mod commands;

use std::path::Path;

use clap::{Parser, Subcommand};
use oubliette_core::config::{Config, LogFormat};
use oubliette_core::env::vars;
use oubliette_core::ConfigError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Oubliette - versioned, hardware-backed credential storage
#[derive(Parser)]
#[command(name = "oubliette")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "OUBLIETTE_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store a secret (prompts for the value if none is given)
    Add(commands::item::AddArgs),

    /// Print a stored secret
    Read(commands::item::ReadArgs),

    /// Delete a secret (succeeds if it is already gone)
    Delete(commands::item::ItemArgs),

    /// Report whether a secret exists, without decrypting it
    Exists(commands::item::ItemArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Run diagnostics
    Doctor(commands::doctor::DoctorArgs),

    /// Show version information
    Version,
}

/// Load the config file at `path` (or the default location).
///
/// A missing file yields defaults; an unreadable one is reported and
/// replaced by defaults so that `config` and `doctor` still work.
pub fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    match loaded {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => Config::default(),
        Err(e) => {
            eprintln!("warning: ignoring unreadable config file: {e}");
            Config::default()
        }
    }
}

/// Install the tracing subscriber. Logs go to stderr so stdout stays clean.
pub fn init_logging(config: &Config, verbose: u8) {
    let filter = EnvFilter::try_from_env(vars::OUBLIETTE_LOG).unwrap_or_else(|_| {
        let level = match verbose {
            0 => config.logging.level.as_directive(),
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!(
            "warn,oubliette_core={level},oubliette_keystore={level},oubliette_cli={level}"
        ))
    });

    let (pretty, json) = match config.logging.format {
        LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Add(args) => commands::item::add(args, &config).await,
        Commands::Read(args) => commands::item::read(args, &config).await,
        Commands::Delete(args) => commands::item::delete(args, &config).await,
        Commands::Exists(args) => commands::item::exists(args, &config).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref(), &config).await,
        Commands::Doctor(args) => commands::doctor::run(args, &config).await,
        Commands::Version => {
            println!("oubliette {}", env!("CARGO_PKG_VERSION"));
            println!(
                "scheme version {}",
                oubliette_keystore::CURRENT_VERSION
            );
            Ok(())
        }
    }
}
