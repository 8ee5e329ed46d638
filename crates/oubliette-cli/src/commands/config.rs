//! Configuration management commands.

use std::path::Path;

use clap::Args;
use oubliette_core::config::Config;
use oubliette_core::paths;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

fn config_path(explicit: Option<&Path>) -> anyhow::Result<std::path::PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// Run the config command.
pub async fn run(
    args: ConfigArgs,
    explicit_path: Option<&Path>,
    config: &Config,
) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }

        ConfigCommand::Init { force } => {
            let path = config_path(explicit_path)?;

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            paths::ensure_dirs()?;
            Config::default().save(&path)?;

            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Path => {
            let path = config_path(explicit_path)?;
            println!("{}", path.display());
        }

        ConfigCommand::Validate => {
            let path = config_path(explicit_path)?;
            match Config::load(&path) {
                Ok(config) => match config.validate() {
                    Ok(_) => println!("Configuration is valid"),
                    Err(e) => anyhow::bail!("Configuration error: {}", e),
                },
                Err(e) => anyhow::bail!("Failed to load config: {}", e),
            }
        }
    }

    Ok(())
}
