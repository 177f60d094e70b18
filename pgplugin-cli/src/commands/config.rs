//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use clap::Subcommand;
use pgplugin::config::default_config_path;
use pgplugin::RunConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", default_config_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let path = default_config_path();
    let config = RunConfig::load_or_default(&path)?;

    if !path.exists() {
        println!("# {} not found, showing defaults", path.display());
    }

    let mut current_section = String::new();
    for (key, value) in config.entries() {
        let (section, name) = key.split_once('.').unwrap_or(("", key.as_str()));

        // Print section header when section changes
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section.to_string();
        }
        println!("  {} = {}", name, value);
    }

    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = default_config_path();
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }

    RunConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
