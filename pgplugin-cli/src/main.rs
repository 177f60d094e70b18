//! PGPlugin CLI - Command-line interface
//!
//! Drives a patch run against a JSON load order snapshot: index the records,
//! apply update batches, and write the output plugins.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pgplugin::logging::init_logging;

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "pgplugin")]
#[command(version = pgplugin::VERSION)]
#[command(about = "Consolidate mesh and texture overrides into loadable plugins", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply update batches and write the output plugins
    Run {
        /// Load order snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Update batch files (JSON), applied in order
        #[arg(long, required = true, num_args = 1..)]
        updates: Vec<PathBuf>,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Previous primary output to keep texture set identifiers stable
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Flag every output as a master file
        #[arg(long)]
        esmify: bool,

        /// Configuration file (default: ~/.pgplugin/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the records using a mesh as JSON
    Query {
        /// Load order snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        /// Mesh path, with or without the meshes\ prefix
        mesh: String,

        /// Configuration file (default: ~/.pgplugin/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => exit_with_error(CliError::from(e)),
    };

    if let Err(e) = dispatch(cli.command) {
        exit_with_error(e);
    }
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run {
            snapshot,
            updates,
            output,
            prior,
            esmify,
            config,
        } => commands::run::run(commands::run::RunArgs {
            snapshot,
            updates,
            output,
            prior,
            esmify,
            config,
        }),
        Commands::Query {
            snapshot,
            mesh,
            config,
        } => commands::query::run(commands::query::QueryArgs {
            snapshot,
            mesh,
            config,
        }),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn exit_with_error(error: CliError) -> ! {
    eprintln!("Error: {}", error);
    std::process::exit(error.exit_code());
}
