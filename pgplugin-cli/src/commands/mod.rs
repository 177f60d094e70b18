//! CLI subcommands.

pub mod config;
pub mod query;
pub mod run;

use std::path::Path;

use pgplugin::config::default_config_path;
use pgplugin::store::MemoryRecordStore;
use pgplugin::RunConfig;

use crate::error::CliError;

/// Load the run configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<RunConfig, CliError> {
    let config = match path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::load_or_default(&default_config_path())?,
    };
    Ok(config)
}

/// Open a load order snapshot.
pub fn open_snapshot(path: &Path) -> Result<MemoryRecordStore, CliError> {
    tracing::debug!(path = %path.display(), "Opening load order snapshot");
    Ok(MemoryRecordStore::open(path)?)
}
