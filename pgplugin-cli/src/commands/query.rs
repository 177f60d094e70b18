//! Query command - list the records using a mesh.

use std::path::PathBuf;

use pgplugin::PatchRun;

use super::{load_config, open_snapshot};
use crate::error::CliError;

/// Arguments for the query command.
pub struct QueryArgs {
    pub snapshot: PathBuf,
    pub mesh: String,
    pub config: Option<PathBuf>,
}

/// Print the model uses of a mesh as JSON.
pub fn run(args: QueryArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let store = open_snapshot(&args.snapshot)?;

    let mut run = PatchRun::initialize(store, config)?;
    run.populate(None)?;
    let uses = run.model_uses(&args.mesh)?;

    let json =
        serde_json::to_string_pretty(&uses).map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
