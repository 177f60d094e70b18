//! Run command - apply update batches and write the output plugins.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use pgplugin::protocol::ApplyUpdatesBatch;
use pgplugin::PatchRun;
use tracing::info;

use super::{load_config, open_snapshot};
use crate::error::CliError;

/// Arguments for the run command.
pub struct RunArgs {
    pub snapshot: PathBuf,
    pub updates: Vec<PathBuf>,
    pub output: PathBuf,
    pub prior: Option<PathBuf>,
    pub esmify: bool,
    pub config: Option<PathBuf>,
}

/// Run a complete patch run.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if args.esmify {
        config = config.with_esmify(true);
    }

    let store = open_snapshot(&args.snapshot)?;
    let mut run = PatchRun::initialize(store, config)?;

    let populated = run.populate(args.prior.as_deref())?;
    println!(
        "Indexed {} records ({} skipped), {} meshes",
        populated.records, populated.skipped, populated.mesh_paths
    );
    if populated.preloaded > 0 {
        println!("Preloaded {} texture sets", populated.preloaded);
    }

    for path in &args.updates {
        let batch = read_batch(path)?;
        let report = run.apply_batch(&batch)?;
        info!(
            file = %path.display(),
            modified = report.modified,
            rejected = report.rejected,
            "Applied batch"
        );
        println!(
            "{}: {} modified, {} unchanged, {} repeated, {} rejected",
            path.display(),
            report.modified,
            report.unchanged,
            report.already_processed,
            report.rejected
        );
    }

    let report = run.finalize(&args.output)?;
    println!(
        "Wrote {} texture sets ({} pruned) and {} records in {} partitions",
        report.texture_sets,
        report.pruned.len(),
        report.records,
        report.partitions
    );
    for path in &report.written {
        println!("  {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!(
            "Skipped {} records exceeding the master limit",
            report.skipped.len()
        );
    }

    Ok(())
}

/// Read a JSON update batch.
fn read_batch(path: &Path) -> Result<ApplyUpdatesBatch, CliError> {
    let file = File::open(path)
        .map_err(|e| CliError::Updates(format!("Failed to open {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CliError::Updates(format!("Failed to parse {}: {}", path.display(), e)))
}
