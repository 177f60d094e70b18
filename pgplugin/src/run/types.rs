//! Run phases and phase reports

use std::fmt;
use std::path::PathBuf;

use crate::record::RecordKey;

/// Lifecycle phase of a [`PatchRun`](super::PatchRun).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No run exists yet.
    Uninitialized,
    /// Configured, index not built yet.
    Initialized,
    /// Index built; queries and updates are accepted.
    Populated,
    /// Outputs written; the run accepts no further calls.
    Finalized,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::Populated => "populated",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Statistics about index construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Winning records indexed
    pub records: usize,
    /// Records skipped because the store could not resolve them
    pub skipped: usize,
    /// Distinct normalized mesh paths
    pub mesh_paths: usize,
    /// Texture sets carried over from a prior output
    pub preloaded: usize,
}

/// Outcome counts of one update batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub modified: usize,
    pub unchanged: usize,
    pub already_processed: usize,
    /// Entries rejected with a record mismatch or resolution fault
    pub rejected: usize,
}

/// What finalization produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Container files handed to the store, primary output first
    pub written: Vec<PathBuf>,
    /// Number of split output containers
    pub partitions: usize,
    /// Texture sets kept in the primary output
    pub texture_sets: usize,
    /// Unused texture sets removed before writing
    pub pruned: Vec<RecordKey>,
    /// Modified records written to partitions
    pub records: usize,
    /// Records skipped because they alone exceed the master limit
    pub skipped: Vec<RecordKey>,
}
