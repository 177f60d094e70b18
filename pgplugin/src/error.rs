//! Engine error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;
use crate::protocol::CodecError;
use crate::record::{ContainerKey, RecordKey};
use crate::run::Phase;
use crate::store::{ResolveFault, StoreError};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the patch consolidation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation was called out of phase order.
    #[error("{operation} called in phase {actual}, expected {expected}")]
    InvalidSequence {
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },

    /// A record could not be resolved from the record store.
    #[error("Resolution fault: {0}")]
    ResolutionFault(#[from] ResolveFault),

    /// An update does not fit the record it targets.
    #[error("Update does not match record {record}: {reason}")]
    RecordMismatch { record: RecordKey, reason: String },

    /// No local identifiers are left in the output container.
    #[error("Identifier space of {container} exhausted")]
    IdSpaceExhausted { container: ContainerKey },

    /// The run environment could not be constructed.
    #[error("Failed to build environment: {0}")]
    EnvironmentBuild(String),

    /// A single record needs more dependency containers than one output may declare.
    #[error("Record {record} requires {required} masters (limit: {limit})")]
    MasterLimitExceeded {
        record: RecordKey,
        required: usize,
        limit: usize,
    },

    /// Record store failure.
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// Wire codec failure.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Configuration failure.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether the error aborts the whole run rather than a single entry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::IdSpaceExhausted { .. }
                | EngineError::EnvironmentBuild(_)
                | EngineError::Store(_)
        )
    }
}
