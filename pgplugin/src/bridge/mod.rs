//! Host-facing call surface.
//!
//! The host drives a run through byte buffers and never sees Rust errors.
//! [`HostBridge`] serializes every call behind one mutex, decodes and encodes
//! protocol buffers, and turns failures into a last-error message plus an
//! entry in the [`LogQueue`] the host drains.

mod log_queue;

pub use log_queue::{LogEntry, LogQueue, LogQueueLayer, Severity};

use std::error::Error as StdError;
use std::path::Path;

use parking_lot::Mutex;

use crate::config::RunConfig;
use crate::error::{EngineError, EngineResult};
use crate::protocol::{self, ApplyUpdatesBatch, MeshUsesQuery};
use crate::run::{BatchReport, FinalizeReport, PatchRun, Phase, PopulateReport};
use crate::store::RecordStore;

struct BridgeState<S> {
    run: Option<PatchRun<S>>,
    last_error: Option<String>,
}

/// Serialized entry point for a host process.
pub struct HostBridge<S> {
    state: Mutex<BridgeState<S>>,
    log: LogQueue,
}

impl<S: RecordStore> HostBridge<S> {
    /// Create a bridge with no run.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState {
                run: None,
                last_error: None,
            }),
            log: LogQueue::new(),
        }
    }

    /// A tracing layer feeding this bridge's log queue.
    pub fn log_layer(&self, min_severity: Severity) -> LogQueueLayer {
        LogQueueLayer::new(self.log.clone(), min_severity)
    }

    /// Start a new run, replacing any previous one.
    pub fn initialize(&self, store: S, config: RunConfig) -> bool {
        self.call("initialize", |state| {
            state.run = Some(PatchRun::initialize(store, config)?);
            Ok(())
        })
        .is_some()
    }

    /// Build the index, preloading `prior_output` when given.
    pub fn populate(&self, prior_output: Option<&Path>) -> Option<PopulateReport> {
        self.call("populate", |state| {
            active_run(state, "populate")?.populate(prior_output)
        })
    }

    /// Answer a bincode-encoded [`MeshUsesQuery`] with encoded `ModelUses`.
    pub fn get_model_uses(&self, buffer: &[u8]) -> Option<Vec<u8>> {
        self.call("get_model_uses", |state| {
            let query: MeshUsesQuery = protocol::decode(buffer)?;
            let uses = active_run(state, "get_model_uses")?.model_uses(&query.mesh_path)?;
            Ok(protocol::encode(&uses)?)
        })
    }

    /// Apply a bincode-encoded [`ApplyUpdatesBatch`].
    pub fn set_model_uses(&self, buffer: &[u8]) -> Option<BatchReport> {
        self.call("set_model_uses", |state| {
            let batch: ApplyUpdatesBatch = protocol::decode(buffer)?;
            active_run(state, "set_model_uses")?.apply_batch(&batch)
        })
    }

    /// Write all outputs into `output_dir`.
    pub fn finalize(&self, output_dir: &Path) -> Option<FinalizeReport> {
        self.call("finalize", |state| {
            active_run(state, "finalize")?.finalize(output_dir)
        })
    }

    /// Take the message of the most recent failure.
    pub fn take_last_error(&self) -> Option<String> {
        self.state.lock().last_error.take()
    }

    /// Remove and return every queued log entry.
    pub fn drain_log(&self) -> Vec<LogEntry> {
        self.log.drain()
    }

    fn call<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut BridgeState<S>) -> EngineResult<T>,
    ) -> Option<T> {
        let mut state = self.state.lock();
        match f(&mut state) {
            Ok(value) => Some(value),
            Err(e) => {
                let message = describe(&e);
                let severity = match e {
                    EngineError::EnvironmentBuild(_) => Severity::Critical,
                    _ => Severity::Error,
                };
                self.log.push(format!("{}: {}", operation, message), severity);
                state.last_error = Some(message);
                None
            }
        }
    }
}

impl<S: RecordStore> Default for HostBridge<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn active_run<'a, S>(
    state: &'a mut BridgeState<S>,
    operation: &'static str,
) -> EngineResult<&'a mut PatchRun<S>> {
    state.run.as_mut().ok_or(EngineError::InvalidSequence {
        operation,
        expected: Phase::Initialized,
        actual: Phase::Uninitialized,
    })
}

/// Error message followed by any source not already part of it.
fn describe(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
