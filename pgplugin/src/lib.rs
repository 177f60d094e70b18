//! PGPlugin - patch consolidation for texture and mesh overrides
//!
//! This library collects per-object mesh and alternate texture overrides,
//! deduplicates the texture sets they need, and partitions the modified
//! records into output plugins that stay under the game's master limit.
//!
//! # Architecture
//!
//! ```text
//! RecordStore ──► MeshUseIndex ──► (query) ──► host
//!                                   host ──► ApplyUpdatesBatch
//!                 RecordTracker ◄── TextureSetCache ◄── IdAllocator
//!                       │
//!                       ▼
//!                 Partitioner ──► finalize ──► RecordStore::write_container
//! ```
//!
//! A run is driven through [`run::PatchRun`] directly or through
//! [`bridge::HostBridge`] when a host process exchanges byte buffers.

pub mod allocator;
pub mod bridge;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod partition;
pub mod paths;
pub mod protocol;
pub mod record;
pub mod run;
pub mod store;
pub mod texture_set;
pub mod tracker;

pub use config::RunConfig;
pub use error::{EngineError, EngineResult};
pub use run::PatchRun;
pub use store::{MemoryRecordStore, RecordStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
