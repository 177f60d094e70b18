//! Record database interface.
//!
//! The engine never parses or writes container files itself. It consumes a
//! [`RecordStore`] that resolves the winning version of every record across
//! the load order, and hands finished output containers back to it for
//! serialization.
//!
//! # Fault tolerance
//!
//! [`RecordStore::winning_records`] is a lazy, fallible sequence: a record
//! that cannot be decoded surfaces as a [`ResolveFault`] without ending the
//! sequence. [`SafeRecords`] wraps that sequence in a skip loop that logs
//! each fault once per record identity.

mod memory;

pub use memory::{LoadOrderSnapshot, MemoryRecordStore};

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::{GameRelease, PluginLanguage};
use crate::record::{ContainerKey, Record, RecordKey};

/// A record that could not be resolved or decoded.
#[derive(Debug, Clone, Error)]
#[error(
    "{}: {}",
    .record.as_ref().map_or_else(|| "<unknown record>".to_string(), ToString::to_string),
    .reason
)]
pub struct ResolveFault {
    /// Identity of the failing record, if known.
    pub record: Option<RecordKey>,
    /// Failure description from the store.
    pub reason: String,
}

impl ResolveFault {
    /// Create a fault for a known record.
    pub fn new(record: RecordKey, reason: impl Into<String>) -> Self {
        Self {
            record: Some(record),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reading or writing containers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure on a container file.
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Container or snapshot document is malformed.
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to serialize a container.
    #[error("Failed to serialize {name}: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A compact container uses an identifier outside the compact range.
    #[error("{name} is flagged compact but record {record} is out of range")]
    NotCompact { name: String, record: RecordKey },

    /// Load order is inconsistent.
    #[error("Invalid load order: {0}")]
    InvalidLoadOrder(String),
}

/// Header flags of a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerFlags {
    /// Loaded as a master file.
    #[serde(default)]
    pub master: bool,

    /// Uses the compact (light) identifier space.
    #[serde(default)]
    pub compact: bool,
}

/// A data container: named, ordered records plus its declared masters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: ContainerKey,

    #[serde(default)]
    pub masters: Vec<ContainerKey>,

    #[serde(default)]
    pub flags: ContainerFlags,

    #[serde(default)]
    pub records: Vec<Record>,

    /// Records present in the container that the store failed to decode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<RecordKey>,
}

impl Container {
    /// Create an empty container.
    pub fn new(name: impl Into<ContainerKey>) -> Self {
        Self {
            name: name.into(),
            masters: Vec::new(),
            flags: ContainerFlags::default(),
            records: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the container has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether every record the container owns fits the compact id range.
    pub fn fits_compact_range(&self) -> bool {
        self.owned_records()
            .all(|record| record.key.id.value() <= MAX_COMPACT_ID)
    }

    /// Records defined by this container, as opposed to overrides.
    pub fn owned_records(&self) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |record| record.key.container == self.name)
    }

    /// Containers referenced by this container's records, excluding itself,
    /// sorted by name.
    pub fn referenced_containers(&self) -> Vec<ContainerKey> {
        self.records
            .iter()
            .flat_map(|record| {
                std::iter::once(&record.key)
                    .chain(record.form_links())
                    .map(|key| key.container.clone())
            })
            .filter(|container| *container != self.name)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Largest local id a compact container may own.
pub const MAX_COMPACT_ID: u32 = 0xFFF;

/// Options applied when writing an output container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    pub language: PluginLanguage,
    pub release: GameRelease,
}

/// Record database collaborator.
///
/// `Record: Clone` is the deep-copy primitive; no separate copy entry point
/// is needed.
pub trait RecordStore {
    /// Every winning record across the load order, lazily.
    fn winning_records(&self) -> Box<dyn Iterator<Item = Result<Record, ResolveFault>> + '_>;

    /// Current winning version of `key`.
    fn resolve(&self, key: &RecordKey) -> Result<Record, ResolveFault>;

    /// Position of `container` in the load order, if it is loaded.
    fn load_order_position(&self, container: &ContainerKey) -> Option<usize>;

    /// Read a previously written container. A missing file yields `Ok(None)`.
    fn load_container(&self, path: &Path) -> Result<Option<Container>, StoreError>;

    /// Serialize `container` to `path`.
    fn write_container(
        &self,
        container: &Container,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<(), StoreError>;
}

/// Skip-and-log wrapper around a fallible record sequence.
pub struct SafeRecords<I> {
    inner: I,
    reported: HashSet<RecordKey>,
    skipped: usize,
}

impl<I> SafeRecords<I>
where
    I: Iterator<Item = Result<Record, ResolveFault>>,
{
    /// Wrap a record sequence.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            reported: HashSet::new(),
            skipped: 0,
        }
    }

    /// Number of faults skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<I> Iterator for SafeRecords<I>
where
    I: Iterator<Item = Result<Record, ResolveFault>>,
{
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            match self.inner.next()? {
                Ok(record) => return Some(record),
                Err(fault) => {
                    self.skipped += 1;
                    let first_report = match &fault.record {
                        Some(key) => self.reported.insert(key.clone()),
                        None => true,
                    };
                    if first_report {
                        warn!(error = %fault, "Skipping unresolvable record");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LocalId, RecordBody};

    fn key(id: u32) -> RecordKey {
        RecordKey::new("Skyrim.esm", LocalId::new(id).unwrap())
    }

    #[test]
    fn test_safe_records_skips_faults() {
        let items = vec![
            Ok(Record::new(key(1), RecordBody::Other)),
            Err(ResolveFault::new(key(2), "bad subrecord")),
            Err(ResolveFault::new(key(2), "bad subrecord")),
            Err(ResolveFault {
                record: None,
                reason: "truncated".to_string(),
            }),
            Ok(Record::new(key(3), RecordBody::Other)),
        ];

        let mut safe = SafeRecords::new(items.into_iter());
        let ids: Vec<u32> = safe.by_ref().map(|r| r.key.id.value()).collect();

        assert_eq!(ids, vec![1, 3]);
        assert_eq!(safe.skipped(), 3);
    }

    #[test]
    fn test_resolve_fault_display() {
        let fault = ResolveFault::new(key(0x10), "corrupt");
        assert_eq!(fault.to_string(), "Skyrim.esm:000010: corrupt");
    }

    #[test]
    fn test_referenced_containers_excludes_self() {
        let mut container = Container::new("PG_1.esp");
        container.records.push(
            Record::new(key(1), RecordBody::Other).with_links(vec![
                RecordKey::new("PG_1.esp", LocalId::new(5).unwrap()),
                RecordKey::new("Dawnguard.esm", LocalId::new(5).unwrap()),
            ]),
        );

        let names: Vec<String> = container
            .referenced_containers()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, vec!["Dawnguard.esm", "Skyrim.esm"]);
    }
}
