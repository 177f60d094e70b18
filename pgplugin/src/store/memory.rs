//! In-memory record store backed by JSON documents.
//!
//! The load order is a list of [`Container`]s. For every record key the
//! version defined by the last container in load order wins. Output
//! containers are written as pretty-printed JSON documents.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Container, RecordStore, ResolveFault, StoreError, WriteOptions, MAX_COMPACT_ID};
use crate::record::{ContainerKey, Record, RecordKey};

/// A load order as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOrderSnapshot {
    /// Containers in load order.
    pub containers: Vec<Container>,
}

impl LoadOrderSnapshot {
    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        read_json(path)
    }

    /// Write the snapshot as JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        write_json_atomic(self, path, "load order")
    }
}

/// Container document written by [`MemoryRecordStore::write_container`].
#[derive(Debug, Serialize, Deserialize)]
struct ContainerDocument {
    container: Container,
    #[serde(default)]
    options: WriteOptions,
}

/// Where the winning version of a record lives.
#[derive(Debug, Clone, Copy)]
enum Winner {
    Record { container: usize, index: usize },
    Unreadable { container: usize },
}

/// Record store over an in-memory load order.
#[derive(Debug)]
pub struct MemoryRecordStore {
    containers: Vec<Container>,
    winners: HashMap<RecordKey, Winner>,
    order: Vec<RecordKey>,
}

impl MemoryRecordStore {
    /// Build a store from containers in load order.
    ///
    /// Fails if a container name repeats or a container declares a master
    /// that does not load before it.
    pub fn new(containers: Vec<Container>) -> Result<Self, StoreError> {
        let mut seen: HashSet<ContainerKey> = HashSet::new();
        for container in &containers {
            for master in &container.masters {
                if !seen.contains(master) {
                    return Err(StoreError::InvalidLoadOrder(format!(
                        "{} requires master {} which is not loaded before it",
                        container.name, master
                    )));
                }
            }
            if !seen.insert(container.name.clone()) {
                return Err(StoreError::InvalidLoadOrder(format!(
                    "{} appears more than once",
                    container.name
                )));
            }
        }

        let mut winners = HashMap::new();
        let mut order = Vec::new();
        for (ci, container) in containers.iter().enumerate() {
            for (ri, record) in container.records.iter().enumerate() {
                let winner = Winner::Record {
                    container: ci,
                    index: ri,
                };
                if winners.insert(record.key.clone(), winner).is_none() {
                    order.push(record.key.clone());
                }
            }
            for key in &container.unreadable {
                if winners
                    .insert(key.clone(), Winner::Unreadable { container: ci })
                    .is_none()
                {
                    order.push(key.clone());
                }
            }
        }

        debug!(
            containers = containers.len(),
            records = order.len(),
            "Built in-memory load order"
        );

        Ok(Self {
            containers,
            winners,
            order,
        })
    }

    /// Build a store from a snapshot.
    pub fn from_snapshot(snapshot: LoadOrderSnapshot) -> Result<Self, StoreError> {
        Self::new(snapshot.containers)
    }

    /// Read a snapshot file and build a store from it.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_snapshot(LoadOrderSnapshot::load(path)?)
    }

    /// Containers in load order.
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Number of distinct record keys in the load order.
    pub fn record_count(&self) -> usize {
        self.order.len()
    }

    fn winner(&self, key: &RecordKey) -> Result<Record, ResolveFault> {
        match self.winners.get(key) {
            Some(Winner::Record { container, index }) => {
                Ok(self.containers[*container].records[*index].clone())
            }
            Some(Winner::Unreadable { container }) => Err(ResolveFault::new(
                key.clone(),
                format!(
                    "record in {} could not be decoded",
                    self.containers[*container].name
                ),
            )),
            None => Err(ResolveFault::new(key.clone(), "record is not in the load order")),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn winning_records(&self) -> Box<dyn Iterator<Item = Result<Record, ResolveFault>> + '_> {
        Box::new(self.order.iter().map(move |key| self.winner(key)))
    }

    fn resolve(&self, key: &RecordKey) -> Result<Record, ResolveFault> {
        self.winner(key)
    }

    fn load_order_position(&self, container: &ContainerKey) -> Option<usize> {
        self.containers
            .iter()
            .position(|loaded| loaded.name == *container)
    }

    fn load_container(&self, path: &Path) -> Result<Option<Container>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let document: ContainerDocument = read_json(path)?;
        Ok(Some(document.container))
    }

    fn write_container(
        &self,
        container: &Container,
        path: &Path,
        options: &WriteOptions,
    ) -> Result<(), StoreError> {
        if container.flags.compact && options.release.checks_compactness() {
            if let Some(record) = container
                .owned_records()
                .find(|record| record.key.id.value() > MAX_COMPACT_ID)
            {
                return Err(StoreError::NotCompact {
                    name: container.name.to_string(),
                    record: record.key.clone(),
                });
            }
        }

        let document = ContainerDocument {
            container: container.clone(),
            options: *options,
        };
        write_json_atomic(&document, path, container.name.name())?;
        debug!(
            container = %container.name,
            records = container.len(),
            path = %path.display(),
            "Wrote container"
        );
        Ok(())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a temp file first, then rename over the target.
fn write_json_atomic<T: Serialize>(value: &T, path: &Path, name: &str) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Serialize {
        name: name.to_string(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    drop(writer);

    std::fs::rename(&temp_path, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LocalId, Model, ModeledKind, RecordBody};
    use tempfile::TempDir;

    fn key(container: &str, id: u32) -> RecordKey {
        RecordKey::new(container, LocalId::new(id).unwrap())
    }

    fn stat(key: RecordKey, mesh: &str) -> Record {
        Record::new(
            key,
            RecordBody::Modeled {
                kind: ModeledKind::Static,
                model: Some(Model::new(mesh)),
                material: None,
                single_pass: false,
            },
        )
    }

    fn container(name: &str, masters: &[&str], records: Vec<Record>) -> Container {
        let mut c = Container::new(name);
        c.masters = masters.iter().map(|m| ContainerKey::new(*m)).collect();
        c.records = records;
        c
    }

    fn mesh_of(record: &Record) -> &str {
        match &record.body {
            RecordBody::Modeled {
                model: Some(model), ..
            } => &model.file,
            _ => "",
        }
    }

    #[test]
    fn test_last_container_wins() {
        let store = MemoryRecordStore::new(vec![
            container("Skyrim.esm", &[], vec![stat(key("Skyrim.esm", 1), "a.nif")]),
            container(
                "Mod.esp",
                &["Skyrim.esm"],
                vec![stat(key("Skyrim.esm", 1), "b.nif")],
            ),
        ])
        .unwrap();

        let winners: Vec<Record> = store.winning_records().map(Result::unwrap).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(mesh_of(&winners[0]), "b.nif");
        assert_eq!(
            mesh_of(&store.resolve(&key("Skyrim.esm", 1)).unwrap()),
            "b.nif"
        );
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let store = MemoryRecordStore::new(vec![
            container(
                "Skyrim.esm",
                &[],
                vec![
                    stat(key("Skyrim.esm", 2), "a.nif"),
                    stat(key("Skyrim.esm", 1), "b.nif"),
                ],
            ),
            container(
                "Mod.esp",
                &["Skyrim.esm"],
                vec![
                    stat(key("Mod.esp", 9), "c.nif"),
                    stat(key("Skyrim.esm", 2), "d.nif"),
                ],
            ),
        ])
        .unwrap();

        let ids: Vec<u32> = store
            .winning_records()
            .map(|r| r.unwrap().key.id.value())
            .collect();
        assert_eq!(ids, vec![2, 1, 9]);
    }

    #[test]
    fn test_unreadable_records_surface_as_faults() {
        let mut broken = container("Broken.esp", &[], vec![]);
        broken.unreadable.push(key("Broken.esp", 7));
        let store = MemoryRecordStore::new(vec![broken]).unwrap();

        let results: Vec<_> = store.winning_records().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert!(store.resolve(&key("Broken.esp", 7)).is_err());
    }

    #[test]
    fn test_unknown_record_fails_to_resolve() {
        let store = MemoryRecordStore::new(vec![]).unwrap();
        let fault = store.resolve(&key("Skyrim.esm", 1)).unwrap_err();
        assert_eq!(fault.record, Some(key("Skyrim.esm", 1)));
    }

    #[test]
    fn test_load_order_position() {
        let store = MemoryRecordStore::new(vec![
            container("Skyrim.esm", &[], Vec::new()),
            container("Dawnguard.esm", &["Skyrim.esm"], Vec::new()),
        ])
        .unwrap();

        assert_eq!(store.load_order_position(&ContainerKey::new("skyrim.esm")), Some(0));
        assert_eq!(store.load_order_position(&ContainerKey::new("Dawnguard.esm")), Some(1));
        assert_eq!(store.load_order_position(&ContainerKey::new("PG_1.esp")), None);
    }

    #[test]
    fn test_rejects_missing_master() {
        let result = MemoryRecordStore::new(vec![container("Mod.esp", &["Skyrim.esm"], vec![])]);
        assert!(matches!(result, Err(StoreError::InvalidLoadOrder(_))));
    }

    #[test]
    fn test_rejects_duplicate_container() {
        let result = MemoryRecordStore::new(vec![
            container("Skyrim.esm", &[], vec![]),
            container("SKYRIM.ESM", &[], vec![]),
        ]);
        assert!(matches!(result, Err(StoreError::InvalidLoadOrder(_))));
    }

    #[test]
    fn test_write_then_load_container() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out").join("ParallaxGen.esp");
        let store = MemoryRecordStore::new(vec![]).unwrap();

        let mut out = container(
            "ParallaxGen.esp",
            &[],
            vec![stat(key("ParallaxGen.esp", 0x800), "x.nif")],
        );
        out.flags.compact = true;

        store
            .write_container(&out, &path, &WriteOptions::default())
            .unwrap();

        assert!(!path.with_extension("tmp").exists());
        let loaded = store.load_container(&path).unwrap().unwrap();
        assert_eq!(loaded, out);
    }

    #[test]
    fn test_compact_check_depends_on_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ParallaxGen.esp");
        let store = MemoryRecordStore::new(vec![]).unwrap();

        let mut out = container(
            "ParallaxGen.esp",
            &[],
            vec![stat(key("ParallaxGen.esp", 0x1000), "x.nif")],
        );
        out.flags.compact = true;

        let se = WriteOptions::default();
        assert!(matches!(
            store.write_container(&out, &path, &se),
            Err(StoreError::NotCompact { .. })
        ));

        let vr = WriteOptions {
            release: crate::config::GameRelease::SkyrimVR,
            ..WriteOptions::default()
        };
        assert!(store.write_container(&out, &path, &vr).is_ok());
    }

    #[test]
    fn test_load_missing_container_is_none() {
        let temp = TempDir::new().unwrap();
        let store = MemoryRecordStore::new(vec![]).unwrap();
        assert!(store
            .load_container(&temp.path().join("absent.esp"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_snapshot_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snapshot.json");
        let snapshot = LoadOrderSnapshot {
            containers: vec![container(
                "Skyrim.esm",
                &[],
                vec![stat(key("Skyrim.esm", 1), "a.nif")],
            )],
        };
        snapshot.save(&path).unwrap();

        let store = MemoryRecordStore::open(&path).unwrap();
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.containers().len(), 1);
    }
}
