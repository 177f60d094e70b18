//! Patch run lifecycle.
//!
//! A [`PatchRun`] owns every piece of state of one consolidation run and
//! enforces the call order:
//!
//! ```text
//! initialize ──► populate ──► (model_uses | apply_batch)* ──► finalize
//! ```
//!
//! Calls made out of order fail with [`EngineError::InvalidSequence`].

mod types;

pub use types::{BatchReport, FinalizeReport, Phase, PopulateReport};

use std::path::Path;

use tracing::{debug, error, info};

use crate::allocator::IdAllocator;
use crate::config::RunConfig;
use crate::error::{EngineError, EngineResult};
use crate::index::{MeshUse, MeshUseIndex};
use crate::partition::Partitioner;
use crate::protocol::{AlternateTextureSlots, ApplyUpdatesBatch, ModelUse, ModelUses};
use crate::record::{slot, ContainerKey, LocalId, RecordBody, RecordKey, SlotTag};
use crate::store::{Container, RecordStore, SafeRecords, WriteOptions};
use crate::texture_set::{TextureSetCache, TextureSetDescriptor};
use crate::tracker::{
    AltTextureUpdate, RecordArena, RecordHandle, RecordTracker, SlotUpdate, TextureResolver,
    UpdateOutcome,
};

/// State of one consolidation run.
pub struct PatchRun<S> {
    store: S,
    config: RunConfig,
    phase: Phase,
    arena: RecordArena,
    index: MeshUseIndex,
    cache: TextureSetCache,
    allocator: IdAllocator,
    tracker: RecordTracker,
}

impl<S: RecordStore> PatchRun<S> {
    /// Start a run against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EnvironmentBuild`] if the configuration cannot
    /// produce valid outputs.
    pub fn initialize(store: S, config: RunConfig) -> EngineResult<Self> {
        if config.plugin_name.trim().is_empty() {
            return Err(EngineError::EnvironmentBuild(
                "output plugin name is empty".to_string(),
            ));
        }
        if config.split_prefix.trim().is_empty() {
            return Err(EngineError::EnvironmentBuild(
                "split prefix is empty".to_string(),
            ));
        }
        if config.max_masters < 2 {
            return Err(EngineError::EnvironmentBuild(format!(
                "master limit {} leaves no room for dependencies",
                config.max_masters
            )));
        }
        if LocalId::new(config.first_id).is_none() {
            return Err(EngineError::EnvironmentBuild(format!(
                "first id {:#X} is outside the identifier space",
                config.first_id
            )));
        }

        let output = ContainerKey::new(config.plugin_name.clone());
        info!(
            plugin = %output,
            release = %config.release,
            language = %config.language,
            "Initialized patch run"
        );

        Ok(Self {
            store,
            cache: TextureSetCache::new(output),
            allocator: IdAllocator::new(config.first_id),
            config,
            phase: Phase::Initialized,
            arena: RecordArena::new(),
            index: MeshUseIndex::new(),
            tracker: RecordTracker::new(),
        })
    }

    /// Build the mesh-use index and preload a prior output, if one exists.
    pub fn populate(&mut self, prior_output: Option<&Path>) -> EngineResult<PopulateReport> {
        self.expect_phase("populate", Phase::Initialized)?;

        let mut records = SafeRecords::new(self.store.winning_records());
        for record in records.by_ref() {
            self.index.add(&record);
            self.arena.insert(record);
        }
        let skipped = records.skipped();

        let mut preloaded = 0;
        if let Some(path) = prior_output {
            match self.store.load_container(path)? {
                Some(prior) => {
                    preloaded = self.cache.preload(&prior, &mut self.allocator);
                }
                None => debug!(path = %path.display(), "No prior output to preload"),
            }
        }

        self.phase = Phase::Populated;
        let report = PopulateReport {
            records: self.arena.len(),
            skipped,
            mesh_paths: self.index.mesh_count(),
            preloaded,
        };
        info!(
            records = report.records,
            skipped = report.skipped,
            meshes = report.mesh_paths,
            preloaded = report.preloaded,
            "Built mesh-use index"
        );
        Ok(report)
    }

    /// Uses of `mesh_path` recorded by the index.
    pub fn lookup(&self, mesh_path: &str) -> EngineResult<&[MeshUse]> {
        self.expect_phase("lookup", Phase::Populated)?;
        Ok(self.index.lookup(mesh_path))
    }

    /// Report every model slot using `mesh_path`, with its current
    /// alternate texture bindings resolved to texture paths.
    pub fn model_uses(&self, mesh_path: &str) -> EngineResult<ModelUses> {
        self.expect_phase("model_uses", Phase::Populated)?;

        let mut uses = Vec::new();
        for mesh_use in self.index.lookup(mesh_path) {
            let Some(handle) = self.arena.handle_of(&mesh_use.record) else {
                continue;
            };
            let record = self.arena.get(handle);
            let Some(model) = slot(&record.body, mesh_use.slot) else {
                continue;
            };

            let single_pass_material = match &record.body {
                RecordBody::Modeled {
                    material: Some(material),
                    ..
                } => self.index.single_pass(material),
                _ => false,
            };

            let mut alternate_textures = Vec::new();
            for binding in model.alternate_textures() {
                match self.descriptor_of(&binding.new_texture) {
                    Some(descriptor) => alternate_textures.push(AlternateTextureSlots {
                        slot_id: binding.index,
                        slot_id_new: binding.index,
                        textures: descriptor.slots().clone(),
                    }),
                    None => debug!(
                        record = %record.key,
                        texture_set = %binding.new_texture,
                        "Alternate texture set not resolvable"
                    ),
                }
            }

            uses.push(ModelUse {
                container_name: record.key.container.clone(),
                local_id: record.key.id,
                sub_model_tag: mesh_use.slot.as_str().to_string(),
                mesh_file: model.file.clone(),
                single_pass_material,
                alternate_textures,
            });
        }

        Ok(ModelUses { uses })
    }

    /// Reconcile one model slot of `key` with the desired state.
    ///
    /// Records outside the index are resolved through the store on demand.
    pub fn apply_update(
        &mut self,
        key: &RecordKey,
        tag: SlotTag,
        update: &SlotUpdate,
    ) -> EngineResult<UpdateOutcome> {
        self.expect_phase("apply_update", Phase::Populated)?;

        let handle = self.handle_for(key)?;
        let mut textures = TextureResolver {
            known: self.index.texture_sets(),
            cache: &mut self.cache,
            allocator: &mut self.allocator,
        };
        self.tracker
            .apply_update(&self.arena, handle, tag, update, &mut textures)
    }

    /// Apply a batch of desired model states.
    ///
    /// Entries that do not match their record are logged and skipped; the
    /// rest of the batch still applies. Fatal errors abort the batch.
    pub fn apply_batch(&mut self, batch: &ApplyUpdatesBatch) -> EngineResult<BatchReport> {
        self.expect_phase("apply_batch", Phase::Populated)?;

        let mut report = BatchReport::default();
        for entry in &batch.uses {
            let result = slot_update(entry)
                .and_then(|(key, tag, update)| self.apply_update(&key, tag, &update));

            match result {
                Ok(UpdateOutcome::Modified) => report.modified += 1,
                Ok(UpdateOutcome::Unchanged) => report.unchanged += 1,
                Ok(UpdateOutcome::AlreadyProcessed) => report.already_processed += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(
                        container = %entry.container_name,
                        id = %entry.local_id,
                        tag = %entry.sub_model_tag,
                        error = %e,
                        "Skipping update"
                    );
                    report.rejected += 1;
                }
            }
        }

        debug!(
            entries = batch.uses.len(),
            modified = report.modified,
            rejected = report.rejected,
            "Applied update batch"
        );
        Ok(report)
    }

    /// Prune, partition and write every output container into `output_dir`.
    ///
    /// The run is finished afterwards, whether or not writing succeeded.
    pub fn finalize(&mut self, output_dir: &Path) -> EngineResult<FinalizeReport> {
        self.expect_phase("finalize", Phase::Populated)?;
        self.phase = Phase::Finalized;

        // Modified records may keep bindings to preloaded texture sets that
        // no update requested again.
        for (_, record) in self.tracker.modified() {
            for link in record.form_links() {
                self.cache.mark_used(link);
            }
        }

        let mut report = FinalizeReport {
            pruned: self.cache.prune_unused(),
            ..FinalizeReport::default()
        };
        let options = WriteOptions {
            language: self.config.language,
            release: self.config.release,
        };
        let compact_supported = self.config.release.supports_compact();

        let mut primary = Container::new(self.cache.output().clone());
        primary.records = self.cache.records().cloned().collect();
        primary.masters = self.in_load_order(primary.referenced_containers());
        primary.flags.compact = compact_supported && primary.fits_compact_range();
        primary.flags.master = self.config.esmify;
        report.texture_sets = primary.len();

        let mut partitioner =
            Partitioner::new(self.config.split_prefix.clone(), self.config.max_masters);
        for record in std::mem::take(&mut self.tracker).into_modified() {
            let key = record.key.clone();
            match partitioner.place(record) {
                Ok(_) => report.records += 1,
                Err(e @ EngineError::MasterLimitExceeded { .. }) => {
                    error!(record = %key, error = %e, "Record cannot be placed in any output");
                    report.skipped.push(key);
                }
                Err(e) => return Err(e),
            }
        }

        if primary.is_empty() {
            debug!(container = %primary.name, "Primary output is empty, not writing");
        } else {
            let path = output_dir.join(primary.name.name());
            self.store.write_container(&primary, &path, &options)?;
            report.written.push(path);
        }

        for partition in partitioner.into_partitions() {
            let (name, masters, records) = partition.into_parts();
            let mut container = Container::new(name);
            container.masters = self.in_load_order(masters);
            container.records = records;
            container.flags.compact = compact_supported;
            container.flags.master = self.config.esmify;

            let path = output_dir.join(container.name.name());
            self.store.write_container(&container, &path, &options)?;
            report.written.push(path);
            report.partitions += 1;
        }

        info!(
            texture_sets = report.texture_sets,
            pruned = report.pruned.len(),
            records = report.records,
            partitions = report.partitions,
            skipped = report.skipped.len(),
            "Finalized patch run"
        );
        Ok(report)
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The record store backing the run.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Synthesized texture sets of the run.
    pub fn texture_sets(&self) -> &TextureSetCache {
        &self.cache
    }

    /// Number of records modified so far.
    pub fn modified_count(&self) -> usize {
        self.tracker.modified_count()
    }

    fn expect_phase(&self, operation: &'static str, expected: Phase) -> EngineResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidSequence {
                operation,
                expected,
                actual: self.phase,
            })
        }
    }

    fn handle_for(&mut self, key: &RecordKey) -> EngineResult<RecordHandle> {
        if let Some(handle) = self.arena.handle_of(key) {
            return Ok(handle);
        }

        match self.store.resolve(key) {
            Ok(record) => {
                debug!(record = %key, "Resolved record outside the index");
                Ok(self.arena.insert(record))
            }
            Err(fault) => Err(EngineError::RecordMismatch {
                record: key.clone(),
                reason: fault.reason,
            }),
        }
    }

    /// Masters ordered by load order. Containers outside it, such as this
    /// run's own outputs, follow by name.
    fn in_load_order(&self, masters: impl IntoIterator<Item = ContainerKey>) -> Vec<ContainerKey> {
        let mut masters: Vec<ContainerKey> = masters.into_iter().collect();
        masters.sort_by_cached_key(|name| {
            (
                self.store.load_order_position(name).unwrap_or(usize::MAX),
                name.clone(),
            )
        });
        masters
    }

    fn descriptor_of(&self, key: &RecordKey) -> Option<TextureSetDescriptor> {
        self.index
            .texture_sets()
            .get(key)
            .cloned()
            .or_else(|| self.cache.descriptor_of(key))
    }
}

/// Convert a wire entry into a tracker update.
fn slot_update(entry: &ModelUse) -> EngineResult<(RecordKey, SlotTag, SlotUpdate)> {
    let key = RecordKey::new(entry.container_name.clone(), entry.local_id);
    let tag = entry
        .sub_model_tag
        .parse::<SlotTag>()
        .map_err(|reason| EngineError::RecordMismatch {
            record: key.clone(),
            reason,
        })?;

    let update = SlotUpdate {
        mesh_file: entry.mesh_file.clone(),
        alternate_textures: entry
            .alternate_textures
            .iter()
            .map(|alt| AltTextureUpdate {
                slot_id: alt.slot_id,
                slot_id_new: alt.slot_id_new,
                descriptor: TextureSetDescriptor::new(&alt.textures),
            })
            .collect(),
    };
    Ok((key, tag, update))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Model, Record};
    use crate::store::MemoryRecordStore;
    use tempfile::TempDir;

    fn key(id: u32) -> RecordKey {
        RecordKey::new("Skyrim.esm", LocalId::new(id).unwrap())
    }

    fn static_record(id: u32, mesh: &str) -> Record {
        Record::new(
            key(id),
            RecordBody::Modeled {
                kind: crate::record::ModeledKind::Static,
                model: Some(Model::new(mesh)),
                material: None,
                single_pass: false,
            },
        )
    }

    fn store(records: Vec<Record>) -> MemoryRecordStore {
        let mut skyrim = Container::new("Skyrim.esm");
        skyrim.flags.master = true;
        skyrim.records = records;
        MemoryRecordStore::new(vec![skyrim]).unwrap()
    }

    fn populated(records: Vec<Record>) -> PatchRun<MemoryRecordStore> {
        let mut run = PatchRun::initialize(store(records), RunConfig::default()).unwrap();
        run.populate(None).unwrap();
        run
    }

    fn entry(id: u32, tag: &str, mesh: &str, textures: &[&str]) -> ModelUse {
        let mut slots: [String; 8] = Default::default();
        for (slot, texture) in slots.iter_mut().zip(textures) {
            *slot = texture.to_string();
        }
        ModelUse {
            container_name: ContainerKey::new("Skyrim.esm"),
            local_id: LocalId::new(id).unwrap(),
            sub_model_tag: tag.to_string(),
            mesh_file: mesh.to_string(),
            single_pass_material: false,
            alternate_textures: vec![AlternateTextureSlots {
                slot_id: 0,
                slot_id_new: 0,
                textures: slots,
            }],
        }
    }

    #[test]
    fn test_initialize_rejects_empty_plugin_name() {
        let result = PatchRun::initialize(
            store(Vec::new()),
            RunConfig::default().with_plugin_name("  "),
        );
        assert!(matches!(result, Err(EngineError::EnvironmentBuild(_))));
    }

    #[test]
    fn test_initialize_rejects_out_of_range_first_id() {
        let result = PatchRun::initialize(
            store(Vec::new()),
            RunConfig::default().with_first_id(0x0100_0000),
        );
        assert!(matches!(result, Err(EngineError::EnvironmentBuild(_))));
    }

    #[test]
    fn test_query_before_populate_is_invalid() {
        let run = PatchRun::initialize(store(Vec::new()), RunConfig::default()).unwrap();
        let err = run.model_uses("meshes\\x.nif").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidSequence {
                operation: "model_uses",
                expected: Phase::Populated,
                actual: Phase::Initialized,
            }
        ));
    }

    #[test]
    fn test_populate_twice_is_invalid() {
        let mut run = populated(Vec::new());
        assert!(matches!(
            run.populate(None),
            Err(EngineError::InvalidSequence { .. })
        ));
    }

    #[test]
    fn test_calls_after_finalize_are_invalid() {
        let dir = TempDir::new().unwrap();
        let mut run = populated(vec![static_record(1, "x.nif")]);
        run.finalize(dir.path()).unwrap();

        assert_eq!(run.phase(), Phase::Finalized);
        assert!(run.finalize(dir.path()).is_err());
        assert!(run.apply_batch(&ApplyUpdatesBatch::default()).is_err());
    }

    #[test]
    fn test_model_uses_report_current_bindings() {
        let mut run = populated(vec![static_record(1, "rocks\\rock01.nif")]);
        run.apply_batch(&ApplyUpdatesBatch {
            uses: vec![entry(1, "MODL", "rocks\\rock01.nif", &["rocks\\rock01_p.dds"])],
        })
        .unwrap();

        // Queries report originals, not working copies.
        let uses = run.model_uses("Meshes/Rocks/Rock01.nif").unwrap().uses;
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].sub_model_tag, "MODL");
        assert_eq!(uses[0].mesh_file, "rocks\\rock01.nif");
        assert!(uses[0].alternate_textures.is_empty());
    }

    #[test]
    fn test_batch_skips_mismatched_entries() {
        let mut run = populated(vec![static_record(1, "x.nif")]);
        let report = run
            .apply_batch(&ApplyUpdatesBatch {
                uses: vec![
                    entry(1, "MALE", "x.nif", &["a.dds"]),
                    entry(2, "MODL", "x.nif", &["a.dds"]),
                    entry(1, "BOGUS", "x.nif", &["a.dds"]),
                    entry(1, "MODL", "x.nif", &["a.dds"]),
                ],
            })
            .unwrap();

        assert_eq!(report.rejected, 3);
        assert_eq!(report.modified, 1);
        assert_eq!(run.modified_count(), 1);
    }

    #[test]
    fn test_finalize_skips_empty_primary() {
        let dir = TempDir::new().unwrap();
        let mut run = populated(vec![static_record(1, "x.nif")]);
        run.apply_batch(&ApplyUpdatesBatch {
            uses: vec![ModelUse {
                alternate_textures: Vec::new(),
                ..entry(1, "MODL", "y.nif", &[])
            }],
        })
        .unwrap();

        let report = run.finalize(dir.path()).unwrap();
        assert_eq!(report.texture_sets, 0);
        assert_eq!(report.partitions, 1);
        assert_eq!(report.written, vec![dir.path().join("PG_1.esp")]);
        assert!(!dir.path().join("ParallaxGen.esp").exists());
    }

    #[test]
    fn test_finalize_writes_primary_then_partitions() {
        let dir = TempDir::new().unwrap();
        let mut run = populated(vec![static_record(1, "x.nif")]);
        run.apply_batch(&ApplyUpdatesBatch {
            uses: vec![entry(1, "MODL", "x.nif", &["a.dds"])],
        })
        .unwrap();

        let report = run.finalize(dir.path()).unwrap();
        assert_eq!(
            report.written,
            vec![
                dir.path().join("ParallaxGen.esp"),
                dir.path().join("PG_1.esp")
            ]
        );

        let partition = run
            .store()
            .load_container(&dir.path().join("PG_1.esp"))
            .unwrap()
            .unwrap();
        let masters: Vec<String> = partition.masters.iter().map(|m| m.to_string()).collect();
        assert_eq!(masters, vec!["Skyrim.esm", "ParallaxGen.esp"]);
        assert!(partition.flags.compact);
    }

    #[test]
    fn test_masters_follow_load_order() {
        let dir = TempDir::new().unwrap();
        let mut zeta = Container::new("Zeta.esm");
        zeta.flags.master = true;
        let mut alpha = Container::new("Alpha.esp");
        alpha.masters.push(ContainerKey::new("Zeta.esm"));
        alpha.records.push(
            Record::new(
                RecordKey::new("Alpha.esp", LocalId::new(0x20).unwrap()),
                RecordBody::Modeled {
                    kind: crate::record::ModeledKind::Static,
                    model: Some(Model::new("x.nif")),
                    material: None,
                    single_pass: false,
                },
            )
            .with_links(vec![RecordKey::new("Zeta.esm", LocalId::new(0x10).unwrap())]),
        );

        let store = MemoryRecordStore::new(vec![zeta, alpha]).unwrap();
        let mut run = PatchRun::initialize(store, RunConfig::default()).unwrap();
        run.populate(None).unwrap();
        run.apply_batch(&ApplyUpdatesBatch {
            uses: vec![ModelUse {
                container_name: ContainerKey::new("Alpha.esp"),
                local_id: LocalId::new(0x20).unwrap(),
                alternate_textures: Vec::new(),
                ..entry(0x20, "MODL", "y.nif", &[])
            }],
        })
        .unwrap();
        run.finalize(dir.path()).unwrap();

        let partition = run
            .store()
            .load_container(&dir.path().join("PG_1.esp"))
            .unwrap()
            .unwrap();
        let masters: Vec<String> = partition.masters.iter().map(|m| m.to_string()).collect();
        assert_eq!(masters, vec!["Zeta.esm", "Alpha.esp"]);
    }
}
