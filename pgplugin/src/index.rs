//! Mesh-use index.
//!
//! Built once per run from the winning records: maps each normalized mesh
//! path to the (record, slot) pairs that reference it. The same scan keeps
//! the descriptors of every winning texture set and the single-pass flag of
//! every material object, which model-use reports need.

use std::collections::HashMap;

use crate::paths::{normalize_mesh_path, weight_variant_sibling};
use crate::record::{model_slots, ModeledKind, Record, RecordBody, RecordKey, SlotTag};
use crate::texture_set::TextureSetDescriptor;

/// One reference to a mesh: which record, through which model slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshUse {
    pub record: RecordKey,
    pub slot: SlotTag,
}

/// Normalized mesh path to the records using it.
#[derive(Debug, Default)]
pub struct MeshUseIndex {
    uses: HashMap<String, Vec<MeshUse>>,
    texture_sets: HashMap<RecordKey, TextureSetDescriptor>,
    single_pass: HashMap<RecordKey, bool>,
}

impl MeshUseIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a record sequence.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.add(record);
        }
        index
    }

    /// Index one record.
    ///
    /// Armor and armor addon meshes named `*_0.<ext>` or `*_1.<ext>` are
    /// also registered under their weight sibling, since the game loads both.
    pub fn add(&mut self, record: &Record) {
        match &record.body {
            RecordBody::TextureSet { textures } => {
                self.texture_sets.insert(
                    record.key.clone(),
                    TextureSetDescriptor::from_record_textures(textures),
                );
            }
            RecordBody::Modeled {
                kind: ModeledKind::MaterialObject,
                single_pass,
                ..
            } => {
                self.single_pass.insert(record.key.clone(), *single_pass);
            }
            _ => {}
        }

        let aliased = record.body.has_weight_variants();
        for (model, slot) in model_slots(&record.body) {
            let path = normalize_mesh_path(&model.file);
            if path.is_empty() {
                continue;
            }

            let mesh_use = MeshUse {
                record: record.key.clone(),
                slot,
            };
            if aliased {
                if let Some(sibling) = weight_variant_sibling(&path) {
                    self.uses
                        .entry(sibling)
                        .or_default()
                        .push(mesh_use.clone());
                }
            }
            self.uses.entry(path).or_default().push(mesh_use);
        }
    }

    /// Uses of `mesh_path` in insertion order; empty for unknown meshes.
    pub fn lookup(&self, mesh_path: &str) -> &[MeshUse] {
        self.uses
            .get(&normalize_mesh_path(mesh_path))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Descriptors of the winning texture sets.
    pub fn texture_sets(&self) -> &HashMap<RecordKey, TextureSetDescriptor> {
        &self.texture_sets
    }

    /// Single-pass flag of a material object; `false` when unknown.
    pub fn single_pass(&self, material: &RecordKey) -> bool {
        self.single_pass.get(material).copied().unwrap_or(false)
    }

    /// Number of distinct mesh paths.
    pub fn mesh_count(&self) -> usize {
        self.uses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ArmorModel, Gendered, LocalId, Model};

    fn key(id: u32) -> RecordKey {
        RecordKey::new("Skyrim.esm", LocalId::new(id).unwrap())
    }

    fn modeled(id: u32, kind: ModeledKind, mesh: &str) -> Record {
        Record::new(
            key(id),
            RecordBody::Modeled {
                kind,
                model: Some(Model::new(mesh)),
                material: None,
                single_pass: false,
            },
        )
    }

    #[test]
    fn test_uses_keep_insertion_order() {
        let records = vec![
            modeled(3, ModeledKind::Static, "x.nif"),
            modeled(1, ModeledKind::Static, "X.NIF"),
            modeled(2, ModeledKind::Static, "meshes/x.nif"),
        ];
        let index = MeshUseIndex::build(&records);

        let ids: Vec<u32> = index
            .lookup("meshes\\x.nif")
            .iter()
            .map(|u| u.record.id.value())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(index.lookup("meshes\\x.nif").iter().all(|u| u.slot == SlotTag::Primary));
    }

    #[test]
    fn test_lookup_normalizes_query() {
        let index = MeshUseIndex::build(&[modeled(1, ModeledKind::Tree, "trees\\pine.nif")]);
        assert_eq!(index.lookup("Trees/Pine.NIF").len(), 1);
        assert!(index.lookup("trees\\oak.nif").is_empty());
    }

    #[test]
    fn test_empty_mesh_paths_are_skipped() {
        let index = MeshUseIndex::build(&[modeled(1, ModeledKind::Static, "")]);
        assert_eq!(index.mesh_count(), 0);
    }

    #[test]
    fn test_armor_weight_variants_are_aliased() {
        let armor = Record::new(
            key(1),
            RecordBody::Armor {
                world_model: Some(Gendered::new(
                    Some(ArmorModel::new(Model::new("armor\\iron\\cuirass_0.nif"))),
                    None,
                )),
            },
        );
        let index = MeshUseIndex::build(&[armor]);

        let light = index.lookup("meshes\\armor\\iron\\cuirass_0.nif");
        let heavy = index.lookup("meshes\\armor\\iron\\cuirass_1.nif");
        assert_eq!(light, heavy);
        assert_eq!(light[0].slot, SlotTag::Male);
    }

    #[test]
    fn test_weight_variants_not_aliased_for_other_kinds() {
        let index = MeshUseIndex::build(&[modeled(1, ModeledKind::Static, "rock_0.nif")]);
        assert_eq!(index.lookup("rock_0.nif").len(), 1);
        assert!(index.lookup("rock_1.nif").is_empty());
    }

    #[test]
    fn test_texture_sets_and_materials_are_recorded() {
        let txst = Record::texture_set(key(10), std::array::from_fn(|i| {
            if i == 0 {
                "rock\\rock01.dds".to_string()
            } else {
                String::new()
            }
        }));
        let mato = Record::new(
            key(11),
            RecordBody::Modeled {
                kind: ModeledKind::MaterialObject,
                model: None,
                material: None,
                single_pass: true,
            },
        );
        let index = MeshUseIndex::build(&[txst, mato]);

        assert_eq!(
            index.texture_sets().get(&key(10)),
            Some(&TextureSetDescriptor::new(&["textures\\rock\\rock01.dds"]))
        );
        assert!(index.single_pass(&key(11)));
        assert!(!index.single_pass(&key(12)));
    }
}
