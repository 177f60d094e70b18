//! Texture set deduplication.
//!
//! Every replacement texture set the engine synthesizes goes through the
//! [`TextureSetCache`]: equal descriptors share one record in the primary
//! output container. A prior run's output can be preloaded so unchanged
//! descriptors keep their identifiers across runs; preloaded entries that no
//! update asks for again are pruned at finalization.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::allocator::IdAllocator;
use crate::error::{EngineError, EngineResult};
use crate::paths::{file_stem, normalize_texture_path, strip_prefix_ci, TEXTURE_PREFIX};
use crate::record::{ContainerKey, LocalId, Record, RecordBody, RecordKey, TEXTURE_SLOT_COUNT};
use crate::store::Container;

/// Prefix of synthesized editor ids.
pub const EDITOR_ID_PREFIX: &str = "PG_";

/// Eight normalized texture slots.
///
/// Slots are lowercase, backslash-separated and carry the `textures\`
/// prefix; unset slots are empty. Equality is therefore slot-wise and
/// case-insensitive with respect to the raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureSetDescriptor([String; TEXTURE_SLOT_COUNT]);

impl TextureSetDescriptor {
    /// Build a descriptor from raw slot paths.
    ///
    /// Missing trailing slots are unset; slots past the eighth are ignored.
    pub fn new<S: AsRef<str>>(slots: &[S]) -> Self {
        Self(std::array::from_fn(|i| {
            slots
                .get(i)
                .map(|slot| normalize_texture_path(slot.as_ref()))
                .unwrap_or_default()
        }))
    }

    /// Build a descriptor from the slots of a texture set record.
    pub fn from_record_textures(textures: &[String; TEXTURE_SLOT_COUNT]) -> Self {
        Self::new(textures)
    }

    /// Slots in the form stored on texture set records (no `textures\` prefix).
    pub fn to_record_textures(&self) -> [String; TEXTURE_SLOT_COUNT] {
        std::array::from_fn(|i| strip_prefix_ci(&self.0[i], TEXTURE_PREFIX).to_string())
    }

    /// Normalized slots.
    pub fn slots(&self) -> &[String; TEXTURE_SLOT_COUNT] {
        &self.0
    }

    /// Check if every slot is unset.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    /// Editor id for a synthesized record: `PG_<stem>_<id>`.
    ///
    /// `<stem>` is the alphanumeric part of the first set slot's file stem.
    pub fn editor_id(&self, id: LocalId) -> String {
        let stem: String = self
            .0
            .iter()
            .find(|slot| !slot.is_empty())
            .map(|slot| file_stem(slot))
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        format!("{}{}_{}", EDITOR_ID_PREFIX, stem, id)
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    id: LocalId,
    used: bool,
}

/// Deduplicating store of synthesized texture sets.
#[derive(Debug)]
pub struct TextureSetCache {
    output: ContainerKey,
    entries: HashMap<TextureSetDescriptor, CacheEntry>,
    records: BTreeMap<LocalId, Record>,
}

impl TextureSetCache {
    /// Create an empty cache writing into `output`.
    pub fn new(output: ContainerKey) -> Self {
        Self {
            output,
            entries: HashMap::new(),
            records: BTreeMap::new(),
        }
    }

    /// The primary output container.
    pub fn output(&self) -> &ContainerKey {
        &self.output
    }

    /// Carry the texture sets of a prior output into this run as unused.
    ///
    /// Every identifier the prior container owns is reserved in `allocator`.
    /// Returns the number of texture sets registered.
    pub fn preload(&mut self, prior: &Container, allocator: &mut IdAllocator) -> usize {
        let mut registered = 0;

        for record in prior.owned_records() {
            allocator.reserve(record.key.id);

            let RecordBody::TextureSet { textures } = &record.body else {
                continue;
            };

            let descriptor = TextureSetDescriptor::from_record_textures(textures);
            if self.entries.contains_key(&descriptor) {
                debug!(record = %record.key, "Duplicate texture set in prior output, dropping");
                continue;
            }

            let mut carried = record.clone();
            carried.key = RecordKey::new(self.output.clone(), record.key.id);
            self.entries.insert(
                descriptor,
                CacheEntry {
                    id: record.key.id,
                    used: false,
                },
            );
            self.records.insert(record.key.id, carried);
            registered += 1;
        }

        debug!(
            container = %prior.name,
            texture_sets = registered,
            "Preloaded prior output"
        );
        registered
    }

    /// Identity of the texture set for `descriptor`, creating it if needed.
    ///
    /// Hits are marked used. Misses allocate a new identifier and synthesize
    /// a texture set record in the primary output container.
    pub fn find_or_create(
        &mut self,
        descriptor: &TextureSetDescriptor,
        allocator: &mut IdAllocator,
    ) -> EngineResult<RecordKey> {
        if let Some(entry) = self.entries.get_mut(descriptor) {
            entry.used = true;
            return Ok(RecordKey::new(self.output.clone(), entry.id));
        }

        let id = allocator
            .allocate()
            .ok_or_else(|| EngineError::IdSpaceExhausted {
                container: self.output.clone(),
            })?;
        let key = RecordKey::new(self.output.clone(), id);

        let record = Record::texture_set(key.clone(), descriptor.to_record_textures())
            .with_editor_id(descriptor.editor_id(id));
        trace!(record = %record, "Created texture set");

        self.entries
            .insert(descriptor.clone(), CacheEntry { id, used: true });
        self.records.insert(id, record);
        Ok(key)
    }

    /// Identity of the texture set for `descriptor`, without marking it used.
    pub fn lookup(&self, descriptor: &TextureSetDescriptor) -> Option<RecordKey> {
        self.entries
            .get(descriptor)
            .map(|entry| RecordKey::new(self.output.clone(), entry.id))
    }

    /// Whether the entry for `descriptor` has been requested in this run.
    pub fn is_used(&self, descriptor: &TextureSetDescriptor) -> Option<bool> {
        self.entries.get(descriptor).map(|entry| entry.used)
    }

    /// Descriptor of a texture set held by the cache.
    pub fn descriptor_of(&self, key: &RecordKey) -> Option<TextureSetDescriptor> {
        if key.container != self.output {
            return None;
        }
        match &self.records.get(&key.id)?.body {
            RecordBody::TextureSet { textures } => {
                Some(TextureSetDescriptor::from_record_textures(textures))
            }
            _ => None,
        }
    }

    /// Mark the texture set `key` used if the cache holds it.
    ///
    /// Returns whether `key` names a cached texture set.
    pub fn mark_used(&mut self, key: &RecordKey) -> bool {
        let Some(descriptor) = self.descriptor_of(key) else {
            return false;
        };
        match self.entries.get_mut(&descriptor) {
            Some(entry) if entry.id == key.id => {
                entry.used = true;
                true
            }
            _ => false,
        }
    }

    /// Remove every entry still unused, returning the removed identities.
    pub fn prune_unused(&mut self) -> Vec<RecordKey> {
        let unused: Vec<LocalId> = self
            .entries
            .values()
            .filter(|entry| !entry.used)
            .map(|entry| entry.id)
            .collect();

        self.entries.retain(|_, entry| entry.used);

        let mut pruned: Vec<RecordKey> = unused
            .into_iter()
            .filter_map(|id| self.records.remove(&id).map(|record| record.key))
            .collect();
        pruned.sort();
        pruned
    }

    /// Texture set records in identifier order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Number of cached texture sets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
