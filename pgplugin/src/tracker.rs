//! Copy-on-write record tracking.
//!
//! Original records live in a [`RecordArena`] and are addressed by
//! [`RecordHandle`]. The [`RecordTracker`] keeps at most one working copy per
//! original, remembers which (record, slot) pairs were already reconciled so
//! repeated updates are no-ops, and collects the handles of records that
//! actually changed.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::trace;

use crate::allocator::IdAllocator;
use crate::error::{EngineError, EngineResult};
use crate::paths::{strip_prefix_ci, MESH_PREFIX};
use crate::record::{slot, slot_mut, AlternateTexture, Record, RecordKey, SlotTag};
use crate::texture_set::{TextureSetCache, TextureSetDescriptor};

/// Index of an original record in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(usize);

impl RecordHandle {
    /// Position in indexing order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owned storage for original (resolved) records.
#[derive(Debug, Default)]
pub struct RecordArena {
    records: Vec<Record>,
    by_key: HashMap<RecordKey, RecordHandle>,
}

impl RecordArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record. A record with an already known key replaces the
    /// stored version and keeps its handle.
    pub fn insert(&mut self, record: Record) -> RecordHandle {
        if let Some(&handle) = self.by_key.get(&record.key) {
            self.records[handle.0] = record;
            return handle;
        }
        let handle = RecordHandle(self.records.len());
        self.by_key.insert(record.key.clone(), handle);
        self.records.push(record);
        handle
    }

    /// The original record behind `handle`.
    pub fn get(&self, handle: RecordHandle) -> &Record {
        &self.records[handle.0]
    }

    /// Handle of the record with `key`, if stored.
    pub fn handle_of(&self, key: &RecordKey) -> Option<RecordHandle> {
        self.by_key.get(key).copied()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Desired alternate texture state for one shape slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AltTextureUpdate {
    /// Shape index currently bound.
    pub slot_id: i32,
    /// Shape index the binding should move to.
    pub slot_id_new: i32,
    /// Texture set the shape should use.
    pub descriptor: TextureSetDescriptor,
}

/// Desired state of one model slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotUpdate {
    /// Mesh path, with or without the `meshes\` prefix.
    pub mesh_file: String,
    pub alternate_textures: Vec<AltTextureUpdate>,
}

/// Texture set lookup and synthesis available to updates.
pub struct TextureResolver<'a> {
    /// Descriptors of the winning texture sets in the load order.
    pub known: &'a HashMap<RecordKey, TextureSetDescriptor>,
    pub cache: &'a mut TextureSetCache,
    pub allocator: &'a mut IdAllocator,
}

impl TextureResolver<'_> {
    /// Descriptor of the texture set `key`, if it can be resolved.
    pub fn descriptor_of(&self, key: &RecordKey) -> Option<TextureSetDescriptor> {
        self.known
            .get(key)
            .cloned()
            .or_else(|| self.cache.descriptor_of(key))
    }

    /// Identity of the texture set for `descriptor`, creating it if needed.
    pub fn find_or_create(&mut self, descriptor: &TextureSetDescriptor) -> EngineResult<RecordKey> {
        self.cache.find_or_create(descriptor, self.allocator)
    }
}

/// Result of applying one slot update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The (record, slot) pair was reconciled earlier in this run.
    AlreadyProcessed,
    /// The record already matched the update.
    Unchanged,
    /// At least one field of the working copy changed.
    Modified,
}

/// Working copies and reconciliation state of a run.
#[derive(Debug, Default)]
pub struct RecordTracker {
    working: HashMap<RecordHandle, Record>,
    processed: HashSet<(RecordKey, SlotTag)>,
    modified: BTreeSet<RecordHandle>,
}

impl RecordTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// The working copy for `handle`, cloning the original on first use.
    pub fn get_or_create_working_copy(
        &mut self,
        arena: &RecordArena,
        handle: RecordHandle,
    ) -> &mut Record {
        self.working
            .entry(handle)
            .or_insert_with(|| arena.get(handle).clone())
    }

    /// Whether `(key, tag)` was already reconciled.
    pub fn is_processed(&self, key: &RecordKey, tag: SlotTag) -> bool {
        self.processed.contains(&(key.clone(), tag))
    }

    /// Reconcile one model slot of a record with the desired state.
    ///
    /// The mesh is replaced when it differs case-insensitively. Each
    /// alternate texture the original slot binds at `slot_id` is moved to
    /// `slot_id_new` and
    /// pointed at the requested texture set when its current set differs (or
    /// cannot be resolved). A request for an unbound `slot_id` appends a new
    /// binding at `slot_id_new`.
    pub fn apply_update(
        &mut self,
        arena: &RecordArena,
        handle: RecordHandle,
        tag: SlotTag,
        update: &SlotUpdate,
        textures: &mut TextureResolver<'_>,
    ) -> EngineResult<UpdateOutcome> {
        let original = arena.get(handle);
        let pair = (original.key.clone(), tag);
        if self.processed.contains(&pair) {
            return Ok(UpdateOutcome::AlreadyProcessed);
        }

        let Some(original_model) = slot(&original.body, tag) else {
            return Err(EngineError::RecordMismatch {
                record: original.key.clone(),
                reason: format!("record has no {} model", tag),
            });
        };
        // Bindings are matched against the original slot so that one entry's
        // index move cannot redirect a later entry.
        let targets: Vec<Option<usize>> = update
            .alternate_textures
            .iter()
            .map(|alt| {
                original_model
                    .alternate_textures()
                    .position(|binding| binding.index == alt.slot_id)
            })
            .collect();
        self.processed.insert(pair);

        let copy = self.get_or_create_working_copy(arena, handle);
        let key = copy.key.clone();
        let model = slot_mut(&mut copy.body, tag).ok_or_else(|| EngineError::RecordMismatch {
            record: key.clone(),
            reason: format!("working copy has no {} model", tag),
        })?;

        let mut changed = false;

        let mesh = strip_prefix_ci(update.mesh_file.trim(), MESH_PREFIX);
        if !mesh.is_empty() && !mesh.eq_ignore_ascii_case(&model.file) {
            trace!(record = %key, from = %model.file, to = %mesh, "Replacing mesh");
            model.file = mesh.to_string();
            changed = true;
        }

        for (alt, target) in update.alternate_textures.iter().zip(targets) {
            let bindings = model.alternate_textures.get_or_insert_with(Vec::new);

            match target {
                Some(pos) => {
                    let binding = &mut bindings[pos];
                    if alt.slot_id != alt.slot_id_new {
                        binding.index = alt.slot_id_new;
                        changed = true;
                    }
                    let current = textures.descriptor_of(&binding.new_texture);
                    if current.as_ref() != Some(&alt.descriptor) {
                        let target = textures.find_or_create(&alt.descriptor)?;
                        if binding.new_texture != target {
                            binding.new_texture = target;
                            changed = true;
                        }
                    }
                }
                None => {
                    let target = textures.find_or_create(&alt.descriptor)?;
                    bindings.push(AlternateTexture {
                        name: String::new(),
                        index: alt.slot_id_new,
                        new_texture: target,
                    });
                    changed = true;
                }
            }
        }

        if model
            .alternate_textures
            .as_ref()
            .is_some_and(|bindings| bindings.is_empty())
        {
            model.alternate_textures = None;
        }

        if changed {
            self.modified.insert(handle);
            Ok(UpdateOutcome::Modified)
        } else {
            Ok(UpdateOutcome::Unchanged)
        }
    }

    /// Modified working copies in handle order.
    pub fn modified(&self) -> impl Iterator<Item = (RecordHandle, &Record)> {
        self.modified
            .iter()
            .filter_map(|handle| self.working.get(handle).map(|record| (*handle, record)))
    }

    /// Number of modified records.
    pub fn modified_count(&self) -> usize {
        self.modified.len()
    }

    /// Take the modified working copies in handle order.
    pub fn into_modified(mut self) -> Vec<Record> {
        let modified = std::mem::take(&mut self.modified);
        modified
            .into_iter()
            .filter_map(|handle| self.working.remove(&handle))
            .collect()
    }
}
