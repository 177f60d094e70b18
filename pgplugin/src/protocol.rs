//! Messages exchanged with the host.
//!
//! The host queries which records use a mesh ([`MeshUsesQuery`] to
//! [`ModelUses`]) and submits desired model states ([`ApplyUpdatesBatch`]).
//! Buffers crossing the host boundary are bincode-encoded; files read by the
//! command-line driver use JSON with the same types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{ContainerKey, LocalId, TEXTURE_SLOT_COUNT};

/// Wire codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Failed to encode a message.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] bincode::Error),

    /// Failed to decode a message.
    #[error("Failed to decode message: {0}")]
    Decode(#[source] bincode::Error),
}

/// Which records use this mesh?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshUsesQuery {
    pub mesh_path: String,
}

/// Alternate texture binding of one shape slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateTextureSlots {
    /// Shape index currently bound.
    pub slot_id: i32,
    /// Shape index the binding should move to (equal to `slot_id` in reports).
    pub slot_id_new: i32,
    /// Texture paths of the bound set.
    pub textures: [String; TEXTURE_SLOT_COUNT],
}

/// One model slot of one record, as reported to or requested by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUse {
    pub container_name: ContainerKey,
    pub local_id: LocalId,
    /// Wire spelling of the slot tag (`MODL`, `MALE`, ...).
    pub sub_model_tag: String,
    pub mesh_file: String,
    /// Single-pass flag of the record's directional material.
    #[serde(default)]
    pub single_pass_material: bool,
    #[serde(default)]
    pub alternate_textures: Vec<AlternateTextureSlots>,
}

/// Reply to a [`MeshUsesQuery`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUses {
    pub uses: Vec<ModelUse>,
}

/// Desired model states to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyUpdatesBatch {
    pub uses: Vec<ModelUse>,
}

/// Encode a message for the host buffer path.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(message).map_err(CodecError::Encode)
}

/// Decode a message from a host buffer.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}
