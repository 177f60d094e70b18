//! Model sub-objects and the slot tags that address them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::key::RecordKey;

/// Which nested model inside a record is being addressed.
///
/// Single-model records only have [`SlotTag::Primary`]. Armor carries a
/// gendered world model, armor addons carry gendered world and first-person
/// models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotTag {
    Primary,
    Male,
    Female,
    FirstPersonMale,
    FirstPersonFemale,
}

impl SlotTag {
    /// All slot tags in extraction order.
    pub const ALL: [SlotTag; 5] = [
        SlotTag::Primary,
        SlotTag::Male,
        SlotTag::Female,
        SlotTag::FirstPersonMale,
        SlotTag::FirstPersonFemale,
    ];

    /// Wire spelling of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotTag::Primary => "MODL",
            SlotTag::Male => "MALE",
            SlotTag::Female => "FEMALE",
            SlotTag::FirstPersonMale => "1STMALE",
            SlotTag::FirstPersonFemale => "1STFEMALE",
        }
    }
}

impl fmt::Display for SlotTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sub-model tag '{}'", s))
    }
}

/// Male/female pair of optional values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gendered<T> {
    #[serde(default)]
    pub male: Option<T>,
    #[serde(default)]
    pub female: Option<T>,
}

impl<T> Gendered<T> {
    /// Create a pair.
    pub fn new(male: Option<T>, female: Option<T>) -> Self {
        Self { male, female }
    }
}

/// One alternate texture binding: replaces the textures of a named shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateTexture {
    /// Name of the shape inside the mesh.
    #[serde(default)]
    pub name: String,

    /// Shape index inside the mesh.
    pub index: i32,

    /// Texture set record applied to the shape.
    pub new_texture: RecordKey,
}

/// A mesh reference with optional alternate textures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    /// Mesh path, usually relative to `meshes\`.
    pub file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_textures: Option<Vec<AlternateTexture>>,
}

impl Model {
    /// Create a model without alternate textures.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            alternate_textures: None,
        }
    }

    /// Add alternate texture bindings.
    pub fn with_alternate_textures(mut self, textures: Vec<AlternateTexture>) -> Self {
        self.alternate_textures = Some(textures);
        self
    }

    /// Iterate over the alternate texture bindings (empty when absent).
    pub fn alternate_textures(&self) -> impl Iterator<Item = &AlternateTexture> {
        self.alternate_textures.iter().flatten()
    }
}

/// World model wrapper of an armor record; the mesh sits one level down.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmorModel {
    #[serde(default)]
    pub model: Option<Model>,
}

impl ArmorModel {
    /// Wrap a model.
    pub fn new(model: Model) -> Self {
        Self { model: Some(model) }
    }
}
