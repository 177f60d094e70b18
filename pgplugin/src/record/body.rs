//! Record payloads as a closed set of kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::key::RecordKey;
use super::model::{ArmorModel, Gendered, Model};

/// Number of texture slots in a texture set record.
pub const TEXTURE_SLOT_COUNT: usize = 8;

/// Record kinds that carry a single model.
///
/// Armor and armor addons have their own [`RecordBody`] variants because
/// their models are nested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeledKind {
    Activator,
    AddonNode,
    Ammunition,
    AnimatedObject,
    ArtObject,
    BodyPartData,
    Book,
    CameraShot,
    Climate,
    Container,
    Door,
    Explosion,
    Flora,
    Furniture,
    Grass,
    Hazard,
    HeadPart,
    IdleMarker,
    Impact,
    Ingestible,
    Ingredient,
    Key,
    LeveledNpc,
    Light,
    MaterialObject,
    MiscItem,
    MoveableStatic,
    Projectile,
    Scroll,
    SoulGem,
    Static,
    TalkingActivator,
    Tree,
    Weapon,
}

impl ModeledKind {
    /// Four-character record signature.
    pub fn signature(&self) -> &'static str {
        match self {
            ModeledKind::Activator => "ACTI",
            ModeledKind::AddonNode => "ADDN",
            ModeledKind::Ammunition => "AMMO",
            ModeledKind::AnimatedObject => "ANIO",
            ModeledKind::ArtObject => "ARTO",
            ModeledKind::BodyPartData => "BPTD",
            ModeledKind::Book => "BOOK",
            ModeledKind::CameraShot => "CAMS",
            ModeledKind::Climate => "CLMT",
            ModeledKind::Container => "CONT",
            ModeledKind::Door => "DOOR",
            ModeledKind::Explosion => "EXPL",
            ModeledKind::Flora => "FLOR",
            ModeledKind::Furniture => "FURN",
            ModeledKind::Grass => "GRAS",
            ModeledKind::Hazard => "HAZD",
            ModeledKind::HeadPart => "HDPT",
            ModeledKind::IdleMarker => "IDLM",
            ModeledKind::Impact => "IPCT",
            ModeledKind::Ingestible => "ALCH",
            ModeledKind::Ingredient => "INGR",
            ModeledKind::Key => "KEYM",
            ModeledKind::LeveledNpc => "LVLN",
            ModeledKind::Light => "LIGH",
            ModeledKind::MaterialObject => "MATO",
            ModeledKind::MiscItem => "MISC",
            ModeledKind::MoveableStatic => "MSTT",
            ModeledKind::Projectile => "PROJ",
            ModeledKind::Scroll => "SCRL",
            ModeledKind::SoulGem => "SLGM",
            ModeledKind::Static => "STAT",
            ModeledKind::TalkingActivator => "TACT",
            ModeledKind::Tree => "TREE",
            ModeledKind::Weapon => "WEAP",
        }
    }
}

/// Kind-specific payload of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordBody {
    /// Armor: gendered world model, each wrapping a model.
    Armor {
        #[serde(default)]
        world_model: Option<Gendered<ArmorModel>>,
    },

    /// Armor addon: gendered world and first-person models.
    ArmorAddon {
        #[serde(default)]
        world_model: Option<Gendered<Model>>,
        #[serde(default)]
        first_person: Option<Gendered<Model>>,
    },

    /// Any other kind with a single model.
    Modeled {
        kind: ModeledKind,
        #[serde(default)]
        model: Option<Model>,
        /// Directional material (statics).
        #[serde(default)]
        material: Option<RecordKey>,
        /// Single-pass flag (material objects).
        #[serde(default)]
        single_pass: bool,
    },

    /// Texture set; slot paths are stored without the `textures\` prefix.
    TextureSet { textures: [String; TEXTURE_SLOT_COUNT] },

    /// Kinds the engine never edits.
    Other,
}

impl RecordBody {
    /// Four-character record signature, `"????"` for untouched kinds.
    pub fn signature(&self) -> &'static str {
        match self {
            RecordBody::Armor { .. } => "ARMO",
            RecordBody::ArmorAddon { .. } => "ARMA",
            RecordBody::Modeled { kind, .. } => kind.signature(),
            RecordBody::TextureSet { .. } => "TXST",
            RecordBody::Other => "????",
        }
    }

    /// Whether the game blends `_0`/`_1` weight meshes for this kind.
    pub fn has_weight_variants(&self) -> bool {
        matches!(self, RecordBody::Armor { .. } | RecordBody::ArmorAddon { .. })
    }

    /// Whether this is a texture set.
    pub fn is_texture_set(&self) -> bool {
        matches!(self, RecordBody::TextureSet { .. })
    }
}

/// A major record as handed over by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: RecordKey,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_id: Option<String>,

    pub body: RecordBody,

    /// Form links other than alternate textures and materials.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<RecordKey>,
}

impl Record {
    /// Create a record with no extra links.
    pub fn new(key: RecordKey, body: RecordBody) -> Self {
        Self {
            key,
            editor_id: None,
            body,
            links: Vec::new(),
        }
    }

    /// Set the editor id.
    pub fn with_editor_id(mut self, editor_id: impl Into<String>) -> Self {
        self.editor_id = Some(editor_id.into());
        self
    }

    /// Add form links.
    pub fn with_links(mut self, links: Vec<RecordKey>) -> Self {
        self.links = links;
        self
    }

    /// Create a texture set record.
    pub fn texture_set(key: RecordKey, textures: [String; TEXTURE_SLOT_COUNT]) -> Self {
        Self::new(key, RecordBody::TextureSet { textures })
    }

    /// Every record this record references.
    pub fn form_links(&self) -> Vec<&RecordKey> {
        let mut links: Vec<&RecordKey> = self.links.iter().collect();

        if let RecordBody::Modeled {
            material: Some(material),
            ..
        } = &self.body
        {
            links.push(material);
        }

        for (model, _) in super::slots::model_slots(&self.body) {
            links.extend(model.alternate_textures().map(|alt| &alt.new_texture));
        }

        links
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.editor_id {
            Some(edid) => write!(f, "{} {} ({})", self.body.signature(), self.key, edid),
            None => write!(f, "{} {}", self.body.signature(), self.key),
        }
    }
}
