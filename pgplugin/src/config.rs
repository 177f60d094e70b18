//! Run configuration.
//!
//! `RunConfig` carries every knob of a patch run. It can be built in code
//! with the `with_*` setters or loaded from an INI file:
//!
//! ```ini
//! [output]
//! plugin_name = ParallaxGen.esp
//! split_prefix = PG_
//! esmify = false
//! language = English
//!
//! [game]
//! release = SkyrimSE
//!
//! [ids]
//! first_id = 0x800
//!
//! [partition]
//! max_masters = 254
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::allocator::DEFAULT_FIRST_ID;
use crate::record::MAX_LOCAL_ID;

/// Default primary output container name.
pub const DEFAULT_PLUGIN_NAME: &str = "ParallaxGen.esp";

/// Default prefix of split output containers.
pub const DEFAULT_SPLIT_PREFIX: &str = "PG_";

/// Exclusive limit on declared masters per output container.
pub const DEFAULT_MAX_MASTERS: usize = 254;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid INI.
    #[error("Failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// String localization of the output containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PluginLanguage {
    #[default]
    English,
    German,
    Italian,
    Spanish,
    SpanishMexico,
    French,
    Polish,
    PortugueseBrazil,
    Chinese,
    Russian,
    Japanese,
    Czech,
    Hungarian,
    Danish,
    Finnish,
    Greek,
    Norwegian,
    Swedish,
    Turkish,
    Arabic,
    Korean,
    Thai,
    ChineseSimplified,
}

impl PluginLanguage {
    /// All languages, alphabetical by display name.
    pub const ALL: [PluginLanguage; 23] = [
        PluginLanguage::Arabic,
        PluginLanguage::Chinese,
        PluginLanguage::ChineseSimplified,
        PluginLanguage::Czech,
        PluginLanguage::Danish,
        PluginLanguage::English,
        PluginLanguage::Finnish,
        PluginLanguage::French,
        PluginLanguage::German,
        PluginLanguage::Greek,
        PluginLanguage::Hungarian,
        PluginLanguage::Italian,
        PluginLanguage::Japanese,
        PluginLanguage::Korean,
        PluginLanguage::Norwegian,
        PluginLanguage::Polish,
        PluginLanguage::PortugueseBrazil,
        PluginLanguage::Russian,
        PluginLanguage::Spanish,
        PluginLanguage::SpanishMexico,
        PluginLanguage::Swedish,
        PluginLanguage::Thai,
        PluginLanguage::Turkish,
    ];

    /// Display name as written in config files.
    pub fn name(&self) -> &'static str {
        match self {
            PluginLanguage::English => "English",
            PluginLanguage::German => "German",
            PluginLanguage::Italian => "Italian",
            PluginLanguage::Spanish => "Spanish",
            PluginLanguage::SpanishMexico => "Spanish Mexico",
            PluginLanguage::French => "French",
            PluginLanguage::Polish => "Polish",
            PluginLanguage::PortugueseBrazil => "Portuguese Brazil",
            PluginLanguage::Chinese => "Chinese",
            PluginLanguage::Russian => "Russian",
            PluginLanguage::Japanese => "Japanese",
            PluginLanguage::Czech => "Czech",
            PluginLanguage::Hungarian => "Hungarian",
            PluginLanguage::Danish => "Danish",
            PluginLanguage::Finnish => "Finnish",
            PluginLanguage::Greek => "Greek",
            PluginLanguage::Norwegian => "Norwegian",
            PluginLanguage::Swedish => "Swedish",
            PluginLanguage::Turkish => "Turkish",
            PluginLanguage::Arabic => "Arabic",
            PluginLanguage::Korean => "Korean",
            PluginLanguage::Thai => "Thai",
            PluginLanguage::ChineseSimplified => "Chinese Simplified",
        }
    }

    /// Parse a display name, falling back to English for unknown names.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl fmt::Display for PluginLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Game release the outputs target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameRelease {
    Skyrim,
    #[default]
    SkyrimSE,
    SkyrimVR,
    SkyrimGOG,
    Enderal,
    EnderalSE,
}

impl GameRelease {
    /// Config file spelling.
    pub fn name(&self) -> &'static str {
        match self {
            GameRelease::Skyrim => "Skyrim",
            GameRelease::SkyrimSE => "SkyrimSE",
            GameRelease::SkyrimVR => "SkyrimVR",
            GameRelease::SkyrimGOG => "SkyrimGOG",
            GameRelease::Enderal => "Enderal",
            GameRelease::EnderalSE => "EnderalSE",
        }
    }

    /// Whether outputs may carry the compact (light) flag.
    ///
    /// The original engine releases cannot load compact containers.
    pub fn supports_compact(&self) -> bool {
        !matches!(self, GameRelease::Skyrim | GameRelease::Enderal)
    }

    /// Whether writers verify that compact containers only use ids up to `0xFFF`.
    ///
    /// VR relies on an engine extension that lifts the limit.
    pub fn checks_compactness(&self) -> bool {
        *self != GameRelease::SkyrimVR
    }
}

impl fmt::Display for GameRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GameRelease {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skyrim" | "skyrimle" => Ok(GameRelease::Skyrim),
            "skyrimse" => Ok(GameRelease::SkyrimSE),
            "skyrimvr" => Ok(GameRelease::SkyrimVR),
            "skyrimgog" => Ok(GameRelease::SkyrimGOG),
            "enderal" => Ok(GameRelease::Enderal),
            "enderalse" => Ok(GameRelease::EnderalSE),
            _ => Err(format!("unknown game release '{}'", s)),
        }
    }
}

/// Configuration of a single patch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Primary output container; holds synthesized texture sets.
    pub plugin_name: String,

    /// Prefix of split output containers (`PG_1.esp`, `PG_2.esp`, ...).
    pub split_prefix: String,

    /// Set the master flag on every output container.
    pub esmify: bool,

    /// String localization of the outputs.
    pub language: PluginLanguage,

    /// Target game release.
    pub release: GameRelease,

    /// First local id issued for synthesized records.
    pub first_id: u32,

    /// Exclusive limit on declared masters per output container.
    pub max_masters: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            plugin_name: DEFAULT_PLUGIN_NAME.to_string(),
            split_prefix: DEFAULT_SPLIT_PREFIX.to_string(),
            esmify: false,
            language: PluginLanguage::default(),
            release: GameRelease::default(),
            first_id: DEFAULT_FIRST_ID,
            max_masters: DEFAULT_MAX_MASTERS,
        }
    }
}

impl RunConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary output container name.
    pub fn with_plugin_name(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = name.into();
        self
    }

    /// Set the split container prefix.
    pub fn with_split_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.split_prefix = prefix.into();
        self
    }

    /// Enable or disable the master flag on outputs.
    pub fn with_esmify(mut self, esmify: bool) -> Self {
        self.esmify = esmify;
        self
    }

    /// Set the output language.
    pub fn with_language(mut self, language: PluginLanguage) -> Self {
        self.language = language;
        self
    }

    /// Set the target game release.
    pub fn with_release(mut self, release: GameRelease) -> Self {
        self.release = release;
        self
    }

    /// Set the first issued local id.
    pub fn with_first_id(mut self, first_id: u32) -> Self {
        self.first_id = first_id;
        self
    }

    /// Set the exclusive master limit.
    pub fn with_max_masters(mut self, max_masters: usize) -> Self {
        self.max_masters = max_masters;
        self
    }

    /// Load from an INI file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = ini.get_from(Some("output"), "plugin_name") {
            config.plugin_name = name.trim().to_string();
        }
        if let Some(prefix) = ini.get_from(Some("output"), "split_prefix") {
            config.split_prefix = prefix.trim().to_string();
        }
        if let Some(value) = ini.get_from(Some("output"), "esmify") {
            config.esmify = parse_bool("output.esmify", value)?;
        }
        if let Some(value) = ini.get_from(Some("output"), "language") {
            config.language = PluginLanguage::from_name(value);
        }
        if let Some(value) = ini.get_from(Some("game"), "release") {
            config.release = value.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "game.release".to_string(),
                value: value.to_string(),
                reason,
            })?;
        }
        if let Some(value) = ini.get_from(Some("ids"), "first_id") {
            config.first_id = parse_local_id("ids.first_id", value)?;
        }
        if let Some(value) = ini.get_from(Some("partition"), "max_masters") {
            config.max_masters = parse_max_masters("partition.max_masters", value)?;
        }

        Ok(config)
    }

    /// Write the configuration as INI.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("output"))
            .set("plugin_name", self.plugin_name.as_str())
            .set("split_prefix", self.split_prefix.as_str())
            .set("esmify", self.esmify.to_string())
            .set("language", self.language.name());
        ini.with_section(Some("game"))
            .set("release", self.release.name());
        ini.with_section(Some("ids"))
            .set("first_id", format!("{:#X}", self.first_id));
        ini.with_section(Some("partition"))
            .set("max_masters", self.max_masters.to_string());
        ini
    }

    /// Flattened `section.key = value` pairs, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let ini = self.to_ini();
        let mut entries = Vec::new();
        for (section, props) in ini.iter() {
            let section = section.unwrap_or_default();
            for (key, value) in props.iter() {
                entries.push((format!("{}.{}", section, key), value.to_string()));
            }
        }
        entries
    }
}

/// Default configuration file location (`~/.pgplugin/config.ini`).
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pgplugin")
        .join("config.ini")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_local_id(key: &str, value: &str) -> Result<u32, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => trimmed.parse::<u32>(),
    };

    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match parsed {
        Ok(id) if id <= MAX_LOCAL_ID => Ok(id),
        Ok(_) => Err(invalid("exceeds 24-bit identifier range")),
        Err(_) => Err(invalid("expected a decimal or 0x-prefixed hex number")),
    }
}

fn parse_max_masters(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(limit) if limit >= 2 => Ok(limit),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected an integer of at least 2".to_string(),
        }),
    }
}
