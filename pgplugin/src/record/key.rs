//! Record and container identities.
//!
//! A record is addressed by the container ("plugin") that owns it plus a
//! 24-bit local identifier. Container names compare case-insensitively, the
//! same way the game resolves plugin file names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Largest local identifier the record format can address.
pub const MAX_LOCAL_ID: u32 = 0x00FF_FFFF;

/// Name of a data container (a plugin file such as `Skyrim.esm`).
///
/// The original spelling is preserved for display and output; equality,
/// hashing and ordering ignore ASCII case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerKey {
    name: String,
}

impl ContainerKey {
    /// Create a container key from a plugin file name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The plugin file name as given.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the name is empty.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.name.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for ContainerKey {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for ContainerKey {}

impl Hash for ContainerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded() {
            state.write_u8(b);
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for ContainerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContainerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for ContainerKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A 24-bit record identifier, unique within its owning container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct LocalId(u32);

impl LocalId {
    /// Create a local id, returning `None` above the 24-bit range.
    pub fn new(value: u32) -> Option<Self> {
        (value <= MAX_LOCAL_ID).then_some(Self(value))
    }

    /// The raw identifier value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for LocalId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        LocalId::new(value).ok_or_else(|| format!("local id {:#X} exceeds 24 bits", value))
    }
}

impl From<LocalId> for u32 {
    fn from(id: LocalId) -> Self {
        id.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

/// Identity of a single record: owning container plus local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Container that owns (originally defines) the record.
    pub container: ContainerKey,

    /// Identifier within the owning container.
    pub id: LocalId,
}

impl RecordKey {
    /// Create a record key.
    pub fn new(container: impl Into<ContainerKey>, id: LocalId) -> Self {
        Self {
            container: container.into(),
            id,
        }
    }
}

impl From<String> for ContainerKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_container_key_ignores_case() {
        let a = ContainerKey::new("Skyrim.esm");
        let b = ContainerKey::new("SKYRIM.ESM");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_container_key_keeps_spelling() {
        let key = ContainerKey::new("Dawnguard.esm");
        assert_eq!(key.to_string(), "Dawnguard.esm");
    }

    #[test]
    fn test_container_key_ordering_is_case_insensitive() {
        let a = ContainerKey::new("apple.esp");
        let b = ContainerKey::new("Banana.esp");
        assert!(a < b);
    }

    #[test]
    fn test_local_id_range() {
        assert!(LocalId::new(0).is_some());
        assert!(LocalId::new(MAX_LOCAL_ID).is_some());
        assert!(LocalId::new(MAX_LOCAL_ID + 1).is_none());
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new("Skyrim.esm", LocalId::new(0x12EB7).unwrap());
        assert_eq!(key.to_string(), "Skyrim.esm:012EB7");
    }

    #[test]
    fn test_local_id_rejects_out_of_range_json() {
        let result: Result<LocalId, _> = serde_json::from_str("16777216");
        assert!(result.is_err());
    }
}
