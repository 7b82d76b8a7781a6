use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a mod archive declares about itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModMetadata {
    /// Mods declared by the archive's own manifest; the first is primary
    pub mods: Vec<ModEntry>,
    /// Mods shipped inside nested jars
    #[serde(default)]
    pub bundled: Vec<ModEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModEntry {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// mod id -> version range
    #[serde(default)]
    pub depends: BTreeMap<String, String>,
    /// Alias ids this mod satisfies
    #[serde(default)]
    pub provides: Vec<String>,
}

impl ModMetadata {
    pub fn single(entry: ModEntry) -> Self {
        Self {
            mods: vec![entry],
            bundled: Vec::new(),
        }
    }

    /// The entry whose dependencies get validated
    pub fn primary(&self) -> Option<&ModEntry> {
        self.mods.first()
    }
}

impl ModEntry {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: None,
            depends: BTreeMap::new(),
            provides: Vec::new(),
        }
    }
}
