use crate::models::ModrinthIndex;
use crate::storage::archive::ArchiveReader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Mod loader runtime a pack targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
    Fabric,
    Forge,
    Neoforge,
    Quilt,
    Liteloader,
    Unknown,
}

impl Loader {
    pub fn as_str(&self) -> &'static str {
        match self {
            Loader::Fabric => "fabric",
            Loader::Forge => "forge",
            Loader::Neoforge => "neoforge",
            Loader::Quilt => "quilt",
            Loader::Liteloader => "liteloader",
            Loader::Unknown => "unknown",
        }
    }

    /// Parse a loader name, tolerating id suffixes like "fabric-0.14.21"
    pub fn parse(value: &str) -> Loader {
        let id = value
            .split('-')
            .next()
            .unwrap_or(value)
            .trim()
            .to_lowercase();
        match id.as_str() {
            "fabric" => Loader::Fabric,
            "forge" => Loader::Forge,
            "neoforge" => Loader::Neoforge,
            "quilt" => Loader::Quilt,
            "liteloader" => Loader::Liteloader,
            _ => Loader::Unknown,
        }
    }

    /// First loader named as a substring of `haystack`, scanned in
    /// fabric, forge, quilt, neoforge, liteloader order
    pub fn find_in(haystack: &str) -> Option<Loader> {
        let lower = haystack.to_lowercase();
        for (token, loader) in [
            ("fabric", Loader::Fabric),
            ("forge", Loader::Forge),
            ("quilt", Loader::Quilt),
            ("neoforge", Loader::Neoforge),
            ("liteloader", Loader::Liteloader),
        ] {
            if lower.contains(token) {
                return Some(loader);
            }
        }
        None
    }
}

impl fmt::Display for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the pack archive describes its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackKind {
    /// `modrinth.index.json` with remote downloads plus optional overrides
    Indexed,
    /// All files present in the archive itself
    Standard,
}

/// A loaded input pack
#[derive(Debug, Clone)]
pub struct Pack {
    pub id: Uuid,
    pub name: String,
    pub minecraft_version: String,
    pub loader: Loader,
    pub kind: PackKind,
    pub archive: Arc<ArchiveReader>,
    /// Parsed index descriptor, present for indexed packs only
    pub index: Option<ModrinthIndex>,
}

impl Pack {
    /// Standard packs may have their detected metadata corrected by the user
    pub fn is_editable(&self) -> bool {
        self.kind == PackKind::Standard
    }
}
