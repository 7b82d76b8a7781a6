use crate::models::{IndexFile, ModMetadata};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a file's category is decided from its target path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Mods,
    Resourcepacks,
    Shaderpacks,
    Configs,
    Others,
}

impl FileCategory {
    /// Classify a slash-separated relative path
    pub fn classify(path: &str) -> FileCategory {
        for (prefix, category) in [
            ("mods/", FileCategory::Mods),
            ("resourcepacks/", FileCategory::Resourcepacks),
            ("shaderpacks/", FileCategory::Shaderpacks),
            ("config/", FileCategory::Configs),
            ("scripts/", FileCategory::Configs),
        ] {
            if path.starts_with(prefix) || path.contains(&format!("/{prefix}")) {
                return category;
            }
        }
        FileCategory::Others
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Mods => "mods",
            FileCategory::Resourcepacks => "resourcepacks",
            FileCategory::Shaderpacks => "shaderpacks",
            FileCategory::Configs => "configs",
            FileCategory::Others => "others",
        }
    }
}

/// Where a file's bytes come from
#[derive(Debug, Clone)]
pub enum FileOrigin {
    /// Entry inside the owning pack's archive
    Local { entry: String },
    /// Download described by an index entry
    Remote {
        urls: Vec<String>,
        descriptor: IndexFile,
    },
}

impl FileOrigin {
    pub fn is_remote(&self) -> bool {
        matches!(self, FileOrigin::Remote { .. })
    }
}

/// A single asset belonging to a loaded pack
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub pack_id: Uuid,
    /// Target path inside an instance, slash-separated
    pub path: String,
    pub file_name: String,
    pub category: FileCategory,
    pub origin: FileOrigin,
    pub enabled: bool,
    pub is_duplicate: bool,
    /// Name of the pack whose copy won, when this one lost
    pub kept_source: Option<String>,
    pub conflict_reason: Option<String>,
    pub metadata: Option<ModMetadata>,
}

impl FileRecord {
    pub fn new(pack_id: Uuid, path: String, origin: FileOrigin) -> Self {
        let file_name = path.rsplit('/').next().unwrap_or(&path).to_string();
        let category = FileCategory::classify(&path);
        Self {
            pack_id,
            path,
            file_name,
            category,
            origin,
            enabled: true,
            is_duplicate: false,
            kept_source: None,
            conflict_reason: None,
            metadata: None,
        }
    }

    /// Survivors are what the emitter streams out
    pub fn is_surviving(&self) -> bool {
        self.enabled && !self.is_duplicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(FileCategory::classify("mods/sodium.jar"), FileCategory::Mods);
        assert_eq!(
            FileCategory::classify("resourcepacks/pack.zip"),
            FileCategory::Resourcepacks
        );
        assert_eq!(
            FileCategory::classify("shaderpacks/bsl.zip"),
            FileCategory::Shaderpacks
        );
        assert_eq!(
            FileCategory::classify("config/sodium.json"),
            FileCategory::Configs
        );
        assert_eq!(
            FileCategory::classify("scripts/startup.zs"),
            FileCategory::Configs
        );
        assert_eq!(FileCategory::classify("options.txt"), FileCategory::Others);
    }

    #[test]
    fn test_classify_nested() {
        assert_eq!(
            FileCategory::classify(".minecraft/mods/sodium.jar"),
            FileCategory::Mods
        );
        // "mods/" must be a path segment, not an arbitrary substring
        assert_eq!(
            FileCategory::classify("custommods/readme.txt"),
            FileCategory::Others
        );
    }

    #[test]
    fn test_file_name_from_path() {
        let record = FileRecord::new(
            uuid::Uuid::new_v4(),
            "mods/sodium-0.5.8.jar".to_string(),
            FileOrigin::Local {
                entry: "mods/sodium-0.5.8.jar".to_string(),
            },
        );
        assert_eq!(record.file_name, "sodium-0.5.8.jar");
        assert_eq!(record.category, FileCategory::Mods);
        assert!(record.is_surviving());
    }
}
