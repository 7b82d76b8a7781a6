use crate::config::Config;
use crate::models::{
    FileCategory, FileOrigin, FileRecord, Loader, ModrinthIndex, Pack, PackKind,
};
use crate::storage::archive::ArchiveReader;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const INDEX_NAME: &str = "modrinth.index.json";
const OVERRIDES_PREFIX: &str = "overrides/";

/// Why a pack archive was rejected. Rejection never disturbs packs that
/// are already loaded.
#[derive(Debug, Error)]
pub enum PackLoadError {
    #[error("failed to read pack file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed pack archive: {0}")]
    InvalidArchive(String),
    #[error("malformed modrinth.index.json: {0}")]
    InvalidIndex(#[from] serde_json::Error),
}

/// A pack plus its enumerated file records, in loader order
#[derive(Debug)]
pub struct LoadedPack {
    pub pack: Pack,
    pub files: Vec<FileRecord>,
}

/// Load a pack archive from disk. The pack name defaults to the file stem.
pub async fn load_pack_from_path(
    path: &Path,
    head: Option<&Pack>,
    config: &Config,
) -> Result<LoadedPack, PackLoadError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pack")
        .to_string();
    load_pack_from_bytes(bytes, name, head, config)
}

/// Classify an archive as indexed or standard and enumerate its files
pub fn load_pack_from_bytes(
    bytes: Vec<u8>,
    name: String,
    head: Option<&Pack>,
    config: &Config,
) -> Result<LoadedPack, PackLoadError> {
    let archive = Arc::new(
        ArchiveReader::from_bytes(bytes)
            .map_err(|e| PackLoadError::InvalidArchive(format!("{e:#}")))?,
    );

    if archive.contains(INDEX_NAME) {
        load_indexed(archive, name, config)
    } else {
        Ok(load_standard(archive, name, head, config))
    }
}

fn load_indexed(
    archive: Arc<ArchiveReader>,
    name: String,
    config: &Config,
) -> Result<LoadedPack, PackLoadError> {
    let text = archive
        .read_string(INDEX_NAME)
        .map_err(|e| PackLoadError::InvalidArchive(format!("{e:#}")))?;
    let index: ModrinthIndex = serde_json::from_str(&text)?;

    let id = Uuid::new_v4();
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for entry in &index.files {
        if !seen.insert(entry.path.clone()) {
            tracing::warn!("index lists {} twice, keeping the first", entry.path);
            continue;
        }
        let mut record = FileRecord::new(
            id,
            entry.path.clone(),
            FileOrigin::Remote {
                urls: entry.downloads.clone(),
                descriptor: entry.clone(),
            },
        );
        record.category = FileCategory::Mods;
        files.push(record);
    }

    for entry_name in archive.entry_names() {
        if entry_name.ends_with('/') {
            continue;
        }
        let Some(target) = entry_name.strip_prefix(OVERRIDES_PREFIX) else {
            continue;
        };
        if target.is_empty() || !seen.insert(target.to_string()) {
            continue;
        }
        files.push(FileRecord::new(
            id,
            target.to_string(),
            FileOrigin::Local {
                entry: entry_name.clone(),
            },
        ));
    }

    let minecraft_version = index
        .dependencies
        .get("minecraft")
        .cloned()
        .unwrap_or_else(|| config.default_minecraft_version.clone());
    let loader = loader_from_dependencies(&index.dependencies);

    Ok(LoadedPack {
        pack: Pack {
            id,
            name,
            minecraft_version,
            loader,
            kind: PackKind::Indexed,
            archive,
            index: Some(index),
        },
        files,
    })
}

/// Pick a loader from index dependency keys, in priority order.
/// A bare "forge" key loses to any key naming neoforge.
fn loader_from_dependencies(dependencies: &BTreeMap<String, String>) -> Loader {
    let keys: Vec<String> = dependencies.keys().map(|k| k.to_lowercase()).collect();
    let has = |token: &str| keys.iter().any(|k| k.contains(token));

    if has("fabric") {
        Loader::Fabric
    } else if has("forge") && !has("neoforge") {
        Loader::Forge
    } else if has("neoforge") {
        Loader::Neoforge
    } else if has("quilt") {
        Loader::Quilt
    } else if has("liteloader") {
        Loader::Liteloader
    } else {
        Loader::Fabric
    }
}

fn load_standard(
    archive: Arc<ArchiveReader>,
    name: String,
    head: Option<&Pack>,
    config: &Config,
) -> LoadedPack {
    let id = Uuid::new_v4();
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for entry_name in archive.entry_names() {
        if entry_name.ends_with('/') {
            continue;
        }
        if !seen.insert(entry_name.clone()) {
            tracing::warn!("archive lists {entry_name} twice, keeping the first");
            continue;
        }
        files.push(FileRecord::new(
            id,
            entry_name.clone(),
            FileOrigin::Local {
                entry: entry_name.clone(),
            },
        ));
    }

    let (minecraft_version, loader) = detect_standard_metadata(&archive, head, config);

    LoadedPack {
        pack: Pack {
            id,
            name,
            minecraft_version,
            loader,
            kind: PackKind::Standard,
            archive,
            index: None,
        },
        files,
    }
}

/// Detect a standard pack's minecraft version and loader. Sources are
/// tried in order and each may fill either gap; detection stops once
/// both are known. Unresolved fields inherit from the head pack, then
/// from configured defaults.
fn detect_standard_metadata(
    archive: &ArchiveReader,
    head: Option<&Pack>,
    config: &Config,
) -> (String, Loader) {
    let mut version: Option<String> = None;
    let mut loader: Option<Loader> = None;

    detect_from_curseforge_manifest(archive, &mut version, &mut loader);
    if version.is_none() || loader.is_none() {
        detect_from_instance_cfg(archive, &mut version, &mut loader);
    }
    if version.is_none() || loader.is_none() {
        detect_from_mod_filenames(archive, &mut version, &mut loader);
    }

    let version = version
        .or_else(|| head.map(|h| h.minecraft_version.clone()))
        .unwrap_or_else(|| config.default_minecraft_version.clone());
    let loader = loader
        .or_else(|| head.map(|h| h.loader))
        .unwrap_or_else(|| config.fallback_loader());

    (version, loader)
}

/// CurseForge-style `manifest.json`
fn detect_from_curseforge_manifest(
    archive: &ArchiveReader,
    version: &mut Option<String>,
    loader: &mut Option<Loader>,
) {
    if !archive.contains("manifest.json") {
        return;
    }
    let json: serde_json::Value = match archive
        .read_string("manifest.json")
        .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
    {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("unreadable manifest.json: {e:#}");
            return;
        }
    };

    if version.is_none() {
        *version = json["minecraft"]["version"].as_str().map(str::to_string);
    }
    if loader.is_none() {
        if let Some(id) = json["minecraft"]["modLoaders"][0]["id"].as_str() {
            let parsed = Loader::parse(id);
            if parsed != Loader::Unknown {
                *loader = Some(parsed);
            }
        }
    }
}

/// MultiMC / Prism `instance.cfg`
fn detect_from_instance_cfg(
    archive: &ArchiveReader,
    version: &mut Option<String>,
    loader: &mut Option<Loader>,
) {
    if !archive.contains("instance.cfg") {
        return;
    }
    let Ok(content) = archive.read_string("instance.cfg") else {
        return;
    };

    if version.is_none() {
        let re = Regex::new(r"(?m)^IntendedVersion=(.+)$").unwrap();
        *version = re
            .captures(&content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
    }
    if loader.is_none() && content.contains("LWJGL") {
        *loader = Some(if content.contains("Fabric") {
            Loader::Fabric
        } else {
            Loader::Forge
        });
    }
}

/// Last resort: mod filenames under any `mods/` directory usually carry
/// a `1.X[.Y]` game version and a loader name
fn detect_from_mod_filenames(
    archive: &ArchiveReader,
    version: &mut Option<String>,
    loader: &mut Option<Loader>,
) {
    let version_re = Regex::new(r"1\.\d+(\.\d+)?").unwrap();

    for entry_name in archive.entry_names() {
        if version.is_some() && loader.is_some() {
            return;
        }
        if entry_name.ends_with('/') || FileCategory::classify(entry_name) != FileCategory::Mods {
            continue;
        }
        let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);

        if version.is_none() {
            if let Some(m) = version_re.find(file_name) {
                *version = Some(m.as_str().to_string());
            }
        }
        if loader.is_none() {
            if file_name.to_lowercase().ends_with(".litemod") {
                *loader = Some(Loader::Liteloader);
            } else {
                *loader = Loader::find_in(file_name);
            }
        }
    }
}
