use crate::models::{ModEntry, ModMetadata};
use crate::storage::archive::ArchiveReader;
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Nested-jar recursion cap; two levels occur in practice
const MAX_NESTING_DEPTH: usize = 4;

const FABRIC_MANIFEST: &str = "fabric.mod.json";
const FORGE_MANIFEST: &str = "META-INF/mods.toml";

/// Extract metadata from a mod archive. First hit wins: Fabric manifest,
/// then Forge manifest, then a fallback record derived from the file
/// name. Parse failures degrade to the fallback and are logged; this
/// never aborts the caller's analysis.
pub fn parse_mod_metadata(archive: &ArchiveReader, file_name: &str) -> ModMetadata {
    parse_at_depth(archive, file_name, 0)
}

fn parse_at_depth(archive: &ArchiveReader, file_name: &str, depth: usize) -> ModMetadata {
    if archive.contains(FABRIC_MANIFEST) {
        match parse_fabric(archive, depth) {
            Ok(metadata) => return metadata,
            Err(e) => {
                tracing::warn!("unreadable {FABRIC_MANIFEST} in {file_name}: {e:#}");
            }
        }
    }

    if archive.contains(FORGE_MANIFEST) {
        match archive.read_string(FORGE_MANIFEST) {
            Ok(text) => {
                if let Some(metadata) = parse_forge_toml(&text) {
                    return metadata;
                }
                tracing::warn!("no modId found in {FORGE_MANIFEST} of {file_name}");
            }
            Err(e) => {
                tracing::warn!("unreadable {FORGE_MANIFEST} in {file_name}: {e:#}");
            }
        }
    }

    fallback_metadata(file_name)
}

/// Read `fabric.mod.json`, recursing into `jars[*].file` bundles
fn parse_fabric(archive: &ArchiveReader, depth: usize) -> Result<ModMetadata> {
    let text = archive.read_string(FABRIC_MANIFEST)?;
    let json: Value = serde_json::from_str(&text).context("invalid manifest JSON")?;

    let id = json["id"].as_str().unwrap_or("unknown").to_string();
    let version = json["version"].as_str().unwrap_or("unknown").to_string();
    let name = json["name"].as_str().map(str::to_string);

    let mut depends = BTreeMap::new();
    if let Some(object) = json["depends"].as_object() {
        for (dep_id, range) in object {
            depends.insert(dep_id.clone(), range_value_to_string(range));
        }
    }

    let provides = match &json["provides"] {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Value::Object(object) => object.keys().cloned().collect(),
        _ => Vec::new(),
    };

    let mut metadata = ModMetadata {
        mods: vec![ModEntry {
            id,
            version,
            name,
            depends,
            provides,
        }],
        bundled: Vec::new(),
    };

    // Nested jars contribute to the bundled list
    if let Some(jars) = json["jars"].as_array() {
        for jar in jars {
            let Some(entry) = jar["file"].as_str() else {
                continue;
            };
            let nested_name = entry.rsplit('/').next().unwrap_or(entry);
            if depth + 1 >= MAX_NESTING_DEPTH {
                tracing::warn!("nesting too deep, treating {nested_name} as opaque");
                metadata.bundled.push(fallback_entry(nested_name));
                continue;
            }
            let nested = match archive
                .read_bytes(entry)
                .and_then(ArchiveReader::from_bytes)
            {
                Ok(inner) => parse_at_depth(&inner, nested_name, depth + 1),
                Err(e) => {
                    tracing::warn!("unreadable bundled jar {entry}: {e:#}");
                    ModMetadata::single(fallback_entry(nested_name))
                }
            };
            metadata.bundled.extend(nested.mods);
            metadata.bundled.extend(nested.bundled);
        }
    }

    Ok(metadata)
}

/// A Fabric range is usually a string; an array means alternatives, of
/// which the first is kept
fn range_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or("*")
            .to_string(),
        _ => "*".to_string(),
    }
}

/// Scrape `mods.toml` with regexes. Only `modId`, `version` and
/// mandatory `[[dependencies.*]]` blocks are consumed; a full TOML
/// parser buys nothing here.
fn parse_forge_toml(text: &str) -> Option<ModMetadata> {
    let mod_id_re = Regex::new(r#"(?m)^\s*modId\s*=\s*"([^"]+)""#).unwrap();
    let version_re = Regex::new(r#"(?m)^\s*version\s*=\s*"([^"]+)""#).unwrap();
    let header_re = Regex::new(r"\[\[dependencies\.[^\]]+\]\]").unwrap();
    let mandatory_re = Regex::new(r"mandatory\s*=\s*true").unwrap();
    let range_re = Regex::new(r#"versionRange\s*=\s*"([^"]*)""#).unwrap();

    let id = mod_id_re.captures(text)?.get(1)?.as_str().to_string();
    let version = version_re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut depends = BTreeMap::new();
    let headers: Vec<_> = header_re.find_iter(text).collect();
    for (i, header) in headers.iter().enumerate() {
        let block_end = headers
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let block = &text[header.end()..block_end];

        if !mandatory_re.is_match(block) {
            continue;
        }
        let Some(dep_id) = mod_id_re
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        let range = range_re
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "*".to_string());
        depends.insert(dep_id, range);
    }

    Some(ModMetadata::single(ModEntry {
        id,
        version,
        name: None,
        depends,
        provides: Vec::new(),
    }))
}

/// The record a mod gets when its archive cannot be read or parsed
pub fn fallback_metadata(file_name: &str) -> ModMetadata {
    ModMetadata::single(fallback_entry(file_name))
}

fn fallback_entry(file_name: &str) -> ModEntry {
    let stem = file_name.strip_suffix(".jar").unwrap_or(file_name);
    ModEntry::new(stem, "unknown")
}
