use crate::cache::MetadataCache;
use crate::http::HttpFetcher;
use crate::models::{FileOrigin, FileRecord, IndexFile, ModrinthIndex, Pack, PackKind};
use crate::storage::loader::INDEX_NAME;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Shape of the produced artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Every surviving file laid out at its original path
    FullArchive,
    /// `modrinth.index.json` plus `overrides/` for local files; remote
    /// files stay download descriptors
    Index,
}

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub format: OutputFormat,
    pub version_id: String,
    pub name: String,
}

/// What got written, and its checksum
#[derive(Debug, Clone)]
pub struct EmitReport {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub local_files: usize,
    pub remote_files: usize,
}

/// Stream every surviving file into the output archive, walking packs
/// in priority order. The payload is already-compressed jars, so
/// entries are stored rather than deflated. The artifact lands via a
/// `.tmp` write and rename; a failed emit leaves nothing behind.
pub async fn emit(
    packs: &[Pack],
    files: &[FileRecord],
    cache: &MetadataCache,
    fetcher: &HttpFetcher,
    options: &EmitOptions,
    output: &Path,
    mut progress: impl FnMut(u8),
) -> Result<EmitReport> {
    let by_id: HashMap<Uuid, &Pack> = packs.iter().map(|p| (p.id, p)).collect();
    let store = FileOptions::default().compression_method(CompressionMethod::Stored);

    let survivors: Vec<&FileRecord> = packs
        .iter()
        .flat_map(|pack| files.iter().filter(move |f| f.pack_id == pack.id && f.enabled))
        .collect();
    let total = survivors.len().max(1);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen: HashSet<&str> = HashSet::new();
    let mut descriptors: Vec<IndexFile> = Vec::new();
    let mut local_files = 0;
    let mut remote_files = 0;

    for (done, file) in survivors.iter().enumerate() {
        // C6 already broke path ties; this guards the walk anyway
        if !seen.insert(file.path.as_str()) {
            continue;
        }
        let pack = by_id
            .get(&file.pack_id)
            .with_context(|| format!("no pack owns {}", file.path))?;

        match (&file.origin, options.format) {
            (FileOrigin::Local { entry }, OutputFormat::FullArchive) => {
                let bytes = pack
                    .archive
                    .read_bytes(entry)
                    .with_context(|| format!("failed to read {} from {}", entry, pack.name))?;
                writer.start_file(file.path.as_str(), store)?;
                writer.write_all(&bytes)?;
                local_files += 1;
            }
            (FileOrigin::Remote { urls, .. }, OutputFormat::FullArchive) => {
                let bytes = remote_bytes(cache, fetcher, urls).await?;
                writer.start_file(file.path.as_str(), store)?;
                writer.write_all(&bytes)?;
                remote_files += 1;
            }
            (FileOrigin::Local { entry }, OutputFormat::Index) => {
                let bytes = pack
                    .archive
                    .read_bytes(entry)
                    .with_context(|| format!("failed to read {} from {}", entry, pack.name))?;
                writer.start_file(format!("overrides/{}", file.path), store)?;
                writer.write_all(&bytes)?;
                local_files += 1;
            }
            (FileOrigin::Remote { descriptor, .. }, OutputFormat::Index) => {
                // Pass the original descriptor through untouched, no bytes move
                let mut descriptor = descriptor.clone();
                descriptor.path = file.path.clone();
                descriptors.push(descriptor);
                remote_files += 1;
            }
        }

        progress((((done + 1) * 95) / total) as u8);
    }

    if options.format == OutputFormat::Index {
        let index = compose_index(packs, options, descriptors)?;
        writer.start_file(INDEX_NAME, store)?;
        writer.write_all(&serde_json::to_vec_pretty(&index)?)?;
    }

    let bytes = writer
        .finish()
        .context("failed to finalize output archive")?
        .into_inner();

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = format!("{:x}", hasher.finalize());
    let size = bytes.len() as u64;

    // Atomic write: temp file first, then rename
    let tmp = output.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, output)
        .await
        .with_context(|| format!("failed to move artifact to {}", output.display()))?;

    progress(100);
    tracing::info!(
        "wrote {} ({} bytes, sha256 {})",
        output.display(),
        size,
        sha256
    );

    Ok(EmitReport {
        path: output.to_path_buf(),
        size,
        sha256,
        local_files,
        remote_files,
    })
}

/// Cached blob if the analysis already pulled it, else a fresh fetch;
/// urls are tried in order
async fn remote_bytes(
    cache: &MetadataCache,
    fetcher: &HttpFetcher,
    urls: &[String],
) -> Result<Vec<u8>> {
    if let Some(url) = urls.first() {
        if let Some(blob) = cache.get_blob(url).await {
            return Ok(blob.as_ref().clone());
        }
    }

    let mut last_error = anyhow::anyhow!("file has no download urls");
    for url in urls {
        match fetcher.fetch(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn compose_index(
    packs: &[Pack],
    options: &EmitOptions,
    files: Vec<IndexFile>,
) -> Result<ModrinthIndex> {
    let head = packs.first().context("cannot emit with no packs loaded")?;

    let dependencies = match (head.kind, &head.index) {
        (PackKind::Indexed, Some(index)) => index.dependencies.clone(),
        _ => BTreeMap::from([
            ("minecraft".to_string(), head.minecraft_version.clone()),
            (head.loader.as_str().to_string(), "latest".to_string()),
        ]),
    };

    Ok(ModrinthIndex {
        format_version: 1,
        game: "minecraft".to_string(),
        version_id: options.version_id.clone(),
        name: options.name.clone(),
        summary: None,
        files,
        dependencies,
    })
}
