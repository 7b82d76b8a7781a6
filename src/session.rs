use crate::cache::{self, MetadataCache};
use crate::config::Config;
use crate::http::HttpFetcher;
use crate::merge::{self, EmitOptions, EmitReport};
use crate::models::{
    CompatibilityIssue, ConflictRecord, DependencyIssue, FileCategory, FileOrigin, FileRecord,
    Loader, ModMetadata, Pack,
};
use crate::services::{compatibility, dependencies, manifest, resolver};
use crate::storage::archive::ArchiveReader;
use crate::storage::loader::{self, PackLoadError};
use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    Up,
    Down,
}

/// Result of a quick or deep analysis pass
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub conflicts: Vec<ConflictRecord>,
    pub compatibility: Vec<CompatibilityIssue>,
    pub dependencies: Vec<DependencyIssue>,
    pub deep: bool,
}

impl AnalysisReport {
    pub fn is_compatible(&self) -> bool {
        self.compatibility.is_empty()
    }
}

/// Owns the pack list, the file registry and the analysis state.
/// Every state-changing event (load, remove, reorder, metadata edit)
/// invalidates the cached deep analysis and re-runs the quick pass.
pub struct MergeSession {
    config: Config,
    fetcher: HttpFetcher,
    cache: MetadataCache,
    packs: Vec<Pack>,
    files: Vec<FileRecord>,
    analysis_in_progress: bool,
    deep_report: Option<AnalysisReport>,
}

impl MergeSession {
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.http_timeout_secs)?;
        Ok(Self {
            config,
            fetcher,
            cache: MetadataCache::new(),
            packs: Vec::new(),
            files: Vec::new(),
            analysis_in_progress: false,
            deep_report: None,
        })
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn head(&self) -> Option<&Pack> {
        self.packs.first()
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Load a pack archive from disk. A pack whose name matches one
    /// already loaded is skipped with a warning, not an error.
    pub async fn load_pack(&mut self, path: &Path) -> Result<Option<Uuid>, PackLoadError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("pack")
            .to_string();
        if self.name_taken(&name) {
            return Ok(None);
        }
        let loaded = loader::load_pack_from_path(path, self.packs.first(), &self.config).await?;
        Ok(Some(self.install(loaded)))
    }

    pub fn load_pack_from_bytes(
        &mut self,
        bytes: Vec<u8>,
        name: String,
    ) -> Result<Option<Uuid>, PackLoadError> {
        if self.name_taken(&name) {
            return Ok(None);
        }
        let loaded =
            loader::load_pack_from_bytes(bytes, name, self.packs.first(), &self.config)?;
        Ok(Some(self.install(loaded)))
    }

    fn name_taken(&self, name: &str) -> bool {
        if self.packs.iter().any(|p| p.name == name) {
            tracing::warn!("a pack named {name} is already loaded, skipping");
            return true;
        }
        false
    }

    fn install(&mut self, loaded: loader::LoadedPack) -> Uuid {
        let id = loaded.pack.id;
        tracing::info!(
            "loaded {} ({:?}, minecraft {}, {} loader, {} files)",
            loaded.pack.name,
            loaded.pack.kind,
            loaded.pack.minecraft_version,
            loaded.pack.loader,
            loaded.files.len()
        );
        self.packs.push(loaded.pack);
        self.files.extend(loaded.files);
        self.on_state_change();
        id
    }

    /// Remove a pack and every file record it owns
    pub fn remove_pack(&mut self, id: Uuid) -> bool {
        let before = self.packs.len();
        self.packs.retain(|p| p.id != id);
        if self.packs.len() == before {
            return false;
        }
        self.files.retain(|f| f.pack_id != id);
        self.on_state_change();
        true
    }

    /// Move the pack at `index` one slot up or down the priority order
    pub fn reorder(&mut self, index: usize, direction: ReorderDirection) -> bool {
        let target = match direction {
            ReorderDirection::Up => index.checked_sub(1),
            ReorderDirection::Down => {
                let next = index + 1;
                (next < self.packs.len()).then_some(next)
            }
        };
        let Some(target) = target else {
            return false;
        };
        if index >= self.packs.len() {
            return false;
        }
        self.packs.swap(index, target);
        self.on_state_change();
        true
    }

    /// Correct a standard pack's detected minecraft version or loader
    pub fn set_pack_metadata(
        &mut self,
        id: Uuid,
        minecraft_version: Option<String>,
        loader: Option<Loader>,
    ) -> Result<()> {
        let pack = self
            .packs
            .iter_mut()
            .find(|p| p.id == id)
            .context("no such pack")?;
        if !pack.is_editable() {
            anyhow::bail!("{} is an indexed pack; its metadata is fixed", pack.name);
        }
        if let Some(version) = minecraft_version {
            pack.minecraft_version = version;
        }
        if let Some(loader) = loader {
            pack.loader = loader;
        }
        self.on_state_change();
        Ok(())
    }

    fn on_state_change(&mut self) {
        self.deep_report = None;
        self.quick_analysis();
    }

    /// Cheap pass: conflict resolution over whatever metadata is
    /// already known, plus the compatibility gate. No network.
    pub fn quick_analysis(&mut self) -> AnalysisReport {
        let resolution = resolver::resolve(&self.packs, &mut self.files);
        let compatibility = compatibility::validate(&self.packs);
        AnalysisReport {
            conflicts: resolution.conflicts,
            compatibility,
            dependencies: Vec::new(),
            deep: false,
        }
    }

    /// Populate metadata for every mod file (bounded batches of
    /// fetch+parse), re-resolve on the enriched list, then validate
    /// dependencies. The result is cached until the next state change.
    pub async fn deep_analysis(&mut self) -> Result<AnalysisReport> {
        if self.analysis_in_progress {
            anyhow::bail!("an analysis is already in progress");
        }
        if let Some(report) = &self.deep_report {
            return Ok(report.clone());
        }

        let compatibility = compatibility::validate(&self.packs);
        if !compatibility.is_empty() {
            anyhow::bail!(
                "packs are incompatible ({} issues); resolve them before deep analysis",
                compatibility.len()
            );
        }

        self.analysis_in_progress = true;
        let result = self.run_deep_analysis().await;
        self.analysis_in_progress = false;

        let report = result?;
        self.deep_report = Some(report.clone());
        Ok(report)
    }

    async fn run_deep_analysis(&mut self) -> Result<AnalysisReport> {
        resolver::resolve(&self.packs, &mut self.files);

        // Every mod file gets metadata, including ones the cheap pass
        // excluded on a filename slug: the rich pass re-judges those by
        // real version. Targets are in pack+file order; batch completion
        // order does not leak into assignment order.
        let mut targets: Vec<usize> = Vec::new();
        for pack in &self.packs {
            for (i, file) in self.files.iter().enumerate() {
                if file.pack_id == pack.id
                    && file.category == FileCategory::Mods
                    && file.metadata.is_none()
                {
                    targets.push(i);
                }
            }
        }

        let batch_size = self.config.batch_size.max(1);
        for chunk in targets.chunks(batch_size) {
            let tasks = chunk.iter().map(|&i| {
                let file = &self.files[i];
                let archive = self
                    .packs
                    .iter()
                    .find(|p| p.id == file.pack_id)
                    .map(|p| Arc::clone(&p.archive));
                fetch_and_parse(
                    self.cache.clone(),
                    self.fetcher.clone(),
                    archive,
                    file.origin.clone(),
                    cache::source_key(file),
                    file.file_name.clone(),
                )
            });
            let results = join_all(tasks).await;
            for (&i, metadata) in chunk.iter().zip(results) {
                self.files[i].metadata = Some(metadata);
            }
        }

        // Rich pass over the enriched list
        let resolution = resolver::resolve(&self.packs, &mut self.files);
        let dependency_issues = dependencies::validate(&self.files);

        Ok(AnalysisReport {
            conflicts: resolution.conflicts,
            compatibility: Vec::new(),
            dependencies: dependency_issues,
            deep: true,
        })
    }

    /// Stream the surviving files into an output artifact. Emit is
    /// blocked while compatibility issues stand.
    pub async fn emit(
        &mut self,
        options: &EmitOptions,
        output: &Path,
        progress: impl FnMut(u8),
    ) -> Result<EmitReport> {
        if self.packs.is_empty() {
            anyhow::bail!("no packs loaded");
        }
        let compatibility = compatibility::validate(&self.packs);
        if !compatibility.is_empty() {
            anyhow::bail!(
                "cannot emit while {} compatibility issues stand",
                compatibility.len()
            );
        }

        merge::emit(
            &self.packs,
            &self.files,
            &self.cache,
            &self.fetcher,
            options,
            output,
            progress,
        )
        .await
    }
}

/// One fetch+parse unit of a deep-analysis batch. Failures of any kind
/// degrade to the filename fallback record; analysis never aborts on a
/// single mod.
async fn fetch_and_parse(
    cache: MetadataCache,
    fetcher: HttpFetcher,
    archive: Option<Arc<ArchiveReader>>,
    origin: FileOrigin,
    key: Option<String>,
    file_name: String,
) -> ModMetadata {
    if let Some(key) = &key {
        if let Some(cached) = cache.get(key).await {
            return (*cached).clone();
        }
    }

    let fetched: Result<(Vec<u8>, bool)> = match &origin {
        FileOrigin::Local { entry } => match &archive {
            Some(archive) => archive.read_bytes(entry).map(|bytes| (bytes, false)),
            None => Err(anyhow::anyhow!("owning pack is gone")),
        },
        FileOrigin::Remote { urls, .. } => {
            let mut result = Err(anyhow::anyhow!("file has no download urls"));
            for url in urls {
                match fetcher.fetch(url).await {
                    Ok(bytes) => {
                        result = Ok((bytes, true));
                        break;
                    }
                    Err(e) => result = Err(e),
                }
            }
            result
        }
    };

    match fetched {
        Ok((bytes, is_remote)) => {
            let raw = is_remote.then(|| bytes.clone());
            let metadata = match ArchiveReader::from_bytes(bytes) {
                Ok(inner) => manifest::parse_mod_metadata(&inner, &file_name),
                Err(e) => {
                    tracing::warn!("{file_name} is not a readable archive: {e:#}");
                    manifest::fallback_metadata(&file_name)
                }
            };
            if let Some(key) = key {
                cache.insert(key, metadata.clone(), raw).await;
            }
            metadata
        }
        Err(e) => {
            tracing::warn!("could not obtain {file_name}: {e:#}");
            manifest::fallback_metadata(&file_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::OutputFormat;
    use crate::models::DependencyIssueKind;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in entries {
            zw.start_file(*name, FileOptions::default()).unwrap();
            zw.write_all(bytes).unwrap();
        }
        zw.finish().unwrap().into_inner()
    }

    /// A mod jar whose fabric manifest declares `id`, `version` and deps
    fn mod_jar(id: &str, version: &str, depends: &[(&str, &str)]) -> Vec<u8> {
        let deps: Vec<String> = depends
            .iter()
            .map(|(k, v)| format!(r#""{k}": "{v}""#))
            .collect();
        let manifest = format!(
            r#"{{ "id": "{id}", "version": "{version}", "depends": {{ {} }} }}"#,
            deps.join(", ")
        );
        zip_with(&[("fabric.mod.json", manifest.as_bytes())])
    }

    fn session() -> MergeSession {
        MergeSession::new(Config::default()).unwrap()
    }

    fn standard_pack(session: &mut MergeSession, name: &str, entries: &[(&str, &[u8])]) -> Uuid {
        session
            .load_pack_from_bytes(zip_with(entries), name.to_string())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_duplicate_pack_name_soft_skip() {
        let mut session = session();
        standard_pack(&mut session, "alpha", &[("mods/a.jar", b"a")]);
        let second = session
            .load_pack_from_bytes(zip_with(&[("mods/b.jar", b"b")]), "alpha".to_string())
            .unwrap();

        assert!(second.is_none());
        assert_eq!(session.packs().len(), 1);
    }

    #[test]
    fn test_remove_pack_removes_only_its_files() {
        let mut session = session();
        let a = standard_pack(&mut session, "A", &[("mods/a.jar", b"a")]);
        let b = standard_pack(&mut session, "B", &[("mods/b.jar", b"b"), ("config/b.toml", b"b")]);

        assert_eq!(session.files().len(), 3);
        assert!(session.remove_pack(b));
        assert_eq!(session.packs().len(), 1);
        assert_eq!(session.files().len(), 1);
        assert!(session.files().iter().all(|f| f.pack_id == a));
        assert!(!session.remove_pack(b));
    }

    #[test]
    fn test_reorder_moves_head() {
        let mut session = session();
        standard_pack(&mut session, "A", &[("mods/x.jar", b"from A")]);
        standard_pack(&mut session, "B", &[("mods/x.jar", b"from B")]);

        assert!(session.reorder(1, ReorderDirection::Up));
        assert_eq!(session.head().unwrap().name, "B");

        // quick analysis already re-ran: B's copy of the path now wins
        let winner = session
            .files()
            .iter()
            .find(|f| f.enabled && f.path == "mods/x.jar")
            .unwrap();
        assert_eq!(winner.pack_id, session.head().unwrap().id);

        assert!(!session.reorder(0, ReorderDirection::Up));
        assert!(!session.reorder(1, ReorderDirection::Down));
    }

    #[test]
    fn test_metadata_edit_only_on_standard_packs() {
        let mut session = session();
        let id = standard_pack(&mut session, "A", &[("mods/a.jar", b"a")]);

        session
            .set_pack_metadata(id, Some("1.19.2".to_string()), Some(Loader::Forge))
            .unwrap();
        assert_eq!(session.head().unwrap().minecraft_version, "1.19.2");
        assert_eq!(session.head().unwrap().loader, Loader::Forge);

        let index = r#"{ "formatVersion": 1, "game": "minecraft", "versionId": "1",
                         "name": "idx", "files": [],
                         "dependencies": { "minecraft": "1.19.2", "forge": "1" } }"#;
        let indexed = session
            .load_pack_from_bytes(
                zip_with(&[("modrinth.index.json", index.as_bytes())]),
                "indexed".to_string(),
            )
            .unwrap()
            .unwrap();
        assert!(session.set_pack_metadata(indexed, None, Some(Loader::Fabric)).is_err());
    }

    #[tokio::test]
    async fn test_compatibility_blocks_deep_analysis_and_emit() {
        let mut session = session();
        standard_pack(
            &mut session,
            "head",
            &[("mods/sodium-fabric-1.20.1.jar", b"jar")],
        );
        standard_pack(
            &mut session,
            "other",
            &[("mods/jei-forge-1.19.2.jar", b"jar")],
        );

        let quick = session.quick_analysis();
        assert_eq!(quick.compatibility.len(), 2);
        assert!(!quick.is_compatible());

        assert!(session.deep_analysis().await.is_err());

        let options = EmitOptions {
            format: OutputFormat::FullArchive,
            version_id: "1".to_string(),
            name: "m".to_string(),
        };
        let dir = tempfile::TempDir::new().unwrap();
        let result = session.emit(&options, &dir.path().join("out.zip"), |_| {}).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deep_analysis_excludes_older_versions() {
        let mut session = session();
        // both packs pin the same game version so the gate stays open
        let pin = br#"{ "minecraft": { "version": "1.20.1",
                        "modLoaders": [{ "id": "fabric-0.15.11" }] } }"# as &[u8];
        let newer = mod_jar("libx", "1.2.0", &[]);
        let older = mod_jar("libx", "1.1.0", &[]);
        standard_pack(
            &mut session,
            "A",
            &[("manifest.json", pin), ("mods/libX-1.2.0.jar", &newer)],
        );
        standard_pack(
            &mut session,
            "B",
            &[("manifest.json", pin), ("mods/libX-1.1.0.jar", &older)],
        );

        let report = session.deep_analysis().await.unwrap();
        assert!(report.deep);

        let loser = session
            .files()
            .iter()
            .find(|f| f.file_name == "libX-1.1.0.jar")
            .unwrap();
        assert!(!loser.enabled);
        assert!(loser
            .conflict_reason
            .as_deref()
            .unwrap()
            .contains("Older version (Mod ID: libx)"));
    }

    #[tokio::test]
    async fn test_deep_analysis_reports_outdated_dependency() {
        let mut session = session();
        let a = mod_jar("a", "1.0.0", &[("b", ">=2.0.0")]);
        let b = mod_jar("b", "1.5.0", &[]);
        standard_pack(
            &mut session,
            "pack",
            &[("mods/a-1.0.0.jar", &a), ("mods/b-1.5.0.jar", &b)],
        );

        let report = session.deep_analysis().await.unwrap();

        assert_eq!(report.dependencies.len(), 1);
        let issue = &report.dependencies[0];
        assert_eq!(issue.kind, DependencyIssueKind::Outdated);
        assert_eq!(issue.mod_id, "b");
        assert_eq!(issue.required_by, "a");
        assert_eq!(issue.required_range, ">=2.0.0");
        assert_eq!(issue.present_version.as_deref(), Some("1.5.0"));
    }

    #[tokio::test]
    async fn test_deep_analysis_cached_until_state_change() {
        let mut session = session();
        let jar = mod_jar("solo", "1.0.0", &[]);
        standard_pack(&mut session, "A", &[("mods/solo-1.0.0.jar", &jar)]);

        session.deep_analysis().await.unwrap();
        let stats_before = session.cache().stats().await;

        // second call is served from the cached report
        session.deep_analysis().await.unwrap();
        let stats_after = session.cache().stats().await;
        assert_eq!(stats_before.misses, stats_after.misses);

        // a state change invalidates the report, but metadata already
        // sits on the records and nothing is re-fetched
        standard_pack(&mut session, "B", &[("config/b.toml", b"b")]);
        let report = session.deep_analysis().await.unwrap();
        assert!(report.deep);
        assert_eq!(session.cache().stats().await.misses, stats_after.misses);
    }

    #[tokio::test]
    async fn test_session_emit_full_archive() {
        let mut session = session();
        standard_pack(
            &mut session,
            "A",
            &[("mods/foo.jar", b"from A"), ("config/c.toml", b"c")],
        );
        standard_pack(&mut session, "B", &[("mods/foo.jar", b"from B")]);

        session.quick_analysis();

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("merged.zip");
        let options = EmitOptions {
            format: OutputFormat::FullArchive,
            version_id: "1".to_string(),
            name: "merged".to_string(),
        };
        let report = session.emit(&options, &out, |_| {}).await.unwrap();

        assert_eq!(report.local_files, 2);
        let produced = ArchiveReader::from_bytes(std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(produced.read_bytes("mods/foo.jar").unwrap(), b"from A");
    }
}
