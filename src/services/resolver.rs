use crate::models::{
    ConflictKind, ConflictRecord, ConflictResolution, FileCategory, FileRecord, Pack,
};
use crate::services::version;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Outcome of one resolution pass over every loaded file
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub conflicts: Vec<ConflictRecord>,
    pub excluded: usize,
}

#[derive(Debug, Clone)]
struct KeptFile {
    pack_name: String,
    file_name: String,
}

#[derive(Debug, Clone)]
struct KeptMod {
    version: String,
    pack_name: String,
    file_name: String,
}

/// Walk packs in priority order (index 0 first) and decide which files
/// survive. Within a pack, files are visited in loader order. Three
/// registries drive exclusion: exact target path (always), mod id with
/// version comparison (when metadata is known), and filename slug (mod
/// files without metadata). The pass is a pure function of pack order
/// and the current file list; re-running it is idempotent.
pub fn resolve(packs: &[Pack], files: &mut [FileRecord]) -> ResolutionReport {
    let mut report = ResolutionReport::default();
    let mut path_registry: HashMap<String, KeptFile> = HashMap::new();
    let mut mod_registry: HashMap<String, KeptMod> = HashMap::new();
    let mut slug_registry: HashMap<String, KeptFile> = HashMap::new();

    for pack in packs {
        for file in files.iter_mut().filter(|f| f.pack_id == pack.id) {
            file.enabled = true;
            file.is_duplicate = false;
            file.kept_source = None;
            file.conflict_reason = None;

            if let Some(kept) = path_registry.get(&file.path) {
                let kept = kept.clone();
                exclude(file, "Exact path duplicate".to_string(), &kept.pack_name);
                report.excluded += 1;
                report.conflicts.push(ConflictRecord {
                    kind: ConflictKind::Duplicate,
                    file_name: file.file_name.clone(),
                    mod_id: None,
                    this_version: None,
                    other_version: None,
                    other_file: kept.file_name,
                    resolution: ConflictResolution::KeepOther,
                });
                continue;
            }

            let has_metadata = file
                .metadata
                .as_ref()
                .is_some_and(|m| !m.mods.is_empty());

            if has_metadata {
                let entries: Vec<(String, String)> = file
                    .metadata
                    .as_ref()
                    .map(|m| {
                        m.mods
                            .iter()
                            .map(|e| (e.id.clone(), e.version.clone()))
                            .collect()
                    })
                    .unwrap_or_default();

                // A registered strictly-newer version wins over this file
                let loss = entries.iter().find_map(|(id, ver)| {
                    mod_registry.get(id).and_then(|kept| {
                        (version::compare(&kept.version, ver) == Ordering::Greater)
                            .then(|| (id.clone(), ver.clone(), kept.clone()))
                    })
                });

                if let Some((id, ver, kept)) = loss {
                    exclude(
                        file,
                        format!("Older version (Mod ID: {id})"),
                        &kept.pack_name,
                    );
                    report.excluded += 1;
                    report.conflicts.push(ConflictRecord {
                        kind: ConflictKind::Version,
                        file_name: file.file_name.clone(),
                        mod_id: Some(id),
                        this_version: Some(ver),
                        other_version: Some(kept.version),
                        other_file: kept.file_name,
                        resolution: ConflictResolution::KeepOther,
                    });
                    continue;
                }

                for (id, ver) in entries {
                    if let Some(kept) = mod_registry.get(&id) {
                        // This file is newer (or equal) and survives; the
                        // registered slot is not reassigned
                        if version::compare(&kept.version, &ver) == Ordering::Less {
                            report.conflicts.push(ConflictRecord {
                                kind: ConflictKind::Version,
                                file_name: file.file_name.clone(),
                                mod_id: Some(id.clone()),
                                this_version: Some(ver.clone()),
                                other_version: Some(kept.version.clone()),
                                other_file: kept.file_name.clone(),
                                resolution: ConflictResolution::KeepThis,
                            });
                        }
                        continue;
                    }
                    mod_registry.insert(
                        id,
                        KeptMod {
                            version: ver,
                            pack_name: pack.name.clone(),
                            file_name: file.file_name.clone(),
                        },
                    );
                }
            } else if file.category == FileCategory::Mods {
                let slug = mod_slug(&file.file_name);
                if let Some(kept) = slug_registry.get(&slug) {
                    let kept = kept.clone();
                    exclude(
                        file,
                        format!("Possible duplicate of {}", kept.file_name),
                        &kept.pack_name,
                    );
                    report.excluded += 1;
                    report.conflicts.push(ConflictRecord {
                        kind: ConflictKind::Duplicate,
                        file_name: file.file_name.clone(),
                        mod_id: Some(slug),
                        this_version: None,
                        other_version: None,
                        other_file: kept.file_name,
                        resolution: ConflictResolution::KeepOther,
                    });
                    continue;
                }
                slug_registry.insert(
                    slug,
                    KeptFile {
                        pack_name: pack.name.clone(),
                        file_name: file.file_name.clone(),
                    },
                );
            }

            path_registry.insert(
                file.path.clone(),
                KeptFile {
                    pack_name: pack.name.clone(),
                    file_name: file.file_name.clone(),
                },
            );
        }
    }

    report
}

fn exclude(file: &mut FileRecord, reason: String, winner: &str) {
    tracing::debug!("excluding {}: {reason}", file.file_name);
    file.enabled = false;
    file.is_duplicate = true;
    file.conflict_reason = Some(reason);
    file.kept_source = Some(winner.to_string());
}

/// Filename slug: drop a trailing `.jar`, cut at the first `-`/`+`
/// followed by a digit (optionally `v`-prefixed), lowercase, trim
fn mod_slug(file_name: &str) -> String {
    let base = file_name.strip_suffix(".jar").unwrap_or(file_name);
    let re = Regex::new(r"[-+]v?\d").unwrap();
    let cut = re.find(base).map(|m| m.start()).unwrap_or(base.len());
    base[..cut].to_lowercase().trim().to_string()
}
