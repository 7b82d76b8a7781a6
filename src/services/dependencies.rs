use crate::models::{DependencyIssue, DependencyIssueKind, FileRecord};
use crate::services::version;
use std::collections::HashMap;

/// Dependency ids that name the platform or a loader runtime rather
/// than a mod the pack could carry
const PLATFORM_IDS: &[&str] = &[
    "minecraft",
    "java",
    "fabricloader",
    "fabric",
    "quiltloader",
    "forge",
    "neoforge",
    "liteloader",
    "mixinextras",
    "mixinextra",
    "mixins",
    "cloth-config",
    "cloth-config2",
];

struct Presence {
    version: String,
}

/// Report required dependencies that the surviving mod set is missing
/// or carries in an unsatisfying version. Only primary entries are
/// validated; bundled jars count toward presence but are not
/// themselves checked.
pub fn validate(files: &[FileRecord]) -> Vec<DependencyIssue> {
    let surviving: Vec<&FileRecord> = files.iter().filter(|f| f.is_surviving()).collect();

    let mut presence: HashMap<String, Presence> = HashMap::new();

    // Real entries first: a provided alias never shadows a real mod
    for file in &surviving {
        let Some(metadata) = &file.metadata else {
            continue;
        };
        for entry in metadata.mods.iter().chain(metadata.bundled.iter()) {
            presence.entry(entry.id.clone()).or_insert(Presence {
                version: entry.version.clone(),
            });
        }
    }
    for file in &surviving {
        let Some(metadata) = &file.metadata else {
            continue;
        };
        for entry in metadata.mods.iter().chain(metadata.bundled.iter()) {
            for alias in &entry.provides {
                presence.entry(alias.clone()).or_insert(Presence {
                    version: entry.version.clone(),
                });
            }
        }
    }

    let mut issues = Vec::new();
    for file in &surviving {
        let Some(primary) = file.metadata.as_ref().and_then(|m| m.primary()) else {
            continue;
        };
        for (dep_id, range) in &primary.depends {
            if PLATFORM_IDS.contains(&dep_id.to_lowercase().as_str()) {
                continue;
            }
            match presence.get(dep_id) {
                None => issues.push(DependencyIssue {
                    kind: DependencyIssueKind::Missing,
                    mod_id: dep_id.clone(),
                    required_by: primary.id.clone(),
                    required_range: range.clone(),
                    present_version: None,
                }),
                Some(present) if !version::satisfies(&present.version, range) => {
                    issues.push(DependencyIssue {
                        kind: DependencyIssueKind::Outdated,
                        mod_id: dep_id.clone(),
                        required_by: primary.id.clone(),
                        required_range: range.clone(),
                        present_version: Some(present.version.clone()),
                    })
                }
                Some(_) => {}
            }
        }
    }
    issues
}
