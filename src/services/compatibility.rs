use crate::models::{CompatibilityIssue, CompatibilityIssueKind, IssueSeverity, Pack};

/// Compare every pack against the head pack's pinned identity.
/// Advisory only, but a non-empty result blocks deep analysis and emit.
pub fn validate(packs: &[Pack]) -> Vec<CompatibilityIssue> {
    let Some((head, rest)) = packs.split_first() else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for pack in rest {
        if pack.minecraft_version != head.minecraft_version {
            issues.push(CompatibilityIssue {
                kind: CompatibilityIssueKind::VersionMismatch,
                severity: IssueSeverity::Danger,
                message: format!(
                    "{} targets minecraft {} but {} targets {}",
                    pack.name, pack.minecraft_version, head.name, head.minecraft_version
                ),
                head_pack: head.name.clone(),
                other_pack: pack.name.clone(),
            });
        }
        if pack.loader != head.loader {
            issues.push(CompatibilityIssue {
                kind: CompatibilityIssueKind::LoaderMismatch,
                severity: IssueSeverity::Danger,
                message: format!(
                    "{} uses the {} loader but {} uses {}",
                    pack.name, pack.loader, head.name, head.loader
                ),
                head_pack: head.name.clone(),
                other_pack: pack.name.clone(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Loader, PackKind};
    use crate::storage::archive::ArchiveReader;
    use std::io::Cursor;
    use std::sync::Arc;
    use zip::ZipWriter;

    fn pack(name: &str, version: &str, loader: Loader) -> Pack {
        let bytes = ZipWriter::new(Cursor::new(Vec::new()))
            .finish()
            .unwrap()
            .into_inner();
        Pack {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            minecraft_version: version.to_string(),
            loader,
            kind: PackKind::Standard,
            archive: Arc::new(ArchiveReader::from_bytes(bytes).unwrap()),
            index: None,
        }
    }

    #[test]
    fn test_matching_packs_pass() {
        let packs = vec![
            pack("A", "1.20.1", Loader::Fabric),
            pack("B", "1.20.1", Loader::Fabric),
        ];
        assert!(validate(&packs).is_empty());
    }

    #[test]
    fn test_one_issue_per_mismatched_field() {
        let packs = vec![
            pack("A", "1.20.1", Loader::Fabric),
            pack("B", "1.19.2", Loader::Forge),
        ];
        let issues = validate(&packs);

        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, CompatibilityIssueKind::VersionMismatch);
        assert_eq!(issues[1].kind, CompatibilityIssueKind::LoaderMismatch);
        assert_eq!(issues[0].head_pack, "A");
        assert_eq!(issues[0].other_pack, "B");
    }

    #[test]
    fn test_head_pack_is_the_reference() {
        let packs = vec![
            pack("A", "1.19.2", Loader::Forge),
            pack("B", "1.19.2", Loader::Forge),
            pack("C", "1.20.1", Loader::Forge),
        ];
        let issues = validate(&packs);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].other_pack, "C");
    }

    #[test]
    fn test_single_or_empty_pack_list() {
        assert!(validate(&[]).is_empty());
        assert!(validate(&[pack("A", "1.20.1", Loader::Fabric)]).is_empty());
    }
}
