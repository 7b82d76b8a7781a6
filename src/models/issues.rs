use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityIssueKind {
    VersionMismatch,
    LoaderMismatch,
}

/// A pack deviating from the head pack on a pinned field.
/// Advisory, but blocks deep analysis and export until resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityIssue {
    pub kind: CompatibilityIssueKind,
    pub severity: IssueSeverity,
    pub message: String,
    pub head_pack: String,
    pub other_pack: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyIssueKind {
    Missing,
    Outdated,
}

/// A required dependency absent from, or too old in, the resolved mod set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyIssue {
    pub kind: DependencyIssueKind,
    pub mod_id: String,
    pub required_by: String,
    pub required_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub present_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Version,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepThis,
    KeepOther,
}

/// One detected conflict between a file and an already-kept file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub this_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_version: Option<String>,
    pub other_file: String,
    pub resolution: ConflictResolution,
}
