pub mod file;
pub mod index;
pub mod issues;
pub mod metadata;
pub mod pack;

pub use file::{FileCategory, FileOrigin, FileRecord};
pub use index::{IndexEnv, IndexFile, ModrinthIndex};
pub use issues::{
    CompatibilityIssue, CompatibilityIssueKind, ConflictKind, ConflictRecord, ConflictResolution,
    DependencyIssue, DependencyIssueKind, IssueSeverity,
};
pub use metadata::{ModEntry, ModMetadata};
pub use pack::{Loader, Pack, PackKind};
