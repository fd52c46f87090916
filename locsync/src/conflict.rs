use std::collections::HashMap;
use std::fmt::Display;

use itertools::Itertools;

use locsync_core::types::{FileDescriptor, RelativeFilePath};
use locsync_core::PROJECT_CONFIG_FILE_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// Same path changed on both sides since the last recorded sync
    BothModified,
    /// The serialized project configuration differs between sides
    ConfigurationConflict,
}

impl Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::BothModified => f.write_str("both modified"),
            ConflictType::ConfigurationConflict => f.write_str("configuration conflict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    pub path: RelativeFilePath,
    pub type_: ConflictType,
    pub detail: Option<String>,
}

impl Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}): {}", self.path, self.type_, detail),
            None => write!(f, "{} ({})", self.path, self.type_),
        }
    }
}

/// Paths that would be created, overwritten or removed by a sync.
/// The three sets are disjoint by construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiffSummary {
    pub files_to_add: Vec<RelativeFilePath>,
    pub files_to_update: Vec<RelativeFilePath>,
    pub files_to_delete: Vec<RelativeFilePath>,
}

impl DiffSummary {
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    pub fn total_changes(&self) -> usize {
        self.files_to_add.len() + self.files_to_update.len() + self.files_to_delete.len()
    }
}

/// A path present on both sides with different hashes changed on both
/// sides since the last sync. One-sided paths are unambiguous
/// adds/deletes and are not conflicts.
pub fn detect_resource_conflicts(
    local: &[FileDescriptor],
    remote: &[FileDescriptor],
) -> Vec<ConflictRecord> {
    let remote_by_path: HashMap<&str, &FileDescriptor> = remote
        .iter()
        .map(|descriptor| (descriptor.path.as_str(), descriptor))
        .collect();

    local
        .iter()
        .filter_map(|local_descriptor| {
            let remote_descriptor = remote_by_path.get(local_descriptor.path.as_str())?;
            if remote_descriptor.hash == local_descriptor.hash {
                return None;
            }
            Some(ConflictRecord {
                path: local_descriptor.path.clone(),
                type_: ConflictType::BothModified,
                detail: Some(format!(
                    "local and remote content differ (local {}, remote {})",
                    local_descriptor.hash, remote_descriptor.hash
                )),
            })
        })
        .sorted_by(|a, b| a.path.cmp(&b.path))
        .collect()
}

/// Raw content comparison, not a structural one: any byte difference
/// in the serialized configuration counts as a conflict, including
/// key reordering.
pub fn detect_configuration_conflict(
    local_raw: &str,
    remote_raw: &str,
) -> Option<ConflictRecord> {
    if local_raw == remote_raw {
        return None;
    }
    Some(ConflictRecord {
        path: PROJECT_CONFIG_FILE_NAME.to_string(),
        type_: ConflictType::ConfigurationConflict,
        detail: Some("local and remote project configuration differ".to_string()),
    })
}

/// Set difference on paths: remote-only is an add, local-only a
/// delete, a common path with differing hash an update. Hashes make
/// the comparison cheap, content never has to be diffed to know that
/// something changed.
pub fn diff_summary(local: &[FileDescriptor], remote: &[FileDescriptor]) -> DiffSummary {
    let local_by_path: HashMap<&str, &FileDescriptor> = local
        .iter()
        .map(|descriptor| (descriptor.path.as_str(), descriptor))
        .collect();
    let remote_by_path: HashMap<&str, &FileDescriptor> = remote
        .iter()
        .map(|descriptor| (descriptor.path.as_str(), descriptor))
        .collect();

    let files_to_add = remote
        .iter()
        .filter(|descriptor| !local_by_path.contains_key(descriptor.path.as_str()))
        .map(|descriptor| descriptor.path.clone())
        .sorted()
        .collect();
    let files_to_delete = local
        .iter()
        .filter(|descriptor| !remote_by_path.contains_key(descriptor.path.as_str()))
        .map(|descriptor| descriptor.path.clone())
        .sorted()
        .collect();
    let files_to_update = local
        .iter()
        .filter(|descriptor| {
            remote_by_path
                .get(descriptor.path.as_str())
                .map(|remote_descriptor| remote_descriptor.hash != descriptor.hash)
                .unwrap_or(false)
        })
        .map(|descriptor| descriptor.path.clone())
        .sorted()
        .collect();

    DiffSummary {
        files_to_add,
        files_to_update,
        files_to_delete,
    }
}
