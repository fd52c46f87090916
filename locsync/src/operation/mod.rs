use std::{
    fs,
    io::Write,
    path::Path,
    sync::{atomic::AtomicBool, atomic::Ordering, Arc},
};

use anyhow::Context as AnyhowContext;
use thiserror::Error;

use locsync_core::client::{ProjectClient, ProjectClientError};
use locsync_core::config::ProjectConfig;
use locsync_core::types::FileDescriptor;

use crate::conflict::{detect_resource_conflicts, ConflictRecord};
use crate::local::split_entry_path;
use crate::state::SyncState;

pub mod link;
pub mod pull;
pub mod push;
pub mod status;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
    #[error("{} conflict(s) detected", .0.len())]
    ConflictsDetected(Vec<ConflictRecord>),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Remote api error: {0}")]
    Client(#[from] ProjectClientError),
    #[error("Unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

/// Cancellation is observed between file operations, never in the
/// middle of one.
pub(crate) fn check_cancel(stop_signal: &Arc<AtomicBool>) -> Result<(), OperationError> {
    if stop_signal.load(Ordering::Relaxed) {
        return Err(OperationError::Cancelled);
    }
    Ok(())
}

/// Remote file listing as hash-only descriptors: content is fetched
/// separately and only when a pull actually needs it.
pub(crate) fn remote_file_listing(
    client: &dyn ProjectClient,
) -> Result<Vec<FileDescriptor>, OperationError> {
    Ok(client
        .get_files()?
        .into_iter()
        .map(|entry| FileDescriptor {
            path: entry.path,
            hash: entry.hash,
            content: vec![],
        })
        .collect())
}

fn changed_since_state(
    state: &SyncState,
    descriptor: &FileDescriptor,
    default_language: Option<&str>,
) -> bool {
    let (key, language) = split_entry_path(&descriptor.path, default_language);
    state.get_entry_hash(&key, &language) != Some(descriptor.hash.as_str())
}

/// Conflicts for a sync run. With a recorded state only paths that
/// drifted on both sides since the last sync are conflicting; without
/// one every common path with differing content is flagged.
pub(crate) fn conflicts_since_last_sync(
    state: Option<&SyncState>,
    local_files: &[FileDescriptor],
    remote_files: &[FileDescriptor],
    default_language: Option<&str>,
) -> Vec<ConflictRecord> {
    match state {
        Some(state) => {
            let drifted_local: Vec<FileDescriptor> = local_files
                .iter()
                .filter(|descriptor| changed_since_state(state, descriptor, default_language))
                .cloned()
                .collect();
            let drifted_remote: Vec<FileDescriptor> = remote_files
                .iter()
                .filter(|descriptor| changed_since_state(state, descriptor, default_language))
                .cloned()
                .collect();
            detect_resource_conflicts(&drifted_local, &drifted_remote)
        }
        None => detect_resource_conflicts(local_files, remote_files),
    }
}

/// State written after a successful sync: entry hashes from the synced
/// files, property hashes from the configuration. The previous state
/// is superseded wholesale.
pub(crate) fn state_after_sync(
    synced_files: &[FileDescriptor],
    config: Option<&ProjectConfig>,
) -> Result<SyncState, OperationError> {
    let default_language = config.and_then(|config| config.default_language.as_deref());
    let mut state = SyncState::new();
    for descriptor in synced_files {
        let (key, language) = split_entry_path(&descriptor.path, default_language);
        state.set_entry_hash(&key, &language, &descriptor.hash);
    }
    if let Some(config) = config {
        state.replace_config_properties(config.property_hashes()?);
    }
    Ok(state)
}

/// Per-file atomic write: temp file in the target directory, then
/// rename over the destination.
pub(crate) fn write_local_file(
    project_path: &Path,
    relative_path: &str,
    content: &[u8],
) -> Result<(), OperationError> {
    let target_path = project_path.join(relative_path);
    let parent = target_path
        .parent()
        .map(|parent| parent.to_path_buf())
        .unwrap_or_else(|| project_path.to_path_buf());
    fs::create_dir_all(&parent)
        .context(format!("Create directory '{}'", parent.display()))?;
    let mut temp_file = tempfile::NamedTempFile::new_in(&parent)
        .context("Create temporary file for incoming content")?;
    temp_file
        .write_all(content)
        .context(format!("Write incoming content for '{}'", relative_path))?;
    temp_file
        .persist(&target_path)
        .context(format!("Replace file '{}'", target_path.display()))?;
    Ok(())
}
