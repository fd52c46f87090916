use std::{
    fs,
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::Context as AnyhowContext;

use locsync_core::client::ProjectClient;
use locsync_core::config::ProjectConfig;
use locsync_core::language::LanguageLookup;
use locsync_core::types::FileDescriptor;
use locsync_core::PROJECT_CONFIG_FILE_NAME;

use crate::backup::BackupManager;
use crate::conflict::{diff_summary, DiffSummary};
use crate::context::Context;
use crate::local::scan_resource_files;
use crate::state::disk::SyncStateStore;
use crate::validation::SyncValidator;

use super::{
    check_cancel, conflicts_since_last_sync, state_after_sync, write_local_file, OperationError,
};

#[derive(Debug, Clone)]
pub struct PullOptions {
    /// Pull despite detected conflicts, remote content wins
    pub force: bool,
    /// Prune old pull backups down to this many after a successful run
    pub keep_backups: Option<usize>,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            force: false,
            keep_backups: Some(10),
        }
    }
}

#[derive(Debug)]
pub struct PullOutcome {
    pub summary: DiffSummary,
    pub backup_path: PathBuf,
    pub written: usize,
    pub deleted: usize,
}

/// Overwrite local files with the remote project content. A backup is
/// taken before the first destructive write; a failed or cancelled
/// pull restores it, so the project is left either untouched or fully
/// pulled, never half-written.
pub fn pull(
    context: &Context,
    client: &dyn ProjectClient,
    languages: &dyn LanguageLookup,
    stop_signal: &Arc<AtomicBool>,
    options: &PullOptions,
) -> Result<PullOutcome, OperationError> {
    log::info!("[{}] Start pull", context.display_name());

    let config = ProjectConfig::load(&context.project_path)?;
    let remote_project = client.get_project()?;

    let validator = SyncValidator::new(languages);
    let validation = validator.validate_for_pull(config.as_ref(), &remote_project);
    for warning in validation.warnings() {
        log::warn!("[{}] {}", context.display_name(), warning);
    }
    if !validation.can_sync() {
        return Err(OperationError::ValidationFailed(
            validation.errors().to_vec(),
        ));
    }

    let local_files = scan_resource_files(&context.project_path, config.as_ref())?;
    check_cancel(stop_signal)?;

    // remote content is needed for every incoming file, fetch it now
    // so nothing destructive happens on a flaky connection
    let mut remote_files: Vec<FileDescriptor> = vec![];
    for entry in client.get_files()? {
        check_cancel(stop_signal)?;
        let content = client.download_file(&entry.path)?;
        remote_files.push(FileDescriptor {
            path: entry.path,
            hash: entry.hash,
            content,
        });
    }
    let remote_config_raw = client.get_project_config()?;

    let store = SyncStateStore::new(&context.project_path);
    let state_load = store.load()?;
    let default_language = config
        .as_ref()
        .and_then(|config| config.default_language.as_deref());

    let conflicts = conflicts_since_last_sync(
        state_load.state.as_ref(),
        &local_files,
        &remote_files,
        default_language,
    );
    if !conflicts.is_empty() {
        if options.force {
            log::warn!(
                "[{}] Pulling over {} conflict(s) (forced)",
                context.display_name(),
                conflicts.len()
            );
        } else {
            return Err(OperationError::ConflictsDetected(conflicts));
        }
    }

    let summary = diff_summary(&local_files, &remote_files);
    log::info!(
        "[{}] {} change(s): {} to add, {} to update, {} to delete",
        context.display_name(),
        summary.total_changes(),
        summary.files_to_add.len(),
        summary.files_to_update.len(),
        summary.files_to_delete.len(),
    );

    let backup_manager = BackupManager::new(&context.project_path);
    let backup_path = backup_manager.create_backup()?;

    match apply_incoming(
        context,
        &remote_files,
        remote_config_raw.as_deref(),
        &summary,
        stop_signal,
    ) {
        Ok((written, deleted)) => {
            // configuration may have been overwritten, reload before
            // recording its property hashes
            let config = ProjectConfig::load(&context.project_path)?;
            let state = state_after_sync(&remote_files, config.as_ref())?;
            store.save(&state)?;

            if let Some(keep) = options.keep_backups {
                backup_manager.prune_backups(keep)?;
            }

            log::info!("[{}] Pull finished", context.display_name());
            Ok(PullOutcome {
                summary,
                backup_path,
                written,
                deleted,
            })
        }
        Err(error) => {
            log::warn!(
                "[{}] Pull interrupted ({}), restoring backup",
                context.display_name(),
                error
            );
            backup_manager.restore_backup(&backup_path)?;
            Err(error)
        }
    }
}

fn apply_incoming(
    context: &Context,
    remote_files: &[FileDescriptor],
    remote_config_raw: Option<&str>,
    summary: &DiffSummary,
    stop_signal: &Arc<AtomicBool>,
) -> Result<(usize, usize), OperationError> {
    let mut written = 0;
    for descriptor in remote_files {
        if !summary.files_to_add.contains(&descriptor.path)
            && !summary.files_to_update.contains(&descriptor.path)
        {
            continue;
        }
        check_cancel(stop_signal)?;
        log::info!("[{}] Write '{}'", context.display_name(), descriptor.path);
        write_local_file(&context.project_path, &descriptor.path, &descriptor.content)?;
        written += 1;
    }

    let mut deleted = 0;
    for path in &summary.files_to_delete {
        check_cancel(stop_signal)?;
        log::info!("[{}] Delete local '{}'", context.display_name(), path);
        fs::remove_file(context.project_path.join(path))
            .context(format!("Delete local file '{}'", path))?;
        deleted += 1;
    }

    if let Some(remote_raw) = remote_config_raw {
        check_cancel(stop_signal)?;
        let local_raw = ProjectConfig::raw(&context.project_path)?;
        if local_raw.as_deref() != Some(remote_raw) {
            log::info!("[{}] Write '{}'", context.display_name(), PROJECT_CONFIG_FILE_NAME);
            write_local_file(
                &context.project_path,
                PROJECT_CONFIG_FILE_NAME,
                remote_raw.as_bytes(),
            )?;
        }
    }

    Ok((written, deleted))
}
