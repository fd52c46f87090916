use std::sync::{atomic::AtomicBool, Arc};

use locsync_core::client::ProjectClient;
use locsync_core::config::ProjectConfig;
use locsync_core::language::LanguageLookup;
use locsync_core::types::FileDescriptor;

use crate::conflict::{detect_configuration_conflict, diff_summary, DiffSummary};
use crate::context::Context;
use crate::local::scan_resource_files;
use crate::state::disk::SyncStateStore;
use crate::validation::SyncValidator;

use super::{
    check_cancel, conflicts_since_last_sync, remote_file_listing, state_after_sync,
    OperationError,
};

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Push despite detected conflicts, local content wins
    pub force: bool,
    /// Allow deleting remote files that no longer exist locally
    pub allow_delete: bool,
}

#[derive(Debug)]
pub struct PushOutcome {
    pub summary: DiffSummary,
    pub uploaded: usize,
    pub deleted: usize,
    pub warnings: Vec<String>,
}

/// Upload local changes to the remote project. Validation gates the
/// operation, conflicts block it unless forced, and the sync state is
/// rewritten only after every upload succeeded.
pub fn push(
    context: &Context,
    client: &dyn ProjectClient,
    languages: &dyn LanguageLookup,
    stop_signal: &Arc<AtomicBool>,
    options: &PushOptions,
) -> Result<PushOutcome, OperationError> {
    log::info!("[{}] Start push", context.display_name());

    let config = ProjectConfig::load(&context.project_path)?;
    let remote_project = client.get_project()?;

    let validator = SyncValidator::new(languages);
    let validation =
        validator.validate_for_push(&context.project_path, config.as_ref(), &remote_project)?;
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
    let remote_files = remote_file_listing(client)?;

    let store = SyncStateStore::new(&context.project_path);
    let state_load = store.load()?;
    let default_language = config
        .as_ref()
        .and_then(|config| config.default_language.as_deref());

    let mut conflicts = conflicts_since_last_sync(
        state_load.state.as_ref(),
        &local_files,
        &remote_files,
        default_language,
    );
    let local_config_raw = ProjectConfig::raw(&context.project_path)?;
    let remote_config_raw = client.get_project_config()?;
    if let (Some(local_raw), Some(remote_raw)) = (&local_config_raw, &remote_config_raw) {
        if let Some(conflict) = detect_configuration_conflict(local_raw, remote_raw) {
            conflicts.push(conflict);
        }
    }
    if !conflicts.is_empty() {
        if options.force {
            log::warn!(
                "[{}] Pushing over {} conflict(s) (forced)",
                context.display_name(),
                conflicts.len()
            );
        } else {
            return Err(OperationError::ConflictsDetected(conflicts));
        }
    }

    // the summary is oriented remote→local, push applies it in reverse:
    // local-only paths and updates are uploads, remote-only paths are
    // remote deletions
    let summary = diff_summary(&local_files, &remote_files);
    log::info!(
        "[{}] {} change(s): {} to upload, {} to delete remotely",
        context.display_name(),
        summary.total_changes(),
        summary.files_to_delete.len() + summary.files_to_update.len(),
        summary.files_to_add.len(),
    );

    let mut uploaded = 0;
    let uploads: Vec<&FileDescriptor> = local_files
        .iter()
        .filter(|descriptor| {
            summary.files_to_delete.contains(&descriptor.path)
                || summary.files_to_update.contains(&descriptor.path)
        })
        .collect();
    for descriptor in uploads {
        check_cancel(stop_signal)?;
        log::info!("[{}] Upload '{}'", context.display_name(), descriptor.path);
        client.upload_file(&descriptor.path, &descriptor.content)?;
        uploaded += 1;
    }

    let mut deleted = 0;
    for path in &summary.files_to_add {
        check_cancel(stop_signal)?;
        if options.allow_delete {
            log::info!("[{}] Delete remote '{}'", context.display_name(), path);
            client.delete_file(path)?;
            deleted += 1;
        } else {
            log::info!(
                "[{}] Keep remote-only '{}' (deletes not allowed)",
                context.display_name(),
                path
            );
        }
    }

    // the remote configuration follows the local one when it is absent
    // remotely or the push was forced over a configuration conflict
    if let Some(local_raw) = &local_config_raw {
        let needs_update = match &remote_config_raw {
            Some(remote_raw) => remote_raw != local_raw && options.force,
            None => true,
        };
        if needs_update {
            check_cancel(stop_signal)?;
            log::info!("[{}] Update remote configuration", context.display_name());
            client.update_project_config(local_raw)?;
        }
    }

    let state = state_after_sync(&local_files, config.as_ref())?;
    store.save(&state)?;
    log::info!("[{}] Push finished", context.display_name());

    Ok(PushOutcome {
        summary,
        uploaded,
        deleted,
        warnings: validation.warnings().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CURRENT_STATE_VERSION;
    use crate::tests::{build_project, remote_project, tmpdir, MockProjectClientCase};
    use locsync_core::client::MockProjectClient;
    use locsync_core::language::TableLanguageLookup;
    use locsync_core::remote::RemoteUrl;
    use std::sync::atomic::Ordering;

    fn context(project_path: &std::path::Path) -> Context {
        Context::new(
            project_path.to_path_buf(),
            RemoteUrl::parse("https://loc.example.com/acme/webshop").unwrap(),
            "alice".to_string(),
            "token".to_string(),
        )
        .unwrap()
    }

    fn stop_signal() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn push_uploads_new_and_changed_files() {
        let project = tmpdir();
        build_project(
            &project,
            &[
                (
                    "locsync.json",
                    r#"{"resourceFormat":"json","defaultLanguage":"en"}"#,
                ),
                ("en.json", r#"{"hello":"Hello"}"#),
                ("fr.json", r#"{"hello":"Bonjour"}"#),
            ],
        );
        let local_config_raw =
            std::fs::read_to_string(project.join("locsync.json")).unwrap();
        let mut mock = MockProjectClient::new();
        MockProjectClientCase::apply_multiples(
            &mut mock,
            vec![
                MockProjectClientCase::GetProjectOk(remote_project(Some("json"), Some("en"))),
                // fr.json exists remotely with old content, en.json is new
                MockProjectClientCase::GetFilesOk(vec![(
                    "fr.json".to_string(),
                    r#"{"hello":"Salut"}"#.to_string(),
                )]),
                MockProjectClientCase::GetConfigOk(Some(local_config_raw)),
                MockProjectClientCase::UploadOk("en.json".to_string()),
                MockProjectClientCase::UploadOk("fr.json".to_string()),
            ],
        );
        let languages = TableLanguageLookup::builtin();
        let context = context(&project);

        // no prior state: fr.json differs on both sides, forced push
        let outcome = push(
            &context,
            &mock,
            &languages,
            &stop_signal(),
            &PushOptions {
                force: true,
                allow_delete: false,
            },
        )
        .unwrap();

        assert_eq!(outcome.uploaded, 2);
        assert_eq!(outcome.deleted, 0);

        let store = SyncStateStore::new(&project);
        let state = store.load().unwrap().state.unwrap();
        assert_eq!(state.version, CURRENT_STATE_VERSION);
        assert!(state.get_entry_hash("en", "en").is_some());
        assert!(state.get_entry_hash("fr", "en").is_some());
        assert!(state.get_config_property_hash("resourceFormat").is_some());
    }

    #[test]
    fn push_blocked_by_validation() {
        let project = tmpdir();
        build_project(
            &project,
            &[
                ("locsync.json", r#"{"resourceFormat":"json"}"#),
                ("en.json", "{}"),
            ],
        );
        let mut mock = MockProjectClient::new();
        MockProjectClientCase::GetProjectOk(remote_project(Some("resx"), None)).apply(&mut mock);
        let languages = TableLanguageLookup::builtin();
        let context = context(&project);

        let error = push(
            &context,
            &mock,
            &languages,
            &stop_signal(),
            &PushOptions::default(),
        )
        .unwrap_err();

        match error {
            OperationError::ValidationFailed(errors) => {
                assert!(errors[0].contains("Format mismatch"))
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn push_blocked_by_conflicts_without_force() {
        let project = tmpdir();
        build_project(
            &project,
            &[
                ("locsync.json", r#"{"resourceFormat":"json","defaultLanguage":"en"}"#),
                ("en.json", r#"{"hello":"Local"}"#),
            ],
        );
        let local_config_raw =
            std::fs::read_to_string(project.join("locsync.json")).unwrap();
        let mut mock = MockProjectClient::new();
        MockProjectClientCase::apply_multiples(
            &mut mock,
            vec![
                MockProjectClientCase::GetProjectOk(remote_project(Some("json"), Some("en"))),
                MockProjectClientCase::GetFilesOk(vec![(
                    "en.json".to_string(),
                    r#"{"hello":"Remote"}"#.to_string(),
                )]),
                MockProjectClientCase::GetConfigOk(Some(local_config_raw)),
            ],
        );
        let languages = TableLanguageLookup::builtin();
        let context = context(&project);

        let error = push(
            &context,
            &mock,
            &languages,
            &stop_signal(),
            &PushOptions::default(),
        )
        .unwrap_err();

        match error {
            OperationError::ConflictsDetected(conflicts) => {
                assert_eq!(conflicts.len(), 1);
                assert_eq!(conflicts[0].path, "en.json");
            }
            other => panic!("Unexpected error: {}", other),
        }
    }

    #[test]
    fn push_cancelled_before_uploads() {
        let project = tmpdir();
        build_project(
            &project,
            &[
                ("locsync.json", r#"{"resourceFormat":"json"}"#),
                ("en.json", "{}"),
            ],
        );
        let mut mock = MockProjectClient::new();
        MockProjectClientCase::GetProjectOk(remote_project(Some("json"), None)).apply(&mut mock);
        let languages = TableLanguageLookup::builtin();
        let context = context(&project);
        let stop_signal = stop_signal();
        stop_signal.store(true, Ordering::Relaxed);

        let error = push(
            &context,
            &mock,
            &languages,
            &stop_signal,
            &PushOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(error, OperationError::Cancelled));
        // no state written for a cancelled push
        assert!(!SyncStateStore::new(&project).exists());
    }
}
