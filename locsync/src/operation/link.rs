use std::str::FromStr;

use locsync_core::client::ProjectClient;
use locsync_core::config::ProjectConfig;
use locsync_core::language::LanguageLookup;
use locsync_core::types::ResourceFormat;

use crate::context::Context;
use crate::state::disk::SyncStateStore;
use crate::state::SyncState;
use crate::validation::SyncValidator;

use super::OperationError;

/// Attach an existing folder to an existing remote project: record the
/// remote reference in the project configuration and start from a
/// fresh sync state. No file content moves in either direction.
pub fn link(
    context: &Context,
    client: &dyn ProjectClient,
    languages: &dyn LanguageLookup,
) -> Result<(), OperationError> {
    log::info!("[{}] Link project", context.display_name());

    let remote_project = client.get_project()?;
    let validator = SyncValidator::new(languages);
    let validation = validator.validate_for_link(&context.project_path, &remote_project)?;
    for warning in validation.warnings() {
        log::warn!("[{}] {}", context.display_name(), warning);
    }
    if !validation.can_sync() {
        return Err(OperationError::ValidationFailed(
            validation.errors().to_vec(),
        ));
    }

    let mut config = ProjectConfig::load(&context.project_path)?.unwrap_or_default();
    config.remote = Some(context.remote_url.to_string());
    // adopt the remote metadata where the local side is silent
    if config.resource_format.is_none() {
        config.resource_format = remote_project
            .format
            .as_deref()
            .and_then(|format| ResourceFormat::from_str(format).ok());
    }
    if config.default_language.is_none() {
        config.default_language = remote_project.default_language.clone();
    }
    config.save(&context.project_path)?;

    let store = SyncStateStore::new(&context.project_path);
    store.save(&SyncState::new())?;

    log::info!("[{}] Linked to {}", context.display_name(), context.remote_url);
    Ok(())
}
