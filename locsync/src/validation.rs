use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;

use locsync_core::client::RemoteProject;
use locsync_core::config::ProjectConfig;
use locsync_core::language::LanguageLookup;
use locsync_core::types::ResourceFormat;

use crate::local::resource_files_on_disk;

/// Accumulated pre-flight findings. Errors block the sync, warnings
/// never do: every problem is reported at once instead of
/// first-failure-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl SyncValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn can_sync(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Scan the project for resource files and report the format when it
/// is unambiguous. Mixed or absent formats give `None`.
pub fn detect_local_format(project_path: &Path) -> Result<Option<ResourceFormat>> {
    let formats: HashSet<ResourceFormat> = resource_files_on_disk(project_path)?
        .into_iter()
        .map(|(_, format)| format)
        .collect();
    if formats.len() == 1 {
        return Ok(formats.into_iter().next());
    }
    Ok(None)
}

pub struct SyncValidator<'a> {
    languages: &'a dyn LanguageLookup,
}

impl<'a> SyncValidator<'a> {
    pub fn new(languages: &'a dyn LanguageLookup) -> Self {
        Self { languages }
    }

    /// Gate for push: local files are authoritative, so both the
    /// configured format and what is actually on disk must line up
    /// with the remote project before anything is uploaded.
    pub fn validate_for_push(
        &self,
        project_path: &Path,
        config: Option<&ProjectConfig>,
        remote_project: &RemoteProject,
    ) -> Result<SyncValidationResult> {
        let mut result = SyncValidationResult::new();

        let configured_format = config.and_then(|config| config.resource_format);
        let detected_format = detect_local_format(project_path)?;
        if let (Some(configured), Some(detected)) = (configured_format, detected_format) {
            if configured != detected {
                result.add_error(format!(
                    "Configuration specifies format '{}' but local files appear to be '{}'",
                    configured, detected
                ));
            }
        }

        let effective_format = configured_format.or(detected_format);
        match effective_format {
            Some(format) => self.check_format_against_remote(&mut result, format, remote_project),
            None => result.add_warning(
                "No resource format configured and none detected, nothing to validate yet"
                    .to_string(),
            ),
        }

        self.check_default_language(&mut result, config, remote_project);

        Ok(result)
    }

    /// Gate for pull: local files are expected to be created or
    /// overwritten, so on-disk detection is skipped and only the
    /// configured metadata is checked against the remote project.
    pub fn validate_for_pull(
        &self,
        config: Option<&ProjectConfig>,
        remote_project: &RemoteProject,
    ) -> SyncValidationResult {
        let mut result = SyncValidationResult::new();

        // nothing configured yet: nothing to conflict with
        let config = match config {
            Some(config) => config,
            None => return result,
        };

        if let Some(format) = config.resource_format {
            self.check_format_against_remote(&mut result, format, remote_project);
        }
        self.check_default_language(&mut result, Some(config), remote_project);

        result
    }

    /// Gate for attaching an existing folder to an existing remote
    /// project. An empty folder always links; otherwise the local
    /// files must match the remote format (json when unspecified).
    pub fn validate_for_link(
        &self,
        project_path: &Path,
        remote_project: &RemoteProject,
    ) -> Result<SyncValidationResult> {
        let mut result = SyncValidationResult::new();

        if resource_files_on_disk(project_path)?.is_empty() {
            return Ok(result);
        }

        let detected_format = match detect_local_format(project_path)? {
            Some(format) => format,
            None => {
                result.add_warning(
                    "Local resource files are of mixed formats, link validation skipped"
                        .to_string(),
                );
                return Ok(result);
            }
        };

        let remote_format = remote_project
            .format
            .as_deref()
            .filter(|format| !format.is_empty())
            .unwrap_or("json");
        if !detected_format.matches(remote_format) {
            result.add_error(format!(
                "Local files are '{}' but remote project '{}' expects '{}'. Create a new remote project with format '{}' instead",
                detected_format, remote_project.name, remote_format, detected_format
            ));
        }

        Ok(result)
    }

    fn check_format_against_remote(
        &self,
        result: &mut SyncValidationResult,
        local_format: ResourceFormat,
        remote_project: &RemoteProject,
    ) {
        match remote_project
            .format
            .as_deref()
            .filter(|format| !format.is_empty())
        {
            Some(remote_format) => {
                if !local_format.matches(remote_format) {
                    result.add_error(format!(
                        "Format mismatch: local is '{}' but remote project is '{}'",
                        local_format, remote_format
                    ));
                }
            }
            // remote without declared format: api is client agnostic
            None => {}
        }
    }

    fn check_default_language(
        &self,
        result: &mut SyncValidationResult,
        config: Option<&ProjectConfig>,
        remote_project: &RemoteProject,
    ) {
        let local_language = config.and_then(|config| config.default_language.as_deref());
        let remote_language = remote_project.default_language.as_deref();

        if let (Some(local), Some(remote)) = (local_language, remote_language) {
            if local != remote {
                result.add_error(format!(
                    "Default language mismatch: local is '{}' but remote project is '{}'",
                    local, remote
                ));
            }
        }

        if let Some(local) = local_language {
            if !self.languages.contains(local) {
                result.add_warning(format!("Unknown default language code '{}'", local));
            }
        }
    }
}
