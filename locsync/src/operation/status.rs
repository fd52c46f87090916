use std::path::Path;

use anyhow::Result;

use locsync_core::config::ProjectConfig;

use crate::local::{scan_resource_files, split_entry_path};
use crate::state::disk::SyncStateStore;

/// Offline report: shape of the persisted state and the drift of the
/// local files against it. Nothing is fetched from the remote.
#[derive(Debug, Default)]
pub struct StatusReport {
    pub state_present: bool,
    pub was_corrupted: bool,
    pub needs_migration: bool,
    /// local files whose content differs from the recorded hash
    pub modified: Vec<String>,
    /// local files with no recorded hash at all
    pub unsynced: Vec<String>,
    /// recorded `entry [language]` pairs with no local file left
    pub missing: Vec<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.unsynced.is_empty() && self.missing.is_empty()
    }
}

pub fn status(project_path: &Path) -> Result<StatusReport> {
    let config = ProjectConfig::load(project_path)?;
    let default_language = config
        .as_ref()
        .and_then(|config| config.default_language.as_deref());
    let local_files = scan_resource_files(project_path, config.as_ref())?;

    let store = SyncStateStore::new(project_path);
    let load = store.load()?;

    let mut report = StatusReport {
        state_present: load.state.is_some() || load.needs_migration || load.was_corrupted,
        was_corrupted: load.was_corrupted,
        needs_migration: load.needs_migration,
        ..StatusReport::default()
    };

    let state = match load.state {
        Some(state) => state,
        None => {
            report.unsynced = local_files
                .into_iter()
                .map(|descriptor| descriptor.path)
                .collect();
            return Ok(report);
        }
    };

    let mut seen: Vec<(String, String)> = vec![];
    for descriptor in &local_files {
        let (key, language) = split_entry_path(&descriptor.path, default_language);
        match state.get_entry_hash(&key, &language) {
            Some(recorded) if recorded == descriptor.hash => {}
            Some(_) => report.modified.push(descriptor.path.clone()),
            None => report.unsynced.push(descriptor.path.clone()),
        }
        seen.push((key, language));
    }

    for (key, languages) in &state.entries {
        for language in languages.keys() {
            if !seen
                .iter()
                .any(|(seen_key, seen_language)| seen_key == key && seen_language == language)
            {
                report.missing.push(format!("{} [{}]", key, language));
            }
        }
    }

    Ok(report)
}
