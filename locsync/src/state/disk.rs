use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::Value;

use locsync_core::STATE_DIR_NAME;

use super::{
    LegacySyncState, StateLoad, SyncState, CURRENT_STATE_VERSION, LEGACY_STATE_VERSION,
    STATE_FILE_NAME,
};

/// Persistence of the sync state under `<project>/.locsync/`.
pub struct SyncStateStore {
    project_path: PathBuf,
}

impl SyncStateStore {
    pub fn new(project_path: &Path) -> Self {
        Self {
            project_path: project_path.to_path_buf(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_path.join(STATE_DIR_NAME)
    }

    pub fn file_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE_NAME)
    }

    pub fn exists(&self) -> bool {
        self.file_path().is_file()
    }

    /// Read and decode the persisted state. A missing file is a normal
    /// first-run situation; anything unreadable is reported as
    /// corrupted rather than failing the caller.
    pub fn load(&self) -> Result<StateLoad> {
        let file_path = self.file_path();
        let raw = match fs::read_to_string(&file_path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(StateLoad::default())
            }
            Err(error) => {
                return Err(error)
                    .context(format!("Read sync state at '{}'", file_path.display()))
            }
        };

        Ok(decode_state(&raw))
    }

    /// Loaded current-schema state, or a fresh empty one when the file
    /// is absent, corrupted or still in the legacy shape. Legacy
    /// per-file data is never carried into the per-entry shape.
    pub fn get_or_create(&self) -> Result<SyncState> {
        let load = self.load()?;
        match load.state {
            Some(state) => Ok(state),
            None => {
                if load.needs_migration {
                    log::warn!(
                        "Sync state at '{}' has the legacy shape, starting from a fresh state",
                        self.file_path().display()
                    );
                } else if load.was_corrupted {
                    log::warn!(
                        "Sync state at '{}' is corrupted, starting from a fresh state",
                        self.file_path().display()
                    );
                }
                Ok(SyncState::new())
            }
        }
    }

    /// Write the state as indented json. The write goes through a
    /// temporary file in the state directory followed by a rename, a
    /// concurrent reader never sees a half-written file.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let state_dir = self.state_dir();
        fs::create_dir_all(&state_dir)
            .context(format!("Create state directory '{}'", state_dir.display()))?;

        let raw = serde_json::to_string_pretty(state)?;
        let mut temp_file = tempfile::NamedTempFile::new_in(&state_dir)
            .context("Create temporary sync state file")?;
        temp_file
            .write_all(raw.as_bytes())
            .context("Write temporary sync state file")?;
        temp_file
            .persist(self.file_path())
            .context(format!("Replace sync state at '{}'", self.file_path().display()))?;
        Ok(())
    }

    /// Delete only the state file. Siblings in the state directory
    /// (backups, caches) are preserved.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(self.file_path()) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).context(format!(
                "Remove sync state at '{}'",
                self.file_path().display()
            )),
        }
    }
}

/// Discriminated decode: probe the raw json shape before committing to
/// a schema, exceptions are not used as control flow.
fn decode_state(raw: &str) -> StateLoad {
    if raw.trim().is_empty() {
        return StateLoad {
            was_corrupted: true,
            ..StateLoad::default()
        };
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            return StateLoad {
                was_corrupted: true,
                ..StateLoad::default()
            }
        }
    };
    let object = match value.as_object() {
        Some(object) => object,
        None => {
            return StateLoad {
                was_corrupted: true,
                ..StateLoad::default()
            }
        }
    };

    // v1 marker: an explicit version tag, or the flat Files map
    let version = object.get("Version").and_then(|version| version.as_u64());
    if version == Some(LEGACY_STATE_VERSION as u64) || object.contains_key("Files") {
        // best effort: a legacy file that does not even parse as
        // legacy still reports needs_migration, the caller decides
        let legacy = serde_json::from_value::<LegacySyncState>(value).ok();
        return StateLoad {
            state: None,
            legacy,
            was_corrupted: false,
            needs_migration: true,
        };
    }

    match serde_json::from_value::<SyncState>(value) {
        Ok(state) if state.version == CURRENT_STATE_VERSION => StateLoad {
            state: Some(state),
            ..StateLoad::default()
        },
        _ => StateLoad {
            was_corrupted: true,
            ..StateLoad::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::tmpdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_without_file() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);

        let load = store.load().unwrap();

        assert!(load.state.is_none());
        assert!(!load.was_corrupted);
        assert!(!load.needs_migration);
        assert!(!store.exists());
    }

    #[test]
    fn save_then_load_preserves_everything() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");
        state.set_entry_hash("Strings", "fr", "bbb");
        state.set_entry_hash("menu/Labels", "en", "ccc");
        state.set_config_property_hash("resourceFormat", "ddd");

        store.save(&state).unwrap();
        let load = store.load().unwrap();

        assert_eq!(load.state, Some(state));
        assert!(!load.was_corrupted);
        assert!(!load.needs_migration);
    }

    #[test]
    fn saved_state_is_indented() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");

        store.save(&state).unwrap();
        let raw = std::fs::read_to_string(store.file_path()).unwrap();

        assert!(raw.contains('\n'));
        assert!(raw.contains("\"Entries\""));
        assert!(raw.contains("\"Version\": 2"));
    }

    #[test]
    fn load_corrupted_content() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(store.file_path(), "{ not json !").unwrap();

        let load = store.load().unwrap();

        assert!(load.state.is_none());
        assert!(load.was_corrupted);
        assert!(!load.needs_migration);
    }

    #[test]
    fn load_empty_content() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(store.file_path(), "   ").unwrap();

        let load = store.load().unwrap();

        assert!(load.state.is_none());
        assert!(load.was_corrupted);
    }

    #[test]
    fn load_legacy_shape_reports_migration() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(
            store.file_path(),
            r#"{
  "Version": 1,
  "ConfigHash": "abc",
  "Files": {
    "Strings.en.resx": "aaa",
    "Strings.fr.resx": "bbb"
  }
}"#,
        )
        .unwrap();

        let load = store.load().unwrap();

        assert!(load.state.is_none());
        assert!(!load.was_corrupted);
        assert!(load.needs_migration);
        let legacy = load.legacy.unwrap();
        assert_eq!(legacy.config_hash.as_deref(), Some("abc"));
        assert_eq!(legacy.files.len(), 2);
    }

    #[test]
    fn legacy_detected_by_files_key_without_version() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(
            store.file_path(),
            r#"{"Files": {"Strings.en.resx": "aaa"}}"#,
        )
        .unwrap();

        let load = store.load().unwrap();

        assert!(load.needs_migration);
        assert!(!load.was_corrupted);
    }

    #[test]
    fn get_or_create_on_legacy_gives_fresh_state() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(
            store.file_path(),
            r#"{"Version": 1, "Files": {"Strings.en.resx": "aaa"}}"#,
        )
        .unwrap();

        let state = store.get_or_create().unwrap();

        assert_eq!(state.version, CURRENT_STATE_VERSION);
        assert!(state.entries.is_empty());
        assert!(state.config_properties.is_empty());
    }

    #[test]
    fn get_or_create_on_corrupted_gives_fresh_state() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(store.file_path(), "garbage").unwrap();

        let state = store.get_or_create().unwrap();

        assert_eq!(state.version, CURRENT_STATE_VERSION);
        assert!(state.entries.is_empty());
    }

    #[test]
    fn unknown_future_version_is_corrupted() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        std::fs::create_dir_all(store.state_dir()).unwrap();
        std::fs::write(
            store.file_path(),
            r#"{"Version": 3, "Timestamp": "2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let load = store.load().unwrap();

        assert!(load.state.is_none());
        assert!(load.was_corrupted);
        assert!(!load.needs_migration);
    }

    #[test]
    fn clear_preserves_siblings() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        store.save(&SyncState::new()).unwrap();
        let sibling = store.state_dir().join("backups");
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("keep.txt"), "keep").unwrap();

        store.clear().unwrap();

        assert!(!store.exists());
        assert!(sibling.join("keep.txt").is_file());
    }

    #[test]
    fn clear_without_file_is_noop() {
        let project = tmpdir();
        let store = SyncStateStore::new(&project);
        store.clear().unwrap();
    }
}
