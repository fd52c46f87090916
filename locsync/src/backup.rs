use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use locsync_core::{PROJECT_CONFIG_FILE_NAME, STATE_DIR_NAME};

use crate::local::resource_files_on_disk;

pub const BACKUPS_DIR_NAME: &str = "backups";
pub const BACKUP_METADATA_FILE_NAME: &str = "backup-metadata.json";
const BACKUP_FILE_PREFIX: &str = "pull-backup-";
const BACKUP_FILE_EXTENSION: &str = "zip";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Self-describing metadata embedded in every backup archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupManifest {
    pub backup_name: String,
    pub timestamp: DateTime<Utc>,
    pub project_directory: String,
}

#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// Safety net around destructive pull operations: snapshot the
/// project before overwriting it, restore on demand, prune old
/// snapshots to bound disk growth.
pub struct BackupManager {
    project_path: PathBuf,
}

impl BackupManager {
    pub fn new(project_path: &Path) -> Self {
        Self {
            project_path: project_path.to_path_buf(),
        }
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.project_path.join(STATE_DIR_NAME).join(BACKUPS_DIR_NAME)
    }

    /// Archive the configuration file, the state directory (without
    /// prior backups) and the resource tree into a timestamped zip.
    pub fn create_backup(&self) -> Result<PathBuf> {
        let timestamp = Utc::now();
        let backup_name = format!(
            "{}{}.{}",
            BACKUP_FILE_PREFIX,
            timestamp.format(BACKUP_TIMESTAMP_FORMAT),
            BACKUP_FILE_EXTENSION
        );
        let backups_dir = self.backups_dir();
        fs::create_dir_all(&backups_dir).context(format!(
            "Create backups directory '{}'",
            backups_dir.display()
        ))?;
        let archive_path = backups_dir.join(&backup_name);

        let file = fs::File::create(&archive_path)
            .context(format!("Create backup archive '{}'", archive_path.display()))?;
        let mut writer = ZipWriter::new(file);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let config_path = self.project_path.join(PROJECT_CONFIG_FILE_NAME);
        if config_path.is_file() {
            self.append_file(&mut writer, options, PROJECT_CONFIG_FILE_NAME, &config_path)?;
        }

        for relative_path in self.state_files()? {
            let absolute_path = self.project_path.join(&relative_path);
            self.append_file(&mut writer, options, &relative_path, &absolute_path)?;
        }

        for (relative_path, _) in resource_files_on_disk(&self.project_path)? {
            let absolute_path = self.project_path.join(&relative_path);
            self.append_file(&mut writer, options, &relative_path, &absolute_path)?;
        }

        let manifest = BackupManifest {
            backup_name: backup_name.clone(),
            timestamp,
            project_directory: self.project_path.display().to_string(),
        };
        writer
            .start_file(BACKUP_METADATA_FILE_NAME, options)
            .context("Start backup metadata entry")?;
        writer
            .write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())
            .context("Write backup metadata entry")?;
        writer.finish().context("Finalize backup archive")?;

        log::info!("Created pull backup '{}'", archive_path.display());
        Ok(archive_path)
    }

    /// Known backups, newest first. The timestamp comes from the
    /// embedded manifest; archives written by older versions without
    /// one fall back to the file name.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let backups_dir = self.backups_dir();
        if !backups_dir.is_dir() {
            return Ok(vec![]);
        }

        let mut backups = vec![];
        for entry in fs::read_dir(&backups_dir).context("Read backups directory")? {
            let entry = entry?;
            let path = entry.path();
            let file_name = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !file_name.starts_with(BACKUP_FILE_PREFIX)
                || !file_name.ends_with(&format!(".{}", BACKUP_FILE_EXTENSION))
            {
                continue;
            }

            let timestamp = match self
                .manifest_timestamp(&path)
                .or_else(|| filename_timestamp(&file_name))
            {
                Some(timestamp) => timestamp,
                None => {
                    log::warn!(
                        "Backup archive '{}' has no readable timestamp, skipping",
                        path.display()
                    );
                    continue;
                }
            };
            backups.push(BackupInfo { path, timestamp });
        }

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Extract every entry except the metadata file back to its
    /// original relative location, overwriting current files.
    pub fn restore_backup(&self, archive_path: &Path) -> Result<()> {
        let file = fs::File::open(archive_path)
            .context(format!("Open backup archive '{}'", archive_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .context(format!("Read backup archive '{}'", archive_path.display()))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.name() == BACKUP_METADATA_FILE_NAME {
                continue;
            }
            let relative_path = match entry.enclosed_name() {
                Some(relative_path) => relative_path,
                None => bail!("Backup entry '{}' has an unsafe path", entry.name()),
            };
            let target_path = self.project_path.join(relative_path);
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent)
                    .context(format!("Create directory '{}'", parent.display()))?;
            }
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            fs::write(&target_path, content)
                .context(format!("Restore file '{}'", target_path.display()))?;
        }

        log::info!("Restored backup '{}'", archive_path.display());
        Ok(())
    }

    /// Delete the oldest archives beyond `keep`, returning what was
    /// removed.
    pub fn prune_backups(&self, keep: usize) -> Result<Vec<PathBuf>> {
        let mut backups = self.list_backups()?;
        // oldest first for deletion
        backups.reverse();
        if backups.len() <= keep {
            return Ok(vec![]);
        }

        let excess = backups.len() - keep;
        let mut removed = vec![];
        for backup in backups.into_iter().take(excess) {
            fs::remove_file(&backup.path).context(format!(
                "Remove backup archive '{}'",
                backup.path.display()
            ))?;
            log::info!("Pruned backup '{}'", backup.path.display());
            removed.push(backup.path);
        }
        Ok(removed)
    }

    /// State directory files to include in a backup, prior backups
    /// excluded.
    fn state_files(&self) -> Result<Vec<String>> {
        let state_dir = self.project_path.join(STATE_DIR_NAME);
        if !state_dir.is_dir() {
            return Ok(vec![]);
        }

        let mut files = vec![];
        for entry in walkdir::WalkDir::new(&state_dir)
            .into_iter()
            .filter_entry(|entry| entry.file_name().to_str() != Some(BACKUPS_DIR_NAME))
        {
            let entry = entry.context("Walk state directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative_path = entry.path().strip_prefix(&self.project_path)?;
            files.push(
                crate::util::normalize_separators(relative_path)
                    .map_err(|error| anyhow::anyhow!("{}", error))?,
            );
        }
        files.sort();
        Ok(files)
    }

    fn append_file(
        &self,
        writer: &mut ZipWriter<fs::File>,
        options: SimpleFileOptions,
        entry_name: &str,
        absolute_path: &Path,
    ) -> Result<()> {
        writer
            .start_file(entry_name, options)
            .context(format!("Start backup entry '{}'", entry_name))?;
        let content = fs::read(absolute_path)
            .context(format!("Read file '{}' for backup", absolute_path.display()))?;
        writer
            .write_all(&content)
            .context(format!("Write backup entry '{}'", entry_name))?;
        Ok(())
    }

    fn manifest_timestamp(&self, archive_path: &Path) -> Option<DateTime<Utc>> {
        let file = fs::File::open(archive_path).ok()?;
        let mut archive = ZipArchive::new(file).ok()?;
        let mut entry = archive.by_name(BACKUP_METADATA_FILE_NAME).ok()?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw).ok()?;
        let manifest: BackupManifest = serde_json::from_str(&raw).ok()?;
        Some(manifest.timestamp)
    }
}

fn filename_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let raw = file_name
        .strip_prefix(BACKUP_FILE_PREFIX)?
        .strip_suffix(&format!(".{}", BACKUP_FILE_EXTENSION))?;
    let naive = NaiveDateTime::parse_from_str(raw, BACKUP_TIMESTAMP_FORMAT).ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{build_project, tmpdir};
    use chrono::TimeZone;

    #[test]
    fn create_backup_contains_config_state_and_resources() {
        let project = tmpdir();
        build_project(
            &project,
            &[
                ("locsync.json", r#"{"resourceFormat":"json"}"#),
                ("en.json", r#"{"hello":"Hello"}"#),
                ("nested/fr.json", r#"{"hello":"Bonjour"}"#),
                (".locsync/sync-state.json", r#"{"Version":2}"#),
            ],
        );
        let manager = BackupManager::new(&project);

        let archive_path = manager.create_backup().unwrap();

        let file = fs::File::open(&archive_path).unwrap();
        let mut archive = ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|index| archive.by_index(index).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"locsync.json".to_string()));
        assert!(names.contains(&"en.json".to_string()));
        assert!(names.contains(&"nested/fr.json".to_string()));
        assert!(names.contains(&".locsync/sync-state.json".to_string()));
        assert!(names.contains(&BACKUP_METADATA_FILE_NAME.to_string()));
    }

    #[test]
    fn create_backup_excludes_prior_backups() {
        let project = tmpdir();
        build_project(&project, &[("en.json", "{}")]);
        let manager = BackupManager::new(&project);
        manager.create_backup().unwrap();

        let second = manager.create_backup().unwrap();

        let file = fs::File::open(&second).unwrap();
        let archive = ZipArchive::new(file).unwrap();
        for name in archive.file_names() {
            assert!(
                !name.contains(BACKUPS_DIR_NAME),
                "second backup must not contain '{}'",
                name
            );
        }
    }

    #[test]
    fn backup_name_matches_convention() {
        let project = tmpdir();
        build_project(&project, &[("en.json", "{}")]);
        let manager = BackupManager::new(&project);

        let archive_path = manager.create_backup().unwrap();

        let file_name = archive_path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("pull-backup-"));
        assert!(file_name.ends_with(".zip"));
    }

    #[test]
    fn restore_overwrites_current_files() {
        let project = tmpdir();
        build_project(&project, &[("en.json", r#"{"hello":"Hello"}"#)]);
        let manager = BackupManager::new(&project);
        let archive_path = manager.create_backup().unwrap();

        fs::write(project.join("en.json"), r#"{"hello":"Changed"}"#).unwrap();
        fs::remove_file(project.join("en.json")).unwrap();

        manager.restore_backup(&archive_path).unwrap();

        let restored = fs::read_to_string(project.join("en.json")).unwrap();
        assert_eq!(restored, r#"{"hello":"Hello"}"#);
    }

    #[test]
    fn list_backups_newest_first_and_manifest_fallback() {
        let project = tmpdir();
        let manager = BackupManager::new(&project);
        fs::create_dir_all(manager.backups_dir()).unwrap();

        // manifest-less archive written by an older version
        let old_path = manager.backups_dir().join("pull-backup-20240101-010203.zip");
        let mut writer = ZipWriter::new(fs::File::create(&old_path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("en.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();

        build_project(&project, &[("en.json", "{}")]);
        let fresh_path = manager.create_backup().unwrap();

        let backups = manager.list_backups().unwrap();

        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].path, fresh_path);
        assert_eq!(backups[1].path, old_path);
        assert_eq!(
            backups[1].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 2, 3).unwrap()
        );
    }

    #[test]
    fn list_skips_undatable_archives() {
        let project = tmpdir();
        let manager = BackupManager::new(&project);
        fs::create_dir_all(manager.backups_dir()).unwrap();
        let bad_path = manager.backups_dir().join("pull-backup-notadate.zip");
        let mut writer = ZipWriter::new(fs::File::create(&bad_path).unwrap());
        writer
            .start_file("en.json", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();

        let backups = manager.list_backups().unwrap();

        assert!(backups.is_empty());
    }

    #[test]
    fn prune_keeps_most_recent() {
        let project = tmpdir();
        let manager = BackupManager::new(&project);
        fs::create_dir_all(manager.backups_dir()).unwrap();
        for day in 1..=5 {
            let path = manager
                .backups_dir()
                .join(format!("pull-backup-2024010{}-120000.zip", day));
            let mut writer = ZipWriter::new(fs::File::create(&path).unwrap());
            writer
                .start_file("en.json", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"{}").unwrap();
            writer.finish().unwrap();
        }

        let removed = manager.prune_backups(2).unwrap();

        assert_eq!(removed.len(), 3);
        let remaining = manager.list_backups().unwrap();
        assert_eq!(remaining.len(), 2);
        let names: Vec<String> = remaining
            .iter()
            .map(|backup| backup.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "pull-backup-20240105-120000.zip".to_string(),
                "pull-backup-20240104-120000.zip".to_string()
            ]
        );
    }

    #[test]
    fn prune_below_keep_count_removes_nothing() {
        let project = tmpdir();
        build_project(&project, &[("en.json", "{}")]);
        let manager = BackupManager::new(&project);
        manager.create_backup().unwrap();

        let removed = manager.prune_backups(5).unwrap();

        assert!(removed.is_empty());
        assert_eq!(manager.list_backups().unwrap().len(), 1);
    }
}
