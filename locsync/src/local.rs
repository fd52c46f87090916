use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use walkdir::{DirEntry, WalkDir};

use locsync_core::config::ProjectConfig;
use locsync_core::types::{FileDescriptor, ResourceFormat};
use locsync_core::PROJECT_CONFIG_FILE_NAME;

use crate::util;

/// Build/output directories never containing resource files.
pub const EXCLUDED_DIR_NAMES: [&str; 6] = ["bin", "obj", "target", "node_modules", "dist", "build"];

/// Json files with a well-known non-resource meaning.
pub const NON_RESOURCE_JSON_FILES: [&str; 4] = [
    "package.json",
    "package-lock.json",
    "tsconfig.json",
    PROJECT_CONFIG_FILE_NAME,
];

fn is_excluded_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    match entry.file_name().to_str() {
        // hidden directories include the state directory and .git
        Some(name) => name.starts_with('.') || EXCLUDED_DIR_NAMES.contains(&name),
        None => true,
    }
}

pub fn is_resource_file(path: &Path) -> Option<ResourceFormat> {
    let format = ResourceFormat::from_path(path)?;
    if format == ResourceFormat::Json {
        let file_name = path.file_name().and_then(|name| name.to_str())?;
        if NON_RESOURCE_JSON_FILES.contains(&file_name) || file_name.ends_with(".schema.json") {
            return None;
        }
    }
    Some(format)
}

/// All resource files under the project, as (relative path, format)
/// pairs. Shared by format auto-detection and the sync scans.
pub fn resource_files_on_disk(project_path: &Path) -> Result<Vec<(String, ResourceFormat)>> {
    let mut files = vec![];
    let walker = WalkDir::new(project_path)
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry));
    for entry in walker {
        let entry = entry.context("Walk project directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let format = match is_resource_file(entry.path()) {
            Some(format) => format,
            None => continue,
        };
        let relative_path = entry.path().strip_prefix(project_path)?;
        let relative_path = util::normalize_separators(relative_path)
            .map_err(|error| anyhow::anyhow!("{}", error))?;
        files.push((relative_path, format));
    }
    files.sort();
    Ok(files)
}

fn is_ignored(relative_path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('/') {
            return relative_path.starts_with(&format!("{}/", prefix));
        }
        if let Some(suffix) = pattern.strip_prefix("*.") {
            return relative_path.ends_with(&format!(".{}", suffix));
        }
        relative_path == pattern
    })
}

/// Fresh local snapshot for a sync run: every resource file with its
/// content hash, honoring the configured ignore patterns.
pub fn scan_resource_files(
    project_path: &Path,
    config: Option<&ProjectConfig>,
) -> Result<Vec<FileDescriptor>> {
    let ignore_patterns: &[String] = config.map(|config| config.ignore.as_slice()).unwrap_or(&[]);
    let mut descriptors = vec![];
    for (relative_path, _) in resource_files_on_disk(project_path)? {
        if is_ignored(&relative_path, ignore_patterns) {
            log::debug!("Ignore local resource file '{}'", relative_path);
            continue;
        }
        let absolute_path: PathBuf = project_path.join(&relative_path);
        let content = fs::read(&absolute_path)
            .context(format!("Read local file '{}'", absolute_path.display()))?;
        descriptors.push(FileDescriptor::new(relative_path, content));
    }
    Ok(descriptors)
}

/// Map a resource file path to its sync state entry: the language
/// segment (when present) keys the hash, the rest is the entry key.
/// `menu/Strings.fr.resx` → (`menu/Strings`, `fr`); a path without a
/// language segment belongs to the project default language.
pub fn split_entry_path(relative_path: &str, default_language: Option<&str>) -> (String, String) {
    let default_language = default_language.unwrap_or("default").to_string();

    let without_extension = match relative_path.rsplit_once('.') {
        Some((stem, _extension)) => stem,
        None => relative_path,
    };
    match without_extension.rsplit_once('.') {
        Some((entry_key, candidate)) if looks_like_language_code(candidate) => {
            (entry_key.to_string(), candidate.to_string())
        }
        _ => (without_extension.to_string(), default_language),
    }
}

fn looks_like_language_code(candidate: &str) -> bool {
    let (base, region) = match candidate.split_once('-') {
        Some((base, region)) => (base, Some(region)),
        None => (candidate, None),
    };
    let base_ok = (2..=3).contains(&base.len())
        && base.chars().all(|character| character.is_ascii_lowercase());
    let region_ok = match region {
        Some(region) => {
            (2..=3).contains(&region.len())
                && region.chars().all(|character| character.is_ascii_alphanumeric())
        }
        None => true,
    };
    base_ok && region_ok
}
