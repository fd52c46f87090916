use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::Error;

pub fn path_to_string(path: &Path) -> Result<String, Error> {
    match path.to_str() {
        Some(path_) => Ok(path_.to_string()),
        None => Err(Error::PathCastingError(format!(
            "Unable to convert {:?} to string",
            path
        ))),
    }
}

pub fn canonicalize_to_string(path: &PathBuf) -> Result<String, Error> {
    path_to_string(&fs::canonicalize(path)?)
}

/// Relative paths are exchanged with the remote with `/` separators,
/// whatever the local platform uses.
pub fn normalize_separators(path: &Path) -> Result<String, Error> {
    let raw = path_to_string(path)?;
    Ok(raw.replace('\\', "/"))
}
