use std::{fmt::Display, path::Path, str::FromStr};

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

pub type RelativeFilePath = String;
pub type AbsoluteFilePath = String;
pub type EntryKey = String;
pub type LanguageCode = String;
pub type ContentHash = String;

#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Debug, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceFormat {
    Resx,
    Json,
}

impl Display for ResourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceFormat::Resx => f.write_str("resx"),
            ResourceFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Error, Debug)]
pub struct ParseResourceFormatError(String);

impl Display for ParseResourceFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("Unknown resource format '{}'", self.0))
    }
}

impl FromStr for ResourceFormat {
    type Err = ParseResourceFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resx" => Ok(Self::Resx),
            "json" => Ok(Self::Json),
            _ => Err(ParseResourceFormatError(s.to_string())),
        }
    }
}

impl ResourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("resx") => Some(Self::Resx),
            Some(extension) if extension.eq_ignore_ascii_case("json") => Some(Self::Json),
            _ => None,
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        self.to_string().eq_ignore_ascii_case(raw)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ResourceFormat::Resx => "resx",
            ResourceFormat::Json => "json",
        }
    }
}

/// A local or remote resource file snapshot exchanged between the sync
/// components. Constructed fresh for each sync run, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: RelativeFilePath,
    pub hash: ContentHash,
    pub content: Vec<u8>,
}

impl FileDescriptor {
    pub fn new(path: RelativeFilePath, content: Vec<u8>) -> Self {
        let hash = crate::utils::md5_bytes(&content);
        Self {
            path,
            hash,
            content,
        }
    }
}
