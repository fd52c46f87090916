use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};

use locsync_core::types::{ContentHash, EntryKey, LanguageCode, RelativeFilePath};

pub mod disk;

pub const STATE_FILE_NAME: &str = "sync-state.json";
pub const CURRENT_STATE_VERSION: u32 = 2;
pub const LEGACY_STATE_VERSION: u32 = 1;

/// Last-known-synced hashes, per entry/language and per configuration
/// property. Superseded wholesale on each successful sync, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyncState {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub entries: BTreeMap<EntryKey, BTreeMap<LanguageCode, ContentHash>>,
    #[serde(default)]
    pub config_properties: BTreeMap<String, ContentHash>,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            timestamp: Utc::now(),
            entries: BTreeMap::new(),
            config_properties: BTreeMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }

    pub fn set_entry_hash(&mut self, key: &str, language: &str, hash: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .insert(language.to_string(), hash.to_string());
    }

    pub fn get_entry_hash(&self, key: &str, language: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|languages| languages.get(language))
            .map(|hash| hash.as_str())
    }

    /// Remove one language hash. An entry key never stays present
    /// without at least one language, so an emptied key is pruned.
    pub fn remove_entry_hash(&mut self, key: &str, language: &str) {
        let remove_key = match self.entries.get_mut(key) {
            Some(languages) => {
                languages.remove(language);
                languages.is_empty()
            }
            None => false,
        };
        if remove_key {
            self.entries.remove(key);
        }
    }

    pub fn remove_entry(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn set_config_property_hash(&mut self, name: &str, hash: &str) {
        self.config_properties
            .insert(name.to_string(), hash.to_string());
    }

    pub fn get_config_property_hash(&self, name: &str) -> Option<&str> {
        self.config_properties.get(name).map(|hash| hash.as_str())
    }

    pub fn replace_config_properties(&mut self, properties: BTreeMap<String, ContentHash>) {
        self.config_properties = properties;
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-v2 shape: one flat path→hash map and a single configuration
/// hash. Recognized so callers can report it, never converted
/// automatically, migration is a deliberate separate action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacySyncState {
    pub version: u32,
    #[serde(default)]
    pub config_hash: Option<ContentHash>,
    #[serde(default)]
    pub files: BTreeMap<RelativeFilePath, ContentHash>,
}

/// Outcome of reading the persisted state file.
#[derive(Debug, Default)]
pub struct StateLoad {
    pub state: Option<SyncState>,
    pub legacy: Option<LegacySyncState>,
    pub was_corrupted: bool,
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_hash_round_trip() {
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");
        state.set_entry_hash("Strings", "fr", "bbb");
        assert_eq!(state.get_entry_hash("Strings", "en"), Some("aaa"));
        assert_eq!(state.get_entry_hash("Strings", "fr"), Some("bbb"));
        assert_eq!(state.get_entry_hash("Strings", "de"), None);
        assert_eq!(state.get_entry_hash("Other", "en"), None);
    }

    #[test]
    fn set_entry_hash_upserts() {
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");
        state.set_entry_hash("Strings", "en", "bbb");
        assert_eq!(state.get_entry_hash("Strings", "en"), Some("bbb"));
        assert_eq!(state.entry_count(), 1);
    }

    #[test]
    fn removing_last_language_removes_key() {
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");
        state.set_entry_hash("Strings", "fr", "bbb");

        state.remove_entry_hash("Strings", "fr");
        assert!(state.entries.contains_key("Strings"));

        state.remove_entry_hash("Strings", "en");
        assert!(!state.entries.contains_key("Strings"));
    }

    #[test]
    fn remove_entry_drops_all_languages() {
        let mut state = SyncState::new();
        state.set_entry_hash("Strings", "en", "aaa");
        state.set_entry_hash("Strings", "fr", "bbb");
        state.remove_entry("Strings");
        assert_eq!(state.entry_count(), 0);
    }

    #[test]
    fn config_property_hashes() {
        let mut state = SyncState::new();
        state.set_config_property_hash("resourceFormat", "abc");
        assert_eq!(state.get_config_property_hash("resourceFormat"), Some("abc"));
        assert_eq!(state.get_config_property_hash("defaultLanguage"), None);
    }
}
