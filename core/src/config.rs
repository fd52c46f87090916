use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use ini::Ini;
use serde_derive::{Deserialize, Serialize};

use crate::{security::get_token, types::ResourceFormat, utils::strbool, PROJECT_CONFIG_FILE_NAME};

/// Per-project configuration, stored as `locsync.json` at the project
/// root. This file is also what the configuration-conflict check
/// compares byte-for-byte against the remote copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_format: Option<ResourceFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

impl ProjectConfig {
    pub fn file_path(project_path: &Path) -> PathBuf {
        project_path.join(PROJECT_CONFIG_FILE_NAME)
    }

    /// Read the project configuration. `None` when the file is absent.
    pub fn load(project_path: &Path) -> Result<Option<Self>> {
        match Self::raw(project_path)? {
            Some(raw) => {
                let config = serde_json::from_str(&raw).context(format!(
                    "Parse project configuration at '{}'",
                    Self::file_path(project_path).display()
                ))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }

    /// Raw serialized configuration, as needed by the byte-level
    /// configuration-conflict check.
    pub fn raw(project_path: &Path) -> Result<Option<String>> {
        let file_path = Self::file_path(project_path);
        match fs::read_to_string(&file_path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error).context(format!(
                "Read project configuration at '{}'",
                file_path.display()
            )),
        }
    }

    pub fn save(&self, project_path: &Path) -> Result<()> {
        let file_path = Self::file_path(project_path);
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&file_path, raw).context(format!(
            "Write project configuration at '{}'",
            file_path.display()
        ))?;
        Ok(())
    }

    /// Hash of each set top-level property, keyed by its serialized
    /// name. Stored in the sync state to detect configuration drift
    /// property by property.
    pub fn property_hashes(&self) -> Result<BTreeMap<String, String>> {
        let value = serde_json::to_value(self)?;
        let mut hashes = BTreeMap::new();
        if let Some(object) = value.as_object() {
            for (name, property) in object {
                let serialized = serde_json::to_string(property)?;
                hashes.insert(name.clone(), crate::utils::md5_bytes(serialized.as_bytes()));
            }
        }
        Ok(hashes)
    }
}

/// User-level configuration (`~/.locsync.conf`), holding remote
/// addresses and usernames. Api tokens come from the OS keyring,
/// with a raw-token fallback in the file when explicitly allowed.
#[derive(Debug, Clone)]
pub struct UserConfig {
    pub remotes: Vec<RemoteCredentials>,
    pub allow_raw_tokens: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    pub host: String,
    pub username: String,
    pub token: String,
}

impl UserConfig {
    pub fn from_env(allow_raw_tokens: bool) -> Result<Self> {
        let user_home_folder_path = dirs::home_dir().context("Unable to determine home folder")?;
        let config_file_path = if cfg!(target_os = "windows") {
            user_home_folder_path
                .join("AppData")
                .join("Local")
                .join("locsync.conf")
        } else {
            user_home_folder_path.join(".locsync.conf")
        };

        let config_ini = Ini::load_from_file(&config_file_path).context(format!(
            "Error when loading config file at '{}'",
            config_file_path.display()
        ))?;
        Self::from_ini(config_ini, allow_raw_tokens)
    }

    pub fn from_ini(config_ini: Ini, allow_raw_tokens: bool) -> Result<Self> {
        let os_username = whoami::username();
        let server = config_ini
            .section(Some("server"))
            .context("Missing \"server\" section in config")?;

        let allow_raw_tokens =
            allow_raw_tokens || strbool(server.get("allow_raw_tokens").unwrap_or("0"));
        let remote_hosts: Vec<String> = server
            .get("remotes")
            .unwrap_or("")
            .split(',')
            .filter(|host| !host.trim().is_empty())
            .map(|host| host.trim().to_string())
            .collect();

        let mut remotes = vec![];
        for host in remote_hosts {
            let section_name = format!("remote.{}", host);
            let remote_config = config_ini
                .section(Some(section_name.clone()))
                .context(format!("Missing '{}' section in config", section_name))?;
            let username = remote_config
                .get("username")
                .context(format!(
                    "Unable to read username config from '{}' section",
                    &section_name
                ))?
                .to_string();

            // try to get api token from keyring
            let token = match get_token(&host, &os_username) {
                Ok(token_) => token_,
                Err(error) => {
                    if !allow_raw_tokens {
                        log::error!(
                            "Unable to read api token from keyring for remote '{}' and user '{os_username}', this remote will be ignored : '{}'",
                            &host,
                            error,
                        );
                        continue;
                    }

                    match config_ini.get_from(Some(&section_name), "token") {
                        Some(token) => token.to_string(),
                        None => {
                            log::error!(
                                "Unable to read api token from config for remote '{}' and user '{os_username}', this remote will be ignored : '{}'",
                                &host,
                                error,
                            );
                            continue;
                        }
                    }
                }
            };

            remotes.push(RemoteCredentials {
                host,
                username,
                token,
            })
        }

        Ok(Self {
            remotes,
            allow_raw_tokens,
        })
    }

    pub fn credentials_for(&self, host: &str) -> Option<&RemoteCredentials> {
        self.remotes.iter().find(|remote| remote.host == host)
    }
}
