use std::fmt::Display;

use thiserror::Error;

const DEFAULT_HTTPS_PORT: u16 = 443;
const DEFAULT_HTTP_PORT: u16 = 80;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteUrlError {
    #[error("Remote url is empty")]
    Empty,
    #[error("Unsupported scheme '{0}' (expected 'http' or 'https')")]
    UnsupportedScheme(String),
    #[error("Missing host in remote url '{0}'")]
    MissingHost(String),
    #[error("Invalid port '{0}'")]
    InvalidPort(String),
    #[error("Remote url path must be 'owner/project' or '@user/project', got {0} segment(s)")]
    UnexpectedSegmentCount(usize),
    #[error("Invalid identifier '{0}' (allowed characters are letters, digits, '_' and '-')")]
    InvalidIdentifier(String),
}

/// Namespace owning a remote project: an organization, or a personal
/// account marked by a leading `@` in the url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOwner {
    Organization(String),
    User(String),
}

impl ProjectOwner {
    pub fn name(&self) -> &str {
        match self {
            ProjectOwner::Organization(name) => name,
            ProjectOwner::User(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    pub port: u16,
    pub use_https: bool,
    pub owner: ProjectOwner,
    pub project_name: String,
    pub original_url: String,
}

impl RemoteUrl {
    pub fn parse(raw: &str) -> Result<Self, RemoteUrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RemoteUrlError::Empty);
        }

        let (scheme, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
            None => return Err(RemoteUrlError::UnsupportedScheme("".to_string())),
        };
        let use_https = match scheme.as_str() {
            "https" => true,
            "http" => false,
            _ => return Err(RemoteUrlError::UnsupportedScheme(scheme)),
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, raw_port)) => {
                let port = raw_port
                    .parse::<u16>()
                    .map_err(|_| RemoteUrlError::InvalidPort(raw_port.to_string()))?;
                (host, port)
            }
            None => (
                authority,
                if use_https {
                    DEFAULT_HTTPS_PORT
                } else {
                    DEFAULT_HTTP_PORT
                },
            ),
        };
        if host.is_empty() {
            return Err(RemoteUrlError::MissingHost(trimmed.to_string()));
        }

        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        if segments.len() != 2 {
            return Err(RemoteUrlError::UnexpectedSegmentCount(segments.len()));
        }

        let owner = match segments[0].strip_prefix('@') {
            Some(user) => ProjectOwner::User(validate_identifier(user)?),
            None => ProjectOwner::Organization(validate_identifier(segments[0])?),
        };
        let project_name = validate_identifier(segments[1])?;

        Ok(Self {
            host: host.to_string(),
            port,
            use_https,
            owner,
            project_name,
            original_url: raw.to_string(),
        })
    }

    pub fn try_parse(raw: &str) -> Option<Self> {
        Self::parse(raw).ok()
    }

    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    fn is_default_port(&self) -> bool {
        (self.use_https && self.port == DEFAULT_HTTPS_PORT)
            || (!self.use_https && self.port == DEFAULT_HTTP_PORT)
    }

    fn authority(&self) -> String {
        if self.is_default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn api_base_url(&self) -> String {
        format!("{}://{}/api", self.scheme(), self.authority())
    }

    pub fn project_api_url(&self) -> String {
        match &self.owner {
            ProjectOwner::Organization(organization) => format!(
                "{}/projects/{}/{}",
                self.api_base_url(),
                organization,
                self.project_name
            ),
            ProjectOwner::User(user) => format!(
                "{}/users/{}/projects/{}",
                self.api_base_url(),
                user,
                self.project_name
            ),
        }
    }
}

impl Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = match &self.owner {
            ProjectOwner::Organization(organization) => organization.clone(),
            ProjectOwner::User(user) => format!("@{}", user),
        };
        write!(
            f,
            "{}://{}/{}/{}",
            self.scheme(),
            self.authority(),
            owner,
            self.project_name
        )
    }
}

fn validate_identifier(raw: &str) -> Result<String, RemoteUrlError> {
    if raw.is_empty()
        || !raw
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '_' || character == '-')
    {
        return Err(RemoteUrlError::InvalidIdentifier(raw.to_string()));
    }
    Ok(raw.to_string())
}
