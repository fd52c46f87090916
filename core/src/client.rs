use std::time::Duration;

use mockall::automock;
use reqwest::{blocking::Response, Method};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::remote::RemoteUrl;

pub const PROJECT_NOT_FOUND_ERR_CODE: u64 = 2001;
pub const FILE_NOT_FOUND_ERR_CODE: u64 = 2003;
pub const INVALID_TOKEN_ERR_CODE: u64 = 1002;
pub const DEFAULT_CLIENT_TIMEOUT: u64 = 30;

#[derive(Debug, Clone, Error)]
pub enum ProjectClientError {
    #[error("Authentication error")]
    AuthenticationError,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Connection error")]
    ConnectionError,
    #[error("Timeout error")]
    TimeoutError,
    #[error("Invalid response: `{0}` (`{1}`)")]
    InvalidResponse(String, Value),
    #[error("Unknown error: `{0}`")]
    Unknown(String),
}

impl ProjectClientError {
    fn from_code(error_code: u64) -> Option<ProjectClientError> {
        match error_code {
            PROJECT_NOT_FOUND_ERR_CODE => Some(ProjectClientError::ProjectNotFound),
            INVALID_TOKEN_ERR_CODE => Some(ProjectClientError::AuthenticationError),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProjectClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            return Self::ConnectionError;
        }

        if error.is_timeout() {
            return Self::TimeoutError;
        }

        Self::Unknown(error.to_string())
    }
}

/// Project metadata as declared by the remote service. `format` and
/// `default_language` may be unset on freshly created projects.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteProject {
    pub name: String,
    pub format: Option<String>,
    pub default_language: Option<String>,
}

/// One resource file as listed by the remote service. Content is
/// fetched separately, file listings stay cheap.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteFileEntry {
    pub path: String,
    pub hash: String,
}

#[automock]
pub trait ProjectClient {
    fn get_project(&self) -> Result<RemoteProject, ProjectClientError>;
    fn get_files(&self) -> Result<Vec<RemoteFileEntry>, ProjectClientError>;
    fn download_file(&self, path: &str) -> Result<Vec<u8>, ProjectClientError>;
    fn upload_file(&self, path: &str, content: &[u8]) -> Result<(), ProjectClientError>;
    fn delete_file(&self, path: &str) -> Result<(), ProjectClientError>;
    fn get_project_config(&self) -> Result<Option<String>, ProjectClientError>;
    fn update_project_config(&self, raw: &str) -> Result<(), ProjectClientError>;
}

pub struct Client {
    remote_url: RemoteUrl,
    token: String,
    client: reqwest::blocking::Client,
}

impl Client {
    pub fn new(remote_url: RemoteUrl, token: String) -> Result<Self, ProjectClientError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_CLIENT_TIMEOUT))
            .build()?;
        Ok(Self {
            remote_url,
            token,
            client,
        })
    }

    fn project_url(&self, suffix: &str) -> String {
        format!("{}{}", self.remote_url.project_api_url(), suffix)
    }

    fn request(&self, method: Method, url: String) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(self.token.clone())
    }

    fn response_error(&self, response: Response) -> Result<ProjectClientError, ProjectClientError> {
        match response.status().as_u16() {
            401 | 403 => return Ok(ProjectClientError::AuthenticationError),
            404 => return Ok(ProjectClientError::ProjectNotFound),
            _ => {}
        };

        let content_value = response.json::<Value>()?;
        if let Some(error_code) = content_value["code"].as_u64() {
            if let Some(error) = ProjectClientError::from_code(error_code) {
                return Ok(error);
            }
        }

        if let Some(message) = content_value["message"].as_str() {
            return Ok(ProjectClientError::Unknown(message.to_string()));
        }

        Ok(ProjectClientError::Unknown("Unknown error".to_string()))
    }
}

impl ProjectClient for Client {
    fn get_project(&self) -> Result<RemoteProject, ProjectClientError> {
        let response = self.request(Method::GET, self.project_url("")).send()?;
        if response.status() == 200 {
            return Ok(response.json::<RemoteProject>()?);
        }
        Err(self.response_error(response)?)
    }

    fn get_files(&self) -> Result<Vec<RemoteFileEntry>, ProjectClientError> {
        let response = self.request(Method::GET, self.project_url("/files")).send()?;
        if response.status() == 200 {
            return Ok(response.json::<Vec<RemoteFileEntry>>()?);
        }
        Err(self.response_error(response)?)
    }

    fn download_file(&self, path: &str) -> Result<Vec<u8>, ProjectClientError> {
        let response = self
            .request(
                Method::GET,
                self.project_url(&format!("/files/{}/content", path)),
            )
            .send()?;
        match response.status().as_u16() {
            200 => Ok(response.bytes()?.to_vec()),
            404 => Err(ProjectClientError::FileNotFound(path.to_string())),
            _ => Err(self.response_error(response)?),
        }
    }

    fn upload_file(&self, path: &str, content: &[u8]) -> Result<(), ProjectClientError> {
        let response = self
            .request(
                Method::PUT,
                self.project_url(&format!("/files/{}/content", path)),
            )
            .body(content.to_vec())
            .send()?;
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            _ => Err(self.response_error(response)?),
        }
    }

    fn delete_file(&self, path: &str) -> Result<(), ProjectClientError> {
        let response = self
            .request(Method::DELETE, self.project_url(&format!("/files/{}", path)))
            .send()?;
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            404 => Err(ProjectClientError::FileNotFound(path.to_string())),
            _ => Err(self.response_error(response)?),
        }
    }

    fn get_project_config(&self) -> Result<Option<String>, ProjectClientError> {
        let response = self.request(Method::GET, self.project_url("/config")).send()?;
        match response.status().as_u16() {
            200 => Ok(Some(response.text()?)),
            204 | 404 => Ok(None),
            _ => Err(self.response_error(response)?),
        }
    }

    fn update_project_config(&self, raw: &str) -> Result<(), ProjectClientError> {
        let response = self
            .request(Method::PUT, self.project_url("/config"))
            .body(raw.to_string())
            .send()?;
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            _ => Err(self.response_error(response)?),
        }
    }
}
