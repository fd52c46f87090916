use std::fmt;
use std::path::PathBuf;

use locsync_core::client::{Client, ProjectClientError};
use locsync_core::remote::RemoteUrl;

use crate::error::Error;
use crate::util;

#[derive(Clone)]
pub struct Context {
    pub project_path: PathBuf,
    pub remote_url: RemoteUrl,
    pub username: String,
    pub token: String,
}

impl Context {
    pub fn new(
        project_path: PathBuf,
        remote_url: RemoteUrl,
        username: String,
        token: String,
    ) -> Result<Self, Error> {
        let project_path = PathBuf::from(util::canonicalize_to_string(&project_path)?);
        Ok(Self {
            project_path,
            remote_url,
            username,
            token,
        })
    }

    pub fn client(&self) -> Result<Client, ProjectClientError> {
        Client::new(self.remote_url.clone(), self.token.clone())
    }

    /// `project@host` label used as log prefix by the operations.
    pub fn display_name(&self) -> String {
        format!("{}@{}", self.remote_url.project_name, self.remote_url.host)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("project_path", &self.project_path)
            .field("remote_url", &self.remote_url.to_string())
            .field("username", &self.username)
            .finish()
    }
}
