use std::fs;
use std::path::{Path, PathBuf};

use testdir::testdir;
use uuid::Uuid;

use locsync_core::client::{MockProjectClient, RemoteFileEntry, RemoteProject};
use locsync_core::types::FileDescriptor;
use locsync_core::utils::md5_bytes;

pub fn tmpdir() -> PathBuf {
    let path = testdir!().join(PathBuf::from(Uuid::new_v4().to_string()));
    fs::create_dir_all(&path).unwrap();
    path
}

/// Materialize a project tree from (relative path, content) pairs.
pub fn build_project(project_path: &Path, files: &[(&str, &str)]) {
    for (relative_path, content) in files {
        let absolute_path = project_path.join(relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&absolute_path, content).unwrap();
    }
}

pub fn descriptor(path: &str, content: &str) -> FileDescriptor {
    FileDescriptor::new(path.to_string(), content.as_bytes().to_vec())
}

pub fn remote_project(format: Option<&str>, default_language: Option<&str>) -> RemoteProject {
    RemoteProject {
        name: "webshop".to_string(),
        format: format.map(|format| format.to_string()),
        default_language: default_language.map(|language| language.to_string()),
    }
}

pub enum MockProjectClientCase {
    GetProjectOk(RemoteProject),
    /// File listing plus per-file content served on download
    GetFilesOk(Vec<(String, String)>),
    UploadOk(String),
    DeleteOk(String),
    GetConfigOk(Option<String>),
    UpdateConfigOk(String),
}

impl MockProjectClientCase {
    pub fn apply_multiples(mock: &mut MockProjectClient, cases: Vec<Self>) {
        for case in cases {
            case.apply(mock)
        }
    }

    pub fn apply(self, mock: &mut MockProjectClient) {
        match self {
            MockProjectClientCase::GetProjectOk(project) => {
                mock.expect_get_project()
                    .returning(move || Ok(project.clone()));
            }
            MockProjectClientCase::GetFilesOk(raw_files) => {
                let entries: Vec<RemoteFileEntry> = raw_files
                    .iter()
                    .map(|(path, content)| RemoteFileEntry {
                        path: path.clone(),
                        hash: md5_bytes(content.as_bytes()),
                    })
                    .collect();
                mock.expect_get_files()
                    .returning(move || Ok(entries.clone()));
                for (path, content) in raw_files {
                    let expected_path = path.clone();
                    let content = content.into_bytes();
                    mock.expect_download_file()
                        .withf(move |requested| requested == expected_path)
                        .returning(move |_| Ok(content.clone()));
                }
            }
            MockProjectClientCase::UploadOk(path) => {
                mock.expect_upload_file()
                    .withf(move |requested, _| requested == path)
                    .times(1)
                    .returning(|_, _| Ok(()));
            }
            MockProjectClientCase::DeleteOk(path) => {
                mock.expect_delete_file()
                    .withf(move |requested| requested == path)
                    .times(1)
                    .returning(|_| Ok(()));
            }
            MockProjectClientCase::GetConfigOk(raw) => {
                mock.expect_get_project_config()
                    .returning(move || Ok(raw.clone()));
            }
            MockProjectClientCase::UpdateConfigOk(raw) => {
                mock.expect_update_project_config()
                    .withf(move |requested| requested == raw)
                    .times(1)
                    .returning(|_| Ok(()));
            }
        }
    }
}
