//! File namespace

use crate::{
    Result,
    client::{RequestOptions, SessionClient, error_for_status},
    errors::ClientError,
    utils::encode_path_segment,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// File metadata as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub name: String,
    /// Public path the file can be read back from
    pub path: String,
    #[serde(default, rename = "isDirectory")]
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// File storage on the backend
#[async_trait]
pub trait FileService: Send + Sync {
    /// Upload one file; the backend picks the stored name
    async fn upload(&self, file_name: &str, mime: Option<&str>, data: Vec<u8>) -> Result<FileItem>;

    /// Read a file by the path `upload` returned, or by stored name
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    async fn write(&self, _path: &str, _data: Vec<u8>) -> Result<FileItem> {
        Err(ClientError::Unsupported("fs.write"))
    }

    async fn read_dir(&self, _path: &str) -> Result<Vec<FileItem>> {
        Err(ClientError::Unsupported("fs.read_dir"))
    }

    async fn delete(&self, _path: &str) -> Result<()> {
        Err(ClientError::Unsupported("fs.delete"))
    }
}

/// `FileService` over `/api/files`
#[derive(Debug, Clone)]
pub struct HttpFiles {
    client: SessionClient,
}

impl HttpFiles {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    fn base(&self) -> &str {
        self.client.config().endpoints.files.trim_end_matches('/')
    }

    /// Paths under the files endpoint are used as-is; bare names are encoded
    fn resolve(&self, path: &str) -> String {
        let base = self.base();
        if path.starts_with(&format!("{}/", base)) {
            path.to_string()
        } else {
            format!("{}/{}", base, encode_path_segment(path.trim_start_matches('/')))
        }
    }
}

#[async_trait]
impl FileService for HttpFiles {
    async fn upload(&self, file_name: &str, mime: Option<&str>, data: Vec<u8>) -> Result<FileItem> {
        let options = RequestOptions::post().file("file", file_name, mime.map(str::to_string), data);
        let path = format!("{}/upload", self.base());
        let response = self.client.request(&path, options).await?;
        let response = error_for_status(response, "Failed to upload file").await?;
        Ok(response.json().await?)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .request(&self.resolve(path), RequestOptions::get())
            .await?;
        let response = error_for_status(response, "Failed to read file").await?;
        Ok(response.bytes().await?.to_vec())
    }
}
