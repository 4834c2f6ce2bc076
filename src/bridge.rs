//! Forge Bridge client.
//!
//! Remote access to the platform's virtual filesystem. Paths are VFS paths,
//! never local ones; a missing path surfaces as [`crate::Error::NotFound`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::transport::{ApiRequest, Transport};
use crate::types::{check_non_empty, DirectoryListing, FileInfo, SyncStatus};

const PREFIX: &str = "/v1/bridge";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingResponse {
    path: String,
    files: Vec<FileInfo>,
    #[serde(default)]
    total_count: Option<usize>,
}

impl From<ListingResponse> for DirectoryListing {
    fn from(raw: ListingResponse) -> Self {
        let total_count = raw.total_count.unwrap_or(raw.files.len());
        DirectoryListing {
            path: raw.path,
            files: raw.files,
            total_count,
        }
    }
}

#[derive(Deserialize)]
struct ContentResponse {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteBody<'a> {
    path: &'a str,
    content: &'a str,
    create_dirs: bool,
}

#[derive(Serialize)]
struct SyncBody<'a> {
    path: &'a str,
}

/// Options for [`BridgeClient::list_files_with`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub recursive: bool,
    /// Glob pattern applied by the server
    pub pattern: Option<String>,
}

impl ListOptions {
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Client for the Forge Bridge API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    transport: Arc<Transport>,
}

impl BridgeClient {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// List the entries of a directory.
    pub async fn list_files(&self, path: &str) -> Result<DirectoryListing> {
        self.list_files_with(path, ListOptions::default()).await
    }

    /// List a directory, optionally recursively or filtered by a glob.
    pub async fn list_files_with(&self, path: &str, options: ListOptions) -> Result<DirectoryListing> {
        check_non_empty("path", path)?;

        let request = ApiRequest::get(format!("{}/files", PREFIX))
            .query("path", path)
            .query("recursive", options.recursive)
            .query_opt("pattern", options.pattern.as_deref());
        let listing: ListingResponse = self.transport.json(request).await?;

        debug!(path, entries = listing.files.len(), "VFS listing");
        Ok(listing.into())
    }

    /// Read a text file.
    pub async fn read_file(&self, path: &str) -> Result<String> {
        check_non_empty("path", path)?;

        let request = ApiRequest::get(format!("{}/file", PREFIX))
            .query("path", path)
            .attested(None);
        let response: ContentResponse = self.transport.json(request).await?;
        Ok(response.content)
    }

    /// Read a file as raw bytes.
    pub async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>> {
        check_non_empty("path", path)?;

        let request = ApiRequest::get(format!("{}/file/bytes", PREFIX))
            .query("path", path)
            .accept("application/octet-stream")
            .attested(None);
        self.transport.bytes(request).await
    }

    /// Write a text file, creating parent directories when asked to.
    pub async fn write_file(&self, path: &str, content: &str, create_dirs: bool) -> Result<FileInfo> {
        check_non_empty("path", path)?;

        let body = WriteBody {
            path,
            content,
            create_dirs,
        };
        let request = ApiRequest::put(format!("{}/file", PREFIX))
            .json(&body)?
            .attested(None);
        self.transport.json(request).await
    }

    /// Delete a file.
    pub async fn delete_file(&self, path: &str) -> Result<()> {
        check_non_empty("path", path)?;

        let request = ApiRequest::delete(format!("{}/file", PREFIX))
            .query("path", path)
            .attested(None);
        self.transport.send(request).await
    }

    /// Get metadata for a single path.
    pub async fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        check_non_empty("path", path)?;

        let request = ApiRequest::get(format!("{}/file/info", PREFIX)).query("path", path);
        self.transport.json(request).await
    }

    /// Trigger VFS synchronization.
    pub async fn sync(&self, path: &str) -> Result<SyncStatus> {
        check_non_empty("path", path)?;

        let request = ApiRequest::post(format!("{}/sync", PREFIX)).json(&SyncBody { path })?;
        self.transport.json(request).await
    }

    /// Get the current sync status.
    pub async fn get_sync_status(&self, path: &str) -> Result<SyncStatus> {
        check_non_empty("path", path)?;

        let request = ApiRequest::get(format!("{}/sync/status", PREFIX)).query("path", path);
        self.transport.json(request).await
    }
}
