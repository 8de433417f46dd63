//! Dropbox adapter
//!
//! Lists the app folder via the Dropbox HTTP API (`files/list_folder`)
//! and downloads each file entry (`files/download`). Requires
//! `DROPBOX_ACCESS_TOKEN`.

use async_trait::async_trait;
use granary_core::{GranaryError, Result, SourceDocument};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::SourceAdapter;

const LIST_FOLDER_URL: &str = "https://api.dropboxapi.com/2/files/list_folder";
const DOWNLOAD_URL: &str = "https://content.dropboxapi.com/2/files/download";

/// Fetches documents from a Dropbox folder
pub struct DropboxSource {
    client: Client,
    token: String,
    /// Folder to list; empty string means the app folder root
    path: String,
}

#[derive(Debug, Serialize)]
struct ListFolderRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<DropboxEntry>,
}

#[derive(Debug, Deserialize)]
struct DropboxEntry {
    #[serde(rename = ".tag")]
    tag: String,
    id: String,
    name: String,
    path_lower: Option<String>,
}

#[derive(Debug, Serialize)]
struct DownloadArg<'a> {
    path: &'a str,
}

impl DropboxSource {
    /// Create an adapter listing the app folder root
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_path(token, "")
    }

    /// Create an adapter listing a specific folder path
    pub fn with_path(token: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            path: path.into(),
        }
    }

    async fn list(&self) -> Result<Vec<DropboxEntry>> {
        let response = self
            .client
            .post(LIST_FOLDER_URL)
            .bearer_auth(&self.token)
            .json(&ListFolderRequest { path: &self.path })
            .send()
            .await
            .map_err(|e| self.source_err(format!("list_folder request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(self.source_err(format!("list_folder returned {status}: {body}")));
        }

        let listing: ListFolderResponse = response
            .json()
            .await
            .map_err(|e| self.source_err(format!("cannot parse list_folder response: {e}")))?;

        Ok(listing.entries)
    }

    async fn download(&self, path: &str) -> anyhow::Result<String> {
        let arg = serde_json::to_string(&DownloadArg { path })?;
        let response = self
            .client
            .post(DOWNLOAD_URL)
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", arg)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("download returned {}", response.status());
        }

        Ok(response.text().await?)
    }

    fn source_err(&self, message: String) -> GranaryError {
        GranaryError::SourceError {
            adapter: "dropbox".to_string(),
            message,
        }
    }
}

#[async_trait]
impl SourceAdapter for DropboxSource {
    fn name(&self) -> &str {
        "dropbox"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let entries = self.list().await?;
        let mut documents = Vec::new();

        for entry in entries.iter().filter(|e| e.tag == "file") {
            let path = entry.path_lower.as_deref().unwrap_or(&entry.name);

            match self.download(path).await {
                Ok(content) => {
                    documents.push(
                        SourceDocument::new(entry.id.clone(), content)
                            .with_meta("dropbox_id", entry.id.clone())
                            .with_meta("filename", entry.name.clone()),
                    );
                }
                Err(e) => {
                    warn!(file = %entry.name, error = %e, "skipping dropbox entry");
                }
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_parse_skips_folders() {
        let json = r#"{
            "entries": [
                {".tag": "folder", "id": "id:f1", "name": "reports"},
                {".tag": "file", "id": "id:a1", "name": "notes.txt", "path_lower": "/notes.txt"}
            ]
        }"#;

        let listing: ListFolderResponse = serde_json::from_str(json).unwrap();
        let files: Vec<_> = listing.entries.iter().filter(|e| e.tag == "file").collect();

        assert_eq!(listing.entries.len(), 2);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "id:a1");
        assert_eq!(files[0].path_lower.as_deref(), Some("/notes.txt"));
    }
}
