//! Google Drive adapter
//!
//! Lists files via the Drive v3 REST API and downloads each non-folder
//! file with `alt=media`. Requires `GDRIVE_ACCESS_TOKEN`.

use async_trait::async_trait;
use granary_core::{GranaryError, Result, SourceDocument};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::SourceAdapter;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// Fetches documents from a Google Drive account
pub struct GoogleDriveSource {
    client: Client,
    token: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct FileList {
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
}

impl GoogleDriveSource {
    /// Create an adapter listing up to 100 files
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            page_size: 100,
        }
    }

    async fn list(&self) -> Result<Vec<DriveFile>> {
        let response = self
            .client
            .get(DRIVE_FILES_URL)
            .bearer_auth(&self.token)
            .query(&[
                ("pageSize", self.page_size.to_string()),
                ("fields", "files(id, name, mimeType)".to_string()),
            ])
            .send()
            .await
            .map_err(|e| self.source_err(format!("file listing failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(self.source_err(format!("file listing returned {status}")));
        }

        let listing: FileList = response
            .json()
            .await
            .map_err(|e| self.source_err(format!("cannot parse file listing: {e}")))?;

        Ok(listing.files)
    }

    async fn download(&self, id: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(format!("{DRIVE_FILES_URL}/{id}"))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("media download returned {}", response.status());
        }

        Ok(response.text().await?)
    }

    fn source_err(&self, message: String) -> GranaryError {
        GranaryError::SourceError {
            adapter: "gdrive".to_string(),
            message,
        }
    }
}

#[async_trait]
impl SourceAdapter for GoogleDriveSource {
    fn name(&self) -> &str {
        "gdrive"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let files = self.list().await?;
        let mut documents = Vec::new();

        for file in files.iter().filter(|f| f.mime_type != FOLDER_MIME) {
            match self.download(&file.id).await {
                Ok(content) => {
                    documents.push(
                        SourceDocument::new(file.id.clone(), content)
                            .with_meta("google_drive_id", file.id.clone())
                            .with_meta("filename", file.name.clone()),
                    );
                }
                Err(e) => {
                    warn!(file = %file.name, error = %e, "skipping drive file");
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
    fn test_listing_parse_skips_folders() {
        let json = r#"{
            "files": [
                {"id": "f1", "name": "archive", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "d1", "name": "memo.txt", "mimeType": "text/plain"}
            ]
        }"#;

        let listing: FileList = serde_json::from_str(json).unwrap();
        let files: Vec<_> = listing
            .files
            .iter()
            .filter(|f| f.mime_type != FOLDER_MIME)
            .collect();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "d1");
    }
}
