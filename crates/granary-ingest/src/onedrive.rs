//! OneDrive adapter
//!
//! Lists the drive root via Microsoft Graph and downloads each file
//! item's content. Requires `ONEDRIVE_ACCESS_TOKEN`.

use async_trait::async_trait;
use granary_core::{GranaryError, Result, SourceDocument};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::SourceAdapter;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Fetches documents from the OneDrive root folder
pub struct OneDriveSource {
    client: Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct DriveChildren {
    value: Vec<DriveItem>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    /// Present only for files; folders carry a `folder` facet instead
    file: Option<serde_json::Value>,
}

impl OneDriveSource {
    /// Create an adapter for the authenticated user's drive root
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
        }
    }

    async fn list(&self) -> Result<Vec<DriveItem>> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me/drive/root/children"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| self.source_err(format!("children listing failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(self.source_err(format!("children listing returned {status}")));
        }

        let children: DriveChildren = response
            .json()
            .await
            .map_err(|e| self.source_err(format!("cannot parse children listing: {e}")))?;

        Ok(children.value)
    }

    async fn download(&self, id: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me/drive/items/{id}/content"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("content download returned {}", response.status());
        }

        Ok(response.text().await?)
    }

    fn source_err(&self, message: String) -> GranaryError {
        GranaryError::SourceError {
            adapter: "onedrive".to_string(),
            message,
        }
    }
}

#[async_trait]
impl SourceAdapter for OneDriveSource {
    fn name(&self) -> &str {
        "onedrive"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let items = self.list().await?;
        let mut documents = Vec::new();

        for item in items.iter().filter(|i| i.file.is_some()) {
            match self.download(&item.id).await {
                Ok(content) => {
                    documents.push(
                        SourceDocument::new(item.id.clone(), content)
                            .with_meta("onedrive_id", item.id.clone())
                            .with_meta("filename", item.name.clone()),
                    );
                }
                Err(e) => {
                    warn!(file = %item.name, error = %e, "skipping onedrive item");
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
    fn test_item_parse_distinguishes_files_from_folders() {
        let json = r#"{
            "value": [
                {"id": "1", "name": "docs", "folder": {"childCount": 3}},
                {"id": "2", "name": "plan.txt", "file": {"mimeType": "text/plain"}}
            ]
        }"#;

        let children: DriveChildren = serde_json::from_str(json).unwrap();
        let files: Vec<_> = children.value.iter().filter(|i| i.file.is_some()).collect();

        assert_eq!(children.value.len(), 2);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "plan.txt");
    }
}
