//! Web fetch adapter
//!
//! Performs a plain GET for each configured URL. The URL doubles as the
//! document identifier. A failing URL is logged and skipped.

use async_trait::async_trait;
use granary_core::{Result, SourceDocument};
use reqwest::Client;
use tracing::warn;

use crate::SourceAdapter;

/// Fetches documents from a list of web URLs
pub struct WebSource {
    client: Client,
    urls: Vec<String>,
}

impl WebSource {
    /// Create an adapter for the given URL list
    pub fn new(urls: Vec<String>) -> Self {
        Self::with_timeout(urls, std::time::Duration::from_secs(30))
    }

    /// Create an adapter with an explicit per-request timeout
    pub fn with_timeout(urls: Vec<String>, timeout: std::time::Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, urls }
    }

    async fn fetch_one(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status());
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceAdapter for WebSource {
    fn name(&self) -> &str {
        "web"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::new();

        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(content) => {
                    documents.push(
                        SourceDocument::new(url.clone(), content).with_meta("url", url.clone()),
                    );
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "skipping unreachable url");
                }
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_url_list() {
        let source = WebSource::new(vec![]);
        let docs = source.fetch().await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_url_is_skipped_not_fatal() {
        // Reserved TEST-NET-1 address, refused or unroutable either way.
        let source = WebSource::with_timeout(
            vec!["http://192.0.2.1:1/doc".to_string()],
            std::time::Duration::from_secs(2),
        );
        let docs = source.fetch().await.unwrap();
        assert!(docs.is_empty());
    }
}
