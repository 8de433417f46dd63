//! Local directory adapter
//!
//! Scans one directory (non-recursive), filters by file extension, and
//! emits one document per matching file with the filename as identifier.

use std::path::PathBuf;

use async_trait::async_trait;
use granary_core::{GranaryError, Result, SourceDocument};
use tracing::warn;

use crate::SourceAdapter;

/// Reads text files from a local directory
pub struct LocalDirSource {
    dir: PathBuf,
    extensions: Vec<String>,
}

impl LocalDirSource {
    /// Create an adapter for `dir`, keeping files whose extension is in
    /// `extensions` (compared case-insensitively, without the dot).
    pub fn new(dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            extensions,
        }
    }

    fn wants(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|w| w.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SourceAdapter for LocalDirSource {
    fn name(&self) -> &str {
        "local-dir"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let mut entries =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|e| GranaryError::SourceError {
                    adapter: self.name().to_string(),
                    message: format!("cannot read {}: {e}", self.dir.display()),
                })?;

        let mut documents = Vec::new();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if !self.wants(&path) {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();

            // Per-item isolation: a single unreadable file is skipped,
            // the rest of the directory still goes through.
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    documents.push(
                        SourceDocument::new(filename.clone(), content)
                            .with_meta("filename", filename),
                    );
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable file");
                }
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_one_document_per_matching_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.txt", "alpha");
        write(tmp.path(), "b.txt", "beta");
        write(tmp.path(), "skip.md", "gamma");
        write(tmp.path(), "noext", "delta");

        let source = LocalDirSource::new(tmp.path(), vec!["txt".to_string()]);
        let mut docs = source.fetch().await.unwrap();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a.txt");
        assert_eq!(docs[0].content, "alpha");
        assert_eq!(
            docs[0].metadata.get("filename"),
            Some(&serde_json::json!("a.txt"))
        );
        assert_eq!(docs[1].id, "b.txt");
    }

    #[tokio::test]
    async fn test_extension_filter_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "upper.TXT", "upper");

        let source = LocalDirSource::new(tmp.path(), vec!["txt".to_string()]);
        let docs = source.fetch().await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "upper.TXT");
    }

    #[tokio::test]
    async fn test_missing_directory_fails_adapter() {
        let source = LocalDirSource::new("/no/such/dir", vec!["txt".to_string()]);
        assert!(source.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_empty_directory_yields_no_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let source = LocalDirSource::new(tmp.path(), vec!["txt".to_string()]);
        let docs = source.fetch().await.unwrap();
        assert!(docs.is_empty());
    }
}
