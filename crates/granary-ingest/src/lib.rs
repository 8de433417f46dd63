//! Granary Ingest - Source adapters and the document collector
//!
//! Each adapter fetches documents from one external source (local
//! directory, web URLs, cloud drives, a relational database). Adapters are
//! independent: a failing adapter never aborts its siblings, and a failing
//! item within an adapter is logged and skipped.
//!
//! The [`Collector`] fans all enabled adapters out as tasks and joins them
//! all before the aggregated results are readable.

use std::time::Duration;

use async_trait::async_trait;
use granary_core::{FetchReport, Result, SourceDocument, SourceFailure};
use tokio::task::JoinSet;
use tracing::{error, info};

pub mod database;
pub mod dropbox;
pub mod gdrive;
pub mod local;
pub mod onedrive;
pub mod web;

pub use database::DatabaseSource;
pub use dropbox::DropboxSource;
pub use gdrive::GoogleDriveSource;
pub use local::LocalDirSource;
pub use onedrive::OneDriveSource;
pub use web::WebSource;

// ============================================================================
// Adapter Contract
// ============================================================================

/// An isolated unit responsible for fetching documents from one source.
///
/// Within one adapter, output order matches the source's natural
/// enumeration (directory listing order, URL list order, row order).
/// Across adapters no order is guaranteed.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name for logging and failure reports
    fn name(&self) -> &str;

    /// Fetch all documents from this source
    async fn fetch(&self) -> Result<Vec<SourceDocument>>;
}

// ============================================================================
// Collector
// ============================================================================

/// Fan-out/join collector over a set of enabled adapters.
///
/// Every adapter runs as its own task under a bounded timeout; the
/// collector joins all tasks before returning, so the aggregated report is
/// write-once-then-read. Zero adapters yields an empty report.
pub struct Collector {
    timeout: Duration,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// Create a collector with the default 30 s per-adapter timeout
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    /// Override the per-adapter timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every adapter to completion and aggregate the results.
    ///
    /// Never returns an error: adapter failures (including timeouts and
    /// panics) are recorded in the report's `failures`.
    pub async fn collect(&self, adapters: Vec<Box<dyn SourceAdapter>>) -> FetchReport {
        let mut tasks = JoinSet::new();
        let timeout = self.timeout;

        for adapter in adapters {
            tasks.spawn(async move {
                let name = adapter.name().to_string();
                let outcome = tokio::time::timeout(timeout, adapter.fetch()).await;
                (name, outcome)
            });
        }

        let mut report = FetchReport::default();

        // Join barrier: nothing downstream reads the report until every
        // adapter task has finished.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(Ok(docs)))) => {
                    info!(adapter = %name, count = docs.len(), "source fetch complete");
                    report.documents.extend(docs);
                }
                Ok((name, Ok(Err(e)))) => {
                    error!(adapter = %name, error = %e, "source fetch failed");
                    report.failures.push(SourceFailure {
                        adapter: name,
                        message: e.to_string(),
                    });
                }
                Ok((name, Err(_elapsed))) => {
                    error!(adapter = %name, timeout_secs = timeout.as_secs(), "source fetch timed out");
                    report.failures.push(SourceFailure {
                        adapter: name,
                        message: format!("timed out after {}s", timeout.as_secs()),
                    });
                }
                Err(join_err) => {
                    error!(error = %join_err, "source task aborted");
                    report.failures.push(SourceFailure {
                        adapter: "unknown".to_string(),
                        message: join_err.to_string(),
                    });
                }
            }
        }

        report
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use granary_core::GranaryError;

    struct StaticSource {
        name: &'static str,
        docs: Vec<SourceDocument>,
    }

    #[async_trait]
    impl SourceAdapter for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self) -> Result<Vec<SourceDocument>> {
            Ok(self.docs.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SourceAdapter for FailingSource {
        fn name(&self) -> &str {
            "unreachable-web"
        }

        async fn fetch(&self) -> Result<Vec<SourceDocument>> {
            Err(GranaryError::SourceError {
                adapter: "unreachable-web".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    struct SlowSource;

    #[async_trait]
    impl SourceAdapter for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self) -> Result<Vec<SourceDocument>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_zero_adapters_is_a_noop() {
        let report = Collector::new().collect(vec![]).await;
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_failing_adapter_does_not_abort_siblings() {
        let good = StaticSource {
            name: "local",
            docs: vec![
                SourceDocument::new("a.txt", "alpha"),
                SourceDocument::new("b.txt", "beta"),
            ],
        };

        let report = Collector::new()
            .collect(vec![Box::new(good), Box::new(FailingSource)])
            .await;

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].adapter, "unreachable-web");
    }

    #[tokio::test]
    async fn test_adapter_timeout_is_recorded() {
        let report = Collector::new()
            .with_timeout(Duration::from_millis(50))
            .collect(vec![Box::new(SlowSource)])
            .await;

        assert!(report.documents.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_multiple_sources_aggregate() {
        let a = StaticSource {
            name: "a",
            docs: vec![SourceDocument::new("1", "one")],
        };
        let b = StaticSource {
            name: "b",
            docs: vec![
                SourceDocument::new("2", "two"),
                SourceDocument::new("3", "three"),
            ],
        };

        let report = Collector::new()
            .collect(vec![Box::new(a), Box::new(b)])
            .await;

        assert_eq!(report.documents.len(), 3);
        assert!(report.failures.is_empty());
    }
}
