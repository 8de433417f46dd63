//! Granary Core - Domain models, errors, and configuration
//!
//! This crate defines the shared types used throughout granary:
//! - Document and vector-point records
//! - Collection descriptors (name, dimensionality, distance metric)
//! - Payload filters for search
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ChromaConfig, ConfigError, LoggingConfig, QdrantConfig, SourcesConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for granary operations
#[derive(Error, Debug)]
pub enum GranaryError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Source '{adapter}' failed: {message}")]
    SourceError { adapter: String, message: String },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GranaryError>;

// ============================================================================
// Document Records
// ============================================================================

/// A document gathered from a source, ready for upsert into a collection.
///
/// The identifier is caller-chosen; uniqueness within a collection is
/// enforced only by the remote store's own upsert-by-id semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Identifier, unique within a collection
    pub id: String,

    /// Raw text content
    pub content: String,

    /// Open-ended key/value metadata, filterable at query time
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SourceDocument {
    /// Create a new document
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata field
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Vector Points and Collections
// ============================================================================

/// Point identifier, numeric or string-keyed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Str(String),
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self {
        Self::Num(n)
    }
}

impl From<String> for PointId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A vector with an identifier and payload, ready for upsert.
///
/// The vector length must match the target collection's declared
/// dimensionality or the write is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

impl VectorPoint {
    /// Create a new point with an empty payload
    pub fn new(id: impl Into<PointId>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            payload: HashMap::new(),
        }
    }

    /// Attach a payload field
    pub fn with_payload(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Distance metric used to rank nearest neighbors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
    Euclid,
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::Euclid => write!(f, "euclid"),
        }
    }
}

impl std::str::FromStr for Distance {
    type Err = GranaryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "euclid" | "euclidean" | "l2" => Ok(Self::Euclid),
            _ => Err(GranaryError::ConfigError(format!(
                "unknown distance metric: {s}"
            ))),
        }
    }
}

/// Descriptor for a collection: name, dimensionality, and metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: usize,
    pub distance: Distance,
}

impl CollectionSpec {
    /// Create a new collection spec
    pub fn new(name: impl Into<String>, dimension: usize, distance: Distance) -> Self {
        Self {
            name: name.into(),
            dimension,
            distance,
        }
    }
}

/// A search hit: point id, similarity score, and stored payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Payload Filters
// ============================================================================

/// A single filter condition on a named payload field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Field equals value
    Eq {
        field: String,
        value: serde_json::Value,
    },
    /// Numeric range on a field. `gt`/`lt` bounds are exclusive,
    /// `gte`/`lte` inclusive.
    Range {
        field: String,
        gt: Option<f64>,
        gte: Option<f64>,
        lt: Option<f64>,
        lte: Option<f64>,
    },
}

/// Conjunction of conditions a payload must satisfy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub must: Vec<Condition>,
}

impl PayloadFilter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.must.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require `field < bound` (exclusive)
    pub fn lt(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.must.push(Condition::Range {
            field: field.into(),
            gt: None,
            gte: None,
            lt: Some(bound),
            lte: None,
        });
        self
    }

    /// Require `field > bound` (exclusive)
    pub fn gt(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.must.push(Condition::Range {
            field: field.into(),
            gt: Some(bound),
            gte: None,
            lt: None,
            lte: None,
        });
        self
    }

    /// Require `field >= bound`
    pub fn gte(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.must.push(Condition::Range {
            field: field.into(),
            gt: None,
            gte: Some(bound),
            lt: None,
            lte: None,
        });
        self
    }

    /// Require `field <= bound`
    pub fn lte(mut self, field: impl Into<String>, bound: f64) -> Self {
        self.must.push(Condition::Range {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: Some(bound),
        });
        self
    }

    /// Whether the filter has no conditions
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// Evaluate the filter against a payload. A condition on a missing
    /// or non-numeric field (for range conditions) does not match.
    pub fn matches(&self, payload: &HashMap<String, serde_json::Value>) -> bool {
        self.must.iter().all(|cond| match cond {
            Condition::Eq { field, value } => payload.get(field) == Some(value),
            Condition::Range {
                field,
                gt,
                gte,
                lt,
                lte,
            } => {
                let Some(n) = payload.get(field).and_then(|v| v.as_f64()) else {
                    return false;
                };
                gt.map_or(true, |b| n > b)
                    && gte.map_or(true, |b| n >= b)
                    && lt.map_or(true, |b| n < b)
                    && lte.map_or(true, |b| n <= b)
            }
        })
    }
}

// ============================================================================
// Fetch Reports
// ============================================================================

/// One adapter's failure, recorded instead of thrown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Adapter name
    pub adapter: String,
    /// What went wrong
    pub message: String,
}

/// Aggregated outcome of a collection run across all enabled adapters.
///
/// Partial ingestion is a normal outcome: some adapters succeed, some
/// fail, and the failures are reported here rather than aborting siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchReport {
    /// Documents gathered from all successful adapters
    pub documents: Vec<SourceDocument>,
    /// Adapter-level failures
    pub failures: Vec<SourceFailure>,
}

impl FetchReport {
    /// Whether nothing at all was gathered or attempted
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.failures.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_builder() {
        let doc = SourceDocument::new("notes.txt", "hello")
            .with_meta("filename", "notes.txt")
            .with_meta("size", 5);

        assert_eq!(doc.id, "notes.txt");
        assert_eq!(
            doc.metadata.get("filename"),
            Some(&serde_json::json!("notes.txt"))
        );
    }

    #[test]
    fn test_distance_parse() {
        assert_eq!("cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("Dot".parse::<Distance>().unwrap(), Distance::Dot);
        assert_eq!("euclidean".parse::<Distance>().unwrap(), Distance::Euclid);
        assert!("hamming".parse::<Distance>().is_err());
    }

    #[test]
    fn test_point_id_display() {
        assert_eq!(PointId::from(42u64).to_string(), "42");
        assert_eq!(PointId::from("doc-1").to_string(), "doc-1");
    }

    #[test]
    fn test_filter_eq() {
        let filter = PayloadFilter::new().eq("color", "red");

        let mut payload = HashMap::new();
        payload.insert("color".to_string(), serde_json::json!("red"));
        assert!(filter.matches(&payload));

        payload.insert("color".to_string(), serde_json::json!("blue"));
        assert!(!filter.matches(&payload));
    }

    #[test]
    fn test_filter_lt_excludes_boundary() {
        // "field < 3" must exclude a payload where field == 3
        let filter = PayloadFilter::new().lt("rand_number", 3.0);

        let mut payload = HashMap::new();
        payload.insert("rand_number".to_string(), serde_json::json!(2));
        assert!(filter.matches(&payload));

        payload.insert("rand_number".to_string(), serde_json::json!(3));
        assert!(!filter.matches(&payload));
    }

    #[test]
    fn test_filter_missing_field() {
        let filter = PayloadFilter::new().gte("rank", 1.0);
        assert!(!filter.matches(&HashMap::new()));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = PayloadFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&HashMap::new()));
    }

    #[test]
    fn test_fetch_report_default() {
        let report = FetchReport::default();
        assert!(report.is_empty());
    }
}
