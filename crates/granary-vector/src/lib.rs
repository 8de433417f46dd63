//! Granary Vector - Vector-store client wrappers
//!
//! Two wrappers over remote stores, behind traits at the seams:
//! - [`VectorStore`] for a dedicated vector-search engine (Qdrant),
//!   operating on raw vectors with payloads.
//! - [`DocumentStore`] for a document-oriented store (Chroma) that embeds
//!   text server-side and queries by text.
//!
//! Every remote call wraps its failure with operation context so callers
//! can log and continue; one failed operation never blocks siblings.

use async_trait::async_trait;
use granary_core::{
    CollectionSpec, PayloadFilter, Result, ScoredPoint, SourceDocument, VectorPoint,
};
use serde::{Deserialize, Serialize};

pub mod chroma;
pub mod qdrant;

pub use chroma::ChromaStore;
pub use qdrant::QdrantStore;

/// Operations against a vector-search engine
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection; if it already exists, open the existing one.
    /// Errors only if both creating and opening fail.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Write a batch of points, idempotent by id. Points whose vector
    /// length does not match the collection dimensionality are rejected.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Return at most `k` nearest points under the collection's metric,
    /// optionally restricted by a payload filter.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;
}

/// Handle to a document collection (Chroma addresses collections by id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// A document-level query hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub document: Option<String>,
    pub distance: Option<f32>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Operations against a document-oriented vector store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the named collection, falling back to the existing one
    async fn ensure_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Upsert documents by id (parallel ids/documents/metadatas)
    async fn add_documents(
        &self,
        collection: &CollectionHandle,
        documents: &[SourceDocument],
    ) -> Result<()>;

    /// Query by text, returning at most `k` hits ordered by ascending
    /// distance, optionally restricted by a metadata filter
    async fn query(
        &self,
        collection: &CollectionHandle,
        text: &str,
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<DocumentHit>>;
}
