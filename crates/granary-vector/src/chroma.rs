//! Chroma implementation of [`DocumentStore`]
//!
//! Talks to a Chroma server over its REST API. Documents are sent as
//! parallel ids/documents/metadatas arrays and embedded server-side, so
//! queries are by text rather than by raw vector.

use async_trait::async_trait;
use granary_core::{Condition, GranaryError, PayloadFilter, Result, SourceDocument};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{CollectionHandle, DocumentHit, DocumentStore};

/// Chroma-backed document store
pub struct ChromaStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    query_texts: Vec<String>,
    n_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#where: Option<serde_json::Value>,
}

/// Chroma nests results one list per query text; we always send one.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
}

impl ChromaStore {
    /// Create a client for a Chroma server
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle> {
        let response = self
            .client
            .get(format!("{}/{name}", self.collections_url()))
            .send()
            .await
            .map_err(|e| GranaryError::StoreError(format!("get collection failed: {e}")))?;

        if !response.status().is_success() {
            return Err(GranaryError::NotFound(format!("collection '{name}'")));
        }

        let collection: CollectionResponse = response
            .json()
            .await
            .map_err(|e| GranaryError::StoreError(format!("cannot parse collection: {e}")))?;

        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
        })
    }
}

/// Translate a [`PayloadFilter`] into a Chroma `where` clause.
/// A single condition stays bare; multiple conditions nest under `$and`.
fn to_where_clause(filter: &PayloadFilter) -> Option<serde_json::Value> {
    let mut clauses: Vec<serde_json::Value> = Vec::new();

    for cond in &filter.must {
        match cond {
            Condition::Eq { field, value } => {
                clauses.push(json!({ field: { "$eq": value } }));
            }
            Condition::Range {
                field,
                gt,
                gte,
                lt,
                lte,
            } => {
                if let Some(b) = gt {
                    clauses.push(json!({ field: { "$gt": b } }));
                }
                if let Some(b) = gte {
                    clauses.push(json!({ field: { "$gte": b } }));
                }
                if let Some(b) = lt {
                    clauses.push(json!({ field: { "$lt": b } }));
                }
                if let Some(b) = lte {
                    clauses.push(json!({ field: { "$lte": b } }));
                }
            }
        }
    }

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$and": clauses })),
    }
}

fn flatten_response(response: QueryResponse) -> Vec<DocumentHit> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| DocumentHit {
            id,
            document: documents.get(i).cloned().flatten(),
            distance: distances.get(i).copied(),
            metadata: metadatas.get(i).cloned().flatten(),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for ChromaStore {
    async fn ensure_collection(&self, name: &str) -> Result<CollectionHandle> {
        let response = self
            .client
            .post(self.collections_url())
            .json(&CreateCollectionRequest { name })
            .send()
            .await
            .map_err(|e| GranaryError::StoreError(format!("create collection failed: {e}")))?;

        if response.status().is_success() {
            let collection: CollectionResponse = response
                .json()
                .await
                .map_err(|e| GranaryError::StoreError(format!("cannot parse collection: {e}")))?;

            info!(collection = %name, "created collection");
            return Ok(CollectionHandle {
                id: collection.id,
                name: collection.name,
            });
        }

        // Creation refused, most likely because the collection exists.
        // Fall back to opening it; error only if that fails too.
        let status = response.status();
        match self.get_collection(name).await {
            Ok(handle) => {
                info!(collection = %name, "collection already exists");
                Ok(handle)
            }
            Err(_) => Err(GranaryError::StoreError(format!(
                "failed to create collection '{name}' (HTTP {status}) and no existing collection found"
            ))),
        }
    }

    async fn add_documents(
        &self,
        collection: &CollectionHandle,
        documents: &[SourceDocument],
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let request = UpsertRequest {
            ids: documents.iter().map(|d| d.id.clone()).collect(),
            documents: documents.iter().map(|d| d.content.clone()).collect(),
            metadatas: documents
                .iter()
                .map(|d| d.metadata.clone().into_iter().collect())
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/{}/upsert", self.collections_url(), collection.id))
            .json(&request)
            .send()
            .await
            .map_err(|e| GranaryError::StoreError(format!("upsert failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GranaryError::StoreError(format!(
                "upsert returned {status}: {body}"
            )));
        }

        info!(collection = %collection.name, count = documents.len(), "upserted documents");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        text: &str,
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<DocumentHit>> {
        let request = QueryRequest {
            query_texts: vec![text.to_string()],
            n_results: k,
            r#where: filter.and_then(to_where_clause),
        };

        let response = self
            .client
            .post(format!("{}/{}/query", self.collections_url(), collection.id))
            .json(&request)
            .send()
            .await
            .map_err(|e| GranaryError::StoreError(format!("query failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GranaryError::StoreError(format!(
                "query returned {status}"
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| GranaryError::StoreError(format!("cannot parse query response: {e}")))?;

        Ok(flatten_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_single_condition_stays_bare() {
        let clause = to_where_clause(&PayloadFilter::new().lt("rand_number", 3.0)).unwrap();
        assert_eq!(clause, json!({ "rand_number": { "$lt": 3.0 } }));
    }

    #[test]
    fn test_where_clause_multiple_conditions_use_and() {
        let clause =
            to_where_clause(&PayloadFilter::new().eq("color", "red").lt("rank", 5.0)).unwrap();

        assert_eq!(
            clause,
            json!({ "$and": [
                { "color": { "$eq": "red" } },
                { "rank": { "$lt": 5.0 } }
            ]})
        );
    }

    #[test]
    fn test_where_clause_empty_filter_is_none() {
        assert!(to_where_clause(&PayloadFilter::new()).is_none());
    }

    #[test]
    fn test_flatten_query_response() {
        let json = r#"{
            "ids": [["a.txt", "b.txt"]],
            "documents": [["alpha", null]],
            "distances": [[0.1, 0.4]],
            "metadatas": [[{"filename": "a.txt"}, null]]
        }"#;

        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        let hits = flatten_response(parsed);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a.txt");
        assert_eq!(hits[0].document.as_deref(), Some("alpha"));
        assert_eq!(hits[0].distance, Some(0.1));
        assert!(hits[1].document.is_none());
        assert!(hits[1].metadata.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = ChromaStore::new("http://localhost:8000/");
        assert_eq!(
            store.collections_url(),
            "http://localhost:8000/api/v1/collections"
        );
    }
}
