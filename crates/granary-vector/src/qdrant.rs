//! Qdrant implementation of [`VectorStore`]
//!
//! Wraps the Qdrant gRPC client: create-or-open collections, batched
//! upserts, and (filtered) nearest-neighbor search.

use std::collections::HashMap;

use async_trait::async_trait;
use granary_core::{
    CollectionSpec, Condition, Distance, GranaryError, PayloadFilter, PointId, QdrantConfig,
    Result, ScoredPoint, VectorPoint,
};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, Condition as QdrantCondition, CreateCollectionBuilder,
    Distance as QdrantDistance, Filter, ListValue, PointStruct, Range, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::info;

/// Qdrant-backed vector store
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to a Qdrant server
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let client = Qdrant::from_url(&config.url)
            .api_key(config.api_key.clone())
            .build()
            .map_err(|e| {
                GranaryError::ConnectionError(format!("Qdrant connection failed: {e}"))
            })?;

        Ok(Self { client })
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| GranaryError::StoreError(format!("failed to list collections: {e}")))?;

        Ok(collections.collections.iter().any(|c| c.name == name))
    }
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
    }
}

/// Reject points whose vector length does not match the collection
/// dimensionality, before anything reaches the wire.
fn check_dimensions(points: &[VectorPoint], expected: usize) -> Result<()> {
    for point in points {
        if point.vector.len() != expected {
            return Err(GranaryError::DimensionMismatch {
                expected,
                got: point.vector.len(),
            });
        }
    }
    Ok(())
}

/// Translate a [`PayloadFilter`] into a Qdrant must-filter.
/// `lt`/`gt` bounds stay exclusive, `lte`/`gte` inclusive.
fn to_qdrant_filter(filter: &PayloadFilter) -> Filter {
    let conditions: Vec<QdrantCondition> = filter
        .must
        .iter()
        .map(|cond| match cond {
            Condition::Eq { field, value } => match value {
                serde_json::Value::Bool(b) => QdrantCondition::matches(field, *b),
                serde_json::Value::Number(n) if n.is_i64() => {
                    QdrantCondition::matches(field, n.as_i64().unwrap_or_default())
                }
                serde_json::Value::String(s) => QdrantCondition::matches(field, s.clone()),
                other => QdrantCondition::matches(field, other.to_string()),
            },
            Condition::Range {
                field,
                gt,
                gte,
                lt,
                lte,
            } => QdrantCondition::range(
                field,
                Range {
                    gt: *gt,
                    gte: *gte,
                    lt: *lt,
                    lte: *lte,
                },
            ),
        })
        .collect();

    Filter::must(conditions)
}

fn to_qdrant_point(point: VectorPoint) -> PointStruct {
    let payload: HashMap<String, Value> = point
        .payload
        .into_iter()
        .map(|(k, v)| (k, v.into()))
        .collect();

    match point.id {
        PointId::Num(n) => PointStruct::new(n, point.vector, payload),
        PointId::Str(s) => PointStruct::new(s, point.vector, payload),
    }
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(ListValue { values })) => {
            serde_json::Value::Array(values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl super::VectorStore for QdrantStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let create = self
            .client
            .create_collection(
                CreateCollectionBuilder::new(&spec.name).vectors_config(VectorParamsBuilder::new(
                    spec.dimension as u64,
                    to_qdrant_distance(spec.distance),
                )),
            )
            .await;

        match create {
            Ok(_) => {
                info!(collection = %spec.name, dimension = spec.dimension, "created collection");
                Ok(())
            }
            // Creation failed; fall back to the existing collection and
            // only surface an error when that is missing too.
            Err(create_err) => {
                if self.collection_exists(&spec.name).await? {
                    info!(collection = %spec.name, "collection already exists");
                    Ok(())
                } else {
                    Err(GranaryError::StoreError(format!(
                        "failed to create collection '{}': {create_err}",
                        spec.name
                    )))
                }
            }
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| GranaryError::StoreError(format!("failed to read collection: {e}")))?;

        // Validate against the declared dimensionality when the server
        // reports one; the server enforces it regardless.
        if let Some(expected) = collection_dimension(&info) {
            check_dimensions(&points, expected)?;
        }

        let count = points.len();
        let points: Vec<PointStruct> = points.into_iter().map(to_qdrant_point).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| GranaryError::StoreError(format!("failed to upsert points: {e}")))?;

        info!(collection = %collection, count, "upserted points");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut request = SearchPointsBuilder::new(collection, vector.to_vec(), k as u64)
            .with_payload(true);

        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            request = request.filter(to_qdrant_filter(filter));
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| GranaryError::StoreError(format!("vector search failed: {e}")))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                let id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Num(n)) => PointId::Num(n),
                    Some(PointIdOptions::Uuid(s)) => PointId::Str(s),
                    None => PointId::Num(0),
                };

                let payload = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, value_to_json(v)))
                    .collect();

                ScoredPoint {
                    id,
                    score: point.score,
                    payload,
                }
            })
            .collect();

        Ok(hits)
    }
}

/// Pull the single-vector dimensionality out of a collection info
/// response, if the collection declares one.
fn collection_dimension(
    info: &qdrant_client::qdrant::GetCollectionInfoResponse,
) -> Option<usize> {
    use qdrant_client::qdrant::vectors_config::Config;

    let params = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;

    match params {
        Config::Params(p) => Some(p.size as usize),
        Config::ParamsMap(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::condition::ConditionOneOf;

    #[test]
    fn test_check_dimensions_accepts_matching() {
        let points = vec![VectorPoint::new(1u64, vec![0.0; 4])];
        assert!(check_dimensions(&points, 4).is_ok());
    }

    #[test]
    fn test_check_dimensions_rejects_mismatch() {
        let points = vec![
            VectorPoint::new(1u64, vec![0.0; 4]),
            VectorPoint::new(2u64, vec![0.0; 3]),
        ];

        let err = check_dimensions(&points, 4).unwrap_err();
        match err {
            GranaryError::DimensionMismatch { expected, got } => {
                assert_eq!(expected, 4);
                assert_eq!(got, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_filter_translation_keeps_lt_exclusive() {
        let filter = to_qdrant_filter(&PayloadFilter::new().lt("rand_number", 3.0));

        assert_eq!(filter.must.len(), 1);
        match &filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert_eq!(field.key, "rand_number");
                let range = field.range.as_ref().unwrap();
                assert_eq!(range.lt, Some(3.0));
                assert_eq!(range.lte, None);
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn test_filter_translation_eq_string() {
        let filter = to_qdrant_filter(&PayloadFilter::new().eq("color", "red"));

        assert_eq!(filter.must.len(), 1);
        assert!(matches!(
            filter.must[0].condition_one_of,
            Some(ConditionOneOf::Field(_))
        ));
    }

    #[test]
    fn test_distance_mapping() {
        assert_eq!(to_qdrant_distance(Distance::Cosine), QdrantDistance::Cosine);
        assert_eq!(to_qdrant_distance(Distance::Dot), QdrantDistance::Dot);
        assert_eq!(to_qdrant_distance(Distance::Euclid), QdrantDistance::Euclid);
    }

    #[test]
    fn test_value_round_trip() {
        let json = serde_json::json!({"color": "red", "rank": 3, "flag": true});
        let value: Value = json.clone().into();
        assert_eq!(value_to_json(value), json);
    }
}
