//! Database adapter
//!
//! Pulls (content, id, metadata) rows from a PostgreSQL document table.
//! Rows that fail conversion are logged and skipped; the query itself
//! failing fails the adapter.

use async_trait::async_trait;
use granary_core::{GranaryError, Result, SourceDocument};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::warn;

use crate::SourceAdapter;

/// Fetches documents from a relational document table
pub struct DatabaseSource {
    pool: PgPool,
    table: String,
}

impl DatabaseSource {
    /// Connect to the database and target a document table with
    /// `content`, `id`, and `metadata` columns.
    pub async fn connect(database_url: &str, table: impl Into<String>) -> Result<Self> {
        let table = table.into();

        // The table name is interpolated into the query, so restrict it
        // to plain identifiers.
        if !is_identifier(&table) {
            return Err(GranaryError::ConfigError(format!(
                "invalid table name: {table}"
            )));
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| {
                GranaryError::ConnectionError(format!("database connection failed: {e}"))
            })?;

        Ok(Self { pool, table })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[async_trait]
impl SourceAdapter for DatabaseSource {
    fn name(&self) -> &str {
        "database"
    }

    async fn fetch(&self) -> Result<Vec<SourceDocument>> {
        let query = format!("SELECT content, id, metadata FROM {}", self.table);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GranaryError::SourceError {
                adapter: self.name().to_string(),
                message: format!("document query failed: {e}"),
            })?;

        let mut documents = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let content: String = match row.try_get("content") {
                Ok(content) => content,
                Err(e) => {
                    warn!(row = index, error = %e, "skipping row without text content");
                    continue;
                }
            };
            let id: String = match row.try_get("id") {
                Ok(id) => id,
                Err(e) => {
                    warn!(row = index, error = %e, "skipping row without string id");
                    continue;
                }
            };

            let mut doc = SourceDocument::new(id, content).with_meta("source", self.table.clone());

            if let Ok(metadata) = row.try_get::<serde_json::Value, _>("metadata") {
                if let Some(obj) = metadata.as_object() {
                    for (k, v) in obj {
                        doc.metadata.insert(k.clone(), v.clone());
                    }
                }
            }

            documents.push(doc);
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_identifier("documents"));
        assert!(is_identifier("doc_table_2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("docs; DROP TABLE users"));
        assert!(!is_identifier("docs.public"));
    }
}
