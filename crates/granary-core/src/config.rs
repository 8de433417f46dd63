//! Granary Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for local development. Credentials are read at
//! startup; a missing credential fails only the adapter that needs it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Distance;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Document-oriented vector store (Chroma)
    pub chroma: ChromaConfig,

    /// Vector-search engine (Qdrant)
    pub qdrant: QdrantConfig,

    /// Source adapter credentials and limits
    pub sources: SourcesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Chroma
        if let Ok(url) = std::env::var("CHROMA_URL") {
            config.chroma.url = url;
        }
        if let Ok(name) = std::env::var("CHROMA_COLLECTION") {
            config.chroma.collection = name;
        }

        // Qdrant
        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.qdrant.url = url;
        }
        if let Ok(key) = std::env::var("QDRANT_API_KEY") {
            config.qdrant.api_key = Some(key);
        }
        if let Ok(name) = std::env::var("QDRANT_COLLECTION") {
            config.qdrant.collection = name;
        }
        if let Ok(dim) = std::env::var("VECTOR_DIMENSION") {
            config.qdrant.dimension = dim.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VECTOR_DIMENSION".to_string(),
                value: dim,
            })?;
        }
        if let Ok(metric) = std::env::var("DISTANCE_METRIC") {
            config.qdrant.distance =
                metric
                    .parse::<Distance>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "DISTANCE_METRIC".to_string(),
                        value: metric,
                    })?;
        }

        // Source credentials
        if let Ok(token) = std::env::var("DROPBOX_ACCESS_TOKEN") {
            config.sources.dropbox_token = Some(token);
        }
        if let Ok(token) = std::env::var("ONEDRIVE_ACCESS_TOKEN") {
            config.sources.onedrive_token = Some(token);
        }
        if let Ok(token) = std::env::var("GDRIVE_ACCESS_TOKEN") {
            config.sources.gdrive_token = Some(token);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.sources.database_url = Some(url);
        }
        if let Ok(secs) = std::env::var("FETCH_TIMEOUT_SECS") {
            config.sources.fetch_timeout_secs =
                secs.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "FETCH_TIMEOUT_SECS".to_string(),
                    value: secs,
                })?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Chroma connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    /// Chroma server base URL
    pub url: String,

    /// Default collection name for ingestion
    pub collection: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection: "documents".to_string(),
        }
    }
}

/// Qdrant connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Qdrant gRPC URL
    pub url: String,

    /// API key (cloud deployments)
    pub api_key: Option<String>,

    /// Default collection name
    pub collection: String,

    /// Vector dimension (must match what is upserted)
    pub dimension: usize,

    /// Distance metric for new collections
    pub distance: Distance,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection: "points".to_string(),
            dimension: 100,
            distance: Distance::Cosine,
        }
    }
}

/// Source adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Dropbox access token
    pub dropbox_token: Option<String>,

    /// OneDrive (Microsoft Graph) access token
    pub onedrive_token: Option<String>,

    /// Google Drive access token
    pub gdrive_token: Option<String>,

    /// PostgreSQL connection URL for the database adapter
    pub database_url: Option<String>,

    /// Table holding (content, id, metadata) rows
    pub database_table: String,

    /// Per-adapter fetch timeout in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            dropbox_token: None,
            onedrive_token: None,
            gdrive_token: None,
            database_url: None,
            database_table: "documents".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chroma.url, "http://localhost:8000");
        assert_eq!(config.qdrant.dimension, 100);
        assert_eq!(config.qdrant.distance, Distance::Cosine);
        assert_eq!(config.sources.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [chroma]
            url = "http://chroma:8000"
            collection = "corpus"

            [qdrant]
            url = "http://qdrant:6334"
            collection = "vectors"
            dimension = 384
            distance = "euclid"

            [sources]
            database_table = "docs"
            fetch_timeout_secs = 10

            [logging]
            level = "debug"
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.chroma.collection, "corpus");
        assert_eq!(config.qdrant.dimension, 384);
        assert_eq!(config.qdrant.distance, Distance::Euclid);
        assert_eq!(config.sources.database_table, "docs");
        assert_eq!(config.logging.level, "debug");
    }
}
