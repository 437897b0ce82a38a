//! Configuration types for the receiver and processor services.
//!
//! Sources are layered with the `config` crate, later sources overriding
//! earlier ones:
//!
//! 1. `config/ingest.{toml,yaml,json}` in the working directory (optional)
//! 2. An explicit file, usually from `INGEST_CONFIG_FILE` (required if given)
//! 3. The flat deployment variables
//!    `GCP_PROJECT_ID`, `PUBSUB_TOPIC_ID`, `BIGQUERY_DATASET_ID`,
//!    `BIGQUERY_TABLE_ID`, `PUBSUB_EMULATOR_HOST` and `PORT`
//! 4. Variables prefixed `INGEST__` with `__` as the nesting separator,
//!    e.g. `INGEST__SERVER__PORT=9090`
//!
//! Every field has a default, so loading never fails on absent settings.
//! Required settings are checked afterwards by [`ReceiverSettings::from_config`]
//! and [`ProcessorSettings::from_config`].

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use webhook_ingest_core::{ProjectId, TableRef, TopicName};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Flat variable names and the nested keys they set
const LEGACY_VARIABLES: &[(&str, &str)] = &[
    ("GCP_PROJECT_ID", "GCP__PROJECT_ID"),
    ("PUBSUB_TOPIC_ID", "GCP__TOPIC_ID"),
    ("BIGQUERY_DATASET_ID", "GCP__DATASET_ID"),
    ("BIGQUERY_TABLE_ID", "GCP__TABLE_ID"),
    ("PUBSUB_EMULATOR_HOST", "GCP__PUBSUB_EMULATOR_HOST"),
    ("PORT", "SERVER__PORT"),
];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Message sink and row store settings
    pub gcp: GcpConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum accepted request body in bytes
    pub max_body_size: usize,

    /// Time allowed for in-flight requests after a shutdown signal
    pub shutdown_timeout_seconds: u64,

    /// Enable permissive CORS on `/health` and `/metrics`
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
            shutdown_timeout_seconds: 30,
            enable_cors: false,
        }
    }
}

/// Which collaborator implementations to wire in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Pub/Sub and BigQuery
    #[default]
    Gcp,

    /// In-process sink and store, for local runs
    Memory,
}

/// Message sink and row store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    pub backend: Backend,

    /// Project owning the topic and the dataset
    pub project_id: Option<String>,

    /// Topic the receiver publishes to
    pub topic_id: Option<String>,

    /// Dataset and table the processor writes to
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,

    pub pubsub_endpoint: String,

    /// `host:port` of a Pub/Sub emulator; disables authentication for Pub/Sub
    pub pubsub_emulator_host: Option<String>,

    pub bigquery_endpoint: String,

    /// Fixed bearer token; when absent tokens come from the metadata server
    pub access_token: Option<String>,

    /// Timeout for each outgoing API request
    pub request_timeout_seconds: u64,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            project_id: None,
            topic_id: None,
            dataset_id: None,
            table_id: None,
            pubsub_endpoint: "https://pubsub.googleapis.com".to_string(),
            pubsub_emulator_host: None,
            bigquery_endpoint: "https://bigquery.googleapis.com".to_string(),
            access_token: None,
            request_timeout_seconds: 30,
        }
    }
}

impl fmt::Debug for GcpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpConfig")
            .field("backend", &self.backend)
            .field("project_id", &self.project_id)
            .field("topic_id", &self.topic_id)
            .field("dataset_id", &self.dataset_id)
            .field("table_id", &self.table_id)
            .field("pubsub_endpoint", &self.pubsub_endpoint)
            .field("pubsub_emulator_host", &self.pubsub_emulator_host)
            .field("bigquery_endpoint", &self.bigquery_endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Where to read configuration from
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Explicit configuration file; must exist when set
    pub file: Option<PathBuf>,

    /// Environment to read instead of the process environment
    pub environment: Option<HashMap<String, String>>,
}

impl ServiceConfig {
    /// Load configuration from files and environment variables.
    pub fn load(sources: ConfigSources) -> Result<Self, ConfigError> {
        let environment = match sources.environment {
            Some(environment) => environment,
            None => std::env::vars().collect(),
        };

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/ingest").required(false));

        if let Some(path) = &sources.file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let legacy: HashMap<String, String> = LEGACY_VARIABLES
            .iter()
            .filter_map(|(flat, nested)| {
                environment
                    .get(*flat)
                    .filter(|value| !value.is_empty())
                    .map(|value| (nested.to_string(), value.clone()))
            })
            .collect();

        let settings = builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .source(Some(legacy)),
            )
            .add_source(
                config::Environment::with_prefix("INGEST")
                    .separator("__")
                    .source(Some(environment)),
            )
            .build()
            .map_err(|e| ConfigError::Parsing {
                message: e.to_string(),
            })?;

        let config: ServiceConfig = settings.try_deserialize().map_err(|e| ConfigError::Parsing {
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check values that are present but unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        if self.gcp.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "gcp.request_timeout_seconds must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ConfigError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing {
            key: key.to_string(),
        }),
    }
}

/// Validated settings required to run the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverSettings {
    pub project: ProjectId,
    pub topic: TopicName,
}

impl ReceiverSettings {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let project = required(&config.gcp.project_id, "gcp.project_id (GCP_PROJECT_ID)")?;
        let topic = required(&config.gcp.topic_id, "gcp.topic_id (PUBSUB_TOPIC_ID)")?;

        Ok(Self {
            project: ProjectId::new(project)?,
            topic: TopicName::new(topic)?,
        })
    }
}

/// Validated settings required to run the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub table: TableRef,
}

impl ProcessorSettings {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let project = required(&config.gcp.project_id, "gcp.project_id (GCP_PROJECT_ID)")?;
        let dataset = required(&config.gcp.dataset_id, "gcp.dataset_id (BIGQUERY_DATASET_ID)")?;
        let table = required(&config.gcp.table_id, "gcp.table_id (BIGQUERY_TABLE_ID)")?;

        Ok(Self {
            table: TableRef::new(project, dataset, table)?,
        })
    }
}
