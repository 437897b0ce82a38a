//! # Webhook Ingest Core
//!
//! Domain logic for the two-stage webhook ingestion pipeline.
//!
//! The receiver stage forwards raw webhook bodies to a [`MessageSink`]; the
//! processor stage turns each queued message into a [`WebhookRecord`] and hands
//! it to a [`RowStore`]. Both collaborators are traits so the pipeline can run
//! against the in-memory [`adapters`] in tests or against real backends wired
//! in at startup.
//!
//! ## Usage
//!
//! ```rust
//! use webhook_ingest_core::{TableRef, TopicName};
//!
//! let topic = TopicName::new("webhook-events").unwrap();
//! let table = TableRef::new("my-project", "webhooks", "events").unwrap();
//! assert_eq!(topic.as_str(), "webhook-events");
//! assert_eq!(table.to_string(), "my-project.webhooks.events");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod adapters;
pub mod payload;
pub mod projector;
pub mod sink;
pub mod store;

pub use payload::{QueuedMessage, WebhookPayload, WebhookRecord};
pub use projector::{ProjectionError, ProjectionOutcome, ProjectorStats, RecordProjector};
pub use sink::{MessageSink, SinkError};
pub use store::{RowStore, StoreError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier assigned by the message sink to a published message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Create a message ID, rejecting empty values
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Generate a random message ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Cloud project identifier shared by the topic and the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project ID
    ///
    /// Project IDs end up in request paths, so slashes and whitespace are
    /// rejected. Domain-scoped IDs (`example.com:project`) are allowed.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "project_id".to_string(),
            });
        }

        if value.chars().any(|c| c == '/' || c.is_whitespace()) {
            return Err(ValidationError::InvalidCharacters {
                field: "project_id".to_string(),
                invalid_chars: "'/' or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated publish/subscribe topic name
///
/// Follows Pub/Sub resource naming: 3-255 characters, starting with a letter,
/// made of letters, digits and `-_.~+%`, and not starting with `goog`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicName(String);

impl TopicName {
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 255;

    /// Create a topic name with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "topic_id".to_string(),
            });
        }

        if value.len() < Self::MIN_LENGTH {
            return Err(ValidationError::TooShort {
                field: "topic_id".to_string(),
                min_length: Self::MIN_LENGTH,
            });
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "topic_id".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !value.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "topic_id".to_string(),
                message: "must start with a letter".to_string(),
            });
        }

        if value.to_ascii_lowercase().starts_with("goog") {
            return Err(ValidationError::InvalidFormat {
                field: "topic_id".to_string(),
                message: "must not start with 'goog'".to_string(),
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.~+%".contains(c))
        {
            return Err(ValidationError::InvalidCharacters {
                field: "topic_id".to_string(),
                invalid_chars: "only letters, digits and '-_.~+%' allowed".to_string(),
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TopicName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Fully-qualified warehouse table reference (`project.dataset.table`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    project: ProjectId,
    dataset: String,
    table: String,
}

impl TableRef {
    pub const MAX_ID_LENGTH: usize = 1024;

    /// Create a table reference, validating the dataset and table IDs
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let project = ProjectId::new(project)?;
        let dataset = Self::validate_id("dataset_id", dataset.into(), false)?;
        let table = Self::validate_id("table_id", table.into(), true)?;
        Ok(Self {
            project,
            dataset,
            table,
        })
    }

    fn validate_id(
        field: &str,
        value: String,
        allow_dash: bool,
    ) -> Result<String, ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }

        if value.len() > Self::MAX_ID_LENGTH {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max_length: Self::MAX_ID_LENGTH,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'))
        {
            return Err(ValidationError::InvalidCharacters {
                field: field.to_string(),
                invalid_chars: if allow_dash {
                    "only letters, digits, '_' and '-' allowed".to_string()
                } else {
                    "only letters, digits and '_' allowed".to_string()
                },
            });
        }

        Ok(value)
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Validation failures for domain identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' is below minimum length of {min_length}")]
    TooShort { field: String, min_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}
