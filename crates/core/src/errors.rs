//! Error taxonomy shared by every BioQuest crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Retry policy classification for external failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify an HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> RetryClass {
    match status {
        401 | 403 => RetryClass::ReauthRequired,
        408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
        500..=599 => RetryClass::Retryable,
        _ => RetryClass::Permanent,
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bad input shape or range. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Any failure during fetch or persist of a sync run. Retried only by a later trigger.
    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("A sync is already running for user {0}")]
    SyncInFlight(String),

    /// Per-job rarity classification failure.
    #[error("Classification failed for taxon {taxon_id}: {message}")]
    Classification {
        taxon_id: i64,
        message: String,
        transient: bool,
    },

    #[error("Observation source error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Whether the same request may succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sync(_) | Self::SyncInFlight(_) | Self::Database(_) => true,
            Self::Source(err) => err.retry_class() == RetryClass::Retryable,
            Self::Classification { transient, .. } => *transient,
            Self::Validation(_)
            | Self::Unauthorized(_)
            | Self::NotFound(_)
            | Self::Serialization(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("{0}")]
    Internal(String),
}

/// Failures reported by the external observation source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl SourceError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Network(_) => RetryClass::Retryable,
            Self::InvalidResponse(_) => RetryClass::Permanent,
            Self::Auth(_) => RetryClass::ReauthRequired,
        }
    }

    /// Network, rate-limit and server-side failures.
    pub fn is_transient(&self) -> bool {
        self.retry_class() == RetryClass::Retryable
    }
}
