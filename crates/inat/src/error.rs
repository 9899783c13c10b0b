//! Error types for the iNaturalist client.

use bioquest_core::errors::SourceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, INatError>;

#[derive(Debug, Error)]
pub enum INatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx response from the API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl INatError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<INatError> for SourceError {
    fn from(err: INatError) -> Self {
        match err {
            INatError::Api { status, message } => SourceError::Api { status, message },
            INatError::Http(err) => match err.status() {
                Some(status) => SourceError::api(status.as_u16(), err.to_string()),
                None => SourceError::Network(err.to_string()),
            },
            INatError::Json(err) => SourceError::InvalidResponse(err.to_string()),
            INatError::InvalidRequest(message) => {
                SourceError::InvalidResponse(format!("invalid request: {message}"))
            }
            INatError::Auth(message) => SourceError::Auth(message),
        }
    }
}
