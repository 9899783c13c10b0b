use thiserror::Error;

pub type Result<T> = std::result::Result<T, OfflineQueueError>;

#[derive(Debug, Error)]
pub enum OfflineQueueError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered the replay with a non-2xx status.
    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}
