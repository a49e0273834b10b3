//! Error types for taskminder.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    /// Notification channel failure (missing tool, non-zero exit).
    #[error("notification error: {0}")]
    Notify(String),

    /// Rejected at the input boundary (empty text, bad priority).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
