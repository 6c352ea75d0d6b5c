use thiserror::Error;

/// Message shown to users when a request fails for reasons other than bad input.
pub const UNABLE_TO_ANSWER: &str = "Unable to answer this question right now.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Failures of an external capability (embedding or generation).
    pub fn is_provider(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Generation(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Text suitable for an end user. Input errors are explained; anything
    /// else collapses to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => msg.clone(),
            _ => UNABLE_TO_ANSWER.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
