//! Upstream text generation errors

use thiserror::Error;

/// Errors that can occur while calling the text generation service
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Short label used in log records
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::ApiError { .. } => "api",
            LlmError::Network(_) => "network",
            LlmError::InvalidResponse(_) => "invalid_response",
        }
    }
}
