//! Error taxonomy for API calls

use thiserror::Error;

/// Message used when the API answers with something we cannot make sense of
pub const API_DOWN_MESSAGE: &str =
    "The API seems to be down, or sending back invalid responses, please try again later.";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success status or a payload that does not deserialize
    #[error("{message}")]
    InvalidResponse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0}")]
    Ratelimited(String),

    #[error("Client update required: {0}")]
    ClientUpdateRequired(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    pub fn invalid_response(message: impl Into<String>) -> Self {
        ApiError::InvalidResponse {
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_payload(source: serde_json::Error) -> Self {
        ApiError::InvalidResponse {
            message: API_DOWN_MESSAGE.to_string(),
            source: Some(Box::new(source)),
        }
    }
}
