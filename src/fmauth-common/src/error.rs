//! Transport-level error taxonomy shared by every HTTP-speaking component.

use thiserror::Error;

/// Failures at the HTTP transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The target URL could not be built or parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with something that is not a usable HTTP response.
    #[error("Invalid response from server")]
    InvalidResponse,

    /// Non-success status not covered by a more specific variant.
    #[error("HTTP error {status}: {}", message.as_deref().unwrap_or("no message"))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Body or server-provided message, if any.
        message: Option<String>,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decoding(String),

    /// Connection, timeout or other transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 401: the presented credential was rejected.
    #[error("Unauthorized - credential rejected by server")]
    Unauthorized,

    /// HTTP 5xx.
    #[error("Server error - please try again later")]
    Server,

    /// The server returned an empty body where data was required.
    #[error("No data received from server")]
    NoData,
}

impl TransportError {
    /// Classify a non-success status code.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => TransportError::Unauthorized,
            500..=599 => TransportError::Server,
            _ => TransportError::Http {
                status,
                message: if body.is_empty() {
                    None
                } else {
                    Some(body.to_string())
                },
            },
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decoding(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decoding(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        TransportError::InvalidUrl(err.to_string())
    }
}
