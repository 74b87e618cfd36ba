use fmauth_cloud::SecretsError;
use fmauth_common::TransportError;
use thiserror::Error;

/// Legacy Data API failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LegacyApiError {
    /// The session endpoint refused the connection credentials.
    #[error("Legacy API authentication failed")]
    AuthenticationFailed,

    /// No valid session token is held.
    #[error("Legacy API session expired")]
    TokenExpired,

    /// The lookup matched no records.
    #[error("Record not found")]
    RecordNotFound,

    /// The request was rejected before it was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A server-side script failed.
    #[error("Script error: {0}")]
    Script(String),

    /// Record creation was rejected.
    #[error("Submission failed")]
    SubmissionFailed,

    /// The response could not be interpreted.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transport failure; `Unauthorized` means the session token was rejected.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connection secret could not be obtained.
    #[error(transparent)]
    Secrets(#[from] SecretsError),
}

/// Result type for legacy API operations.
pub type Result<T> = std::result::Result<T, LegacyApiError>;

impl LegacyApiError {
    /// Whether the server rejected the session token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, LegacyApiError::Transport(TransportError::Unauthorized))
    }
}
