use fmauth_common::TransportError;
use thiserror::Error;

/// Failures while obtaining temporary cloud credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudCredentialsError {
    /// No identity-provider id token is available.
    #[error("Not authenticated - sign in first")]
    NotAuthenticated,

    /// The identity-id lookup was rejected.
    #[error("Identity error: {0}")]
    Identity(String),

    /// The credentials exchange was rejected.
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Transport failure during either exchange.
    #[error("Network error: {0}")]
    Network(#[from] TransportError),
}

/// Failures while fetching the legacy API connection secret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// The secret name is unknown to the service.
    #[error("Secret not found")]
    NotFound,

    /// The caller is not allowed to read the secret.
    #[error("Access denied to secret")]
    AccessDenied,

    /// The envelope or the embedded secret document could not be decoded.
    #[error("Invalid secret format")]
    InvalidSecret,

    /// Transport failure or unexpected status.
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// The backing cloud credentials could not be obtained.
    #[error(transparent)]
    Credentials(#[from] CloudCredentialsError),
}
