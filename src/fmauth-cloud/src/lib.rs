//! Cloud-side links of the credential chain.
//!
//! - [`CredentialBroker`] trades the identity-provider id token for
//!   temporary cloud credentials through the identity pool.
//! - [`SecretsClient`] uses those credentials to fetch the legacy API
//!   connection secret from the secrets service with a signed request.
//!
//! Both keep their state in memory only, behind one async mutex each, so
//! concurrent callers coalesce onto a single refresh.

mod broker;
mod credentials;
mod error;
mod secrets;

pub use broker::CredentialBroker;
pub use credentials::{CloudCredentials, LegacyCredentials};
pub use error::{CloudCredentialsError, SecretsError};
pub use secrets::SecretsClient;

/// Value of `X-Amz-Target` for the identity-id lookup.
pub const GET_ID_TARGET: &str = "AWSCognitoIdentityService.GetId";

/// Value of `X-Amz-Target` for the temporary credentials exchange.
pub const GET_CREDENTIALS_TARGET: &str = "AWSCognitoIdentityService.GetCredentialsForIdentity";

/// Value of `X-Amz-Target` for secret retrieval.
pub const GET_SECRET_VALUE_TARGET: &str = "secretsmanager.GetSecretValue";

/// Pull a human-readable message out of an AWS JSON error body.
pub(crate) fn aws_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("Message")))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// The `__type` discriminator of an AWS JSON error body.
pub(crate) fn aws_error_type(body: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
    parsed
        .get("__type")
        .and_then(|t| t.as_str())
        .map(str::to_string)
}
