use fmauth_cloud::{CloudCredentialsError, SecretsError};
use fmauth_cognito::IdentityError;
use fmauth_common::TransportError;
use fmauth_filemaker::LegacyApiError;
use thiserror::Error;

/// Why a sign-in did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignInError {
    /// The identity provider refused the sign-in; nothing else was contacted.
    #[error("Identity provider sign-in failed: {0}")]
    Identity(#[from] IdentityError),

    /// The identity provider accepted the user but the legacy lookup failed.
    /// The identity session has been signed out again.
    #[error("Legacy user lookup failed: {0}")]
    Legacy(#[from] LegacyApiError),
}

impl SignInError {
    /// Text suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            SignInError::Identity(e) => identity_message(e),
            SignInError::Legacy(e) => legacy_message(e),
        }
    }
}

const NETWORK_MESSAGE: &str = "Unable to reach the server. Check your connection and try again.";

/// User-facing text for an identity-provider failure.
pub fn identity_message(error: &IdentityError) -> String {
    let message = match error {
        IdentityError::InvalidCredentials => "Incorrect email or password.",
        IdentityError::UserNotFound => "No account exists for this email.",
        IdentityError::UserNotConfirmed => {
            "Your account has not been confirmed yet. Check your email for the confirmation link."
        }
        IdentityError::PasswordResetRequired => "You must reset your password before signing in.",
        IdentityError::NewPasswordRequired => "You must set a new password before signing in.",
        IdentityError::InvalidPassword => "The password does not meet the security requirements.",
        IdentityError::CodeMismatch => "The verification code is incorrect.",
        IdentityError::ExpiredCode => "The verification code has expired. Request a new one.",
        IdentityError::RateLimited => "Too many attempts. Wait a moment and try again.",
        IdentityError::Network(_) => NETWORK_MESSAGE,
        IdentityError::Configuration(_) => "The app is not configured correctly. Contact support.",
        IdentityError::Unknown(_) => "Sign-in failed. Please try again.",
    };
    message.to_string()
}

/// User-facing text for a legacy lookup failure.
pub fn legacy_message(error: &LegacyApiError) -> String {
    let message = match error {
        LegacyApiError::RecordNotFound => {
            "Your account is not registered in the system. Contact your administrator."
        }
        LegacyApiError::AuthenticationFailed => {
            "Could not connect to the business system. Please try again later."
        }
        LegacyApiError::TokenExpired | LegacyApiError::Transport(TransportError::Unauthorized) => {
            "Your session with the business system expired. Please sign in again."
        }
        LegacyApiError::Transport(TransportError::Network(_)) => NETWORK_MESSAGE,
        LegacyApiError::Transport(TransportError::Server) => {
            "The business system is unavailable. Please try again later."
        }
        LegacyApiError::Secrets(SecretsError::Credentials(CloudCredentialsError::NotAuthenticated)) => {
            "Your session has ended. Please sign in again."
        }
        LegacyApiError::Secrets(SecretsError::Network(_))
        | LegacyApiError::Secrets(SecretsError::Credentials(CloudCredentialsError::Network(_))) => {
            NETWORK_MESSAGE
        }
        LegacyApiError::Secrets(_) => {
            "Could not retrieve the connection settings. Please try again later."
        }
        LegacyApiError::Validation(_)
        | LegacyApiError::Script(_)
        | LegacyApiError::SubmissionFailed
        | LegacyApiError::InvalidResponse(_)
        | LegacyApiError::Transport(_) => "Could not load your user profile. Please try again.",
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_errors_have_distinct_messages() {
        let errors = [
            IdentityError::InvalidCredentials,
            IdentityError::UserNotFound,
            IdentityError::UserNotConfirmed,
            IdentityError::PasswordResetRequired,
            IdentityError::NewPasswordRequired,
            IdentityError::RateLimited,
            IdentityError::Network(TransportError::Network("timeout".to_string())),
            IdentityError::Configuration("client id is empty".to_string()),
            IdentityError::Unknown("boom".to_string()),
        ];
        let mut messages: Vec<String> = errors.iter().map(identity_message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn test_legacy_messages() {
        assert_eq!(
            SignInError::from(LegacyApiError::RecordNotFound).user_message(),
            "Your account is not registered in the system. Contact your administrator."
        );
        assert_eq!(
            legacy_message(&LegacyApiError::Secrets(SecretsError::Network(
                TransportError::Network("reset".to_string())
            ))),
            NETWORK_MESSAGE
        );
        assert_eq!(
            legacy_message(&LegacyApiError::Secrets(SecretsError::NotFound)),
            "Could not retrieve the connection settings. Please try again later."
        );
        assert_ne!(
            legacy_message(&LegacyApiError::AuthenticationFailed),
            legacy_message(&LegacyApiError::Transport(TransportError::Unauthorized))
        );
    }

    #[test]
    fn test_messages_never_echo_details() {
        let message = SignInError::from(IdentityError::Unknown("internal trace id 42".to_string()))
            .user_message();
        assert!(!message.contains("42"));
    }
}
