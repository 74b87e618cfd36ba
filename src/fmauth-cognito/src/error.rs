use fmauth_common::TransportError;
use thiserror::Error;

/// Identity-provider failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User account is not confirmed")]
    UserNotConfirmed,

    #[error("Password reset required")]
    PasswordResetRequired,

    #[error("A new password must be set")]
    NewPasswordRequired,

    #[error("Password does not meet the policy")]
    InvalidPassword,

    #[error("Verification code mismatch")]
    CodeMismatch,

    #[error("Verification code expired")]
    ExpiredCode,

    #[error("Too many attempts")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    #[error("Identity provider is not configured: {0}")]
    Configuration(String),

    #[error("Identity provider error: {0}")]
    Unknown(String),
}

/// Result type for identity-provider operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Which `__type` discriminators an operation recognizes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operation {
    SignIn,
    ForgotPassword,
    ConfirmForgotPassword,
}

impl IdentityError {
    /// Map an error body's `__type` to the operation's closed error set.
    pub(crate) fn classify(operation: Operation, error_type: &str, message: String) -> Self {
        let is = |needle: &str| error_type.contains(needle);
        let rate_limited = is("TooManyRequestsException") || is("LimitExceededException");

        match operation {
            Operation::SignIn if is("NotAuthorizedException") => IdentityError::InvalidCredentials,
            Operation::SignIn if is("UserNotConfirmedException") => IdentityError::UserNotConfirmed,
            Operation::SignIn if is("PasswordResetRequiredException") => {
                IdentityError::PasswordResetRequired
            }
            Operation::ConfirmForgotPassword if is("CodeMismatchException") => {
                IdentityError::CodeMismatch
            }
            Operation::ConfirmForgotPassword if is("ExpiredCodeException") => {
                IdentityError::ExpiredCode
            }
            Operation::ConfirmForgotPassword if is("InvalidPasswordException") => {
                IdentityError::InvalidPassword
            }
            _ if is("UserNotFoundException") => IdentityError::UserNotFound,
            _ if rate_limited => IdentityError::RateLimited,
            _ => IdentityError::Unknown(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_classification() {
        let classify = |t: &str| IdentityError::classify(Operation::SignIn, t, "m".to_string());
        assert_eq!(
            classify("com.amazonaws#NotAuthorizedException"),
            IdentityError::InvalidCredentials
        );
        assert_eq!(classify("UserNotFoundException"), IdentityError::UserNotFound);
        assert_eq!(
            classify("UserNotConfirmedException"),
            IdentityError::UserNotConfirmed
        );
        assert_eq!(
            classify("PasswordResetRequiredException"),
            IdentityError::PasswordResetRequired
        );
        assert_eq!(classify("TooManyRequestsException"), IdentityError::RateLimited);
        assert_eq!(
            classify("InternalErrorException"),
            IdentityError::Unknown("m".to_string())
        );
    }

    #[test]
    fn test_reset_classification() {
        assert_eq!(
            IdentityError::classify(
                Operation::ForgotPassword,
                "LimitExceededException",
                String::new()
            ),
            IdentityError::RateLimited
        );
        assert_eq!(
            IdentityError::classify(
                Operation::ConfirmForgotPassword,
                "ExpiredCodeException",
                String::new()
            ),
            IdentityError::ExpiredCode
        );
        assert_eq!(
            IdentityError::classify(
                Operation::ConfirmForgotPassword,
                "NotAuthorizedException",
                "nope".to_string()
            ),
            IdentityError::Unknown("nope".to_string())
        );
    }
}
