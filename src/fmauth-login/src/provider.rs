//! Seams between the orchestrator and the concrete clients.

use async_trait::async_trait;

use fmauth_cloud::{CredentialBroker, SecretsClient};
use fmauth_cognito::{CognitoClient, IdentityError, UserAttributes};
use fmauth_filemaker::{FileMakerSession, LegacyApiError, LegacyUser};

/// The password-authenticating identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, username: &str, password: &str)
    -> Result<UserAttributes, IdentityError>;

    /// Drop the local session and revoke it remotely, best effort.
    async fn sign_out(&self);

    async fn forgot_password(&self, username: &str) -> Result<(), IdentityError>;

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError>;

    /// `false` when there is nothing to refresh or the refresh failed.
    async fn refresh_tokens(&self) -> bool;

    /// Local check only.
    fn is_authenticated(&self) -> bool;
}

/// Where signed-in users are looked up after identity verification.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<LegacyUser, LegacyApiError>;

    /// Non-critical; implementations log and swallow failures.
    async fn update_login_time(&self, record_id: &str);
}

/// A credential cache that must be emptied on sign-out.
#[async_trait]
pub trait SessionCache: Send + Sync {
    fn name(&self) -> &'static str;

    async fn clear(&self);
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserAttributes, IdentityError> {
        CognitoClient::sign_in(self, username, password).await
    }

    async fn sign_out(&self) {
        CognitoClient::sign_out(self).await
    }

    async fn forgot_password(&self, username: &str) -> Result<(), IdentityError> {
        CognitoClient::forgot_password(self, username).await
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        CognitoClient::confirm_forgot_password(self, username, code, new_password).await
    }

    async fn refresh_tokens(&self) -> bool {
        CognitoClient::refresh_tokens(self).await
    }

    fn is_authenticated(&self) -> bool {
        CognitoClient::is_authenticated(self)
    }
}

#[async_trait]
impl UserDirectory for FileMakerSession {
    async fn find_user_by_email(&self, email: &str) -> Result<LegacyUser, LegacyApiError> {
        FileMakerSession::find_user_by_email(self, email).await
    }

    async fn update_login_time(&self, record_id: &str) {
        FileMakerSession::update_login_time(self, record_id).await
    }
}

#[async_trait]
impl SessionCache for CredentialBroker {
    fn name(&self) -> &'static str {
        "cloud credentials"
    }

    async fn clear(&self) {
        self.clear_credentials().await
    }
}

#[async_trait]
impl SessionCache for SecretsClient {
    fn name(&self) -> &'static str {
        "legacy API secret"
    }

    async fn clear(&self) {
        self.clear_cache().await
    }
}

#[async_trait]
impl SessionCache for FileMakerSession {
    fn name(&self) -> &'static str {
        "legacy API session"
    }

    async fn clear(&self) {
        self.clear_token().await
    }
}
