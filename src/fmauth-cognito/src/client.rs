//! Identity-provider client.

use chrono::Duration;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use fmauth_common::http::AMZ_JSON_CONTENT_TYPE;
use fmauth_common::{AuthConfig, SharedClock, TransportError};
use fmauth_secure_store::{SecureStore, SharedStore, StoreKey};

use crate::error::{IdentityError, Operation, Result};
use crate::jwt::UserAttributes;
use crate::models::{
    ConfirmForgotPasswordRequest, ErrorBody, ForgotPasswordRequest, InitiateAuthRequest,
    InitiateAuthResponse, secret_hash,
};
use crate::TARGET_PREFIX;

const PASSWORD_FLOW: &str = "USER_PASSWORD_AUTH";
const REFRESH_FLOW: &str = "REFRESH_TOKEN_AUTH";
const NEW_PASSWORD_CHALLENGE: &str = "NEW_PASSWORD_REQUIRED";

/// Keys owned by the identity-provider session.
const SESSION_KEYS: [StoreKey; 4] = [
    StoreKey::CognitoIdToken,
    StoreKey::CognitoAccessToken,
    StoreKey::CognitoRefreshToken,
    StoreKey::CognitoTokenExpiry,
];

/// Client for the hosted identity provider.
pub struct CognitoClient {
    http: Client,
    endpoint: String,
    user_pool_id: String,
    client_id: String,
    client_secret: Option<SecretString>,
    default_ttl_secs: i64,
    store: SharedStore,
    clock: SharedClock,
}

impl CognitoClient {
    pub fn new(config: &AuthConfig, http: Client, store: SharedStore, clock: SharedClock) -> Self {
        Self {
            http,
            endpoint: config.identity_provider_url(),
            user_pool_id: config.user_pool_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            default_ttl_secs: config.ttl.default_id_token_secs,
            store,
            clock,
        }
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.user_pool_id.trim().is_empty() {
            return Err(IdentityError::Configuration(
                "user pool id is empty".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(IdentityError::Configuration("client id is empty".to_string()));
        }
        Ok(())
    }

    fn secret_hash_for(&self, username: &str) -> Option<String> {
        self.client_secret
            .as_ref()
            .map(|secret| secret_hash(secret.expose_secret(), username, &self.client_id))
    }

    async fn call<B: Serialize>(&self, operation: &str, body: &B) -> Result<(u16, String)> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(body)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(TransportError::from)?;
        Ok((status, text))
    }

    fn rejection(operation: Operation, status: u16, body: &str) -> IdentityError {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        warn!(status, error_type = %parsed.error_type, ?operation, "Identity provider rejected request");
        let message = parsed
            .message
            .unwrap_or_else(|| format!("request failed with status {status}"));
        IdentityError::classify(operation, &parsed.error_type, message)
    }

    /// Password sign-in. On success the token triple is persisted and the id
    /// token's attributes are returned.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<UserAttributes> {
        self.ensure_configured()?;

        let mut params = BTreeMap::new();
        params.insert("USERNAME", username.to_string());
        params.insert("PASSWORD", password.to_string());
        if let Some(hash) = self.secret_hash_for(username) {
            params.insert("SECRET_HASH", hash);
        }
        let request = InitiateAuthRequest {
            auth_flow: PASSWORD_FLOW,
            client_id: &self.client_id,
            auth_parameters: params,
        };

        let (status, text) = self.call("InitiateAuth", &request).await?;
        if status != 200 {
            return Err(Self::rejection(Operation::SignIn, status, &text));
        }

        let response: InitiateAuthResponse =
            serde_json::from_str(&text).map_err(TransportError::from)?;
        if let Some(challenge) = response.challenge_name {
            return Err(if challenge == NEW_PASSWORD_CHALLENGE {
                IdentityError::NewPasswordRequired
            } else {
                IdentityError::Unknown(format!("Unsupported challenge: {challenge}"))
            });
        }

        let result = response
            .authentication_result
            .ok_or_else(|| IdentityError::Unknown("No authentication result".to_string()))?;
        let (Some(id_token), Some(access_token), Some(refresh_token)) =
            (result.id_token, result.access_token, result.refresh_token)
        else {
            return Err(IdentityError::Unknown(
                "Authentication result is missing tokens".to_string(),
            ));
        };

        let attributes = UserAttributes::from_id_token(&id_token)?;
        self.persist_tokens(&id_token, &access_token, &refresh_token, result.expires_in)?;
        self.store
            .set(StoreKey::SavedUsername, username)
            .map_err(|e| IdentityError::Unknown(format!("Failed to persist username: {e}")))?;

        info!(record_id = %attributes.record_id, "Identity provider sign-in succeeded");
        Ok(attributes)
    }

    fn persist_tokens(
        &self,
        id_token: &str,
        access_token: &str,
        refresh_token: &str,
        expires_in: Option<i64>,
    ) -> Result<()> {
        let expires_at =
            self.clock.now() + Duration::seconds(expires_in.unwrap_or(self.default_ttl_secs));
        let expiry = expires_at.timestamp().to_string();
        let entries = [
            (StoreKey::CognitoIdToken, id_token),
            (StoreKey::CognitoAccessToken, access_token),
            (StoreKey::CognitoRefreshToken, refresh_token),
            (StoreKey::CognitoTokenExpiry, expiry.as_str()),
        ];

        // A partial write would pair new tokens with stale ones.
        for (key, value) in entries {
            if let Err(e) = self.store.set(key, value) {
                warn!(key = %key, error = %e, "Failed to persist identity tokens, discarding session");
                self.delete_session_keys();
                return Err(IdentityError::Unknown(format!(
                    "Failed to persist tokens: {e}"
                )));
            }
        }
        debug!(expires_at = %expires_at, "Persisted identity tokens");
        Ok(())
    }

    fn delete_session_keys(&self) {
        for key in SESSION_KEYS {
            if let Err(e) = self.store.delete(key) {
                warn!(key = %key, error = %e, "Failed to delete session key");
            }
        }
    }

    /// Delete the persisted session, then ask the provider to revoke it.
    ///
    /// The revocation is best effort; its outcome is only logged.
    pub async fn sign_out(&self) {
        let access_token = self.store.read(StoreKey::CognitoAccessToken);
        self.delete_session_keys();

        let Some(access_token) = access_token else {
            return;
        };
        match self
            .call("GlobalSignOut", &json!({ "AccessToken": access_token }))
            .await
        {
            Ok((200, _)) => debug!("Global sign-out acknowledged"),
            Ok((status, _)) => debug!(status, "Global sign-out not acknowledged"),
            Err(e) => debug!(error = %e, "Global sign-out request failed"),
        }
    }

    /// Start the password-reset flow; the provider sends a code to the user.
    pub async fn forgot_password(&self, username: &str) -> Result<()> {
        self.ensure_configured()?;
        let request = ForgotPasswordRequest {
            client_id: &self.client_id,
            username,
            secret_hash: self.secret_hash_for(username),
        };

        let (status, text) = self.call("ForgotPassword", &request).await?;
        if status != 200 {
            return Err(Self::rejection(Operation::ForgotPassword, status, &text));
        }
        info!("Password reset code requested");
        Ok(())
    }

    /// Complete the password-reset flow.
    pub async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        self.ensure_configured()?;
        let request = ConfirmForgotPasswordRequest {
            client_id: &self.client_id,
            username,
            confirmation_code: code,
            password: new_password,
            secret_hash: self.secret_hash_for(username),
        };

        let (status, text) = self.call("ConfirmForgotPassword", &request).await?;
        if status != 200 {
            return Err(Self::rejection(
                Operation::ConfirmForgotPassword,
                status,
                &text,
            ));
        }
        info!("Password reset confirmed");
        Ok(())
    }

    /// Refresh-token sign-in. Any failure yields `false`.
    pub async fn refresh_tokens(&self) -> bool {
        let (Some(refresh_token), Some(username)) = (
            self.store.read(StoreKey::CognitoRefreshToken),
            self.store.read(StoreKey::SavedUsername),
        ) else {
            return false;
        };
        if self.ensure_configured().is_err() {
            return false;
        }

        match self.refresh_with(&refresh_token, &username).await {
            Ok(()) => {
                info!("Identity tokens refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                false
            }
        }
    }

    async fn refresh_with(&self, refresh_token: &str, username: &str) -> Result<()> {
        let mut params = BTreeMap::new();
        params.insert("REFRESH_TOKEN", refresh_token.to_string());
        if let Some(hash) = self.secret_hash_for(username) {
            params.insert("SECRET_HASH", hash);
        }
        let request = InitiateAuthRequest {
            auth_flow: REFRESH_FLOW,
            client_id: &self.client_id,
            auth_parameters: params,
        };

        let (status, text) = self.call("InitiateAuth", &request).await?;
        if status != 200 {
            return Err(Self::rejection(Operation::SignIn, status, &text));
        }

        let response: InitiateAuthResponse =
            serde_json::from_str(&text).map_err(TransportError::from)?;
        let result = response
            .authentication_result
            .ok_or_else(|| IdentityError::Unknown("No authentication result".to_string()))?;
        let (Some(id_token), Some(access_token)) = (result.id_token, result.access_token) else {
            return Err(IdentityError::Unknown(
                "Refresh result is missing tokens".to_string(),
            ));
        };
        let refresh_token = result
            .refresh_token
            .unwrap_or_else(|| refresh_token.to_string());

        self.persist_tokens(&id_token, &access_token, &refresh_token, result.expires_in)
    }

    /// Local check: an access token exists and its persisted expiry is in the future.
    pub fn is_authenticated(&self) -> bool {
        if self.store.read(StoreKey::CognitoAccessToken).is_none() {
            return false;
        }
        self.store
            .get_expiry(StoreKey::CognitoTokenExpiry)
            .is_some_and(|expiry| expiry > self.clock.now())
    }

    /// Persisted access token.
    pub fn access_token(&self) -> Option<String> {
        self.store.read(StoreKey::CognitoAccessToken)
    }

    /// Persisted id token.
    pub fn id_token(&self) -> Option<String> {
        self.store.read(StoreKey::CognitoIdToken)
    }
}
