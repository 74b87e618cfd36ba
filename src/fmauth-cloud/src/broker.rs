//! Identity-pool credential broker.

use chrono::Duration;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fmauth_common::clock::from_epoch_secs;
use fmauth_common::http::AMZ_JSON_CONTENT_TYPE;
use fmauth_common::{AuthConfig, SharedClock, TransportError};
use fmauth_secure_store::{SecureStore, SharedStore, StoreKey};

use crate::error::CloudCredentialsError;
use crate::{CloudCredentials, GET_CREDENTIALS_TARGET, GET_ID_TARGET, aws_error_message};

type Result<T> = std::result::Result<T, CloudCredentialsError>;

#[derive(Default)]
struct BrokerState {
    credentials: Option<CloudCredentials>,
    identity_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: RawCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawCredentials {
    access_key_id: String,
    secret_key: String,
    session_token: String,
    expiration: f64,
}

/// Exchanges the persisted id token for temporary cloud credentials.
///
/// Credentials and the identity id are held in memory only. The whole
/// check-then-fetch sequence runs under one lock, so concurrent callers share
/// a single exchange.
pub struct CredentialBroker {
    http: Client,
    endpoint: String,
    identity_pool_id: String,
    login_provider: String,
    refresh_lead: Duration,
    store: SharedStore,
    clock: SharedClock,
    state: Mutex<BrokerState>,
}

impl CredentialBroker {
    pub fn new(config: &AuthConfig, http: Client, store: SharedStore, clock: SharedClock) -> Self {
        Self {
            http,
            endpoint: config.identity_federation_url(),
            identity_pool_id: config.identity_pool_id.clone(),
            login_provider: config.login_provider_name(),
            refresh_lead: Duration::seconds(config.ttl.credential_refresh_lead_secs),
            store,
            clock,
            state: Mutex::new(BrokerState::default()),
        }
    }

    /// Current credentials, refreshed when less than the lead time remains.
    pub async fn get_credentials(&self) -> Result<CloudCredentials> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if let Some(credentials) = &state.credentials {
            if !credentials.is_expiring_soon(now, self.refresh_lead) {
                return Ok(credentials.clone());
            }
            debug!("Cloud credentials expiring soon, refreshing");
        }

        let id_token = self
            .store
            .read(StoreKey::CognitoIdToken)
            .ok_or(CloudCredentialsError::NotAuthenticated)?;
        let logins = self.logins(id_token);

        let reusable_id = match (&state.identity_id, &state.credentials) {
            (Some(id), Some(credentials)) if !credentials.is_expired(now) => Some(id.clone()),
            _ => None,
        };
        let identity_id = match reusable_id {
            Some(id) => id,
            None => self.fetch_identity_id(&logins).await?,
        };

        let credentials = self.fetch_credentials(&identity_id, &logins).await?;
        info!(
            expiration = %credentials.expiration,
            "Obtained temporary cloud credentials"
        );

        state.identity_id = Some(identity_id);
        state.credentials = Some(credentials.clone());
        Ok(credentials)
    }

    /// Forget cached credentials and identity id.
    pub async fn clear_credentials(&self) {
        let mut state = self.state.lock().await;
        state.credentials = None;
        state.identity_id = None;
        debug!("Cleared cloud credentials");
    }

    /// Cached identity id, if any.
    pub async fn identity_id(&self) -> Option<String> {
        self.state.lock().await.identity_id.clone()
    }

    fn logins(&self, id_token: String) -> Value {
        let mut logins = serde_json::Map::new();
        logins.insert(self.login_provider.clone(), Value::String(id_token));
        Value::Object(logins)
    }

    async fn post(&self, target: &str, body: &Value) -> std::result::Result<(u16, String), TransportError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", target)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok((status, text))
    }

    async fn fetch_identity_id(&self, logins: &Value) -> Result<String> {
        let body = json!({
            "IdentityPoolId": self.identity_pool_id,
            "Logins": logins,
        });
        let (status, text) = self.post(GET_ID_TARGET, &body).await?;
        if status != 200 {
            let message = aws_error_message(&text);
            warn!(status, message = %message, "Identity id lookup failed");
            return Err(CloudCredentialsError::Identity(message));
        }

        let parsed: GetIdResponse = serde_json::from_str(&text)
            .map_err(|e| CloudCredentialsError::Identity(format!("Malformed GetId response: {e}")))?;
        debug!("Resolved identity id");
        Ok(parsed.identity_id)
    }

    async fn fetch_credentials(&self, identity_id: &str, logins: &Value) -> Result<CloudCredentials> {
        let body = json!({
            "IdentityId": identity_id,
            "Logins": logins,
        });
        let (status, text) = self.post(GET_CREDENTIALS_TARGET, &body).await?;
        if status != 200 {
            let message = aws_error_message(&text);
            warn!(status, message = %message, "Credentials exchange failed");
            return Err(CloudCredentialsError::Credentials(message));
        }

        let parsed: GetCredentialsResponse = serde_json::from_str(&text).map_err(|e| {
            CloudCredentialsError::Credentials(format!("Malformed credentials response: {e}"))
        })?;
        let raw = parsed.credentials;
        let expiration = from_epoch_secs(raw.expiration as i64).ok_or_else(|| {
            CloudCredentialsError::Credentials(format!("Invalid expiration {}", raw.expiration))
        })?;

        Ok(CloudCredentials {
            access_key_id: raw.access_key_id,
            secret_access_key: SecretString::from(raw.secret_key),
            session_token: SecretString::from(raw.session_token),
            expiration,
        })
    }
}
