//! Signed secrets-service client with a fixed-TTL memory cache.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use fmauth_common::http::AMZ_JSON_CONTENT_TYPE;
use fmauth_common::{AuthConfig, SharedClock, TransportError};
use fmauth_sigv4::{SigningRequest, sign};

use crate::error::SecretsError;
use crate::{CredentialBroker, GET_SECRET_VALUE_TARGET, LegacyCredentials, aws_error_type};

type Result<T> = std::result::Result<T, SecretsError>;

const SERVICE: &str = "secretsmanager";

struct CachedSecret {
    secret: LegacyCredentials,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretValueResponse {
    secret_string: Option<String>,
}

/// Fetches the legacy API connection secret.
pub struct SecretsClient {
    http: Client,
    endpoint: Url,
    region: String,
    secret_name: String,
    ttl: Duration,
    broker: Arc<CredentialBroker>,
    clock: SharedClock,
    cache: Mutex<Option<CachedSecret>>,
}

impl SecretsClient {
    pub fn new(
        config: &AuthConfig,
        http: Client,
        broker: Arc<CredentialBroker>,
        clock: SharedClock,
    ) -> std::result::Result<Self, TransportError> {
        Ok(Self {
            http,
            endpoint: Url::parse(&config.secrets_manager_url())?,
            region: config.region.clone(),
            secret_name: config.secret_name.clone(),
            ttl: Duration::seconds(config.ttl.secret_cache_secs),
            broker,
            clock,
            cache: Mutex::new(None),
        })
    }

    /// The secret, served from memory until its TTL lapses.
    pub async fn get_secret(&self) -> Result<LegacyCredentials> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > self.clock.now() {
                return Ok(cached.secret.clone());
            }
            debug!("Cached secret expired");
        }

        let secret = self.fetch_secret().await?;
        *cache = Some(CachedSecret {
            secret: secret.clone(),
            expires_at: self.clock.now() + self.ttl,
        });
        info!(secret = %self.secret_name, "Fetched legacy API secret");
        Ok(secret)
    }

    /// Drop the cached secret.
    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
        debug!("Cleared secret cache");
    }

    /// Whether a secret is currently cached and unexpired.
    pub async fn has_cached_secret(&self) -> bool {
        let now = self.clock.now();
        self.cache
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| c.expires_at > now)
    }

    async fn fetch_secret(&self) -> Result<LegacyCredentials> {
        let credentials = self.broker.get_credentials().await?;

        let body = serde_json::to_vec(&json!({ "SecretId": self.secret_name }))
            .map_err(TransportError::from)?;
        let request = SigningRequest::for_url(
            "POST",
            &self.endpoint,
            SERVICE,
            &self.region,
            self.clock.now(),
        )
        .header("content-type", AMZ_JSON_CONTENT_TYPE)
        .header("x-amz-target", GET_SECRET_VALUE_TARGET)
        .body(&body);
        let signed = sign(&request, &credentials.signing());

        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", GET_SECRET_VALUE_TARGET)
            .header("X-Amz-Date", &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("X-Amz-Security-Token", token);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(TransportError::from)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(TransportError::from)?;

        match status {
            200 => parse_secret(&text),
            400 => {
                let kind = aws_error_type(&text).unwrap_or_default();
                warn!(error_type = %kind, "Secrets service rejected request");
                if kind.contains("ResourceNotFoundException") {
                    Err(SecretsError::NotFound)
                } else {
                    Err(SecretsError::AccessDenied)
                }
            }
            _ => {
                warn!(status, "Secrets service returned unexpected status");
                Err(SecretsError::Network(TransportError::from_status(status, &text)))
            }
        }
    }
}

/// Decode the envelope and the JSON document embedded in `SecretString`.
fn parse_secret(body: &str) -> Result<LegacyCredentials> {
    let envelope: SecretValueResponse =
        serde_json::from_str(body).map_err(|_| SecretsError::InvalidSecret)?;
    let inner = envelope.secret_string.ok_or(SecretsError::InvalidSecret)?;
    serde_json::from_str(&inner).map_err(|_| SecretsError::InvalidSecret)
}
