//! Legacy API session token management.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use fmauth_cloud::{LegacyCredentials, SecretsClient};
use fmauth_common::{AuthConfig, LoginTimeConfig, SharedClock, TransportError, UserLookupConfig};
use fmauth_secure_store::{SecureStore, SharedStore, StoreKey};

use crate::error::{LegacyApiError, Result};
use crate::models::TokenResponse;

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn live_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if expires_at > now => Some(token),
            _ => None,
        }
    }
}

/// Session manager for the legacy Data API.
///
/// Tokens resolve memory first, then the secure store, then the network.
/// Every successful authenticated call pushes the expiry forward by the
/// token TTL. All cache access and the session round-trip happen under one
/// lock, so concurrent callers share a single session creation. Connection
/// credentials are always read through the secrets client, which owns their
/// cache and its TTL.
pub struct FileMakerSession {
    http: Client,
    secrets: Arc<SecretsClient>,
    store: SharedStore,
    clock: SharedClock,
    token_ttl: Duration,
    pub(crate) user_lookup: UserLookupConfig,
    pub(crate) login_time: Option<LoginTimeConfig>,
    state: Mutex<SessionState>,
}

impl FileMakerSession {
    pub fn new(
        config: &AuthConfig,
        http: Client,
        secrets: Arc<SecretsClient>,
        store: SharedStore,
        clock: SharedClock,
    ) -> Self {
        Self {
            http,
            secrets,
            store,
            clock,
            token_ttl: Duration::seconds(config.ttl.legacy_token_secs),
            user_lookup: config.user_lookup.clone(),
            login_time: config.login_time.clone(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// A valid session token, creating a session when needed.
    pub async fn get_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        self.resolve_token(&mut state).await
    }

    /// Forget the token and its expiry, in memory and in the secure store.
    pub async fn clear_token(&self) {
        let mut state = self.state.lock().await;
        *state = SessionState::default();
        self.delete_persisted();
        debug!("Cleared legacy API session");
    }

    /// Extend the current token's life without contacting the server.
    pub async fn extend_session(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.live_token(self.clock.now()).is_none() {
            return Err(LegacyApiError::TokenExpired);
        }
        self.slide_expiry(&mut state);
        Ok(())
    }

    /// Expiry of the in-memory token, if one is held.
    pub async fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.expires_at
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn resolve_token(&self, state: &mut SessionState) -> Result<String> {
        let now = self.clock.now();

        if let Some(token) = state.live_token(now) {
            return Ok(token.to_string());
        }

        if let (Some(token), Some(expires_at)) = (
            self.store.read(StoreKey::FileMakerToken),
            self.store.get_expiry(StoreKey::FileMakerTokenExpiry),
        ) {
            if expires_at > now {
                debug!("Restored legacy API token from secure storage");
                state.token = Some(token.clone());
                state.expires_at = Some(expires_at);
                return Ok(token);
            }
        }

        self.delete_persisted();
        let credentials = self.secrets.get_secret().await?;
        let token = match self.create_session(&credentials).await {
            Ok(token) => token,
            Err(e) => {
                if matches!(e, LegacyApiError::AuthenticationFailed) {
                    self.secrets.clear_cache().await;
                }
                return Err(e);
            }
        };

        let expires_at = self.clock.now() + self.token_ttl;
        state.token = Some(token.clone());
        state.expires_at = Some(expires_at);
        if let Err(e) = self.store.set(StoreKey::FileMakerToken, &token) {
            warn!(error = %e, "Failed to persist legacy API token");
        }
        if let Err(e) = self.store.set_expiry(StoreKey::FileMakerTokenExpiry, expires_at) {
            warn!(error = %e, "Failed to persist legacy API token expiry");
        }
        info!(expires_at = %expires_at, "Created legacy API session");
        Ok(token)
    }

    async fn create_session(&self, credentials: &LegacyCredentials) -> Result<String> {
        let url = endpoint(&credentials.base_url, &["sessions"])?;
        let response = self
            .http
            .post(url)
            .basic_auth(
                &credentials.username,
                Some(credentials.password.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Legacy API rejected session request");
            return Err(LegacyApiError::AuthenticationFailed);
        }

        let text = response.text().await.map_err(TransportError::from)?;
        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| LegacyApiError::InvalidResponse(e.to_string()))?;
        if parsed.response.token.is_empty() {
            return Err(LegacyApiError::InvalidResponse(
                "session response has an empty token".to_string(),
            ));
        }
        Ok(parsed.response.token)
    }

    fn slide_expiry(&self, state: &mut SessionState) {
        if state.token.is_none() {
            return;
        }
        let expires_at = self.clock.now() + self.token_ttl;
        state.expires_at = Some(expires_at);
        if let Err(e) = self.store.set_expiry(StoreKey::FileMakerTokenExpiry, expires_at) {
            warn!(error = %e, "Failed to persist extended token expiry");
        }
    }

    fn delete_persisted(&self) {
        for key in [StoreKey::FileMakerToken, StoreKey::FileMakerTokenExpiry] {
            if let Err(e) = self.store.delete(key) {
                warn!(key = %key, error = %e, "Failed to delete persisted legacy token");
            }
        }
    }

    /// Issue an authenticated request.
    ///
    /// HTTP 401 clears the session and fails with `Unauthorized`; the call is
    /// not retried. Any 2xx slides the token expiry. Other statuses are handed
    /// back with their body for the caller to interpret.
    pub(crate) async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<(StatusCode, String)> {
        let (token, base_url) = {
            let mut state = self.state.lock().await;
            let token = self.resolve_token(&mut state).await?;
            let credentials = self.secrets.get_secret().await?;
            (token, credentials.base_url)
        };

        let mut request = self
            .http
            .request(method.clone(), endpoint(&base_url, segments)?)
            .bearer_auth(&token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(TransportError::from)?;

        if status == StatusCode::UNAUTHORIZED {
            warn!(method = %method, "Legacy API rejected session token");
            self.clear_token().await;
            return Err(TransportError::Unauthorized.into());
        }

        if status.is_success() {
            let mut state = self.state.lock().await;
            self.slide_expiry(&mut state);
        }

        Ok((status, text))
    }
}

/// `base` with `segments` appended, each percent-encoded as one path segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(TransportError::from)?;
    url.path_segments_mut()
        .map_err(|_| TransportError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NOW, bare_fixture, fixture, mount_secret, mount_session};
    use fmauth_cloud::GET_SECRET_VALUE_TARGET;
    use fmauth_common::clock::from_epoch_secs;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_endpoint_appends_encoded_segments() {
        let url = endpoint(
            "https://fm.example.com/fmi/data/vLatest/databases/App",
            &["layouts", "Web Pacientes", "_find"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://fm.example.com/fmi/data/vLatest/databases/App/layouts/Web%20Pacientes/_find"
        );
        assert!(endpoint("not a url", &["sessions"]).is_err());
    }

    #[tokio::test]
    async fn test_session_created_with_basic_auth_and_persisted() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/sessions", crate::testing::BASE_PATH)))
            .and(header("authorization", "Basic YXBpOnB3"))
            .and(header("content-type", "application/json"))
            .and(body_string("{}"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "response": { "token": "tok-1" },
                    "messages": [{ "code": "0", "message": "OK" }]
                })),
            )
            .expect(1)
            .mount(&f.server)
            .await;

        assert_eq!(f.session.get_token().await.unwrap(), "tok-1");
        assert_eq!(
            f.store.get(StoreKey::FileMakerToken).unwrap().as_deref(),
            Some("tok-1")
        );
        assert_eq!(
            f.store.get_expiry(StoreKey::FileMakerTokenExpiry),
            from_epoch_secs(NOW + 600)
        );
        assert!(f.secrets.has_cached_secret().await);
    }

    #[tokio::test]
    async fn test_token_valid_until_ttl_lapses() {
        let f = fixture().await;
        mount_session(&f.server, "tok-1", Some(2)).await;

        f.session.get_token().await.unwrap();
        f.clock.advance_secs(599);
        assert_eq!(f.session.get_token().await.unwrap(), "tok-1");

        f.clock.advance_secs(2);
        f.session.get_token().await.unwrap();
        assert_eq!(f.session.token_expiry().await, from_epoch_secs(NOW + 601 + 600));
    }

    #[tokio::test]
    async fn test_persisted_token_promoted_without_network() {
        let f = fixture().await;
        mount_session(&f.server, "unused", Some(0)).await;
        f.store.set(StoreKey::FileMakerToken, "stored").unwrap();
        f.store
            .set_expiry(
                StoreKey::FileMakerTokenExpiry,
                from_epoch_secs(NOW + 300).unwrap(),
            )
            .unwrap();

        assert_eq!(f.session.get_token().await.unwrap(), "stored");
        assert_eq!(f.session.token_expiry().await, from_epoch_secs(NOW + 300));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_session() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/sessions", crate::testing::BASE_PATH)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": { "token": "shared" } }))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&f.server)
            .await;

        let calls = (0..10).map(|_| {
            let session = f.session.clone();
            tokio::spawn(async move { session.get_token().await })
        });
        let tokens = futures::future::join_all(calls).await;

        assert_eq!(tokens.len(), 10);
        for token in tokens {
            assert_eq!(token.unwrap().unwrap(), "shared");
        }
    }

    #[tokio::test]
    async fn test_rejected_session_invalidates_secret_caches() {
        let f = bare_fixture().await;
        mount_secret(&f.server, Some(2)).await;
        Mock::given(method("POST"))
            .and(path(format!("{}/sessions", crate::testing::BASE_PATH)))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&f.server)
            .await;
        mount_session(&f.server, "fresh", Some(1)).await;

        f.store.set(StoreKey::FileMakerToken, "stale").unwrap();
        f.store
            .set_expiry(
                StoreKey::FileMakerTokenExpiry,
                from_epoch_secs(NOW - 1).unwrap(),
            )
            .unwrap();

        assert_eq!(
            f.session.get_token().await.unwrap_err(),
            LegacyApiError::AuthenticationFailed
        );
        assert!(!f.secrets.has_cached_secret().await);
        assert_eq!(f.store.get(StoreKey::FileMakerToken).unwrap(), None);
        assert_eq!(f.store.get(StoreKey::FileMakerTokenExpiry).unwrap(), None);

        assert_eq!(f.session.get_token().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_new_session_never_outlives_secret_ttl() {
        let f = bare_fixture().await;
        mount_secret(&f.server, Some(2)).await;
        mount_session(&f.server, "tok", Some(3)).await;
        let secret_fetches = |requests: Vec<wiremock::Request>| {
            requests
                .iter()
                .filter(|r| {
                    r.headers
                        .get("x-amz-target")
                        .is_some_and(|v| v == GET_SECRET_VALUE_TARGET)
                })
                .count()
        };

        f.session.get_token().await.unwrap();
        f.clock.advance_secs(3000);
        f.session.clear_token().await;
        f.session.get_token().await.unwrap();
        assert_eq!(secret_fetches(f.server.received_requests().await.unwrap()), 1);

        f.clock.advance_secs(1200);
        f.session.get_token().await.unwrap();
        assert_eq!(secret_fetches(f.server.received_requests().await.unwrap()), 2);
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid_response() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/sessions", crate::testing::BASE_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": {} })))
            .mount(&f.server)
            .await;

        assert!(matches!(
            f.session.get_token().await.unwrap_err(),
            LegacyApiError::InvalidResponse(_)
        ));
        assert!(f.secrets.has_cached_secret().await);
    }

    #[tokio::test]
    async fn test_clear_token_is_idempotent() {
        let f = fixture().await;
        mount_session(&f.server, "tok-1", Some(1)).await;
        f.session.get_token().await.unwrap();

        f.session.clear_token().await;
        f.session.clear_token().await;

        assert_eq!(f.session.token_expiry().await, None);
        assert!(f.secrets.has_cached_secret().await);
        assert_eq!(f.store.get(StoreKey::FileMakerToken).unwrap(), None);
        assert_eq!(f.store.get(StoreKey::FileMakerTokenExpiry).unwrap(), None);
    }

    #[tokio::test]
    async fn test_extend_session_requires_live_token() {
        let f = fixture().await;
        assert_eq!(
            f.session.extend_session().await.unwrap_err(),
            LegacyApiError::TokenExpired
        );

        mount_session(&f.server, "tok-1", Some(1)).await;
        f.session.get_token().await.unwrap();
        f.clock.advance_secs(120);
        f.session.extend_session().await.unwrap();
        assert_eq!(
            f.store.get_expiry(StoreKey::FileMakerTokenExpiry),
            from_epoch_secs(NOW + 720)
        );
    }
}
