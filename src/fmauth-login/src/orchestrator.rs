//! Two-layer sign-in.
//!
//! A user counts as signed in only when both the identity provider and the
//! legacy user directory agree. When the directory lookup fails after the
//! identity provider already accepted the password, the identity session is
//! signed out again before the failure is reported.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use fmauth_cognito::IdentityError;
use fmauth_secure_store::{SecureStore, SharedStore, StoreKey};

use crate::error::SignInError;
use crate::provider::{IdentityProvider, SessionCache, UserDirectory};
use crate::user::User;

/// Where the sign-in state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    SignedOut,
    IdentityVerifying,
    IdentityFailed,
    IdentityVerified,
    LegacyLookup,
    LegacyFailed,
    CompensatingSignOut,
    SignedIn,
}

impl SessionPhase {
    /// Whether a sign-in is in flight.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionPhase::IdentityVerifying
                | SessionPhase::IdentityVerified
                | SessionPhase::LegacyLookup
                | SessionPhase::CompensatingSignOut
        )
    }
}

/// Coordinates sign-in, sign-out and session restore across the layers.
pub struct AuthOrchestrator {
    identity: Arc<dyn IdentityProvider>,
    directory: Arc<dyn UserDirectory>,
    caches: Vec<Arc<dyn SessionCache>>,
    store: SharedStore,
    phase_tx: watch::Sender<SessionPhase>,
    phase_rx: watch::Receiver<SessionPhase>,
}

impl AuthOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        directory: Arc<dyn UserDirectory>,
        store: SharedStore,
    ) -> Self {
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::SignedOut);
        Self {
            identity,
            directory,
            caches: Vec::new(),
            store,
            phase_tx,
            phase_rx,
        }
    }

    /// Register a cache to empty on sign-out, in registration order.
    pub fn with_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_rx.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }

    fn set_phase(&self, phase: SessionPhase) {
        debug!(?phase, "Session phase changed");
        if self.phase_tx.send(phase).is_err() {
            warn!(?phase, "Failed to publish session phase - all receivers dropped");
        }
    }

    /// Sign in against the identity provider, then resolve the legacy user.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<User, SignInError> {
        let username = username.trim();
        self.set_phase(SessionPhase::IdentityVerifying);
        let attributes = match self.identity.sign_in(username, password).await {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(error = %e, "Identity verification failed");
                self.set_phase(SessionPhase::IdentityFailed);
                self.set_phase(SessionPhase::SignedOut);
                return Err(e.into());
            }
        };
        self.set_phase(SessionPhase::IdentityVerified);

        let email = if attributes.email.is_empty() {
            username
        } else {
            attributes.email.as_str()
        };

        self.set_phase(SessionPhase::LegacyLookup);
        let legacy = match self.directory.find_user_by_email(email).await {
            Ok(legacy) => legacy,
            Err(e) => {
                warn!(error = %e, "Legacy user lookup failed, undoing identity sign-in");
                self.set_phase(SessionPhase::LegacyFailed);
                self.set_phase(SessionPhase::CompensatingSignOut);
                self.identity.sign_out().await;
                self.set_phase(SessionPhase::SignedOut);
                return Err(e.into());
            }
        };

        self.directory.update_login_time(&legacy.record_id).await;

        let user = User::merge(attributes, legacy);
        self.set_phase(SessionPhase::SignedIn);
        info!(user_id = %user.id, company_id = %user.company_id, "Signed in");
        Ok(user)
    }

    /// End the session everywhere: identity provider, every registered
    /// cache, and the generic app token.
    pub async fn sign_out(&self) {
        self.identity.sign_out().await;
        for cache in &self.caches {
            cache.clear().await;
            debug!(cache = cache.name(), "Cleared cache");
        }
        if let Err(e) = self.store.delete(StoreKey::AuthToken) {
            warn!(error = %e, "Failed to delete app auth token");
        }
        self.set_phase(SessionPhase::SignedOut);
        info!("Signed out");
    }

    /// Cold-start check: is there a usable identity session, refreshing it if
    /// the persisted one has lapsed?
    pub async fn restore_session(&self) -> bool {
        let restored = if self.identity.is_authenticated() {
            true
        } else {
            debug!("Persisted identity session missing or expired, trying refresh");
            self.identity.refresh_tokens().await
        };

        if restored {
            self.set_phase(SessionPhase::IdentityVerified);
        } else {
            self.set_phase(SessionPhase::SignedOut);
        }
        restored
    }

    pub async fn forgot_password(&self, username: &str) -> Result<(), IdentityError> {
        self.identity.forgot_password(username).await
    }

    pub async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), IdentityError> {
        self.identity
            .confirm_forgot_password(username, code, new_password)
            .await
    }
}
