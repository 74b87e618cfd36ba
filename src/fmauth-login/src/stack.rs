//! Composition root for the credential chain.

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use fmauth_cloud::{CredentialBroker, SecretsClient};
use fmauth_cognito::CognitoClient;
use fmauth_common::http::build_client;
use fmauth_common::{AuthConfig, SharedClock, SystemClock};
use fmauth_filemaker::FileMakerSession;
use fmauth_secure_store::{SharedStore, open_store};

use crate::orchestrator::AuthOrchestrator;

/// Every component of one tenant's credential chain, wired together.
///
/// The application entry point owns the stack; components share the store,
/// clock and HTTP client through `Arc`s.
pub struct AuthStack {
    pub config: AuthConfig,
    pub store: SharedStore,
    pub clock: SharedClock,
    pub cognito: Arc<CognitoClient>,
    pub broker: Arc<CredentialBroker>,
    pub secrets: Arc<SecretsClient>,
    pub filemaker: Arc<FileMakerSession>,
    pub orchestrator: AuthOrchestrator,
}

impl AuthStack {
    /// Wire the chain from explicit parts.
    pub fn new(
        config: AuthConfig,
        store: SharedStore,
        clock: SharedClock,
        http: Client,
    ) -> Result<Self> {
        let cognito = Arc::new(CognitoClient::new(
            &config,
            http.clone(),
            store.clone(),
            clock.clone(),
        ));
        let broker = Arc::new(CredentialBroker::new(
            &config,
            http.clone(),
            store.clone(),
            clock.clone(),
        ));
        let secrets = Arc::new(
            SecretsClient::new(&config, http.clone(), broker.clone(), clock.clone())
                .context("Invalid secrets service endpoint")?,
        );
        let filemaker = Arc::new(FileMakerSession::new(
            &config,
            http,
            secrets.clone(),
            store.clone(),
            clock.clone(),
        ));

        let orchestrator = AuthOrchestrator::new(cognito.clone(), filemaker.clone(), store.clone())
            .with_cache(broker.clone())
            .with_cache(secrets.clone())
            .with_cache(filemaker.clone());

        Ok(Self {
            config,
            store,
            clock,
            cognito,
            broker,
            secrets,
            filemaker,
            orchestrator,
        })
    }

    /// Validate `config` and build the stack with the configured store,
    /// the system clock and a fresh HTTP client.
    pub fn from_config(config: AuthConfig) -> Result<Self> {
        config.validate().context("Invalid auth configuration")?;
        let http = build_client(&config.http).context("Failed to build HTTP client")?;
        let dir = config.storage.resolved_dir();
        let store = open_store(config.storage.mode, &config.bundle_id, &dir);
        info!(
            bundle = %config.bundle_id,
            mode = ?config.storage.mode,
            "Opened secure store"
        );
        Self::new(config, store, Arc::new(SystemClock), http)
    }

    /// Load the configuration file, overlay the environment, and build.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = AuthConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        config.apply_env();
        Self::from_config(config)
    }
}
