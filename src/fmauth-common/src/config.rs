//! Tenant configuration for the credential chain.
//!
//! Supports loading configuration from:
//! - TOML files
//! - Environment variables (overlaying file values)
//!
//! Both apps the chain serves differ only in these values, so nothing
//! downstream hard-codes a pool, a secret name or a legacy schema.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default namespace for persisted keys.
pub const DEFAULT_BUNDLE_ID: &str = "com.fmauth.app";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required value is missing or unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where SecureStore entries are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// OS keychain (preferred).
    #[default]
    Keyring,
    /// AES-256-GCM encrypted file with restrictive permissions.
    EncryptedFile,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Optional endpoint overrides; defaults derive from the region.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Identity-provider (user pool) endpoint.
    pub identity_provider: Option<String>,
    /// Identity-federation (identity pool) endpoint.
    pub identity_federation: Option<String>,
    /// Secrets-service endpoint.
    pub secrets_manager: Option<String>,
}

/// Cache lifetimes, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Legacy session token lifetime (sliding).
    pub legacy_token_secs: i64,
    /// Third-party secret cache lifetime.
    pub secret_cache_secs: i64,
    /// Lead time before cloud-credential expiry at which they count as stale.
    pub credential_refresh_lead_secs: i64,
    /// Identity-provider token lifetime assumed when the server omits one.
    pub default_id_token_secs: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            legacy_token_secs: 600,
            secret_cache_secs: 3600,
            credential_refresh_lead_secs: 300,
            default_id_token_secs: 3600,
        }
    }
}

/// HTTP timeouts, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connect and read timeout.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

/// Persistent storage settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub mode: StoreMode,
    /// Directory for the encrypted file backend; defaults to `~/.fmauth`.
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory the encrypted file backend writes to.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".fmauth")
        })
    }
}

/// Legacy schema used to locate and map the signed-in user's record.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserLookupConfig {
    /// Layout searched with `_find`.
    pub layout: String,
    /// Field matched against the identity-provider email.
    pub email_field: String,
    /// Full-name field, split into first and last name.
    pub name_field: String,
    /// Company / tenant identifier field.
    pub company_field: String,
    /// Role field.
    pub type_field: String,
    /// Login-name field.
    pub username_field: String,
    /// Stable account identifier field; the record id is used when empty.
    pub account_field: String,
}

impl Default for UserLookupConfig {
    fn default() -> Self {
        Self {
            layout: "@Usuarios".to_string(),
            email_field: "Usu_Mail".to_string(),
            name_field: "Usu_Nombre".to_string(),
            company_field: "Usu_IDSucursal".to_string(),
            type_field: "Usu_TipoCuenta".to_string(),
            username_field: "Usu_Usuario".to_string(),
            account_field: "Usu_Cuenta_Num".to_string(),
        }
    }
}

/// Where the non-critical last-login timestamp is written.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginTimeConfig {
    /// Layout holding the user record.
    pub layout: String,
    /// Timestamp field name.
    #[serde(default = "default_login_time_field")]
    pub field: String,
}

fn default_login_time_field() -> String {
    "LastLoginTime".to_string()
}

/// Complete configuration of one tenant's credential chain.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Namespace for persisted keys (`<bundle>.<key>`).
    pub bundle_id: String,
    /// AWS region of every cloud service.
    pub region: String,
    /// Identity-provider user pool id.
    pub user_pool_id: String,
    /// App client id.
    pub client_id: String,
    /// App client secret; only confidential clients have one.
    #[serde(deserialize_with = "deserialize_optional_secret")]
    pub client_secret: Option<SecretString>,
    /// Identity pool exchanging id tokens for cloud credentials.
    pub identity_pool_id: String,
    /// Name of the secret holding the legacy API connection credentials.
    pub secret_name: String,
    /// Endpoint overrides.
    pub endpoints: Endpoints,
    /// Cache lifetimes.
    pub ttl: TtlConfig,
    /// HTTP timeouts.
    pub http: HttpConfig,
    /// SecureStore backend.
    pub storage: StorageConfig,
    /// Legacy user schema.
    pub user_lookup: UserLookupConfig,
    /// Optional last-login update.
    pub login_time: Option<LoginTimeConfig>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("bundle_id", &self.bundle_id)
            .field("region", &self.region)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("identity_pool_id", &self.identity_pool_id)
            .field("secret_name", &self.secret_name)
            .field("endpoints", &self.endpoints)
            .field("ttl", &self.ttl)
            .field("http", &self.http)
            .field("storage", &self.storage)
            .field("user_lookup", &self.user_lookup)
            .field("login_time", &self.login_time)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bundle_id: DEFAULT_BUNDLE_ID.to_string(),
            region: DEFAULT_REGION.to_string(),
            user_pool_id: String::new(),
            client_id: String::new(),
            client_secret: None,
            identity_pool_id: String::new(),
            secret_name: String::new(),
            endpoints: Endpoints::default(),
            ttl: TtlConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            user_lookup: UserLookupConfig::default(),
            login_time: None,
        }
    }
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

impl AuthConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        debug!(path = %path.display(), "Loaded auth configuration");
        Ok(config)
    }

    /// Overlay values from the environment.
    ///
    /// Recognized variables:
    /// - `COGNITO_REGION`, `COGNITO_USER_POOL_ID`, `COGNITO_CLIENT_ID`, `COGNITO_CLIENT_SECRET`
    /// - `FMAUTH_IDENTITY_POOL_ID`, `FMAUTH_SECRET_NAME`, `FMAUTH_BUNDLE_ID`
    pub fn apply_env(&mut self) {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }

        if let Some(v) = var("COGNITO_REGION") {
            self.region = v;
        }
        if let Some(v) = var("COGNITO_USER_POOL_ID") {
            self.user_pool_id = v;
        }
        if let Some(v) = var("COGNITO_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = var("COGNITO_CLIENT_SECRET") {
            self.client_secret = Some(SecretString::from(v));
        }
        if let Some(v) = var("FMAUTH_IDENTITY_POOL_ID") {
            self.identity_pool_id = v;
        }
        if let Some(v) = var("FMAUTH_SECRET_NAME") {
            self.secret_name = v;
        }
        if let Some(v) = var("FMAUTH_BUNDLE_ID") {
            self.bundle_id = v;
        }
    }

    /// Check the values the credential chain cannot work without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("user_pool_id", &self.user_pool_id),
            ("client_id", &self.client_id),
            ("bundle_id", &self.bundle_id),
            ("identity_pool_id", &self.identity_pool_id),
            ("secret_name", &self.secret_name),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} is not set")));
            }
        }
        Ok(())
    }

    /// Identity-provider endpoint.
    pub fn identity_provider_url(&self) -> String {
        self.endpoints
            .identity_provider
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }

    /// Identity-federation endpoint.
    pub fn identity_federation_url(&self) -> String {
        self.endpoints
            .identity_federation
            .clone()
            .unwrap_or_else(|| format!("https://cognito-identity.{}.amazonaws.com/", self.region))
    }

    /// Secrets-service endpoint.
    pub fn secrets_manager_url(&self) -> String {
        self.endpoints
            .secrets_manager
            .clone()
            .unwrap_or_else(|| format!("https://secretsmanager.{}.amazonaws.com/", self.region))
    }

    /// Key of the `Logins` map sent to the identity pool.
    pub fn login_provider_name(&self) -> String {
        format!(
            "cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }
}
