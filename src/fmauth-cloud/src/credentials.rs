//! Credential value types.

use chrono::{DateTime, Duration, Utc};
use fmauth_sigv4::SigningCredentials;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Temporary cloud credentials issued by the identity pool.
#[derive(Clone)]
pub struct CloudCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: SecretString,
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl CloudCredentials {
    /// Past hard expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    /// Less than `lead` remains before hard expiry.
    pub fn is_expiring_soon(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        self.expiration < now + lead
    }

    /// Borrow as request-signing keys.
    pub fn signing(&self) -> SigningCredentials<'_> {
        SigningCredentials {
            access_key_id: &self.access_key_id,
            secret_access_key: self.secret_access_key.expose_secret(),
            session_token: Some(self.session_token.expose_secret()),
        }
    }
}

/// Connection credentials for the legacy API, as stored in the secrets service.
#[derive(Clone, Deserialize)]
#[serde(from = "RawLegacyCredentials")]
pub struct LegacyCredentials {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLegacyCredentials {
    base_url: String,
    username: String,
    password: String,
}

impl From<RawLegacyCredentials> for LegacyCredentials {
    fn from(raw: RawLegacyCredentials) -> Self {
        Self {
            base_url: raw.base_url.trim_end_matches('/').to_string(),
            username: raw.username,
            password: SecretString::from(raw.password),
        }
    }
}

impl std::fmt::Debug for LegacyCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for LegacyCredentials {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url
            && self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmauth_common::clock::from_epoch_secs;

    const HARD_EXPIRY: i64 = 1_700_003_600;

    fn credentials() -> CloudCredentials {
        CloudCredentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: SecretString::from("secret"),
            session_token: SecretString::from("token"),
            expiration: from_epoch_secs(HARD_EXPIRY).unwrap(),
        }
    }

    #[test]
    fn test_expiring_soon_uses_five_minute_lead() {
        let creds = credentials();
        let lead = Duration::seconds(300);

        let with_301_left = from_epoch_secs(HARD_EXPIRY - 301).unwrap();
        let with_299_left = from_epoch_secs(HARD_EXPIRY - 299).unwrap();

        assert!(!creds.is_expiring_soon(with_301_left, lead));
        assert!(creds.is_expiring_soon(with_299_left, lead));
        assert!(!creds.is_expired(with_299_left));
    }

    #[test]
    fn test_hard_expiry() {
        let creds = credentials();
        assert!(!creds.is_expired(from_epoch_secs(HARD_EXPIRY - 1).unwrap()));
        assert!(creds.is_expired(from_epoch_secs(HARD_EXPIRY).unwrap()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("token\""));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_legacy_credentials_from_secret_document() {
        let creds: LegacyCredentials = serde_json::from_str(
            r#"{"baseUrl":"https://fm.example.com/fmi/data/vLatest/databases/App/","username":"api","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(
            creds.base_url,
            "https://fm.example.com/fmi/data/vLatest/databases/App"
        );
        assert_eq!(creds.username, "api");
        assert_eq!(creds.password.expose_secret(), "pw");
        assert!(!format!("{creds:?}").contains("pw\""));
    }
}
