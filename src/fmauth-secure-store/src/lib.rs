//! Persistent secret storage for the credential chain.
//!
//! Backends:
//! - OS keychain (Windows Credential Manager, macOS Keychain, Linux Secret Service)
//! - AES-256-GCM encrypted file with a machine-derived key and 0600 permissions
//! - Process memory, for tests and ephemeral sessions
//!
//! Values are opaque strings. Expiries are stored as epoch-second strings and
//! parsed back through [`SecureStore::get_expiry`].

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use fmauth_common::StoreMode;
use fmauth_common::clock::from_epoch_secs;

mod encrypted;
mod keychain;
mod memory;
mod utils;

pub use encrypted::EncryptedFileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// Errors that can occur during secure storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to access the backing store.
    #[error("Failed to access secure storage: {0}")]
    AccessDenied(String),

    /// Failed to store the value.
    #[error("Failed to store value for {key}: {reason}")]
    StoreFailed {
        /// Fully qualified key.
        key: String,
        /// Backend message.
        reason: String,
    },

    /// Failed to delete the value.
    #[error("Failed to delete value for {key}: {reason}")]
    DeleteFailed {
        /// Fully qualified key.
        key: String,
        /// Backend message.
        reason: String,
    },

    /// Encryption or decryption of the file backend failed.
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Filesystem error in the file backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal backend error.
    #[error("Secure storage error: {0}")]
    Internal(String),
}

/// Result type for secure storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The complete persisted key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Generic app auth token.
    AuthToken,
    /// Legacy API session token.
    FileMakerToken,
    /// Legacy API session token expiry (epoch seconds).
    FileMakerTokenExpiry,
    /// Identity-provider id token.
    CognitoIdToken,
    /// Identity-provider access token.
    CognitoAccessToken,
    /// Identity-provider refresh token.
    CognitoRefreshToken,
    /// Identity-provider token expiry (epoch seconds).
    CognitoTokenExpiry,
    /// Username of the last successful sign-in.
    SavedUsername,
}

impl StoreKey {
    /// Every key, in a stable order.
    pub const ALL: [StoreKey; 8] = [
        StoreKey::AuthToken,
        StoreKey::FileMakerToken,
        StoreKey::FileMakerTokenExpiry,
        StoreKey::CognitoIdToken,
        StoreKey::CognitoAccessToken,
        StoreKey::CognitoRefreshToken,
        StoreKey::CognitoTokenExpiry,
        StoreKey::SavedUsername,
    ];

    /// Unqualified key name.
    pub fn name(self) -> &'static str {
        match self {
            StoreKey::AuthToken => "authToken",
            StoreKey::FileMakerToken => "fileMakerToken",
            StoreKey::FileMakerTokenExpiry => "fileMakerTokenExpiry",
            StoreKey::CognitoIdToken => "cognitoIdToken",
            StoreKey::CognitoAccessToken => "cognitoAccessToken",
            StoreKey::CognitoRefreshToken => "cognitoRefreshToken",
            StoreKey::CognitoTokenExpiry => "cognitoTokenExpiry",
            StoreKey::SavedUsername => "savedUsername",
        }
    }

    /// Key qualified by the app namespace: `<bundle>.<name>`.
    pub fn qualified(self, bundle: &str) -> String {
        format!("{bundle}.{}", self.name())
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Device-local store for small secrets.
pub trait SecureStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: StoreKey, value: &str) -> Result<()>;

    /// Retrieve the value under `key`.
    fn get(&self, key: StoreKey) -> Result<Option<String>>;

    /// Delete the value under `key`. Absent keys are not an error; the return
    /// value says whether anything was removed.
    fn delete(&self, key: StoreKey) -> Result<bool>;

    /// Delete every known key.
    fn clear(&self) -> Result<()> {
        for key in StoreKey::ALL {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Retrieve a value, treating backend failures as absence.
    fn read(&self, key: StoreKey) -> Option<String> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Secure storage read failed, treating as absent");
                None
            }
        }
    }

    /// Store an instant as epoch seconds.
    fn set_expiry(&self, key: StoreKey, at: DateTime<Utc>) -> Result<()> {
        self.set(key, &at.timestamp().to_string())
    }

    /// Read an instant stored as epoch seconds. Unparseable values read as absent.
    fn get_expiry(&self, key: StoreKey) -> Option<DateTime<Utc>> {
        let raw = self.read(key)?;
        parse_epoch(&raw)
    }
}

/// Shared store handle.
pub type SharedStore = Arc<dyn SecureStore>;

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let secs = raw
        .parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i64))?;
    from_epoch_secs(secs)
}

/// Build the configured backend.
pub fn open_store(mode: StoreMode, bundle: &str, dir: &Path) -> SharedStore {
    match mode {
        StoreMode::Keyring => Arc::new(KeyringStore::new(bundle)),
        StoreMode::EncryptedFile => Arc::new(EncryptedFileStore::new(dir, bundle)),
        StoreMode::Memory => Arc::new(MemoryStore::new(bundle)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_key_names() {
        assert_eq!(
            StoreKey::FileMakerTokenExpiry.qualified("com.example.app"),
            "com.example.app.fileMakerTokenExpiry"
        );
        assert_eq!(
            StoreKey::CognitoIdToken.qualified("b"),
            "b.cognitoIdToken"
        );
    }

    #[test]
    fn test_all_keys_unique() {
        let mut names: Vec<_> = StoreKey::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), StoreKey::ALL.len());
    }

    #[test]
    fn test_parse_epoch_accepts_integer_and_fraction() {
        assert_eq!(parse_epoch("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert_eq!(
            parse_epoch("1700000000.75").unwrap().timestamp(),
            1_700_000_000
        );
        assert!(parse_epoch("soon").is_none());
    }

    #[test]
    fn test_expiry_helpers_round_trip_through_store() {
        let store = MemoryStore::new("test");
        let at = from_epoch_secs(1_700_000_600).unwrap();
        store.set_expiry(StoreKey::FileMakerTokenExpiry, at).unwrap();
        assert_eq!(
            store.get(StoreKey::FileMakerTokenExpiry).unwrap().as_deref(),
            Some("1700000600")
        );
        assert_eq!(store.get_expiry(StoreKey::FileMakerTokenExpiry), Some(at));

        store.set(StoreKey::CognitoTokenExpiry, "garbage").unwrap();
        assert!(store.get_expiry(StoreKey::CognitoTokenExpiry).is_none());
    }

    #[test]
    fn test_open_store_memory_mode() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(StoreMode::Memory, "test", dir.path());
        store.set(StoreKey::AuthToken, "x").unwrap();
        assert_eq!(store.read(StoreKey::AuthToken).as_deref(), Some("x"));
    }
}
