//! Keyring-based backend.
//!
//! One keyring entry per credential artifact, service = app namespace,
//! account = `<bundle>.<key>`.

use tracing::{debug, warn};

use crate::{Result, SecureStore, StoreError, StoreKey};

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(_) => {
                StoreError::AccessDenied("Cannot access keyring storage".to_string())
            }
            keyring::Error::PlatformFailure(_) => {
                StoreError::Internal("Platform-specific keyring failure".to_string())
            }
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

/// Keyring store for secure credential management.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Create a store whose entries live under the given namespace.
    pub fn new(bundle: impl Into<String>) -> Self {
        Self {
            service: bundle.into(),
        }
    }

    fn get_entry(&self, key: StoreKey) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &key.qualified(&self.service)).map_err(StoreError::from)
    }
}

impl SecureStore for KeyringStore {
    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let entry = self.get_entry(key)?;
        entry.set_password(value).map_err(|e| {
            warn!(key = %key, error = %e, "Failed to store credential in keyring");
            StoreError::StoreFailed {
                key: key.qualified(&self.service),
                reason: e.to_string(),
            }
        })?;
        debug!(key = %key, "Stored credential in keyring");
        Ok(())
    }

    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let entry = self.get_entry(key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn delete(&self, key: StoreKey) -> Result<bool> {
        let entry = self.get_entry(key)?;
        match entry.delete_credential() {
            Ok(()) => {
                debug!(key = %key, "Deleted credential from keyring");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(StoreError::DeleteFailed {
                key: key.qualified(&self.service),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a working keyring on the system.
    // They are marked as ignored by default to avoid CI failures.

    #[test]
    #[ignore]
    fn test_store_and_retrieve() {
        let store = KeyringStore::new("fmauth-test");
        store.set(StoreKey::FileMakerToken, "token-12345").unwrap();
        assert_eq!(
            store.get(StoreKey::FileMakerToken).unwrap().as_deref(),
            Some("token-12345")
        );
        assert!(store.delete(StoreKey::FileMakerToken).unwrap());
        assert!(store.get(StoreKey::FileMakerToken).unwrap().is_none());
    }

    #[test]
    #[ignore]
    fn test_delete_absent_is_ok() {
        let store = KeyringStore::new("fmauth-test");
        for key in StoreKey::ALL {
            assert!(store.delete(key).is_ok());
        }
    }
}
