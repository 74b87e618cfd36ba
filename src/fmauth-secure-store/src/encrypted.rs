//! Encrypted file backend.
//!
//! All entries live in one JSON map, sealed with AES-256-GCM under a key
//! derived from machine identity. File layout: 12-byte nonce || ciphertext.

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroize;

use crate::utils::{secure_remove, set_file_permissions};
use crate::{Result, SecureStore, StoreError, StoreKey};

const STORE_FILE: &str = "secure-store.enc";
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

type Entries = BTreeMap<String, String>;

/// Derive the file key from machine-specific entropy and the app namespace.
fn machine_key(bundle: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();

    #[cfg(target_os = "linux")]
    {
        if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
            hasher.update(id.trim().as_bytes());
        } else if let Ok(id) = std::fs::read_to_string("/var/lib/dbus/machine-id") {
            hasher.update(id.trim().as_bytes());
        }
    }

    if let Ok(hostname) = hostname::get() {
        hasher.update(hostname.as_encoded_bytes());
    }

    #[cfg(unix)]
    {
        hasher.update(unsafe { libc::getuid() }.to_le_bytes());
    }
    #[cfg(windows)]
    {
        if let Ok(user) = std::env::var("USERNAME") {
            hasher.update(user.as_bytes());
        }
    }

    if let Some(home) = dirs::home_dir() {
        hasher.update(home.to_string_lossy().as_bytes());
    }

    hasher.update(bundle.as_bytes());
    hasher.update(b"fmauth-secure-store-v1-machine-key");

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Secret store backed by a single encrypted file.
pub struct EncryptedFileStore {
    path: PathBuf,
    bundle: String,
    lock: Mutex<()>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.path)
            .field("bundle", &self.bundle)
            .finish()
    }
}

impl EncryptedFileStore {
    /// Store whose file lives in `dir`.
    pub fn new(dir: &Path, bundle: impl Into<String>) -> Self {
        Self {
            path: dir.join(STORE_FILE),
            bundle: bundle.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the encrypted file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let mut key = machine_key(&self.bundle);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| StoreError::Crypto(format!("Cipher init failed: {e}")));
        key.zeroize();
        cipher
    }

    fn load(&self) -> Result<Entries> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }

        let sealed = std::fs::read(&self.path)?;
        if sealed.len() < NONCE_SIZE {
            return Err(StoreError::Crypto(format!(
                "Invalid encrypted store file: {}",
                self.path.display()
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| StoreError::Crypto(format!("Decryption failed: {e}")))?;

        let mut json = String::from_utf8(plaintext)
            .map_err(|_| StoreError::Crypto("Invalid UTF-8 in decrypted data".to_string()))?;
        let entries = serde_json::from_str(&json)
            .map_err(|e| StoreError::Crypto(format!("Corrupt store contents: {e}")));
        json.zeroize();
        entries
    }

    fn save(&self, entries: &Entries) -> Result<()> {
        if entries.is_empty() {
            if self.path.exists() {
                secure_remove(&self.path)?;
                debug!(path = %self.path.display(), "Removed empty encrypted store");
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut json = serde_json::to_string(entries)
            .map_err(|e| StoreError::Internal(format!("Failed to serialize entries: {e}")))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce_bytes), json.as_bytes())
            .map_err(|e| StoreError::Crypto(format!("Encryption failed: {e}")));
        json.zeroize();
        let ciphertext = ciphertext?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);

        std::fs::write(&self.path, &output)?;
        set_file_permissions(&self.path)?;
        Ok(())
    }
}

impl SecureStore for EncryptedFileStore {
    fn set(&self, key: StoreKey, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.insert(key.qualified(&self.bundle), value.to_string());
        self.save(&entries)
    }

    fn get(&self, key: StoreKey) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(&key.qualified(&self.bundle)))
    }

    fn delete(&self, key: StoreKey) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if entries.remove(&key.qualified(&self.bundle)).is_none() {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        store.set(StoreKey::CognitoRefreshToken, "refresh-xyz").unwrap();
        store.set(StoreKey::SavedUsername, "alice").unwrap();

        let reopened = EncryptedFileStore::new(dir.path(), "com.example");
        assert_eq!(
            reopened.get(StoreKey::CognitoRefreshToken).unwrap().as_deref(),
            Some("refresh-xyz")
        );
        assert_eq!(
            reopened.get(StoreKey::SavedUsername).unwrap().as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_file_does_not_contain_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        store.set(StoreKey::FileMakerToken, "very-secret-token").unwrap();

        let raw = std::fs::read(store.path()).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("very-secret-token"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        store.set(StoreKey::AuthToken, "t").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_delete_absent_key_is_ok_for_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        for key in StoreKey::ALL {
            assert!(matches!(store.delete(key), Ok(false)), "{key}");
        }

        store.set(StoreKey::AuthToken, "t").unwrap();
        for key in StoreKey::ALL {
            assert!(store.delete(key).is_ok(), "{key}");
        }
        assert!(store.get(StoreKey::AuthToken).unwrap().is_none());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        store.set(StoreKey::CognitoIdToken, "id").unwrap();
        store.set(StoreKey::CognitoAccessToken, "access").unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_reports_crypto_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncryptedFileStore::new(dir.path(), "com.example");
        std::fs::write(store.path(), b"short").unwrap();
        assert!(matches!(
            store.get(StoreKey::AuthToken),
            Err(StoreError::Crypto(_))
        ));
        assert!(store.read(StoreKey::AuthToken).is_none());
    }
}
