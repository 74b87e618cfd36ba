//! File helpers for the encrypted backend.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use std::path::Path;

use crate::Result;

/// Set restrictive file permissions (0600 on Unix).
pub fn set_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

/// Overwrite a file with random bytes, then remove it.
pub fn secure_remove(path: &Path) -> Result<()> {
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut noise = vec![0u8; metadata.len() as usize];
        OsRng.fill_bytes(&mut noise);
        let _ = std::fs::write(path, &noise);
    }
    std::fs::remove_file(path)?;
    Ok(())
}
