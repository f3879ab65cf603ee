//! Optional keyfile second factor.
//!
//! A keyfile is 32 random bytes kept outside the vault.  When a vault is
//! created with one, the KDF input becomes `HMAC-SHA256(keyfile, passphrase)`
//! and the header records a SHA-256 fingerprint of the keyfile so a missing
//! or different keyfile can be rejected before running Argon2.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::errors::{AuthVaultError, Result};

/// Expected length of a keyfile in bytes (256 bits).
pub const KEYFILE_LEN: usize = 32;

/// Keyfile bytes held in memory. Zeroed on drop.
pub struct Keyfile {
    bytes: Zeroizing<Vec<u8>>,
}

impl Keyfile {
    /// Wrap raw keyfile bytes, checking the length.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() != KEYFILE_LEN {
            return Err(AuthVaultError::Keyfile(format!(
                "keyfile must be exactly {KEYFILE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Generate a new random keyfile and write it to `path` (mode 0600 on unix).
    pub fn generate(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(AuthVaultError::Keyfile(format!(
                "keyfile already exists at {}",
                path.display()
            )));
        }

        let mut bytes = Zeroizing::new(vec![0u8; KEYFILE_LEN]);
        rand::rng().fill_bytes(&mut bytes);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, bytes.as_slice())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self { bytes })
    }

    /// Read a keyfile from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AuthVaultError::Keyfile(format!(
                "keyfile not found at {}",
                path.display()
            )));
        }
        Self::from_bytes(fs::read(path)?)
    }

    /// Mix the keyfile into a passphrase: `HMAC-SHA256(keyfile, passphrase)`.
    pub fn combine(&self, passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&self.bytes)
            .map_err(|e| AuthVaultError::Keyfile(format!("HMAC init failed: {e}")))?;
        mac.update(passphrase);
        Ok(Zeroizing::new(mac.finalize().into_bytes().to_vec()))
    }

    /// Base64 SHA-256 fingerprint stored in the vault header.
    pub fn fingerprint(&self) -> String {
        BASE64.encode(Sha256::digest(self.bytes.as_slice()))
    }

    /// Constant-time comparison against a stored fingerprint.
    pub fn matches(&self, fingerprint: &str) -> bool {
        self.fingerprint()
            .as_bytes()
            .ct_eq(fingerprint.as_bytes())
            .into()
    }
}

/// The bytes fed into the KDF: the passphrase, or its keyfile combination.
pub fn kdf_input(passphrase: &[u8], keyfile: Option<&Keyfile>) -> Result<Zeroizing<Vec<u8>>> {
    match keyfile {
        Some(kf) => kf.combine(passphrase),
        None => Ok(Zeroizing::new(passphrase.to_vec())),
    }
}
