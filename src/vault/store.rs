//! On-disk vault persistence.
//!
//! `VaultStore` knows where a vault lives and how to read, write, create,
//! back up, and restore it.  It never holds a key or decrypted records;
//! that is the job of `VaultSession`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::crypto::kdf::{derive_key, generate_salt, DerivedKey, KdfParams};
use crate::crypto::keyfile::{kdf_input, Keyfile};
use crate::errors::{AuthVaultError, Result};

use super::format::{self, VaultFile, VaultHeader};
use super::lock::VaultLock;

/// Handle to a vault file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStore {
    path: PathBuf,
}

impl VaultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the `.vault` file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Take the advisory lock guarding this vault.
    pub fn acquire_lock(&self) -> Result<VaultLock> {
        VaultLock::acquire(&self.path)
    }

    /// Read and parse the vault file.
    ///
    /// Leftover temp files from an interrupted save are never looked at.
    pub fn load(&self) -> Result<VaultFile> {
        format::read_vault(&self.path)
    }

    /// Atomically replace the vault file.
    pub fn save(&self, file: &VaultFile) -> Result<()> {
        self.ensure_parent_dir()?;
        format::write_vault(&self.path, file)?;
        debug!(path = %self.path.display(), "vault saved");
        Ok(())
    }

    /// Create a new, empty vault and persist it.
    ///
    /// Generates a fresh salt, derives the key with `params`, and seals an
    /// empty credential list.  With a keyfile, the KDF input is the keyfile
    /// combination and its fingerprint is recorded in the header.
    pub fn create(
        &self,
        passphrase: &[u8],
        params: &KdfParams,
        keyfile: Option<&Keyfile>,
    ) -> Result<(VaultFile, DerivedKey)> {
        if self.path.exists() {
            return Err(AuthVaultError::AlreadyExists(self.path.clone()));
        }
        params.validate()?;

        let (header, key) = new_header(passphrase, params, keyfile)?;
        let file = VaultFile::seal(header, &key, &[])?;
        self.save(&file)?;

        info!(path = %self.path.display(), "vault created");
        Ok((file, key))
    }

    /// Copy the current vault file to `dest` atomically.
    ///
    /// The file is parsed first so a corrupt vault is never backed up
    /// silently.  The copy stays sealed under the same passphrase.
    pub fn backup(&self, dest: &Path) -> Result<()> {
        if dest == self.path {
            return Err(AuthVaultError::CommandFailed(
                "backup destination is the vault itself".into(),
            ));
        }
        let file = self.load()?;
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        format::write_vault(dest, &file)?;
        info!(from = %self.path.display(), to = %dest.display(), "vault backed up");
        Ok(())
    }

    /// Replace this vault with the contents of `src`.
    ///
    /// `src` must parse as a vault file.  The caller is expected to hold the
    /// vault lock and to have verified the passphrase against `src` if it
    /// wants that guarantee.
    pub fn restore(&self, src: &Path) -> Result<VaultFile> {
        let file = format::read_vault(src)?;
        self.save(&file)?;
        info!(from = %src.display(), to = %self.path.display(), "vault restored");
        Ok(file)
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Build a header with a fresh salt and derive the matching key.
pub(crate) fn new_header(
    passphrase: &[u8],
    params: &KdfParams,
    keyfile: Option<&Keyfile>,
) -> Result<(VaultHeader, DerivedKey)> {
    let salt = generate_salt();
    let input = kdf_input(passphrase, keyfile)?;
    let key = derive_key(&input, &salt, params)?;

    let header = VaultHeader {
        salt: salt.to_vec(),
        kdf: *params,
        created_at: Utc::now(),
        keyfile_fingerprint: keyfile.map(Keyfile::fingerprint),
    };
    Ok((header, key))
}
