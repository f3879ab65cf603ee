//! Advisory cross-process lock for a vault file.
//!
//! The lock lives on a sibling `<vault>.lock` file rather than on the vault
//! itself, because saves replace the vault file by rename and a lock on the
//! old inode would silently stop covering the new one.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::errors::{AuthVaultError, Result};

/// An exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Try to take the lock for `vault_path` without blocking.
    ///
    /// Returns `VaultBusy` if another process (or another session in this
    /// process) already holds it.
    pub fn acquire(vault_path: &Path) -> Result<Self> {
        let path = lock_path(vault_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(lock = %path.display(), "vault lock acquired");
                Ok(Self { file, path })
            }
            Err(e) if is_contended(&e) => {
                warn!(lock = %path.display(), "vault is locked by another session");
                Err(AuthVaultError::VaultBusy)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(lock = %self.path.display(), "vault lock released");
    }
}

/// The lock file path for a vault: `<vault file>.lock`.
pub fn lock_path(vault_path: &Path) -> PathBuf {
    let mut name = vault_path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    vault_path.with_file_name(name)
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
