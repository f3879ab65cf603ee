//! `authvault backup`: copy the sealed vault file elsewhere.
//!
//! The backup is byte-for-byte the encrypted vault, so it opens with the
//! same passphrase (and keyfile) as the original.  No passphrase is needed
//! to make one.

use std::path::Path;

use crate::cli::output;
use crate::cli::{load_settings, log_audit, vault_path, Cli};
use crate::errors::{AuthVaultError, Result};
use crate::vault::VaultStore;

/// Execute the `backup` command.
pub fn execute(cli: &Cli, dest: &Path) -> Result<()> {
    let settings = load_settings(cli)?;
    let path = vault_path(cli, &settings)?;
    let store = VaultStore::new(&path);

    if !store.exists() {
        return Err(AuthVaultError::NotFound(path));
    }
    if dest.exists() {
        return Err(AuthVaultError::AlreadyExists(dest.to_path_buf()));
    }

    store.backup(dest)?;

    log_audit(&path, "backup", None, Some(&dest.display().to_string()));
    output::success(&format!("Vault backed up to {}", dest.display()));

    Ok(())
}
