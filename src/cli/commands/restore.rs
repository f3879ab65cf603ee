//! `authvault restore`: replace the vault with a backup.
//!
//! The backup must unlock with the supplied passphrase before the current
//! vault is touched.

use std::path::Path;

use crate::cli::output;
use crate::cli::{confirm, load_keyfile, load_settings, log_audit, prompt_password, vault_path, Cli};
use crate::errors::{AuthVaultError, Result};
use crate::vault::VaultSession;

/// Execute the `restore` command.
pub fn execute(cli: &Cli, src: &Path, force: bool) -> Result<()> {
    if !src.exists() {
        return Err(AuthVaultError::NotFound(src.to_path_buf()));
    }

    let settings = load_settings(cli)?;
    let path = vault_path(cli, &settings)?;

    if path.exists()
        && !force
        && !confirm(&format!(
            "Replace {} with {}? Current credentials will be lost",
            path.display(),
            src.display()
        ))?
    {
        output::info("Cancelled.");
        return Ok(());
    }

    let keyfile = load_keyfile(cli)?;
    let password = prompt_password()?;
    let count = VaultSession::restore_from(&path, src, password.as_bytes(), keyfile.as_ref())?;

    log_audit(
        &path,
        "restore",
        None,
        Some(&format!("{count} credentials from {}", src.display())),
    );
    output::success(&format!(
        "Restored {count} credential(s) from {}",
        src.display()
    ));

    Ok(())
}
