//! `authvault init`: create a new, empty vault.

use crate::cli::output;
use crate::cli::{
    load_keyfile, load_settings, log_audit, prompt_new_password, vault_path, Cli, PASSWORD_ENV,
};
use crate::errors::{AuthVaultError, Result};
use crate::vault::VaultSession;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let path = vault_path(cli, &settings)?;

    // 1. Refuse to clobber an existing vault.
    if path.exists() {
        output::tip("Use `authvault add` to add credentials to the existing vault.");
        return Err(AuthVaultError::AlreadyExists(path));
    }

    // 2. Prompt for a new passphrase (with confirmation).
    let password = prompt_new_password(PASSWORD_ENV)?;

    // 3. Create the vault with the configured Argon2 params.
    let keyfile = load_keyfile(cli)?;
    let mut session = VaultSession::create(
        &path,
        password.as_bytes(),
        &settings.session_options(),
        keyfile.as_ref(),
    )?;
    session.lock();

    if keyfile.is_some() {
        output::info("Vault created with keyfile: you must pass --keyfile on every command.");
    }
    output::success(&format!("Vault created at {}", path.display()));

    log_audit(&path, "init", None, Some("vault created"));

    output::tip("Run `authvault add <LABEL> --secret <BASE32>` to add a credential.");
    output::tip("Run `authvault import <FILE>` to import otpauth:// URIs.");

    Ok(())
}
