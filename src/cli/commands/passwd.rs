//! `authvault passwd`: change the vault passphrase.
//!
//! Unlocks with the current passphrase, generates a new salt, derives a
//! new key from the new passphrase with the configured Argon2 parameters,
//! re-seals every credential, and writes the vault atomically.

use crate::cli::output;
use crate::cli::{
    load_keyfile, load_settings, log_audit, open_session, prompt_new_password, Cli,
    NEW_PASSWORD_ENV,
};
use crate::errors::Result;

/// Execute the `passwd` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;

    // 1. Open the vault with the current passphrase.
    output::info("Enter your current vault passphrase.");
    let mut session = open_session(cli, &settings)?;

    // 2. Prompt for the new passphrase.
    output::info("Choose your new vault passphrase.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    // 3. Re-key.  A vault that used a keyfile keeps using the same one.
    let keyfile = load_keyfile(cli)?;
    let keyfile = if session.requires_keyfile()? {
        keyfile
    } else {
        None
    };
    session.change_passphrase(new_password.as_bytes(), keyfile.as_ref())?;

    let count = session.credential_count()?;
    let path = session.path().to_path_buf();
    session.lock();

    log_audit(
        &path,
        "passwd",
        None,
        Some(&format!("{count} credentials re-sealed")),
    );
    output::success(&format!(
        "Passphrase changed ({count} credentials re-sealed)"
    ));

    Ok(())
}
