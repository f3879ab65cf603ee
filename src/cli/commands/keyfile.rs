//! `authvault keyfile`: generate a new random keyfile.
//!
//! Pass it with `--keyfile` to `authvault init` (or `passwd`) to require it
//! alongside the passphrase.

use std::path::Path;

use crate::cli::output;
use crate::crypto::Keyfile;
use crate::errors::Result;

/// Execute the `keyfile` command.
pub fn execute(path: &Path) -> Result<()> {
    let keyfile = Keyfile::generate(path)?;

    output::success(&format!("Keyfile generated at {}", path.display()));
    output::info(&format!("Fingerprint: {}", keyfile.fingerprint()));
    output::warning("Keep this file secret and backed up: the vault cannot be opened without it.");
    output::tip(&format!(
        "Run `authvault --keyfile {} init` to create a vault that requires it.",
        path.display()
    ));

    Ok(())
}
