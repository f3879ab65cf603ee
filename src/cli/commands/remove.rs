//! `authvault remove`: delete a credential from the vault.

use crate::cli::output;
use crate::cli::{confirm, load_settings, log_audit, open_session, Cli};
use crate::errors::Result;

/// Execute the `remove` command.
pub fn execute(cli: &Cli, label: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force && !confirm(&format!("Remove credential '{label}'? This cannot be undone"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    session.remove_credential(label)?;
    if session.is_dirty() {
        session.save()?;
    }

    log_audit(
        session.path(),
        "remove",
        Some(label),
        force.then_some("forced"),
    );
    output::success(&format!("Removed '{label}'"));

    Ok(())
}
