//! `authvault rename`: change a credential's label.

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli};
use crate::errors::Result;

/// Execute the `rename` command.
pub fn execute(cli: &Cli, old: &str, new: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    session.rename_credential(old, new)?;
    if session.is_dirty() {
        session.save()?;
    }

    log_audit(
        session.path(),
        "rename",
        Some(new),
        Some(&format!("was '{old}'")),
    );
    output::success(&format!("Renamed '{old}' to '{new}'"));

    Ok(())
}
