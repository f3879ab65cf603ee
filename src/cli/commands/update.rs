//! `authvault update`: change an existing credential in place.

use crate::cli::commands::add::apply_fields;
use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli, CredentialArgs};
use crate::errors::{AuthVaultError, Result};

/// Execute the `update` command.
pub fn execute(cli: &Cli, label: &str, fields: &CredentialArgs) -> Result<()> {
    if fields.secret.is_none()
        && fields.issuer.is_none()
        && fields.algorithm.is_none()
        && fields.digits.is_none()
        && fields.period.is_none()
        && fields.note.is_none()
    {
        return Err(AuthVaultError::CommandFailed(
            "nothing to update: pass at least one of --secret, --issuer, --algorithm, --digits, --period, --note".into(),
        ));
    }

    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    let mut record = session.credential(label)?.clone();
    apply_fields(&mut record, fields, true)?;
    let label = record.label.clone();
    session.update_credential(&label, record)?;
    if session.is_dirty() {
        session.save()?;
    }

    let details = fields.secret.is_some().then_some("secret replaced");
    log_audit(session.path(), "update", Some(&label), details);
    output::success(&format!("Updated '{label}'"));

    Ok(())
}
