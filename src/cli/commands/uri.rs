//! `authvault uri`: print the provisioning URI for one credential.
//!
//! The output contains the secret; it is meant for moving a credential to
//! another authenticator (e.g. piping into a QR encoder).

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli};
use crate::errors::Result;
use crate::totp::to_otpauth_uri;

/// Execute the `uri` command.
pub fn execute(cli: &Cli, label: &str) -> Result<()> {
    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    let record = session.credential(label)?;
    let uri = zeroize::Zeroizing::new(to_otpauth_uri(record, Some(&settings.default_issuer)));
    let label = record.label.clone();
    let path = session.path().to_path_buf();
    session.lock();

    log_audit(&path, "uri", Some(&label), None);
    output::warning("This URI contains the secret in plaintext.");
    println!("{}", uri.as_str());

    Ok(())
}
