//! `authvault import`: add credentials from a list of `otpauth://` URIs.
//!
//! One URI per line; blank lines and lines starting with `#` are ignored.
//! Every line is parsed before the vault is unlocked, so a malformed file
//! changes nothing.  Labels already in the vault are skipped.

use std::fs;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli};
use crate::errors::{AuthVaultError, Result};
use crate::totp::parse_otpauth_uri;
use crate::vault::CredentialRecord;

/// Execute the `import` command.
pub fn execute(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        return Err(AuthVaultError::CommandFailed(format!(
            "import file not found: {}",
            file.display()
        )));
    }

    let content = Zeroizing::new(fs::read_to_string(file)?);
    let records = parse_uri_list(&content)?;

    if records.is_empty() {
        output::warning("No otpauth:// URIs found in the import file.");
        return Ok(());
    }

    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    let mut imported = 0;
    let mut skipped = 0;
    for record in records {
        let label = record.label.clone();
        match session.add_credential(record) {
            Ok(()) => {
                output::info(&format!("  + {label}"));
                imported += 1;
            }
            Err(AuthVaultError::DuplicateLabel(_)) => {
                output::warning(&format!("  skipped '{label}' (already exists)"));
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    if session.is_dirty() {
        session.save()?;
    }

    log_audit(
        session.path(),
        "import",
        None,
        Some(&format!("{imported} imported, {skipped} skipped")),
    );
    output::success(&format!(
        "Imported {imported} credential(s) from {}",
        file.display()
    ));

    Ok(())
}

/// Parse every non-comment line as an `otpauth://` URI.
///
/// Fails on the first bad line, naming its line number.
pub(crate) fn parse_uri_list(content: &str) -> Result<Vec<CredentialRecord>> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record = parse_otpauth_uri(line)
            .and_then(|uri| uri.into_record())
            .map_err(|e| AuthVaultError::InvalidOtpUri(format!("line {}: {e}", idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}
