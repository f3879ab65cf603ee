//! `authvault export`: write every credential as an `otpauth://` URI.
//!
//! One URI per line, the same format `authvault import` reads.  The output
//! is plaintext; export files are created owner-readable only.
//!
//! The configured default issuer is not applied here, so a credential
//! without an issuer keeps its exact label through export and import.

use std::fs;
use std::io::Write;
use std::path::Path;

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli};
use crate::errors::{AuthVaultError, Result};
use crate::totp::to_otpauth_uri;
use crate::vault::VaultSession;

/// Execute the `export` command.
pub fn execute(cli: &Cli, output_path: Option<&Path>) -> Result<()> {
    if let Some(dest) = output_path {
        // Safety: refuse to overwrite vault files.
        if dest
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("vault"))
        {
            return Err(AuthVaultError::CommandFailed(
                "refusing to export over a .vault file".into(),
            ));
        }
    }

    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;
    let (content, count) = render_uris(&mut session)?;
    let path = session.path().to_path_buf();
    session.lock();

    log_audit(&path, "export", None, Some(&format!("{count} credentials")));

    match output_path {
        Some(dest) => {
            write_private(dest, content.as_bytes()).map_err(|e| {
                AuthVaultError::CommandFailed(format!("failed to write export file: {e}"))
            })?;
            output::success(&format!("Exported {count} credentials to {}", dest.display()));
            output::warning("The export file contains secrets in plaintext. Delete it when done.");
        }
        None => {
            // Write to stdout (no success message, just raw output).
            print!("{}", content.as_str());
        }
    }

    Ok(())
}

/// All credentials as newline-terminated URIs, sorted by label.
fn render_uris(session: &mut VaultSession) -> Result<(Zeroizing<String>, usize)> {
    let labels: Vec<String> = session
        .list_credentials()?
        .into_iter()
        .map(|c| c.label)
        .collect();

    let mut content = Zeroizing::new(String::new());
    for label in &labels {
        let record = session.credential(label)?;
        content.push_str(&to_otpauth_uri(record, None));
        content.push('\n');
    }
    Ok((content, labels.len()))
}

/// Write `bytes` to `path`, readable by the owner only on unix.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)?.write_all(bytes)
}
