//! `authvault code`: show current TOTP codes.
//!
//! Usage:
//!   authvault code                 # table of every code
//!   authvault code github          # just the code, for scripts
//!   authvault code github --copy   # copy to the clipboard

use std::thread;
use std::time::Duration;

use console::style;

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli};
use crate::errors::{AuthVaultError, Result};
use crate::totp::{self, TotpCode};

/// Execute the `code` command.
pub fn execute(cli: &Cli, label: Option<&str>, copy: bool, at: Option<u64>) -> Result<()> {
    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;
    let now = at.unwrap_or_else(totp::unix_now);

    let Some(label) = label else {
        let labels: Vec<String> = session
            .list_credentials()?
            .into_iter()
            .map(|c| c.label)
            .collect();
        if labels.is_empty() {
            output::info("No credentials in this vault yet.");
            return Ok(());
        }

        let mut codes = Vec::with_capacity(labels.len());
        for label in labels {
            let code = session.generate_code(&label, now)?;
            codes.push((label, code));
        }
        session.save()?;
        session.lock();

        output::print_codes_table(&codes);
        return Ok(());
    };

    let code = session.generate_code(label, now)?;
    // Persist last_used_at.
    session.save()?;
    let path = session.path().to_path_buf();
    session.lock();

    log_audit(&path, "code", Some(label), copy.then_some("copied to clipboard"));

    if copy {
        copy_to_clipboard(label, &code, settings.clipboard_timeout())?;
    } else {
        println!("{}", code.code);
        eprintln!(
            "{}",
            style(format!("expires in {}s", code.remaining_seconds)).dim()
        );
    }

    Ok(())
}

/// Put the code on the clipboard, then clear it after `timeout`.
///
/// The process stays alive until the clipboard is cleared because on
/// X11/Wayland the contents vanish once the owning process exits.
fn copy_to_clipboard(label: &str, code: &TotpCode, timeout: Option<Duration>) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| AuthVaultError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(code.code.clone())
        .map_err(|e| AuthVaultError::Clipboard(e.to_string()))?;

    output::success(&format!(
        "Code for '{label}' copied (valid for {}s)",
        code.remaining_seconds
    ));

    let Some(timeout) = timeout else {
        return Ok(());
    };
    output::tip(&format!(
        "Clipboard will be cleared in {}s.",
        timeout.as_secs()
    ));
    thread::sleep(timeout);

    // Only clear if the user has not copied something else meanwhile.
    if clipboard.get_text().ok().as_deref() == Some(code.code.as_str()) {
        let _ = clipboard.clear();
    }
    Ok(())
}
