//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::totp::TotpCode;
use crate::vault::CredentialInfo;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Split a code into two groups for readability: `123456` -> `123 456`.
pub fn group_code(code: &str) -> String {
    let mid = code.len() / 2;
    format!("{} {}", &code[..mid], &code[mid..])
}

/// Countdown text, red when the code is about to roll over.
pub fn countdown(code: &TotpCode) -> String {
    let text = format!("{}s", code.remaining_seconds);
    if code.remaining_seconds <= 5 {
        style(text).red().to_string()
    } else {
        style(text).dim().to_string()
    }
}

/// Print a table of credential metadata (Label, Issuer, Type, Note, Last used).
pub fn print_credentials_table(credentials: &[CredentialInfo]) {
    if credentials.is_empty() {
        info("No credentials in this vault yet.");
        tip("Run `authvault add <LABEL> --secret <BASE32>` to add one.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Label", "Issuer", "Type", "Note", "Last used"]);

    for c in credentials {
        table.add_row(vec![
            c.label.clone(),
            c.issuer.clone().unwrap_or_else(|| "-".into()),
            format!("{} / {} digits / {}s", c.algorithm, c.digits, c.period),
            if c.note.is_empty() {
                "-".into()
            } else {
                c.note.clone()
            },
            c.last_used_at
                .map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!("{table}");
}

/// Print one row per credential with its current code.
pub fn print_codes_table(codes: &[(String, TotpCode)]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Label", "Code", "Expires in"]);

    for (label, code) in codes {
        table.add_row(vec![
            label.clone(),
            style(group_code(&code.code)).bold().to_string(),
            countdown(code),
        ]);
    }

    println!("{table}");
}
