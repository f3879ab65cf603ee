//! `authvault audit`: show recent vault operations.
//!
//! ```text
//! authvault audit                # newest 50 entries
//! authvault audit --last 10
//! authvault audit --since 2w     # s, m, h, d, or w
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::audit::{AuditEntry, AuditLog};
use crate::cli::output;
use crate::cli::{load_settings, vault_path, Cli};
use crate::errors::{AuthVaultError, Result};

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    // Validate --since before touching the database.
    let cutoff = since.map(parse_since).transpose()?;

    let settings = load_settings(cli)?;
    let path = vault_path(cli, &settings)?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(std::path::Path::new("."));

    let entries = if AuditLog::db_path(dir).exists() {
        AuditLog::open(dir)
            .ok_or_else(|| AuthVaultError::Audit("could not open the audit database".into()))?
            .query(last, cutoff)?
    } else {
        Vec::new()
    };

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    println!("{}", style(format!("{} entries", entries.len())).bold());
    println!("{}", render(&entries));
    Ok(())
}

/// Turn `"30m"`, `"24h"`, `"7d"`... into the instant that far in the past.
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let bad = || {
        AuthVaultError::CommandFailed(format!(
            "invalid --since '{input}': expected a number followed by s, m, h, d, or w"
        ))
    };

    let input = input.trim();
    let (split, _) = input.char_indices().last().ok_or_else(bad)?;
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| bad())?;
    if amount < 0 {
        return Err(bad());
    }

    let span = match unit {
        "s" => TimeDelta::try_seconds(amount),
        "m" => TimeDelta::try_minutes(amount),
        "h" => TimeDelta::try_hours(amount),
        "d" => TimeDelta::try_days(amount),
        "w" => TimeDelta::try_weeks(amount),
        _ => return Err(bad()),
    }
    .ok_or_else(bad)?;

    Utc::now().checked_sub_signed(span).ok_or_else(bad)
}

fn render(entries: &[AuditEntry]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["When", "Operation", "Label", "Details"]);
    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            operation_style(&entry.operation),
            entry.label.clone().unwrap_or_else(|| "-".into()),
            entry.details.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    table
}

/// Destructive operations in red, key changes in yellow, the rest plain.
fn operation_style(op: &str) -> String {
    match op {
        "remove" | "restore" => style(op).red().to_string(),
        "passwd" | "export" => style(op).yellow().to_string(),
        "init" | "add" | "import" => style(op).green().to_string(),
        _ => op.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ago(input: &str) -> TimeDelta {
        Utc::now() - parse_since(input).unwrap()
    }

    #[test]
    fn units_are_understood() {
        assert!((ago("90s").num_seconds() - 90).abs() <= 2);
        assert_eq!(ago("30m").num_minutes(), 30);
        assert_eq!(ago("24h").num_hours(), 24);
        assert_eq!(ago("7d").num_days(), 7);
        assert_eq!(ago("2w").num_days(), 14);
    }

    #[test]
    fn malformed_input_is_rejected() {
        for input in ["", "d", "7", "7x", "-3d", "abc", "99999999999999w"] {
            assert!(parse_since(input).is_err(), "{input}");
        }
    }

    #[test]
    fn renders_one_row_per_entry() {
        let entries = vec![AuditEntry {
            id: 1,
            timestamp: Utc::now(),
            operation: "add".into(),
            label: Some("GitHub:alice".into()),
            details: None,
        }];
        let table = render(&entries).to_string();
        assert!(table.contains("GitHub:alice"));
        assert!(table.contains("Operation"));
    }
}
