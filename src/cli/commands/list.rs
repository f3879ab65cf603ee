//! `authvault list`: display credentials in a table.

use crate::cli::output;
use crate::cli::{load_settings, open_session, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli, search: Option<&str>) -> Result<()> {
    let settings = load_settings(cli)?;
    let mut session = open_session(cli, &settings)?;

    let credentials = match search {
        Some(query) => session.search(query)?,
        None => session.list_credentials()?,
    };
    session.lock();

    match search {
        Some(query) => output::info(&format!(
            "{} credential(s) matching '{query}'",
            credentials.len()
        )),
        None => output::info(&format!("{} credential(s)", credentials.len())),
    }
    if !credentials.is_empty() || search.is_none() {
        output::print_credentials_table(&credentials);
    }

    Ok(())
}
