//! `authvault completions <SHELL>`: print a completion script.
//!
//! `authvault completions zsh > "${fpath[1]}/_authvault"`

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::Cli;
use crate::errors::Result;

/// Execute the `completions` command.
pub fn execute(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout().lock())
}

fn write_script(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, out);
    out.flush()?;
    Ok(())
}
