use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authvault::cli::commands;
use authvault::cli::{output, Cli, Commands};
use authvault::errors::{AuthVaultError, ErrorKind};

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so `authvault code <label>` output stays pipeable.
    let filter = EnvFilter::try_from_env("AUTHVAULT_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("authvault=debug")
        } else {
            EnvFilter::new("authvault=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Add {
            ref label,
            ref fields,
            ref uri,
        } => commands::add::execute(&cli, label.as_deref(), fields, uri.as_deref()),
        Commands::Update {
            ref label,
            ref fields,
        } => commands::update::execute(&cli, label, fields),
        Commands::List { ref search } => commands::list::execute(&cli, search.as_deref()),
        Commands::Code {
            ref label,
            copy,
            at,
        } => commands::code::execute(&cli, label.as_deref(), copy, at),
        Commands::Remove { ref label, force } => commands::remove::execute(&cli, label, force),
        Commands::Rename { ref old, ref new } => commands::rename::execute(&cli, old, new),
        Commands::Uri { ref label } => commands::uri::execute(&cli, label),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Backup { ref dest } => commands::backup::execute(&cli, dest),
        Commands::Restore { ref src, force } => commands::restore::execute(&cli, src, force),
        Commands::Export { ref output } => commands::export::execute(&cli, output.as_deref()),
        Commands::Import { ref file } => commands::import_cmd::execute(&cli, file),
        Commands::Keyfile { ref path } => commands::keyfile::execute(path),
        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Audit { last, ref since } => audit(&cli, last, since.as_deref()),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        if let Some(hint) = hint(&e) {
            output::tip(hint);
        }
        std::process::exit(1);
    }
}

#[cfg(feature = "audit-log")]
fn audit(cli: &Cli, last: usize, since: Option<&str>) -> authvault::errors::Result<()> {
    commands::audit_cmd::execute(cli, last, since)
}

#[cfg(not(feature = "audit-log"))]
fn audit(_cli: &Cli, _last: usize, _since: Option<&str>) -> authvault::errors::Result<()> {
    Err(AuthVaultError::Audit(
        "audit log support not compiled: rebuild with `--features audit-log`".into(),
    ))
}

fn hint(err: &AuthVaultError) -> Option<&'static str> {
    match err.kind() {
        ErrorKind::NotFound => Some("run: authvault init"),
        ErrorKind::VaultBusy => Some("close the other authvault session and try again"),
        ErrorKind::WrongPassphrase => Some("check the passphrase and --keyfile"),
        ErrorKind::CredentialNotFound => Some("run: authvault list"),
        _ => None,
    }
}
