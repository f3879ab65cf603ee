//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::Keyfile;
use crate::errors::{AuthVaultError, Result};
use crate::vault::VaultSession;

/// Minimum passphrase length to prevent trivially weak passphrases.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable holding the vault passphrase for scripted use.
pub const PASSWORD_ENV: &str = "AUTHVAULT_PASSWORD";

/// Environment variable holding the new passphrase for `passwd`.
pub const NEW_PASSWORD_ENV: &str = "AUTHVAULT_NEW_PASSWORD";

/// AuthVault CLI: encrypted vault for TOTP two-factor secrets.
#[derive(Parser)]
#[command(
    name = "authvault",
    about = "Encrypted vault for TOTP two-factor secrets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault file (default: from config, else the platform data directory)
    #[arg(long, env = "AUTHVAULT_VAULT", global = true)]
    pub vault: Option<PathBuf>,

    /// Path to a keyfile for two-factor vault access
    #[arg(long, global = true)]
    pub keyfile: Option<PathBuf>,

    /// Directory holding config.toml (default: platform config directory)
    #[arg(long, env = "AUTHVAULT_CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty vault
    Init,

    /// Add a credential from a base32 secret or an otpauth:// URI
    Add {
        /// Label, e.g. "GitHub:alice" (taken from the URI when omitted)
        label: Option<String>,

        #[command(flatten)]
        fields: CredentialArgs,

        /// otpauth://totp/... provisioning URI
        #[arg(long, conflicts_with = "secret")]
        uri: Option<String>,
    },

    /// Change a credential's secret, parameters, or note
    Update {
        /// Label of the credential to change
        label: String,

        #[command(flatten)]
        fields: CredentialArgs,
    },

    /// List credentials
    List {
        /// Only show credentials whose label, issuer, or note matches
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the current code for one credential, or all of them
    Code {
        /// Credential label (shows every code when omitted)
        label: Option<String>,

        /// Copy the code to the clipboard instead of printing it
        #[arg(short, long, requires = "label")]
        copy: bool,

        /// Compute the code for this Unix time instead of now
        #[arg(long, hide = true)]
        at: Option<u64>,
    },

    /// Remove a credential
    Remove {
        /// Credential label
        label: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Rename a credential
    Rename {
        /// Current label
        old: String,
        /// New label
        new: String,
    },

    /// Print the otpauth:// URI for a credential
    Uri {
        /// Credential label
        label: String,
    },

    /// Change the vault passphrase
    Passwd,

    /// Copy the sealed vault file to a backup location
    Backup {
        /// Destination file
        dest: PathBuf,
    },

    /// Replace the vault with a backup
    Restore {
        /// Backup file to restore from
        src: PathBuf,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Export credentials as a plaintext list of otpauth:// URIs
    Export {
        /// Output file path (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import credentials from a file of otpauth:// URIs (one per line)
    Import {
        /// Path to the file to import
        file: PathBuf,
    },

    /// Generate a new random keyfile
    Keyfile {
        /// Where to write the keyfile
        path: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

/// Credential fields shared by `add` and `update`.
#[derive(clap::Args, Debug, Default)]
pub struct CredentialArgs {
    /// Base32 shared secret (prompted for when neither --secret nor --uri is given)
    #[arg(long)]
    pub secret: Option<String>,

    /// Issuer name, e.g. "GitHub"
    #[arg(long)]
    pub issuer: Option<String>,

    /// HMAC algorithm: SHA1, SHA256, or SHA512
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Number of digits (6-8)
    #[arg(long)]
    pub digits: Option<u32>,

    /// Time step in seconds
    #[arg(long)]
    pub period: Option<u64>,

    /// Free-text note
    #[arg(long)]
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load settings from `--config-dir` or the platform config directory.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config_dir {
        Some(dir) => Settings::load(dir),
        None => Settings::load_default(),
    }
}

/// Resolve the vault file: `--vault` wins over the config file.
pub fn vault_path(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    match &cli.vault {
        Some(path) => Ok(path.clone()),
        None => settings.resolved_vault_path(),
    }
}

/// Load the keyfile from the path in CLI args, if provided.
pub fn load_keyfile(cli: &Cli) -> Result<Option<Keyfile>> {
    cli.keyfile.as_deref().map(Keyfile::load).transpose()
}

/// Prompt for the passphrase and unlock the vault.
pub fn open_session(cli: &Cli, settings: &Settings) -> Result<VaultSession> {
    let path = vault_path(cli, settings)?;
    if !path.exists() {
        output::tip("Run `authvault init` to create a vault.");
        return Err(AuthVaultError::NotFound(path));
    }
    let keyfile = load_keyfile(cli)?;
    let password = prompt_password()?;
    VaultSession::unlock_with(
        &path,
        password.as_bytes(),
        &settings.session_options(),
        keyfile.as_ref(),
    )
}

/// Record an operation in the audit log, if the feature is enabled.
pub fn log_audit(vault_path: &Path, op: &str, label: Option<&str>, details: Option<&str>) {
    #[cfg(feature = "audit-log")]
    crate::audit::log_event(vault_path, op, label, details);

    #[cfg(not(feature = "audit-log"))]
    let _ = (vault_path, op, label, details);
}

/// Get the vault passphrase, trying in order:
/// 1. `AUTHVAULT_PASSWORD` env var (scripts)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the passphrase is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter vault passphrase")
        .interact()
        .map_err(|e| AuthVaultError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new passphrase with confirmation (used by `init` and `passwd`).
///
/// `env_var` is checked first for scripted usage.  Enforces a minimum
/// length either way.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(env_var) {
        check_password_strength(&pw)?;
        return Ok(pw);
    }

    loop {
        let password = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt("Choose vault passphrase")
                .with_confirmation(
                    "Confirm vault passphrase",
                    "Passphrases do not match, try again",
                )
                .interact()
                .map_err(|e| AuthVaultError::CommandFailed(format!("passphrase prompt: {e}")))?,
        );

        if let Err(e) = check_password_strength(&password) {
            output::warning(&format!("{e}. Try again."));
            continue;
        }

        return Ok(password);
    }
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthVaultError::CommandFailed(format!(
            "passphrase must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Ask a yes/no question, defaulting to "no".
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AuthVaultError::CommandFailed(format!("confirm prompt: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passphrase_is_rejected() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("long enough").is_ok());
    }

    #[test]
    fn vault_flag_overrides_settings() {
        let cli = Cli::parse_from(["authvault", "--vault", "/tmp/a.vault", "list"]);
        let settings = Settings {
            vault_path: Some(PathBuf::from("/tmp/b.vault")),
            ..Settings::default()
        };
        assert_eq!(
            vault_path(&cli, &settings).unwrap(),
            PathBuf::from("/tmp/a.vault")
        );

        let cli = Cli::parse_from(["authvault", "list"]);
        if cli.vault.is_none() {
            assert_eq!(
                vault_path(&cli, &settings).unwrap(),
                PathBuf::from("/tmp/b.vault")
            );
        }
    }

    #[test]
    fn add_rejects_secret_and_uri_together() {
        let result = Cli::try_parse_from([
            "authvault",
            "add",
            "x",
            "--secret",
            "JBSWY3DPEHPK3PXP",
            "--uri",
            "otpauth://totp/x?secret=JBSWY3DPEHPK3PXP",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn copy_requires_label() {
        assert!(Cli::try_parse_from(["authvault", "code", "--copy"]).is_err());
        assert!(Cli::try_parse_from(["authvault", "code", "github", "--copy"]).is_ok());
    }
}
