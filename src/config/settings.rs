use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::KdfParams;
use crate::errors::{AuthVaultError, Result};
use crate::vault::SessionOptions;

/// User-level configuration, loaded from `<config dir>/authvault/config.toml`.
///
/// Every field has a sensible default so AuthVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Vault file location.  Defaults to `<data dir>/authvault/accounts.vault`.
    #[serde(default)]
    pub vault_path: Option<PathBuf>,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Write every change to disk as soon as it is made.
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,

    /// Lock an idle session after this many seconds; 0 disables.
    #[serde(default = "default_auto_lock_timeout_secs")]
    pub auto_lock_timeout_secs: u64,

    /// Clear a copied code from the clipboard after this many seconds; 0 keeps it.
    #[serde(default = "default_clipboard_timeout_secs")]
    pub clipboard_timeout_secs: u64,

    /// Issuer `authvault uri` adds for credentials that have none.
    #[serde(default = "default_issuer")]
    pub default_issuer: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_auto_save() -> bool {
    true
}

fn default_auto_lock_timeout_secs() -> u64 {
    300
}

fn default_clipboard_timeout_secs() -> u64 {
    30
}

fn default_issuer() -> String {
    "AuthVault".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_path: None,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            auto_save: default_auto_save(),
            auto_lock_timeout_secs: default_auto_lock_timeout_secs(),
            clipboard_timeout_secs: default_clipboard_timeout_secs(),
            default_issuer: default_issuer(),
        }
    }
}

impl Settings {
    /// Name of the config file inside the config directory.
    const FILE_NAME: &'static str = "config.toml";

    /// Application directory name under the platform config/data dirs.
    const APP_DIR: &'static str = "authvault";

    /// Load settings from `<dir>/config.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            AuthVaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;
        settings.kdf_params().validate().map_err(|e| {
            AuthVaultError::Config(format!("{}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Load settings from the platform config directory
    /// (e.g. `~/.config/authvault/config.toml` on Linux).
    pub fn load_default() -> Result<Self> {
        match Self::config_dir() {
            Some(dir) => Self::load(&dir),
            None => Ok(Self::default()),
        }
    }

    /// `<config dir>/authvault`, if the platform has a config directory.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(Self::APP_DIR))
    }

    /// The vault file to use: the configured path, or the platform default.
    pub fn resolved_vault_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.vault_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(Self::APP_DIR).join("accounts.vault"))
            .ok_or_else(|| {
                AuthVaultError::Config(
                    "could not determine a data directory: pass --vault <path>".into(),
                )
            })
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Session behaviour derived from these settings.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            kdf: self.kdf_params(),
            auto_save: self.auto_save,
            idle_timeout: (self.auto_lock_timeout_secs > 0)
                .then(|| Duration::from_secs(self.auto_lock_timeout_secs)),
        }
    }

    /// How long a copied code stays on the clipboard, if it is cleared at all.
    pub fn clipboard_timeout(&self) -> Option<Duration> {
        (self.clipboard_timeout_secs > 0).then(|| Duration::from_secs(self.clipboard_timeout_secs))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.vault_path, None);
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
        assert!(s.auto_save);
        assert_eq!(s.auto_lock_timeout_secs, 300);
        assert_eq!(s.clipboard_timeout_secs, 30);
        assert_eq!(s.default_issuer, "AuthVault");
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
vault_path = "/srv/2fa/work.vault"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
auto_save = false
auto_lock_timeout_secs = 0
clipboard_timeout_secs = 10
default_issuer = "Work"
"#;
        fs::write(tmp.path().join("config.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.vault_path, Some(PathBuf::from("/srv/2fa/work.vault")));
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.argon2_parallelism, 8);
        assert!(!settings.auto_save);
        assert_eq!(settings.default_issuer, "Work");

        let options = settings.session_options();
        assert_eq!(options.idle_timeout, None);
        assert!(!options.auto_save);
        assert_eq!(settings.clipboard_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "auto_save = false\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert!(!settings.auto_save);
        // Rest should be defaults
        assert_eq!(settings.argon2_iterations, 3);
        assert_eq!(
            settings.session_options().idle_timeout,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "not valid {{toml").unwrap();

        let err = Settings::load(tmp.path()).unwrap_err();
        assert!(matches!(err, AuthVaultError::Config(_)));
    }

    #[test]
    fn load_rejects_out_of_range_argon2_settings() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "argon2_iterations = 1000\n").unwrap();

        let err = Settings::load(tmp.path()).unwrap_err();
        assert!(matches!(err, AuthVaultError::Config(_)));
    }

    #[test]
    fn configured_vault_path_wins() {
        let s = Settings {
            vault_path: Some(PathBuf::from("/tmp/mine.vault")),
            ..Settings::default()
        };
        assert_eq!(
            s.resolved_vault_path().unwrap(),
            PathBuf::from("/tmp/mine.vault")
        );
    }
}
