use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in AuthVault.
///
/// Messages never include underlying crypto-library diagnostics. UI code
/// should branch on [`AuthVaultError::kind`] rather than on the text.
#[derive(Debug, Error)]
pub enum AuthVaultError {
    // --- Crypto errors ---
    #[error("Encryption failed")]
    EncryptionFailed,

    /// AEAD open failed. Remapped at the session boundary.
    #[error("Authentication failed: data could not be verified")]
    AuthenticationFailed,

    #[error("Invalid key derivation parameters: {0}")]
    InvalidParameters(String),

    // --- Vault errors ---
    #[error("Vault not found at {0}")]
    NotFound(PathBuf),

    #[error("Vault already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Vault file is corrupt: {0}")]
    CorruptFile(String),

    #[error("Wrong passphrase or corrupted vault")]
    WrongPassphrase,

    #[error("Vault is in use by another process")]
    VaultBusy,

    #[error("Vault session is locked")]
    SessionLocked,

    // --- Credential errors ---
    #[error("Credential '{0}' already exists")]
    DuplicateLabel(String),

    #[error("Credential '{0}' not found")]
    CredentialNotFound(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid otpauth URI: {0}")]
    InvalidOtpUri(String),

    // --- Keyfile errors ---
    #[error("Keyfile error: {0}")]
    Keyfile(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Audit error: {0}")]
    Audit(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

/// Coarse error classification exposed to front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    CorruptFile,
    WrongPassphrase,
    AuthenticationFailed,
    InvalidParameters,
    DuplicateLabel,
    CredentialNotFound,
    InvalidCredential,
    InvalidOtpUri,
    VaultBusy,
    SessionLocked,
    Io,
    Other,
}

impl AuthVaultError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::CorruptFile(_) => ErrorKind::CorruptFile,
            Self::WrongPassphrase => ErrorKind::WrongPassphrase,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::DuplicateLabel(_) => ErrorKind::DuplicateLabel,
            Self::CredentialNotFound(_) => ErrorKind::CredentialNotFound,
            Self::InvalidCredential(_) => ErrorKind::InvalidCredential,
            Self::InvalidOtpUri(_) => ErrorKind::InvalidOtpUri,
            Self::VaultBusy => ErrorKind::VaultBusy,
            Self::SessionLocked => ErrorKind::SessionLocked,
            Self::Io(_) => ErrorKind::Io,
            Self::EncryptionFailed
            | Self::Keyfile(_)
            | Self::Config(_)
            | Self::CommandFailed(_)
            | Self::UserCancelled
            | Self::Audit(_)
            | Self::Clipboard(_) => ErrorKind::Other,
        }
    }
}

/// Convenience type alias for AuthVault results.
pub type Result<T> = std::result::Result<T, AuthVaultError>;
