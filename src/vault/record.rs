//! Credential records stored inside a vault.
//!
//! A `CredentialRecord` holds everything needed to compute a TOTP code:
//! the shared secret plus algorithm, digit count, and period.  The secret
//! lives in a `SecretSeed`, which zeroes itself on drop and never prints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{AuthVaultError, Result};
use crate::totp::{self, OtpAlgorithm};

/// Longest accepted label, in characters.
const MAX_LABEL_LEN: usize = 256;

pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u64 = 30;

/// Raw shared-secret bytes for one credential.
///
/// Serialized as unpadded base32, which only ever happens inside the
/// encrypted payload.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretSeed(Vec<u8>);

impl SecretSeed {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decode a user-supplied base32 secret (spaces, dashes, lowercase,
    /// and trailing padding are tolerated).
    pub fn from_base32(input: &str) -> Result<Self> {
        totp::decode_secret(input)
            .map(Self)
            .ok_or_else(|| AuthVaultError::InvalidCredential("secret is not valid base32".into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base32(&self) -> String {
        totp::encode_secret(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for SecretSeed {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretSeed {}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed(<redacted>)")
    }
}

impl Serialize for SecretSeed {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut encoded = self.to_base32();
        let result = serializer.serialize_str(&encoded);
        encoded.zeroize();
        result
    }
}

impl<'de> Deserialize<'de> for SecretSeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let decoded = totp::decode_secret(&encoded);
        encoded.zeroize();
        decoded
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom("secret is not valid base32"))
    }
}

/// One managed 2FA entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Unique name within the vault, usually `Issuer:account`.
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    pub secret: SecretSeed,

    #[serde(default)]
    pub algorithm: OtpAlgorithm,

    #[serde(default = "default_digits")]
    pub digits: u32,

    /// Time step in seconds.
    #[serde(default = "default_period")]
    pub period: u64,

    #[serde(default)]
    pub note: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

fn default_digits() -> u32 {
    DEFAULT_DIGITS
}

fn default_period() -> u64 {
    DEFAULT_PERIOD
}

impl CredentialRecord {
    /// Build a record with SHA-1, 6 digits, and a 30-second period.
    pub fn new(label: &str, secret: SecretSeed) -> Result<Self> {
        let now = Utc::now();
        let record = Self {
            label: normalize_label(label),
            issuer: None,
            secret,
            algorithm: OtpAlgorithm::default(),
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            note: String::new(),
            created_at: now,
            updated_at: now,
            last_used_at: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer.map(|i| i.trim().to_string()).filter(|i| !i.is_empty());
        self
    }

    pub fn with_algorithm(mut self, algorithm: OtpAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.trim().to_string();
        self
    }

    /// Check label, secret, and TOTP parameters.
    pub fn validate(&self) -> Result<()> {
        validate_label(&self.label)?;
        if self.secret.is_empty() {
            return Err(AuthVaultError::InvalidCredential(
                "secret cannot be empty".into(),
            ));
        }
        totp::validate_params(self.digits, self.period)
    }

    /// Metadata view without the secret.
    pub fn info(&self) -> CredentialInfo {
        CredentialInfo {
            label: self.label.clone(),
            issuer: self.issuer.clone(),
            algorithm: self.algorithm,
            digits: self.digits,
            period: self.period,
            note: self.note.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
        }
    }

    /// Case-insensitive substring match over label, issuer, and note.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.label.to_lowercase().contains(&query)
            || self
                .issuer
                .as_deref()
                .is_some_and(|i| i.to_lowercase().contains(&query))
            || self.note.to_lowercase().contains(&query)
    }
}

/// Lightweight metadata about a credential (no secret).
///
/// Returned by `VaultSession::list_credentials` so callers can display
/// entries without touching seed material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInfo {
    pub label: String,
    pub issuer: Option<String>,
    pub algorithm: OtpAlgorithm,
    pub digits: u32,
    pub period: u64,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Trim surrounding whitespace from a label.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_string()
}

/// A label must be non-empty, at most 256 characters, and free of control characters.
pub fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(AuthVaultError::InvalidCredential(
            "label cannot be empty".into(),
        ));
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(AuthVaultError::InvalidCredential(format!(
            "label cannot exceed {MAX_LABEL_LEN} characters"
        )));
    }
    if label.chars().any(char::is_control) {
        return Err(AuthVaultError::InvalidCredential(
            "label cannot contain control characters".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> SecretSeed {
        SecretSeed::from_base32("JBSWY3DPEHPK3PXP").unwrap()
    }

    #[test]
    fn new_record_has_totp_defaults() {
        let record = CredentialRecord::new("  github  ", seed()).unwrap();
        assert_eq!(record.label, "github");
        assert_eq!(record.algorithm, OtpAlgorithm::Sha1);
        assert_eq!(record.digits, 6);
        assert_eq!(record.period, 30);
        assert!(record.last_used_at.is_none());
    }

    #[test]
    fn empty_label_is_rejected() {
        let err = CredentialRecord::new("   ", seed()).unwrap_err();
        assert!(matches!(err, AuthVaultError::InvalidCredential(_)));
    }

    #[test]
    fn overlong_label_is_rejected() {
        assert!(validate_label(&"x".repeat(257)).is_err());
        assert!(validate_label(&"x".repeat(256)).is_ok());
    }

    #[test]
    fn control_characters_are_rejected() {
        assert!(validate_label("git\nhub").is_err());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let record = CredentialRecord::new("github", seed()).unwrap();
        let printed = format!("{record:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("JBSWY3DPEHPK3PXP"));
    }

    #[test]
    fn secret_serializes_as_base32() {
        let json = serde_json::to_string(&seed()).unwrap();
        assert_eq!(json, "\"JBSWY3DPEHPK3PXP\"");

        let back: SecretSeed = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seed());
    }

    #[test]
    fn invalid_base32_secret_is_rejected() {
        assert!(SecretSeed::from_base32("not base32 !!").is_err());
        assert!(serde_json::from_str::<SecretSeed>("\"1111\"").is_err());
    }

    #[test]
    fn bad_totp_params_fail_validation() {
        let record = CredentialRecord::new("github", seed()).unwrap().with_digits(4);
        assert!(record.validate().is_err());

        let record = CredentialRecord::new("github", seed()).unwrap().with_period(0);
        assert!(record.validate().is_err());
    }

    #[test]
    fn matches_label_issuer_and_note() {
        let record = CredentialRecord::new("alice@example.com", seed())
            .unwrap()
            .with_issuer(Some("GitHub".into()))
            .with_note("work laptop");

        assert!(record.matches("ALICE"));
        assert!(record.matches("github"));
        assert!(record.matches("laptop"));
        assert!(record.matches(""));
        assert!(!record.matches("gitlab"));
    }

    #[test]
    fn blank_issuer_becomes_none() {
        let record = CredentialRecord::new("a", seed())
            .unwrap()
            .with_issuer(Some("  ".into()));
        assert!(record.issuer.is_none());
    }
}
