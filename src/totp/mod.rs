//! RFC 6238 time-based one-time passwords.
//!
//! `compute_code` is the HOTP core (RFC 4226): HMAC over the big-endian
//! counter, dynamic truncation, then reduction to `digits` decimal digits.
//! The hash is chosen by `OtpAlgorithm` rather than by trait objects.

pub mod uri;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::BASE32_NOPAD;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use crate::errors::{AuthVaultError, Result};

pub use uri::{parse_otpauth_uri, to_otpauth_uri, OtpUri};

/// Supported digit counts.
pub const MIN_DIGITS: u32 = 6;
pub const MAX_DIGITS: u32 = 8;

/// Longest accepted period, in seconds.
pub const MAX_PERIOD: u64 = 300;

/// HMAC hash used for code generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OtpAlgorithm {
    #[default]
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    Sha512,
}

impl OtpAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for OtpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpAlgorithm {
    type Err = AuthVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            other => Err(AuthVaultError::InvalidCredential(format!(
                "unsupported algorithm '{other}': use SHA1, SHA256, or SHA512"
            ))),
        }
    }
}

/// A generated code and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpCode {
    pub code: String,
    pub remaining_seconds: u64,
    pub period: u64,
}

/// Check digit count and period against the supported ranges.
pub fn validate_params(digits: u32, period: u64) -> Result<()> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(AuthVaultError::InvalidCredential(format!(
            "digits must be between {MIN_DIGITS} and {MAX_DIGITS} (got {digits})"
        )));
    }
    if !(1..=MAX_PERIOD).contains(&period) {
        return Err(AuthVaultError::InvalidCredential(format!(
            "period must be between 1 and {MAX_PERIOD} seconds (got {period})"
        )));
    }
    Ok(())
}

/// Compute the HOTP value for `counter`, zero-padded to `digits`.
pub fn compute_code(
    algorithm: OtpAlgorithm,
    seed: &[u8],
    counter: u64,
    digits: u32,
) -> Result<String> {
    validate_params(digits, 1)?;

    let message = counter.to_be_bytes();
    let mut digest = match algorithm {
        OtpAlgorithm::Sha1 => hmac_digest::<Hmac<Sha1>>(seed, &message)?,
        OtpAlgorithm::Sha256 => hmac_digest::<Hmac<Sha256>>(seed, &message)?,
        OtpAlgorithm::Sha512 => hmac_digest::<Hmac<Sha512>>(seed, &message)?,
    };

    // Dynamic truncation: the low nibble of the last byte picks the offset.
    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    digest.zeroize();

    let value = binary % 10u32.pow(digits);
    Ok(format!("{value:0width$}", width = digits as usize))
}

fn hmac_digest<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|_| AuthVaultError::InvalidCredential("unusable secret".into()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Seconds until the code for `unix_time` rolls over.
pub fn remaining_seconds(period: u64, unix_time: u64) -> u64 {
    period - (unix_time % period)
}

/// Generate the TOTP code for `unix_time`.
pub fn generate(
    algorithm: OtpAlgorithm,
    seed: &[u8],
    digits: u32,
    period: u64,
    unix_time: u64,
) -> Result<TotpCode> {
    validate_params(digits, period)?;
    let code = compute_code(algorithm, seed, unix_time / period, digits)?;
    Ok(TotpCode {
        code,
        remaining_seconds: remaining_seconds(period, unix_time),
        period,
    })
}

/// Current Unix time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Normalize and decode a base32 secret.
///
/// Whitespace and dashes are removed, letters upper-cased, and trailing
/// `=` padding stripped.  Returns `None` for empty or invalid input.
pub fn decode_secret(input: &str) -> Option<Vec<u8>> {
    let mut normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let trimmed_len = normalized.trim_end_matches('=').len();
    normalized.truncate(trimmed_len);

    let decoded = if normalized.is_empty() {
        None
    } else {
        BASE32_NOPAD.decode(normalized.as_bytes()).ok()
    };
    normalized.zeroize();
    decoded.filter(|bytes| !bytes.is_empty())
}

/// Encode secret bytes as unpadded base32.
pub fn encode_secret(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}
