//! `otpauth://` provisioning URIs (the Key Uri Format used in QR codes).
//!
//! ```text
//! otpauth://totp/Issuer:account?secret=BASE32&issuer=Issuer&algorithm=SHA1&digits=6&period=30
//! ```
//!
//! Besides the standard parameters, `note` carries the credential's note so
//! an export can be imported without losing it.  Other apps ignore it.
//!
//! Parsing is all-or-nothing: every field is validated before an
//! `OtpUri` is returned, so a malformed URI never yields a half-filled record.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use super::{validate_params, OtpAlgorithm};
use crate::errors::{AuthVaultError, Result};
use crate::vault::record::{
    validate_label, CredentialRecord, SecretSeed, DEFAULT_DIGITS, DEFAULT_PERIOD,
};

/// Characters left unescaped in the label and query values.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'@');

/// Everything extracted from a valid `otpauth://totp/` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpUri {
    /// Decoded label, e.g. `GitHub:alice`.
    pub label: String,
    /// `issuer` parameter, falling back to the label prefix.
    pub issuer: Option<String>,
    /// Label part after the issuer prefix.
    pub account: String,
    pub secret: SecretSeed,
    pub algorithm: OtpAlgorithm,
    pub digits: u32,
    pub period: u64,
    /// `note` parameter, empty when absent.
    pub note: String,
}

impl OtpUri {
    /// Turn the parsed fields into a new credential record.
    pub fn into_record(self) -> Result<CredentialRecord> {
        let record = CredentialRecord::new(&self.label, self.secret)?
            .with_issuer(self.issuer)
            .with_algorithm(self.algorithm)
            .with_digits(self.digits)
            .with_period(self.period)
            .with_note(&self.note);
        record.validate()?;
        Ok(record)
    }
}

fn invalid(reason: &str) -> AuthVaultError {
    AuthVaultError::InvalidOtpUri(reason.to_string())
}

/// Parse an `otpauth://totp/...` URI.
pub fn parse_otpauth_uri(input: &str) -> Result<OtpUri> {
    let url = Url::parse(input.trim()).map_err(|_| invalid("not a URI"))?;

    if url.scheme() != "otpauth" {
        return Err(invalid("scheme must be otpauth"));
    }
    match url.host_str() {
        Some(kind) if kind.eq_ignore_ascii_case("totp") => {}
        Some(_) => return Err(invalid("only totp URIs are supported")),
        None => return Err(invalid("missing OTP type")),
    }

    let label = percent_decode_str(url.path().trim_start_matches('/'))
        .decode_utf8()
        .map_err(|_| invalid("label is not valid UTF-8"))?
        .trim()
        .to_string();
    validate_label(&label).map_err(|_| invalid("missing or invalid label"))?;

    let (label_issuer, account) = match label.split_once(':') {
        Some((issuer, account)) => (
            Some(issuer.trim().to_string()),
            account.trim().to_string(),
        ),
        None => (None, label.clone()),
    };

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.into_owned())
    };

    let secret = param("secret").ok_or_else(|| invalid("missing secret parameter"))?;
    let secret =
        SecretSeed::from_base32(&secret).map_err(|_| invalid("secret is not valid base32"))?;

    let issuer = param("issuer")
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .or(label_issuer.filter(|i| !i.is_empty()));

    let algorithm = match param("algorithm") {
        Some(value) => value
            .parse::<OtpAlgorithm>()
            .map_err(|_| invalid("unsupported algorithm"))?,
        None => OtpAlgorithm::default(),
    };
    let digits = match param("digits") {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid("digits is not a number"))?,
        None => DEFAULT_DIGITS,
    };
    let period = match param("period") {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("period is not a number"))?,
        None => DEFAULT_PERIOD,
    };
    validate_params(digits, period).map_err(|e| AuthVaultError::InvalidOtpUri(e.to_string()))?;
    let note = param("note").unwrap_or_default();

    Ok(OtpUri {
        label,
        issuer,
        account,
        secret,
        algorithm,
        digits,
        period,
        note,
    })
}

/// Build a provisioning URI for `record`.
///
/// The label is written exactly as stored, so parsing the URI gives the
/// same label back.  `default_issuer` is used when the record has no issuer
/// of its own.
pub fn to_otpauth_uri(record: &CredentialRecord, default_issuer: Option<&str>) -> String {
    let issuer = record
        .issuer
        .as_deref()
        .or(default_issuer)
        .filter(|i| !i.is_empty());

    let mut uri = format!(
        "otpauth://totp/{}?secret={}",
        utf8_percent_encode(&record.label, URI_COMPONENT),
        record.secret.to_base32()
    );
    if let Some(issuer) = issuer {
        uri.push_str("&issuer=");
        uri.push_str(&utf8_percent_encode(issuer, URI_COMPONENT).to_string());
    }
    uri.push_str(&format!(
        "&algorithm={}&digits={}&period={}",
        record.algorithm, record.digits, record.period
    ));
    if !record.note.is_empty() {
        uri.push_str("&note=");
        uri.push_str(&utf8_percent_encode(&record.note, URI_COMPONENT).to_string());
    }
    uri
}
