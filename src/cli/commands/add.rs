//! `authvault add`: store a new TOTP credential.
//!
//! The secret comes from `--secret`, an `otpauth://` URI (`--uri`), or an
//! interactive hidden prompt.  Explicit flags override URI parameters.

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_settings, log_audit, open_session, Cli, CredentialArgs};
use crate::errors::{AuthVaultError, Result};
use crate::totp::{parse_otpauth_uri, OtpAlgorithm};
use crate::vault::record::normalize_label;
use crate::vault::{CredentialRecord, SecretSeed};

/// Execute the `add` command.
pub fn execute(
    cli: &Cli,
    label: Option<&str>,
    fields: &CredentialArgs,
    uri: Option<&str>,
) -> Result<()> {
    let settings = load_settings(cli)?;

    // Validate the input before asking for the passphrase.
    let record = build_record(label, fields, uri)?;
    let label = record.label.clone();

    let mut session = open_session(cli, &settings)?;
    session.add_credential(record)?;
    if session.is_dirty() {
        session.save()?;
    }

    log_audit(
        session.path(),
        "add",
        Some(&label),
        uri.is_some().then_some("from otpauth URI"),
    );
    output::success(&format!("Added '{label}'"));
    output::tip(&format!("Run `authvault code {label}` to see its current code."));

    Ok(())
}

/// Turn CLI input into a validated record.
pub(crate) fn build_record(
    label: Option<&str>,
    fields: &CredentialArgs,
    uri: Option<&str>,
) -> Result<CredentialRecord> {
    let mut record = match uri {
        Some(uri) => {
            let mut record = parse_otpauth_uri(uri)?.into_record()?;
            if let Some(label) = label {
                record.label = normalize_label(label);
            }
            record
        }
        None => {
            let label = label.ok_or_else(|| {
                AuthVaultError::CommandFailed("a label is required unless --uri is given".into())
            })?;
            let secret = match &fields.secret {
                Some(s) => Zeroizing::new(s.clone()),
                None => prompt_secret()?,
            };
            CredentialRecord::new(label, SecretSeed::from_base32(&secret)?)?
        }
    };

    apply_fields(&mut record, fields, false)?;
    record.validate()?;
    Ok(record)
}

/// Apply the optional flags to `record`.
///
/// With `include_secret`, a `--secret` flag replaces the stored seed.
pub(crate) fn apply_fields(
    record: &mut CredentialRecord,
    fields: &CredentialArgs,
    include_secret: bool,
) -> Result<()> {
    if include_secret {
        if let Some(secret) = &fields.secret {
            record.secret = SecretSeed::from_base32(secret)?;
        }
    }
    if let Some(issuer) = &fields.issuer {
        let issuer = issuer.trim();
        record.issuer = (!issuer.is_empty()).then(|| issuer.to_string());
    }
    if let Some(algorithm) = &fields.algorithm {
        record.algorithm = algorithm.parse::<OtpAlgorithm>()?;
    }
    if let Some(digits) = fields.digits {
        record.digits = digits;
    }
    if let Some(period) = fields.period {
        record.period = period;
    }
    if let Some(note) = &fields.note {
        record.note = note.trim().to_string();
    }
    Ok(())
}

fn prompt_secret() -> Result<Zeroizing<String>> {
    dialoguer::Password::new()
        .with_prompt("Enter base32 secret")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| AuthVaultError::CommandFailed(format!("secret prompt: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CredentialArgs {
        CredentialArgs {
            secret: Some("JBSWY3DPEHPK3PXP".into()),
            ..CredentialArgs::default()
        }
    }

    #[test]
    fn builds_from_secret_flag() {
        let record = build_record(Some("GitHub:alice"), &args(), None).unwrap();
        assert_eq!(record.label, "GitHub:alice");
        assert_eq!(record.secret.to_base32(), "JBSWY3DPEHPK3PXP");
        assert_eq!(record.digits, 6);
    }

    #[test]
    fn flags_override_uri_parameters() {
        let fields = CredentialArgs {
            digits: Some(8),
            note: Some("backup phone".into()),
            ..CredentialArgs::default()
        };
        let record = build_record(
            None,
            &fields,
            Some("otpauth://totp/GitHub:alice?secret=JBSWY3DPEHPK3PXP&digits=6"),
        )
        .unwrap();
        assert_eq!(record.label, "GitHub:alice");
        assert_eq!(record.issuer.as_deref(), Some("GitHub"));
        assert_eq!(record.digits, 8);
        assert_eq!(record.note, "backup phone");
    }

    #[test]
    fn explicit_label_replaces_uri_label() {
        let record = build_record(
            Some("work"),
            &CredentialArgs::default(),
            Some("otpauth://totp/GitHub:alice?secret=JBSWY3DPEHPK3PXP"),
        )
        .unwrap();
        assert_eq!(record.label, "work");
    }

    #[test]
    fn missing_label_without_uri_fails() {
        let err = build_record(None, &args(), None).unwrap_err();
        assert!(matches!(err, AuthVaultError::CommandFailed(_)));
    }

    #[test]
    fn invalid_parameters_fail() {
        let fields = CredentialArgs {
            period: Some(0),
            ..args()
        };
        assert!(build_record(Some("x"), &fields, None).is_err());

        let fields = CredentialArgs {
            algorithm: Some("MD5".into()),
            ..args()
        };
        assert!(build_record(Some("x"), &fields, None).is_err());
    }
}
