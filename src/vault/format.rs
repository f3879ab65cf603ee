//! Binary vault file format.
//!
//! A `.vault` file has this layout:
//!
//! ```text
//! [AVLT: 4 bytes][version: 1 byte][header_len: 4 bytes LE][header JSON][nonce: 12][tag: 16][ciphertext]
//! ```
//!
//! - **Magic** (`AVLT`): identifies the file as an AuthVault vault.
//! - **Version**: format version (currently `1`).
//! - **Header JSON**: serialized `VaultHeader` (salt, KDF params, ...).
//! - **Nonce / tag / ciphertext**: AES-256-GCM output over the JSON
//!   credential list.
//!
//! Everything before the nonce is fed to the AEAD as associated data, so
//! changing the version, salt, or KDF parameters breaks the tag just like
//! changing the ciphertext does.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::record::CredentialRecord;
use crate::crypto::encryption::{self, SealedBox, NONCE_LEN, TAG_LEN};
use crate::crypto::kdf::{DerivedKey, KdfParams};
use crate::errors::{AuthVaultError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"AVLT";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 4 (header_len).
const PREFIX_LEN: usize = 9;

/// Upper bound on the header JSON, which only holds a handful of fields.
const MAX_HEADER_LEN: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// VaultHeader
// ---------------------------------------------------------------------------

/// Plaintext metadata stored at the beginning of a vault file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    /// The salt used for Argon2id key derivation (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Argon2id parameters used when the key was derived.
    pub kdf: KdfParams,

    /// When this vault was first created.
    pub created_at: DateTime<Utc>,

    /// SHA-256 fingerprint of the keyfile (base64), if one is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyfile_fingerprint: Option<String>,
}

/// Decrypted payload: the whole credential collection.
#[derive(Serialize)]
struct PayloadRef<'a> {
    records: &'a [&'a CredentialRecord],
}

#[derive(Deserialize)]
struct Payload {
    records: Vec<CredentialRecord>,
}

// ---------------------------------------------------------------------------
// VaultFile
// ---------------------------------------------------------------------------

/// A complete, parsed vault file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultFile {
    format_version: u8,
    header: VaultHeader,
    /// Prefix + header JSON exactly as written; the AEAD associated data.
    aad: Vec<u8>,
    sealed: SealedBox,
}

impl VaultFile {
    /// Encrypt `records` under `key` and bind them to `header`.
    pub fn seal(header: VaultHeader, key: &DerivedKey, records: &[&CredentialRecord]) -> Result<Self> {
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|_| AuthVaultError::CorruptFile("header could not be encoded".into()))?;
        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| AuthVaultError::CorruptFile("header too large".into()))?;

        let mut aad = Vec::with_capacity(PREFIX_LEN + header_bytes.len());
        aad.extend_from_slice(MAGIC); // 4 bytes
        aad.push(CURRENT_VERSION); // 1 byte
        aad.extend_from_slice(&header_len.to_le_bytes()); // 4 bytes LE
        aad.extend_from_slice(&header_bytes); // header JSON

        let mut payload = Zeroizing::new(Vec::with_capacity(4096));
        serde_json::to_writer(&mut *payload, &PayloadRef { records })
            .map_err(|_| AuthVaultError::EncryptionFailed)?;

        let sealed = encryption::seal(key.as_bytes(), &payload, &aad)?;

        Ok(Self {
            format_version: CURRENT_VERSION,
            header,
            aad,
            sealed,
        })
    }

    /// Decrypt the credential collection.
    ///
    /// Fails with `AuthenticationFailed` if the key is wrong or any byte of
    /// the file was altered, and with `CorruptFile` if the authenticated
    /// payload is not a valid credential list.
    pub fn open(&self, key: &DerivedKey) -> Result<Vec<CredentialRecord>> {
        let plaintext = encryption::open(key.as_bytes(), &self.sealed, &self.aad)?;
        let payload: Payload = serde_json::from_slice(&plaintext)
            .map_err(|_| AuthVaultError::CorruptFile("credential payload is malformed".into()))?;
        Ok(payload.records)
    }

    pub fn format_version(&self) -> u8 {
        self.format_version
    }

    pub fn header(&self) -> &VaultHeader {
        &self.header
    }

    pub fn sealed(&self) -> &SealedBox {
        &self.sealed
    }

    /// Serialize to the on-disk byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(self.aad.len() + NONCE_LEN + TAG_LEN + self.sealed.ciphertext.len());
        buf.extend_from_slice(&self.aad);
        buf.extend_from_slice(&self.sealed.nonce);
        buf.extend_from_slice(&self.sealed.tag);
        buf.extend_from_slice(&self.sealed.ciphertext);
        buf
    }

    /// Parse the on-disk byte layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < PREFIX_LEN {
            return Err(AuthVaultError::CorruptFile(
                "file too small to be a valid vault".into(),
            ));
        }

        // --- Parse the fixed-size prefix ---

        if &data[0..4] != MAGIC {
            return Err(AuthVaultError::CorruptFile(
                "missing AVLT magic bytes".into(),
            ));
        }

        let version = data[4];
        if version != CURRENT_VERSION {
            return Err(AuthVaultError::CorruptFile(format!(
                "unsupported version {version}, expected {CURRENT_VERSION}"
            )));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[5..9]);
        let header_len = usize::try_from(u32::from_le_bytes(len_bytes))
            .map_err(|_| AuthVaultError::CorruptFile("bad header length".into()))?;
        if header_len > MAX_HEADER_LEN {
            return Err(AuthVaultError::CorruptFile("header length is implausible".into()));
        }

        let header_end = PREFIX_LEN + header_len;
        if header_end + NONCE_LEN + TAG_LEN > data.len() {
            return Err(AuthVaultError::CorruptFile("file is truncated".into()));
        }

        // --- Header JSON ---

        let header: VaultHeader = serde_json::from_slice(&data[PREFIX_LEN..header_end])
            .map_err(|_| AuthVaultError::CorruptFile("header is not valid JSON".into()))?;
        if header.salt.is_empty() {
            return Err(AuthVaultError::CorruptFile("missing salt".into()));
        }

        // --- Sealed payload ---

        let nonce_end = header_end + NONCE_LEN;
        let tag_end = nonce_end + TAG_LEN;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&data[header_end..nonce_end]);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&data[nonce_end..tag_end]);

        Ok(Self {
            format_version: version,
            header,
            aad: data[..header_end].to_vec(),
            sealed: SealedBox {
                nonce,
                ciphertext: data[tag_end..].to_vec(),
                tag,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Disk I/O
// ---------------------------------------------------------------------------

/// Read and parse a vault file.
pub fn read_vault(path: &Path) -> Result<VaultFile> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AuthVaultError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    VaultFile::from_bytes(&data)
}

/// Write a vault file to disk **atomically**.
///
/// 1. Write the bytes to a temp file in the same directory and fsync it.
/// 2. Rename the temp file over the target path.
/// 3. Fsync the directory so the rename itself is durable.
///
/// A crash before step 2 leaves the previous file untouched.
pub fn write_vault(path: &Path, file: &VaultFile) -> Result<()> {
    write_atomic(path, &file.to_bytes())
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = stage(path, bytes)?;
    commit(&tmp_path, path)
}

/// The sibling temp path used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

/// Write `bytes` to the temp sibling of `path` and flush it to disk.
pub(crate) fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let tmp_path = temp_path(path);
    let result = write_synced(&tmp_path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result?;
    Ok(tmp_path)
}

/// Move a staged temp file over `path`.
pub(crate) fn commit(tmp_path: &Path, path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(tmp_path, path) {
        let _ = fs::remove_file(tmp_path);
        return Err(e.into());
    }
    sync_parent_dir(path);
    debug!(path = %path.display(), "vault file replaced");
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // Best effort; some filesystems refuse to fsync directories.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::{derive_key, generate_salt};
    use crate::vault::record::SecretSeed;
    use tempfile::TempDir;

    fn header() -> VaultHeader {
        VaultHeader {
            salt: generate_salt().to_vec(),
            kdf: KdfParams::minimum(),
            created_at: Utc::now(),
            keyfile_fingerprint: None,
        }
    }

    fn key_for(header: &VaultHeader) -> DerivedKey {
        derive_key(b"pw", &header.salt, &header.kdf).unwrap()
    }

    fn record(label: &str) -> CredentialRecord {
        CredentialRecord::new(label, SecretSeed::from_base32("JBSWY3DPEHPK3PXP").unwrap()).unwrap()
    }

    #[test]
    fn bytes_roundtrip_and_open() {
        let header = header();
        let key = key_for(&header);
        let r = record("github");
        let file = VaultFile::seal(header, &key, &[&r]).unwrap();

        let parsed = VaultFile::from_bytes(&file.to_bytes()).unwrap();
        assert_eq!(parsed, file);
        assert_eq!(parsed.format_version(), CURRENT_VERSION);

        let records = parsed.open(&key).unwrap();
        assert_eq!(records, vec![r]);
    }

    #[test]
    fn plaintext_seed_is_not_on_disk() {
        let header = header();
        let key = key_for(&header);
        let r = record("github");
        let bytes = VaultFile::seal(header, &key, &[&r]).unwrap().to_bytes();

        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("JBSWY3DPEHPK3PXP"));
        assert!(!text.contains("github"));
    }

    #[test]
    fn flipping_any_byte_is_detected() {
        let header = header();
        let key = key_for(&header);
        let r = record("github");
        let bytes = VaultFile::seal(header, &key, &[&r]).unwrap().to_bytes();

        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            match VaultFile::from_bytes(&tampered) {
                Ok(file) => assert!(file.open(&key).is_err(), "byte {i} accepted"),
                Err(e) => assert!(matches!(e, AuthVaultError::CorruptFile(_)), "byte {i}: {e:?}"),
            }
        }
    }

    #[test]
    fn header_is_authenticated() {
        let header = header();
        let key = key_for(&header);
        let file = VaultFile::seal(header, &key, &[]).unwrap();
        let mut bytes = file.to_bytes();

        // Swap the created_at year inside the header JSON; still parses,
        // but the associated data no longer matches.
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let pos = text.find("\"created_at\":\"").unwrap() + "\"created_at\":\"".len();
        bytes[pos] = if bytes[pos] == b'1' { b'2' } else { b'1' };

        let tampered = VaultFile::from_bytes(&bytes).unwrap();
        let err = tampered.open(&key).unwrap_err();
        assert!(matches!(err, AuthVaultError::AuthenticationFailed));
    }

    #[test]
    fn rejects_bad_magic_version_and_truncation() {
        let header = header();
        let key = key_for(&header);
        let bytes = VaultFile::seal(header, &key, &[]).unwrap().to_bytes();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            VaultFile::from_bytes(&bad_magic),
            Err(AuthVaultError::CorruptFile(_))
        ));

        let mut bad_version = bytes.clone();
        bad_version[4] = 99;
        assert!(matches!(
            VaultFile::from_bytes(&bad_version),
            Err(AuthVaultError::CorruptFile(_))
        ));

        for len in [0, 5, PREFIX_LEN, bytes.len() - TAG_LEN - 1] {
            assert!(
                matches!(
                    VaultFile::from_bytes(&bytes[..len]),
                    Err(AuthVaultError::CorruptFile(_))
                ),
                "len {len}"
            );
        }
    }

    #[test]
    fn malformed_header_json_has_a_fixed_message() {
        let json = b"{\"salt\": \"AAAA\", \"kdf\": 7";
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(CURRENT_VERSION);
        bytes.extend_from_slice(&(json.len() as u32).to_le_bytes());
        bytes.extend_from_slice(json);
        bytes.extend_from_slice(&[0u8; NONCE_LEN + TAG_LEN + 8]);

        match VaultFile::from_bytes(&bytes) {
            Err(AuthVaultError::CorruptFile(msg)) => {
                assert_eq!(msg, "header is not valid JSON");
                assert!(!msg.contains("line"));
                assert!(!msg.contains("column"));
            }
            other => panic!("expected CorruptFile, got {other:?}"),
        }
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_vault(&dir.path().join("none.vault")).unwrap_err();
        assert!(matches!(err, AuthVaultError::NotFound(_)));
    }

    #[test]
    fn crash_before_rename_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");

        let header = header();
        let key = key_for(&header);
        let r = record("github");
        let original = VaultFile::seal(header.clone(), &key, &[&r]).unwrap();
        write_vault(&path, &original).unwrap();

        // Stage a new version but "crash" before the rename.
        let newer = VaultFile::seal(header, &key, &[]).unwrap();
        let staged = stage(&path, &newer.to_bytes()).unwrap();
        assert!(staged.exists());

        let on_disk = read_vault(&path).unwrap();
        assert_eq!(on_disk, original);
        assert_eq!(on_disk.open(&key).unwrap().len(), 1);
    }

    #[test]
    fn crash_before_first_rename_leaves_no_vault() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        stage(&path, b"partial").unwrap();

        assert!(!path.exists());
        assert!(matches!(read_vault(&path), Err(AuthVaultError::NotFound(_))));
    }

    #[test]
    fn write_replaces_and_cleans_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"two");
        assert!(!temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn vault_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        write_atomic(&path, b"data").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
