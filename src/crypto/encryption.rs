//! AES-256-GCM authenticated encryption.
//!
//! Each call to `seal` generates a fresh random 12-byte nonce.  The
//! result keeps nonce, ciphertext, and the 16-byte auth tag as separate
//! fields so the vault format can lay them out explicitly.
//!
//! Any failure to open a sealed box, whether from a wrong key or from
//! corrupted bytes, is reported as the same `AuthenticationFailed`.

use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce, Tag};
use zeroize::Zeroizing;

use crate::errors::{AuthVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// The output of one AEAD encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Encrypt `plaintext` with a 32-byte `key` and no associated data.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<SealedBox> {
    seal(key, plaintext, &[])
}

/// Decrypt a box produced by `encrypt`.
pub fn decrypt(key: &[u8], sealed: &SealedBox) -> Result<Zeroizing<Vec<u8>>> {
    open(key, sealed, &[])
}

/// Encrypt `plaintext` and bind `aad` into the authentication tag.
pub fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<SealedBox> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| AuthVaultError::EncryptionFailed)?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt in place so the tag comes back detached.
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, aad, &mut buffer)
        .map_err(|_| AuthVaultError::EncryptionFailed)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(SealedBox {
        nonce: nonce_bytes,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt a box produced by `seal`, verifying the tag over ciphertext and `aad`.
///
/// The plaintext is returned in a zeroizing buffer.
pub fn open(key: &[u8], sealed: &SealedBox, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| AuthVaultError::AuthenticationFailed)?;

    let nonce = Nonce::from_slice(&sealed.nonce);
    let tag = Tag::from_slice(&sealed.tag);

    let mut buffer = Zeroizing::new(sealed.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(nonce, aad, &mut buffer, tag)
        .map_err(|_| AuthVaultError::AuthenticationFailed)?;

    Ok(buffer)
}
