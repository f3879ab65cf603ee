//! Passphrase-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  The parameters used at vault creation are written
//! into the vault header, and `derive_key` re-checks them against fixed
//! bounds so a tampered header cannot downgrade (or balloon) the cost.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::errors::{AuthVaultError, Result};

/// Length of the salt generated for new vaults (256 bits).
pub const SALT_LEN: usize = 32;

/// Shortest salt accepted when re-deriving a key.
const MIN_SALT_LEN: usize = 16;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Maximum accepted memory cost in KiB (1 GB).
///
/// Unlock runs Argon2 with the header's parameters before the tag is
/// checked, so these ceilings bound what a tampered file can make us spend.
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;

pub const MAX_ITERATIONS: u32 = 16;
const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters.
///
/// Stored verbatim in the vault header so re-opening uses exactly the
/// settings the vault was created with, even if the defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// The cheapest parameters `validate` accepts. Only meant for tests.
    pub const fn minimum() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Check that every cost factor is within the supported bounds.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_MEMORY_KIB..=MAX_MEMORY_KIB).contains(&self.memory_kib) {
            return Err(AuthVaultError::InvalidParameters(format!(
                "memory_kib must be between {MIN_MEMORY_KIB} and {MAX_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if !(1..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(AuthVaultError::InvalidParameters(format!(
                "iterations must be between 1 and {MAX_ITERATIONS} (got {})",
                self.iterations
            )));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(AuthVaultError::InvalidParameters(format!(
                "parallelism must be between 1 and {MAX_PARALLELISM} (got {})",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// A 32-byte key derived from the passphrase. Zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to the AEAD).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive a 32-byte key from `passphrase` and `salt` with Argon2id.
///
/// The same passphrase + salt + params always produce the same key.
/// Fails with `InvalidParameters` when `params` or the salt length are
/// outside the supported bounds.
pub fn derive_key(passphrase: &[u8], salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    params.validate()?;
    if salt.len() < MIN_SALT_LEN {
        return Err(AuthVaultError::InvalidParameters(format!(
            "salt must be at least {MIN_SALT_LEN} bytes (got {})",
            salt.len()
        )));
    }

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|_| AuthVaultError::InvalidParameters("rejected by Argon2".into()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut bytes)
        .map_err(|_| AuthVaultError::InvalidParameters("Argon2id hashing failed".into()))?;

    let key = DerivedKey::new(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
