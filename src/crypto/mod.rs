//! Cryptographic primitives for AuthVault.
//!
//! This module provides:
//! - Argon2id passphrase-based key derivation (`kdf`)
//! - AES-256-GCM authenticated encryption (`encryption`)
//! - The optional keyfile second factor (`keyfile`)

pub mod encryption;
pub mod kdf;
pub mod keyfile;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{derive_key, seal, open, ...};
pub use encryption::{decrypt, encrypt, open, seal, SealedBox};
pub use kdf::{derive_key, generate_salt, DerivedKey, KdfParams};
pub use keyfile::Keyfile;
