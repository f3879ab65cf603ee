//! Vault module: encrypted TOTP credential storage.
//!
//! This module provides:
//! - `CredentialRecord` and `SecretSeed` types (`record`)
//! - Binary vault file format sealed with AES-256-GCM (`format`)
//! - Cross-process advisory locking (`lock`)
//! - `VaultStore` for loading, saving, backing up, and restoring files (`store`)
//! - `VaultSession`, the unlocked in-memory view (`session`)

pub mod format;
pub mod lock;
pub mod record;
pub mod session;
pub mod store;

// Re-export the most commonly used items.
pub use format::{VaultFile, VaultHeader};
pub use lock::VaultLock;
pub use record::{CredentialInfo, CredentialRecord, SecretSeed};
pub use session::{PendingUnlock, SessionOptions, VaultSession};
pub use store::VaultStore;
