//! The unlocked, in-memory view of a vault.
//!
//! A `VaultSession` is either `Locked` (holds nothing sensitive) or
//! `Unlocked` (holds the derived key, the decrypted records, and the
//! advisory lock).  Every credential operation goes through `active()`,
//! which enforces the idle timeout and rejects calls on a locked session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::kdf::{derive_key, DerivedKey, KdfParams};
use crate::crypto::keyfile::{kdf_input, Keyfile};
use crate::errors::{AuthVaultError, Result};
use crate::totp::{self, TotpCode};

use super::format::{self, VaultFile, VaultHeader};
use super::lock::VaultLock;
use super::record::{normalize_label, validate_label, CredentialInfo, CredentialRecord};
use super::store::{self, VaultStore};

/// Knobs that shape a session's behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Argon2id parameters for new vaults and passphrase changes.
    pub kdf: KdfParams,
    /// Persist every mutation immediately.
    pub auto_save: bool,
    /// Lock automatically after this much inactivity.
    pub idle_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            auto_save: true,
            idle_timeout: None,
        }
    }
}

struct OpenVault {
    key: DerivedKey,
    header: VaultHeader,
    records: BTreeMap<String, CredentialRecord>,
    _lock: VaultLock,
    last_activity: Instant,
    dirty: bool,
}

enum SessionState {
    Locked,
    Unlocked(Box<OpenVault>),
}

/// An open handle on one vault file.
pub struct VaultSession {
    store: VaultStore,
    options: SessionOptions,
    state: SessionState,
}

impl std::fmt::Debug for VaultSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSession")
            .field("path", &self.store.path())
            .field("unlocked", &matches!(self.state, SessionState::Unlocked(_)))
            .finish()
    }
}

impl VaultSession {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a new vault at `path` and return it unlocked.
    pub fn create(
        path: &Path,
        passphrase: &[u8],
        options: &SessionOptions,
        keyfile: Option<&Keyfile>,
    ) -> Result<Self> {
        let store = VaultStore::new(path);
        if store.path().exists() {
            return Err(AuthVaultError::AlreadyExists(path.to_path_buf()));
        }

        let lock = store.acquire_lock()?;
        let (file, key) = store.create(passphrase, &options.kdf, keyfile)?;

        Ok(Self {
            store,
            options: *options,
            state: SessionState::Unlocked(Box::new(OpenVault {
                key,
                header: file.header().clone(),
                records: BTreeMap::new(),
                _lock: lock,
                last_activity: Instant::now(),
                dirty: false,
            })),
        })
    }

    /// Unlock the vault at `path` with default options and no keyfile.
    pub fn unlock(path: &Path, passphrase: &[u8]) -> Result<Self> {
        Self::unlock_with(path, passphrase, &SessionOptions::default(), None)
    }

    /// Unlock the vault at `path`.
    ///
    /// A wrong passphrase, a wrong or missing keyfile, and a tampered file
    /// all surface as `WrongPassphrase`.  Structural damage the AEAD never
    /// gets to see (bad magic, truncation, absurd KDF parameters) is
    /// `CorruptFile`.
    pub fn unlock_with(
        path: &Path,
        passphrase: &[u8],
        options: &SessionOptions,
        keyfile: Option<&Keyfile>,
    ) -> Result<Self> {
        let store = VaultStore::new(path);
        if !store.exists() {
            return Err(AuthVaultError::NotFound(path.to_path_buf()));
        }

        let lock = store.acquire_lock()?;
        let file = store.load()?;
        let (key, records) = match open_file(&file, passphrase, keyfile) {
            Ok(opened) => opened,
            Err(e) => {
                warn!(path = %path.display(), "unlock failed");
                return Err(e);
            }
        };

        info!(path = %path.display(), credentials = records.len(), "vault unlocked");
        Ok(Self {
            store,
            options: *options,
            state: SessionState::Unlocked(Box::new(OpenVault {
                key,
                header: file.header().clone(),
                records,
                _lock: lock,
                last_activity: Instant::now(),
                dirty: false,
            })),
        })
    }

    /// Replace the vault at `path` with the backup at `src`.
    ///
    /// The backup must open with `passphrase` (and `keyfile`, if it was
    /// sealed with one) before anything is written.
    pub fn restore_from(
        path: &Path,
        src: &Path,
        passphrase: &[u8],
        keyfile: Option<&Keyfile>,
    ) -> Result<usize> {
        let store = VaultStore::new(path);
        let _lock = store.acquire_lock()?;

        let file = format::read_vault(src)?;
        let (_key, records) = open_file(&file, passphrase, keyfile)?;
        store.restore(src)?;
        Ok(records.len())
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// `true` while the session holds a key and has not idled out.
    ///
    /// Polling this is enough to enforce the idle timeout: an expired
    /// session is locked here, dropping the key and the file lock.  It does
    /// not count as activity.
    pub fn is_unlocked(&mut self) -> bool {
        let expired = match &self.state {
            SessionState::Locked => return false,
            SessionState::Unlocked(open) => self.idle_expired(open),
        };
        if expired {
            debug!("idle timeout reached");
            self.lock();
        }
        !expired
    }

    /// `true` if there are in-memory changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        match &self.state {
            SessionState::Locked => false,
            SessionState::Unlocked(open) => open.dirty,
        }
    }

    /// When the vault file was first created.
    pub fn created_at(&mut self) -> Result<chrono::DateTime<Utc>> {
        Ok(self.active()?.header.created_at)
    }

    /// Whether this vault needs a keyfile to unlock.
    pub fn requires_keyfile(&mut self) -> Result<bool> {
        Ok(self.active()?.header.keyfile_fingerprint.is_some())
    }

    /// Lock the session, dropping the key, the records, and the file lock.
    ///
    /// Unsaved changes are discarded.  Locking twice is a no-op.
    pub fn lock(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Locked);
        if let SessionState::Unlocked(open) = previous {
            if open.dirty {
                warn!(path = %self.store.path().display(), "locking with unsaved changes");
            }
            drop(open);
            info!(path = %self.store.path().display(), "vault locked");
        }
    }

    fn idle_expired(&self, open: &OpenVault) -> bool {
        self.options
            .idle_timeout
            .is_some_and(|timeout| open.last_activity.elapsed() >= timeout)
    }

    /// The open vault, after the idle check.  Refreshes the activity clock.
    fn active(&mut self) -> Result<&mut OpenVault> {
        let expired = match &self.state {
            SessionState::Locked => return Err(AuthVaultError::SessionLocked),
            SessionState::Unlocked(open) => self.idle_expired(open),
        };
        if expired {
            debug!("idle timeout reached");
            self.lock();
            return Err(AuthVaultError::SessionLocked);
        }
        match &mut self.state {
            SessionState::Unlocked(open) => {
                open.last_activity = Instant::now();
                Ok(open.as_mut())
            }
            SessionState::Locked => Err(AuthVaultError::SessionLocked),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Metadata for every credential, sorted by label.
    pub fn list_credentials(&mut self) -> Result<Vec<CredentialInfo>> {
        Ok(self
            .active()?
            .records
            .values()
            .map(CredentialRecord::info)
            .collect())
    }

    /// Credentials whose label, issuer, or note contains `query`.
    pub fn search(&mut self, query: &str) -> Result<Vec<CredentialInfo>> {
        Ok(self
            .active()?
            .records
            .values()
            .filter(|r| r.matches(query))
            .map(CredentialRecord::info)
            .collect())
    }

    /// Full record, secret included.
    pub fn credential(&mut self, label: &str) -> Result<&CredentialRecord> {
        let label = normalize_label(label);
        self.active()?
            .records
            .get(&label)
            .ok_or(AuthVaultError::CredentialNotFound(label))
    }

    pub fn credential_count(&mut self) -> Result<usize> {
        Ok(self.active()?.records.len())
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Add a new credential.  Labels must be unique.
    pub fn add_credential(&mut self, mut record: CredentialRecord) -> Result<()> {
        record.label = normalize_label(&record.label);
        record.validate()?;
        let open = self.active()?;
        if open.records.contains_key(&record.label) {
            return Err(AuthVaultError::DuplicateLabel(record.label));
        }
        debug!(label = %record.label, "credential added");
        open.records.insert(record.label.clone(), record);
        self.mutated()
    }

    pub fn remove_credential(&mut self, label: &str) -> Result<()> {
        let label = normalize_label(label);
        let open = self.active()?;
        if open.records.remove(&label).is_none() {
            return Err(AuthVaultError::CredentialNotFound(label));
        }
        debug!(label = %label, "credential removed");
        self.mutated()
    }

    pub fn rename_credential(&mut self, old: &str, new: &str) -> Result<()> {
        let old = normalize_label(old);
        let new = normalize_label(new);
        validate_label(&new)?;

        let open = self.active()?;
        if !open.records.contains_key(&old) {
            return Err(AuthVaultError::CredentialNotFound(old));
        }
        if old == new {
            return Ok(());
        }
        if open.records.contains_key(&new) {
            return Err(AuthVaultError::DuplicateLabel(new));
        }

        if let Some(mut record) = open.records.remove(&old) {
            record.label = new.clone();
            record.updated_at = Utc::now();
            open.records.insert(new.clone(), record);
        }
        debug!(from = %old, to = %new, "credential renamed");
        self.mutated()
    }

    /// Replace the credential stored under `label` with `record`.
    ///
    /// `created_at` and `last_used_at` carry over from the old record; the
    /// label may change as long as the new one is free.
    pub fn update_credential(&mut self, label: &str, mut record: CredentialRecord) -> Result<()> {
        record.label = normalize_label(&record.label);
        record.validate()?;
        let label = normalize_label(label);

        let open = self.active()?;
        let Some(existing) = open.records.get(&label) else {
            return Err(AuthVaultError::CredentialNotFound(label));
        };
        if record.label != label && open.records.contains_key(&record.label) {
            return Err(AuthVaultError::DuplicateLabel(record.label));
        }

        record.created_at = existing.created_at;
        record.last_used_at = existing.last_used_at;
        record.updated_at = Utc::now();

        open.records.remove(&label);
        debug!(label = %record.label, "credential updated");
        open.records.insert(record.label.clone(), record);
        self.mutated()
    }

    /// Compute the code for `label` at `unix_time`.
    ///
    /// Records `last_used_at` in memory; that alone does not trigger an
    /// auto-save.
    pub fn generate_code(&mut self, label: &str, unix_time: u64) -> Result<TotpCode> {
        let label = normalize_label(label);
        let open = self.active()?;
        let record = open
            .records
            .get_mut(&label)
            .ok_or(AuthVaultError::CredentialNotFound(label))?;

        let code = totp::generate(
            record.algorithm,
            record.secret.as_bytes(),
            record.digits,
            record.period,
            unix_time,
        )?;
        record.last_used_at = Some(Utc::now());
        open.dirty = true;
        Ok(code)
    }

    pub fn generate_code_now(&mut self, label: &str) -> Result<TotpCode> {
        self.generate_code(label, totp::unix_now())
    }

    /// Re-key the vault under a new passphrase (and optional keyfile).
    ///
    /// A fresh salt is generated and the session's KDF parameters are used.
    /// The new file is written before the in-memory key is replaced.
    pub fn change_passphrase(
        &mut self,
        new_passphrase: &[u8],
        keyfile: Option<&Keyfile>,
    ) -> Result<()> {
        let kdf = self.options.kdf;
        let open = self.active()?;

        let (header, key) = store::new_header(new_passphrase, &kdf, keyfile)?;
        let header = VaultHeader {
            created_at: open.header.created_at,
            ..header
        };
        let records: Vec<&CredentialRecord> = open.records.values().collect();
        let file = VaultFile::seal(header, &key, &records)?;
        self.store.save(&file)?;

        let open = self.active()?;
        open.key = key;
        open.header = file.header().clone();
        open.dirty = false;
        info!(path = %self.store.path().display(), "passphrase changed");
        Ok(())
    }

    /// Seal the current records and atomically rewrite the vault file.
    pub fn save(&mut self) -> Result<()> {
        let open = self.active()?;
        let records: Vec<&CredentialRecord> = open.records.values().collect();
        let file = VaultFile::seal(open.header.clone(), &open.key, &records)?;
        self.store.save(&file)?;

        if let SessionState::Unlocked(open) = &mut self.state {
            open.dirty = false;
        }
        Ok(())
    }

    fn mutated(&mut self) -> Result<()> {
        if let SessionState::Unlocked(open) = &mut self.state {
            open.dirty = true;
        }
        if self.options.auto_save {
            self.save()?;
        }
        Ok(())
    }
}

/// Derive the key for `file` and decrypt its records.
fn open_file(
    file: &VaultFile,
    passphrase: &[u8],
    keyfile: Option<&Keyfile>,
) -> Result<(DerivedKey, BTreeMap<String, CredentialRecord>)> {
    let header = file.header();
    header
        .kdf
        .validate()
        .map_err(|e| AuthVaultError::CorruptFile(e.to_string()))?;

    // A keyfile mismatch is only reported after Argon2 has run, so it costs
    // the same as a wrong passphrase.
    let (keyfile, keyfile_ok) = match (&header.keyfile_fingerprint, keyfile) {
        (Some(expected), Some(kf)) => (Some(kf), kf.matches(expected)),
        (Some(_), None) => (None, false),
        (None, _) => (None, true),
    };

    let input: Zeroizing<Vec<u8>> = kdf_input(passphrase, keyfile)?;
    let key = derive_key(&input, &header.salt, &header.kdf)
        .map_err(|e| AuthVaultError::CorruptFile(e.to_string()))?;
    if !keyfile_ok {
        return Err(AuthVaultError::WrongPassphrase);
    }

    let list = file.open(&key).map_err(|e| match e {
        AuthVaultError::AuthenticationFailed => AuthVaultError::WrongPassphrase,
        other => other,
    })?;

    let mut records = BTreeMap::new();
    for record in list {
        if records.contains_key(&record.label) {
            return Err(AuthVaultError::CorruptFile(format!(
                "duplicate label '{}'",
                record.label
            )));
        }
        records.insert(record.label.clone(), record);
    }
    Ok((key, records))
}

// ---------------------------------------------------------------------------
// Background unlock
// ---------------------------------------------------------------------------

/// An unlock running on a worker thread so a UI stays responsive while
/// Argon2id runs.
pub struct PendingUnlock {
    rx: Receiver<Result<VaultSession>>,
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PendingUnlock {
    /// Start unlocking `path` in the background.
    pub fn spawn(
        path: PathBuf,
        passphrase: Zeroizing<Vec<u8>>,
        options: SessionOptions,
        keyfile: Option<Keyfile>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let handle = thread::spawn(move || {
            let result = VaultSession::unlock_with(&path, &passphrase, &options, keyfile.as_ref());
            drop(passphrase);
            if flag.load(Ordering::SeqCst) {
                debug!("unlock finished after cancel, discarding");
                return;
            }
            let _ = tx.send(result);
        });

        Self {
            rx,
            cancelled,
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// The result, if the worker is done.  Returns `None` while it is still
    /// running.
    pub fn try_take(&mut self) -> Option<Result<VaultSession>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    /// Block until the unlock finishes.
    pub fn wait(self) -> Result<VaultSession> {
        let result = self.rx.recv().map_err(|_| worker_gone())?;
        let _ = self.handle.join();
        result
    }

    /// Abandon the unlock.
    ///
    /// Argon2id cannot be interrupted, so this waits for the worker to
    /// finish and then drops whatever it produced, releasing the vault lock.
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
        while let Ok(result) = self.rx.try_recv() {
            drop(result);
        }
        debug!("pending unlock cancelled");
    }
}

fn worker_gone() -> AuthVaultError {
    AuthVaultError::CommandFailed("unlock worker stopped unexpectedly".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::record::SecretSeed;
    use std::fs;
    use tempfile::TempDir;

    fn options() -> SessionOptions {
        SessionOptions {
            kdf: KdfParams::minimum(),
            ..SessionOptions::default()
        }
    }

    fn record(label: &str) -> CredentialRecord {
        CredentialRecord::new(label, SecretSeed::from_base32("JBSWY3DPEHPK3PXP").unwrap()).unwrap()
    }

    fn new_vault(dir: &TempDir) -> (PathBuf, VaultSession) {
        let path = dir.path().join("accounts.vault");
        let session = VaultSession::create(&path, b"correct horse", &options(), None).unwrap();
        (path, session)
    }

    #[test]
    fn create_unlock_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        session.lock();

        let mut session = VaultSession::unlock_with(&path, b"correct horse", &options(), None).unwrap();
        let list = session.list_credentials().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].label, "github");
    }

    #[test]
    fn wrong_passphrase() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.lock();

        let err = VaultSession::unlock(&path, b"wrong").unwrap_err();
        assert!(matches!(err, AuthVaultError::WrongPassphrase));
    }

    #[test]
    fn missing_vault_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = VaultSession::unlock(&dir.path().join("none.vault"), b"pw").unwrap_err();
        assert!(matches!(err, AuthVaultError::NotFound(_)));
    }

    #[test]
    fn second_session_is_busy() {
        let dir = TempDir::new().unwrap();
        let (path, _session) = new_vault(&dir);
        let err = VaultSession::unlock(&path, b"correct horse").unwrap_err();
        assert!(matches!(err, AuthVaultError::VaultBusy));
    }

    #[test]
    fn locked_session_rejects_everything() {
        let dir = TempDir::new().unwrap();
        let (_path, mut session) = new_vault(&dir);
        session.lock();
        session.lock();

        assert!(!session.is_unlocked());
        assert!(matches!(
            session.list_credentials(),
            Err(AuthVaultError::SessionLocked)
        ));
        assert!(matches!(
            session.add_credential(record("x")),
            Err(AuthVaultError::SessionLocked)
        ));
        assert!(matches!(session.save(), Err(AuthVaultError::SessionLocked)));
    }

    #[test]
    fn duplicate_label_leaves_vault_unchanged() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        let before = fs::read(&path).unwrap();

        let err = session.add_credential(record("github")).unwrap_err();
        assert!(matches!(err, AuthVaultError::DuplicateLabel(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(session.credential_count().unwrap(), 1);
    }

    #[test]
    fn rename_and_remove() {
        let dir = TempDir::new().unwrap();
        let (_path, mut session) = new_vault(&dir);
        session.add_credential(record("a")).unwrap();
        session.add_credential(record("b")).unwrap();

        assert!(matches!(
            session.rename_credential("a", "b"),
            Err(AuthVaultError::DuplicateLabel(_))
        ));
        assert!(matches!(
            session.rename_credential("zzz", "c"),
            Err(AuthVaultError::CredentialNotFound(_))
        ));

        session.rename_credential("a", "c").unwrap();
        let labels: Vec<_> = session
            .list_credentials()
            .unwrap()
            .into_iter()
            .map(|c| c.label)
            .collect();
        assert_eq!(labels, vec!["b", "c"]);

        session.remove_credential("b").unwrap();
        assert!(matches!(
            session.remove_credential("b"),
            Err(AuthVaultError::CredentialNotFound(_))
        ));
        assert_eq!(session.credential_count().unwrap(), 1);
    }

    #[test]
    fn update_preserves_created_at() {
        let dir = TempDir::new().unwrap();
        let (_path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        let created = session.credential("github").unwrap().created_at;

        let replacement = record("github").with_digits(8).with_note("rotated");
        session.update_credential("github", replacement).unwrap();

        let updated = session.credential("github").unwrap();
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.digits, 8);
        assert_eq!(updated.note, "rotated");
    }

    #[test]
    fn search_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let (_path, mut session) = new_vault(&dir);
        session
            .add_credential(record("alice").with_issuer(Some("GitHub".into())))
            .unwrap();
        session.add_credential(record("bob")).unwrap();

        let hits = session.search("github").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "alice");
    }

    #[test]
    fn generate_code_marks_dirty_without_saving() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        let before = fs::read(&path).unwrap();

        let code = session.generate_code("github", 59).unwrap();
        assert_eq!(code.code, "996554");
        assert_eq!(code.remaining_seconds, 1);
        assert!(session.is_dirty());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(session.credential("github").unwrap().last_used_at.is_some());
    }

    #[test]
    fn manual_save_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        let opts = SessionOptions {
            auto_save: false,
            ..options()
        };
        let mut session = VaultSession::create(&path, b"pw", &opts, None).unwrap();
        session.add_credential(record("github")).unwrap();
        assert!(session.is_dirty());
        session.lock();

        let mut session = VaultSession::unlock_with(&path, b"pw", &opts, None).unwrap();
        assert_eq!(session.credential_count().unwrap(), 0);
        session.add_credential(record("github")).unwrap();
        session.save().unwrap();
        assert!(!session.is_dirty());
        session.lock();

        let mut session = VaultSession::unlock_with(&path, b"pw", &opts, None).unwrap();
        assert_eq!(session.credential_count().unwrap(), 1);
    }

    #[test]
    fn idle_timeout_locks_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        let opts = SessionOptions {
            idle_timeout: Some(Duration::from_millis(50)),
            ..options()
        };
        let mut session = VaultSession::create(&path, b"pw", &opts, None).unwrap();
        assert!(session.is_unlocked());

        thread::sleep(Duration::from_millis(120));
        assert!(!session.is_unlocked());
        assert!(matches!(
            session.list_credentials(),
            Err(AuthVaultError::SessionLocked)
        ));

        // The advisory lock was released along with the key.
        assert!(VaultSession::unlock_with(&path, b"pw", &opts, None).is_ok());
    }

    #[test]
    fn change_passphrase_rekeys() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        session.change_passphrase(b"new passphrase", None).unwrap();
        session.lock();

        assert!(matches!(
            VaultSession::unlock_with(&path, b"correct horse", &options(), None),
            Err(AuthVaultError::WrongPassphrase)
        ));
        let mut session = VaultSession::unlock_with(&path, b"new passphrase", &options(), None).unwrap();
        assert_eq!(session.credential_count().unwrap(), 1);
    }

    #[test]
    fn keyfile_is_required_once_set() {
        let dir = TempDir::new().unwrap();
        let kf = Keyfile::generate(&dir.path().join("vault.key")).unwrap();
        let other = Keyfile::generate(&dir.path().join("other.key")).unwrap();
        let path = dir.path().join("accounts.vault");

        VaultSession::create(&path, b"pw", &options(), Some(&kf))
            .unwrap()
            .lock();

        for attempt in [None, Some(&other)] {
            let err = VaultSession::unlock_with(&path, b"pw", &options(), attempt).unwrap_err();
            assert!(matches!(err, AuthVaultError::WrongPassphrase));
        }
        let mut session = VaultSession::unlock_with(&path, b"pw", &options(), Some(&kf)).unwrap();
        assert!(session.requires_keyfile().unwrap());
    }

    #[test]
    fn restore_requires_matching_passphrase() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.add_credential(record("github")).unwrap();
        let backup = dir.path().join("accounts.bak");
        VaultStore::new(&path).backup(&backup).unwrap();
        session.remove_credential("github").unwrap();
        session.lock();

        let err = VaultSession::restore_from(&path, &backup, b"wrong", None).unwrap_err();
        assert!(matches!(err, AuthVaultError::WrongPassphrase));

        let count = VaultSession::restore_from(&path, &backup, b"correct horse", None).unwrap();
        assert_eq!(count, 1);
        let mut session = VaultSession::unlock_with(&path, b"correct horse", &options(), None).unwrap();
        assert!(session.credential("github").is_ok());
    }

    #[test]
    fn polling_is_unlocked_enforces_idle_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        let opts = SessionOptions {
            idle_timeout: Some(Duration::from_millis(20)),
            ..options()
        };
        let mut first = VaultSession::create(&path, b"pw", &opts, None).unwrap();

        thread::sleep(Duration::from_millis(80));
        assert!(!first.is_unlocked());

        // Only polled, never touched, yet the key and file lock are gone.
        assert!(matches!(first.state, SessionState::Locked));
        let mut second = VaultSession::unlock_with(&path, b"pw", &opts, None).unwrap();
        assert!(second.is_unlocked());
    }

    #[test]
    fn oversized_kdf_header_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.vault");
        let header = VaultHeader {
            salt: crate::crypto::kdf::generate_salt().to_vec(),
            kdf: KdfParams {
                memory_kib: 4 * 1024 * 1024,
                iterations: 64,
                parallelism: 4,
            },
            created_at: Utc::now(),
            keyfile_fingerprint: None,
        };
        let file = VaultFile::seal(header, &DerivedKey::new([0u8; 32]), &[]).unwrap();
        format::write_vault(&path, &file).unwrap();

        let err = VaultSession::unlock_with(&path, b"pw", &options(), None).unwrap_err();
        assert!(matches!(err, AuthVaultError::CorruptFile(_)));
    }

    #[test]
    fn padded_label_is_stored_trimmed() {
        let dir = TempDir::new().unwrap();
        let (_path, mut session) = new_vault(&dir);
        let mut padded = record("x");
        padded.label = " x ".into();
        session.add_credential(padded).unwrap();

        assert_eq!(session.credential("x").unwrap().label, "x");
        assert_eq!(session.generate_code("x", 59).unwrap().code, "996554");
        session.remove_credential("x").unwrap();
        assert_eq!(session.credential_count().unwrap(), 0);

        session.add_credential(record("y")).unwrap();
        let mut replacement = record("y");
        replacement.label = "  z\t".into();
        session.update_credential("y", replacement).unwrap();
        assert!(session.credential("z").is_ok());
    }

    #[test]
    fn wrong_keyfile_costs_a_full_derivation() {
        let dir = TempDir::new().unwrap();
        let kf = Keyfile::generate(&dir.path().join("vault.key")).unwrap();
        let other = Keyfile::generate(&dir.path().join("other.key")).unwrap();
        let path = dir.path().join("accounts.vault");
        // Enough work that Argon2 dominates the measurement.
        let opts = SessionOptions {
            kdf: KdfParams {
                memory_kib: 16 * 1024,
                iterations: 2,
                parallelism: 1,
            },
            ..options()
        };
        VaultSession::create(&path, b"pw", &opts, Some(&kf))
            .unwrap()
            .lock();

        let started = Instant::now();
        let err = VaultSession::unlock_with(&path, b"wrong", &opts, Some(&kf)).unwrap_err();
        let wrong_passphrase = started.elapsed();
        assert!(matches!(err, AuthVaultError::WrongPassphrase));

        let started = Instant::now();
        let err = VaultSession::unlock_with(&path, b"pw", &opts, Some(&other)).unwrap_err();
        let wrong_keyfile = started.elapsed();
        assert!(matches!(err, AuthVaultError::WrongPassphrase));

        let started = Instant::now();
        let err = VaultSession::unlock_with(&path, b"pw", &opts, None).unwrap_err();
        let missing_keyfile = started.elapsed();
        assert!(matches!(err, AuthVaultError::WrongPassphrase));

        assert!(wrong_keyfile * 4 >= wrong_passphrase, "{wrong_keyfile:?} vs {wrong_passphrase:?}");
        assert!(missing_keyfile * 4 >= wrong_passphrase, "{missing_keyfile:?} vs {wrong_passphrase:?}");
    }

    #[test]
    fn pending_unlock_wait_and_cancel() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.lock();

        let pending = PendingUnlock::spawn(
            path.clone(),
            Zeroizing::new(b"correct horse".to_vec()),
            options(),
            None,
        );
        pending.cancel();

        // Cancelling released everything, so a fresh unlock succeeds.
        let pending = PendingUnlock::spawn(
            path.clone(),
            Zeroizing::new(b"correct horse".to_vec()),
            options(),
            None,
        );
        let mut session = pending.wait().unwrap();
        assert!(session.is_unlocked());
    }

    #[test]
    fn pending_unlock_try_take_eventually_returns() {
        let dir = TempDir::new().unwrap();
        let (path, mut session) = new_vault(&dir);
        session.lock();

        let mut pending =
            PendingUnlock::spawn(path, Zeroizing::new(b"nope".to_vec()), options(), None);
        let result = loop {
            if let Some(result) = pending.try_take() {
                break result;
            }
            thread::sleep(Duration::from_millis(5));
        };
        assert!(matches!(result, Err(AuthVaultError::WrongPassphrase)));
    }
}
