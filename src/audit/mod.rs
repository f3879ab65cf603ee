//! Audit log: SQLite-based operation history.
//!
//! Stores a record of every vault operation (add, remove, rename, code,
//! passwd, ...) in a local SQLite database at `<vault dir>/audit.db`.
//! Labels are recorded; secrets and generated codes never are.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations silently continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::errors::{AuthVaultError, Result};

/// File name of the audit database inside the vault directory.
const DB_FILE: &str = "audit.db";

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub label: Option<String>,
    pub details: Option<String>,
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<vault_dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened: callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(vault_dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(vault_dir);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                debug!(path = %db_path.display(), error = %e, "audit log unavailable");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                operation   TEXT NOT NULL,
                label       TEXT,
                details     TEXT
            );",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Fire-and-forget: errors are silently ignored.
    pub fn log(&self, operation: &str, label: Option<&str>, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        let _ = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, label, details)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![now, operation, label, details],
        );
    }

    /// Query recent audit entries, most recent first.
    ///
    /// - `limit`: maximum number of entries to return.
    /// - `since`: if provided, only return entries newer than this timestamp.
    pub fn query(&self, limit: usize, since: Option<DateTime<Utc>>) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // RFC 3339 strings in UTC sort chronologically, so a text compare works.
        let since = since.map_or_else(String::new, |ts| ts.to_rfc3339());

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, operation, label, details
                 FROM audit_log
                 WHERE timestamp >= ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(|e| audit_err("query prepare", e))?;

        let rows = stmt
            .query_map(rusqlite::params![since, limit], |row| {
                let ts: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    label: row.get(3)?,
                    details: row.get(4)?,
                })
            })
            .map_err(|e| audit_err("query exec", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| audit_err("row parse", e))
    }

    /// Path of the audit database for a vault directory.
    pub fn db_path(vault_dir: &Path) -> PathBuf {
        vault_dir.join(DB_FILE)
    }
}

fn audit_err(stage: &str, err: rusqlite::Error) -> AuthVaultError {
    AuthVaultError::Audit(format!("{stage}: {err}"))
}

/// Log an event next to the vault at `vault_path`.
///
/// Never fails the calling operation.
pub fn log_event(vault_path: &Path, op: &str, label: Option<&str>, details: Option<&str>) {
    let dir = match vault_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Some(audit) = AuditLog::open(dir) {
        audit.log(op, label, details);
    }
}
