//! Atomic persistence with session-scoped rollback
//!
//! Fixes land on disk through a sibling temp file and an atomic rename,
//! with the pre-mutation content snapshotted per (session, file) so a
//! failed write can always be rolled back. A failed write never leaves a
//! partially-written file visible.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Logical grouping for one pipeline run's backups.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a file's on-disk content before its first mutation.
#[derive(Debug, Clone)]
pub struct Backup {
    pub session_id: String,
    pub file_path: PathBuf,
    pub original_content: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory store of pre-mutation snapshots, keyed by (session, file).
///
/// Exactly one backup per key: the first capture wins, later calls are
/// no-ops, so repeated fixes to one file within a session all roll back
/// to the content the session started from.
pub struct BackupStore {
    backups: Mutex<HashMap<(String, PathBuf), Backup>>,
}

impl BackupStore {
    pub fn new() -> Self {
        Self {
            backups: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, PathBuf), Backup>> {
        self.backups.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Capture the current on-disk content, once per (session, file).
    pub fn create(&self, session_id: &str, path: &Path) -> Result<()> {
        let key = (session_id.to_string(), path.to_path_buf());
        {
            let backups = self.lock();
            if backups.contains_key(&key) {
                return Ok(());
            }
        }

        let original_content = fs::read_to_string(path)
            .with_context(|| format!("failed to snapshot {}", path.display()))?;

        let mut backups = self.lock();
        backups.entry(key).or_insert_with(|| Backup {
            session_id: session_id.to_string(),
            file_path: path.to_path_buf(),
            original_content,
            created_at: Utc::now(),
        });
        Ok(())
    }

    pub fn get(&self, session_id: &str, path: &Path) -> Option<Backup> {
        self.lock()
            .get(&(session_id.to_string(), path.to_path_buf()))
            .cloned()
    }

    /// Overwrite the file with its stored original. Idempotent; returns
    /// false when no backup exists for the key.
    pub fn restore(&self, session_id: &str, path: &Path) -> Result<bool> {
        let Some(backup) = self.get(session_id, path) else {
            return Ok(false);
        };
        fs::write(path, &backup.original_content)
            .with_context(|| format!("failed to restore {}", path.display()))?;
        Ok(true)
    }

    /// Drop every backup belonging to a session.
    pub fn purge_session(&self, session_id: &str) {
        self.lock().retain(|(sid, _), _| sid != session_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one persistence attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub write_success: bool,
    pub rollback_performed: bool,
    pub error: Option<String>,
}

impl PersistOutcome {
    fn ok() -> Self {
        Self {
            write_success: true,
            rollback_performed: false,
            error: None,
        }
    }
}

/// Temp-file + rename writer with backup-based rollback.
pub struct AtomicFilePersistence {
    store: std::sync::Arc<BackupStore>,
}

impl AtomicFilePersistence {
    pub fn new(store: std::sync::Arc<BackupStore>) -> Self {
        Self { store }
    }

    /// Persist new content for a file.
    ///
    /// Ensures a backup exists for (session, path) when requested, writes
    /// a `<path>.tmp` sibling, flushes, then renames over the target. On
    /// any failure the backup (if present) is restored and the outcome
    /// reports `rollback_performed`.
    pub fn persist_fix(
        &self,
        path: &Path,
        content: &str,
        session_id: &str,
        create_backup: bool,
    ) -> PersistOutcome {
        if create_backup {
            if let Err(e) = self.store.create(session_id, path) {
                return PersistOutcome {
                    write_success: false,
                    rollback_performed: false,
                    error: Some(format!("backup failed: {:#}", e)),
                };
            }
        }

        match write_atomic(path, content) {
            Ok(()) => PersistOutcome::ok(),
            Err(e) => {
                let rolled_back = self.store.restore(session_id, path).unwrap_or(false);
                PersistOutcome {
                    write_success: false,
                    rollback_performed: rolled_back,
                    error: Some(format!("{:#}", e)),
                }
            }
        }
    }

    /// Restore a file to its session-start content.
    pub fn restore_file(&self, path: &Path, session_id: &str) -> Result<bool> {
        self.store.restore(session_id, path)
    }
}

/// Sibling temp name: `<path>.tmp`, appended to the full file name.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp = tmp_path(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("failed to open {}", tmp.display()))?;

    let write_result = file
        .write_all(content.as_bytes())
        .and_then(|_| file.sync_all());
    if let Err(e) = write_result {
        drop(file);
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to write {}", tmp.display()));
    }
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("failed to rename over {}", path.display()));
    }
    Ok(())
}
