//! `companies.json` and `search-index.json`, read-modify-written whole.
//!
//! Every write is preceded by a byte snapshot of the current file (plus a
//! `<file>.backup.<ms>` copy on disk). Snapshots are pushed on an undo stack
//! per write, so two writes to the same file inside one transaction each
//! restore their own predecessor and rollback lands on the oldest bytes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use wi_core::documents::{CompaniesDocument, SearchIndexDocument, SearchIndexEntry};
use wi_core::{
    FsAction, IndexLock, IndexStorage, IndexStorageFactory, LockLease, LogOperation,
    ProcessedDrawing, RegistryError, Result, RollbackFailure, TransactionJournal,
};

use crate::paths::{backup_path, companies_path, search_index_path, temp_path};

enum IndexUndo {
    /// The file did not exist before this transaction wrote it.
    RemoveCreated(PathBuf),
    Restore {
        path: PathBuf,
        backup: PathBuf,
        snapshot: Vec<u8>,
    },
}

pub struct JsonIndexStore {
    root: PathBuf,
    lock: Arc<dyn IndexLock>,
    leases: Vec<(PathBuf, Box<dyn LockLease>)>,
    undo: Vec<IndexUndo>,
}

impl JsonIndexStore {
    pub fn new(root: impl Into<PathBuf>, lock: Arc<dyn IndexLock>) -> Self {
        Self {
            root: root.into(),
            lock,
            leases: Vec::new(),
            undo: Vec::new(),
        }
    }

    /// Sets `hasDrawing` on an existing search-index entry. The entry must
    /// already be there; this never creates one.
    pub fn mark_drawing_attached(
        &mut self,
        drawing_number: &str,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let path = search_index_path(&self.root);
        self.guard(&path);
        let Some(snapshot) = self.backup(&path, journal)? else {
            return Err(RegistryError::MissingIndexEntry(drawing_number.to_string()));
        };

        let mut doc: SearchIndexDocument = parse(&path, &snapshot)?;
        let entry = doc
            .entry_mut(drawing_number)
            .ok_or_else(|| RegistryError::MissingIndexEntry(drawing_number.to_string()))?;
        entry.has_drawing = true;
        doc.touch(&now_iso());

        self.write_tracked(&path, &doc, true, journal)?;
        tracing::info!(drawing = %drawing_number, "drawing marked as attached");
        Ok(())
    }

    /// Takes the lease for `path` unless this store already holds it.
    fn guard(&mut self, path: &Path) {
        if self.leases.iter().any(|(held, _)| held == path) {
            return;
        }
        let lease = self.lock.acquire(path);
        self.leases.push((path.to_path_buf(), lease));
    }

    /// Snapshots `path` before it is overwritten. `None` means the file does
    /// not exist yet.
    fn backup(&mut self, path: &Path, journal: &mut TransactionJournal) -> Result<Option<Vec<u8>>> {
        let snapshot = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RegistryError::fs(FsAction::ReadFile, path, e)),
        };

        let backup = backup_path(path);
        if let Err(e) = fs::copy(path, &backup) {
            journal.failed(LogOperation::BackupFile, &backup, &e);
            return Err(RegistryError::fs(FsAction::CopyFile, backup, e));
        }
        journal.ok(LogOperation::BackupFile, &backup);

        self.undo.push(IndexUndo::Restore {
            path: path.to_path_buf(),
            backup,
            snapshot: snapshot.clone(),
        });
        Ok(Some(snapshot))
    }

    fn write_tracked<T: Serialize>(
        &mut self,
        path: &Path,
        doc: &T,
        existed: bool,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let body = serde_json::to_string_pretty(doc).map_err(|e| RegistryError::json(path, e))?;
        if !existed {
            // registered before the write: a half-written new file still goes
            self.undo.push(IndexUndo::RemoveCreated(path.to_path_buf()));
        }
        if let Err(e) = write_replace(path, body.as_bytes()) {
            journal.failed(LogOperation::UpdateFile, path, &e);
            return Err(RegistryError::fs(FsAction::WriteFile, path, e));
        }
        journal.ok(LogOperation::UpdateFile, path);
        Ok(())
    }

    fn release(&mut self) {
        self.undo.clear();
        self.leases.clear();
    }
}

impl IndexStorage for JsonIndexStore {
    fn update_companies_file(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let path = companies_path(&self.root);
        self.guard(&path);
        let snapshot = self.backup(&path, journal)?;
        let now = now_iso();

        let mut doc = match &snapshot {
            Some(bytes) => parse::<CompaniesDocument>(&path, bytes)?,
            None => CompaniesDocument::empty(&now),
        };
        doc.upsert_drawing(data, &now);

        self.write_tracked(&path, &doc, snapshot.is_some(), journal)?;
        tracing::info!(
            drawing = %data.drawing_number,
            company = %data.company_id,
            "companies index updated"
        );
        Ok(())
    }

    fn update_search_index(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let path = search_index_path(&self.root);
        self.guard(&path);
        let snapshot = self.backup(&path, journal)?;
        let now = now_iso();

        let mut doc = match &snapshot {
            Some(bytes) => parse::<SearchIndexDocument>(&path, bytes)?,
            None => SearchIndexDocument::empty(&now),
        };
        doc.upsert_entry(SearchIndexEntry::for_drawing(data), &now);

        self.write_tracked(&path, &doc, snapshot.is_some(), journal)?;
        tracing::info!(
            drawing = %data.drawing_number,
            total = doc.drawings.len(),
            "search index updated"
        );
        Ok(())
    }

    fn commit(&mut self, _journal: &mut TransactionJournal) {
        for step in &self.undo {
            if let IndexUndo::Restore { backup, .. } = step {
                if let Err(e) = fs::remove_file(backup) {
                    tracing::warn!(
                        backup = %backup.display(),
                        error = %e,
                        "could not remove index backup"
                    );
                }
            }
        }
        self.release();
    }

    fn rollback(&mut self, journal: &mut TransactionJournal) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();

        for step in std::mem::take(&mut self.undo).into_iter().rev() {
            match step {
                IndexUndo::Restore { path, backup, snapshot } => {
                    let before = failures.len();
                    journal.compensate(LogOperation::RollbackRestoreFile, &path, &mut failures, || {
                        write_replace(&path, &snapshot)
                    });
                    if failures.len() > before {
                        // the backup is the only copy left of the old bytes
                        tracing::warn!(
                            backup = %backup.display(),
                            "restore failed, keeping backup"
                        );
                        continue;
                    }
                    journal.compensate(
                        LogOperation::RollbackDeleteBackup,
                        &backup,
                        &mut failures,
                        || remove_if_present(&backup),
                    );
                }
                IndexUndo::RemoveCreated(path) => {
                    journal.compensate(LogOperation::RollbackDeleteFile, &path, &mut failures, || {
                        remove_if_present(&path)
                    });
                }
            }
        }

        self.release();
        failures
    }
}

impl Drop for JsonIndexStore {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            tracing::warn!(
                pending = self.undo.len(),
                "index store dropped with uncommitted writes"
            );
        }
    }
}

/// Opens one [`JsonIndexStore`] per transaction, all sharing the same lock.
#[derive(Clone)]
pub struct JsonIndexStoreFactory {
    root: PathBuf,
    lock: Arc<dyn IndexLock>,
}

impl JsonIndexStoreFactory {
    pub fn new(root: impl Into<PathBuf>, lock: Arc<dyn IndexLock>) -> Self {
        Self {
            root: root.into(),
            lock,
        }
    }
}

impl IndexStorageFactory for JsonIndexStoreFactory {
    fn open(&self) -> Box<dyn IndexStorage> {
        Box::new(JsonIndexStore::new(self.root.clone(), Arc::clone(&self.lock)))
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| RegistryError::json(path, e))
}

/// Whole-file replace through a sibling temp file and a rename.
pub(crate) fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Already gone counts as done.
pub(crate) fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Reads and parses an index document, `None` when the file is absent.
pub(crate) fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => parse(path, &bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::fs(FsAction::ReadFile, path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wi_core::Unserialized;

    #[test]
    fn write_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("companies.json");
        write_replace(&file, b"{}").unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"{}");
        assert!(!temp_path(&file).exists());
    }

    #[test]
    fn repeated_writes_roll_back_to_the_oldest_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = search_index_path(dir.path());
        fs::write(&file, b"{\"drawings\": []}").unwrap();

        let mut store = JsonIndexStore::new(dir.path(), Arc::new(Unserialized));
        let mut journal = TransactionJournal::new();
        let first = store.backup(&file, &mut journal).unwrap();
        assert!(first.is_some());
        fs::write(&file, b"second").unwrap();
        store.backup(&file, &mut journal).unwrap();
        fs::write(&file, b"third").unwrap();

        let failures = store.rollback(&mut journal);
        assert!(failures.is_empty());
        assert_eq!(fs::read(&file).unwrap(), b"{\"drawings\": []}");
    }

    #[test]
    fn missing_file_has_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonIndexStore::new(dir.path(), Arc::new(Unserialized));
        let mut journal = TransactionJournal::new();
        let snap = store
            .backup(&companies_path(dir.path()), &mut journal)
            .unwrap();
        assert!(snap.is_none());
        assert!(journal.is_empty());
    }
}
