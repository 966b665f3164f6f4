use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use wi_core::instruction::{generate_basic_instruction, INSTRUCTION_FILE};
use wi_core::{
    DrawingLayout, FsAction, LogOperation, ProcessedDrawing, RegistryError, Result, RollbackFailure,
    TransactionJournal,
};

use crate::json_storage::remove_if_present;
use crate::paths::{drawing_dir, DRAWING_SUBFOLDERS};

enum LayoutUndo {
    RemoveDir(PathBuf),
    /// Intermediate directory made on the way to a target; only removed
    /// while empty, since other writers may share it.
    RemoveEmptyDir(PathBuf),
    RemoveFile(PathBuf),
    Restore { path: PathBuf, snapshot: Vec<u8> },
}

/// Builds drawing directories and files under a data root.
///
/// Only what this instance actually created is registered for removal; a
/// directory that already existed is left alone on rollback.
pub struct FsLayout {
    root: PathBuf,
    undo: Vec<LayoutUndo>,
}

impl FsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            undo: Vec::new(),
        }
    }
}

impl DrawingLayout for FsLayout {
    fn create_directory(&mut self, path: &Path, journal: &mut TransactionJournal) -> Result<()> {
        let missing: Vec<PathBuf> = path
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();
        if let Err(e) = fs::create_dir_all(path) {
            journal.failed(LogOperation::CreateDir, path, &e);
            return Err(RegistryError::fs(FsAction::CreateDir, path, e));
        }
        // outermost first, so the reverse walk empties children before parents
        for dir in missing.into_iter().rev() {
            let step = if dir.as_path() == path {
                LayoutUndo::RemoveDir(dir)
            } else {
                LayoutUndo::RemoveEmptyDir(dir)
            };
            self.undo.push(step);
        }
        journal.ok(LogOperation::CreateDir, path);
        Ok(())
    }

    fn create_file(
        &mut self,
        path: &Path,
        content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                journal.failed(LogOperation::CreateFile, path, "file already exists");
                return Err(RegistryError::AlreadyExists(path.to_path_buf()));
            }
            Err(e) => {
                journal.failed(LogOperation::CreateFile, path, &e);
                return Err(RegistryError::fs(FsAction::WriteFile, path, e));
            }
        };
        self.undo.push(LayoutUndo::RemoveFile(path.to_path_buf()));

        if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
            journal.failed(LogOperation::CreateFile, path, &e);
            return Err(RegistryError::fs(FsAction::WriteFile, path, e));
        }
        journal.ok(LogOperation::CreateFile, path);
        Ok(())
    }

    fn update_file(
        &mut self,
        path: &Path,
        content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        match fs::read(path) {
            Ok(snapshot) => {
                self.undo.push(LayoutUndo::Restore {
                    path: path.to_path_buf(),
                    snapshot,
                });
                journal.ok(LogOperation::BackupFile, path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.undo.push(LayoutUndo::RemoveFile(path.to_path_buf()));
            }
            Err(e) => {
                journal.failed(LogOperation::BackupFile, path, &e);
                return Err(RegistryError::fs(FsAction::ReadFile, path, e));
            }
        }

        if let Err(e) = fs::write(path, content) {
            journal.failed(LogOperation::UpdateFile, path, &e);
            return Err(RegistryError::fs(FsAction::WriteFile, path, e));
        }
        journal.ok(LogOperation::UpdateFile, path);
        Ok(())
    }

    fn create_drawing_structure(
        &mut self,
        drawing_number: &str,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let base = drawing_dir(&self.root, drawing_number);
        self.create_directory(&base, journal)?;
        for sub in DRAWING_SUBFOLDERS {
            self.create_directory(&base.join(sub), journal)?;
        }
        tracing::debug!(
            drawing = %drawing_number,
            dir = %base.display(),
            "drawing structure created"
        );
        Ok(())
    }

    fn create_instruction_file(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        let path = drawing_dir(&self.root, &data.drawing_number).join(INSTRUCTION_FILE);
        let doc = generate_basic_instruction(data, Utc::now().date_naive());
        let body = serde_json::to_string_pretty(&doc).map_err(|e| RegistryError::json(&path, e))?;
        self.create_file(&path, body.as_bytes(), journal)
    }

    fn commit(&mut self, _journal: &mut TransactionJournal) {
        tracing::debug!(steps = self.undo.len(), "layout committed");
        self.undo.clear();
    }

    fn rollback(&mut self, journal: &mut TransactionJournal) -> Vec<RollbackFailure> {
        let mut failures = Vec::new();
        for step in std::mem::take(&mut self.undo).into_iter().rev() {
            match step {
                LayoutUndo::RemoveFile(path) => {
                    journal.compensate(LogOperation::RollbackDeleteFile, &path, &mut failures, || {
                        remove_if_present(&path)
                    });
                }
                LayoutUndo::RemoveDir(path) => {
                    journal.compensate(LogOperation::RollbackDeleteDir, &path, &mut failures, || {
                        remove_dir(&path)
                    });
                }
                LayoutUndo::RemoveEmptyDir(path) => {
                    journal.compensate(LogOperation::RollbackDeleteDir, &path, &mut failures, || {
                        remove_empty_dir(&path)
                    });
                }
                LayoutUndo::Restore { path, snapshot } => {
                    journal.compensate(LogOperation::RollbackRestoreFile, &path, &mut failures, || {
                        fs::write(&path, &snapshot)
                    });
                }
            }
        }
        failures
    }
}

/// Empty first; anything left inside was created by this transaction too
/// (intermediate directories, partial files), so it goes recursively.
fn remove_dir(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(_) => fs::remove_dir_all(path),
    }
}

fn remove_empty_dir(path: &Path) -> std::io::Result<()> {
    match fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => match fs::read_dir(path).map(|mut entries| entries.next().is_some()) {
            Ok(true) => {
                tracing::debug!(dir = %path.display(), "shared directory not empty, kept");
                Ok(())
            }
            _ => Err(e),
        },
    }
}
