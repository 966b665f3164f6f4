//! Append-only operation log of one transaction.
//!
//! The journal is returned to the caller for diagnostics and never persisted.
//! Each entry is mirrored to `tracing` at debug level.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOperation {
    TransactionStart,
    CreateDir,
    CreateFile,
    UpdateFile,
    BackupFile,
    RollbackDeleteFile,
    RollbackDeleteDir,
    RollbackRestoreFile,
    RollbackDeleteBackup,
    TransactionCommit,
    TransactionRollback,
}

impl LogOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            LogOperation::TransactionStart => "transaction_start",
            LogOperation::CreateDir => "create_dir",
            LogOperation::CreateFile => "create_file",
            LogOperation::UpdateFile => "update_file",
            LogOperation::BackupFile => "backup_file",
            LogOperation::RollbackDeleteFile => "rollback_delete_file",
            LogOperation::RollbackDeleteDir => "rollback_delete_dir",
            LogOperation::RollbackRestoreFile => "rollback_restore_file",
            LogOperation::RollbackDeleteBackup => "rollback_delete_backup",
            LogOperation::TransactionCommit => "transaction_commit",
            LogOperation::TransactionRollback => "transaction_rollback",
        }
    }

    pub fn is_compensation(self) -> bool {
        matches!(
            self,
            LogOperation::RollbackDeleteFile
                | LogOperation::RollbackDeleteDir
                | LogOperation::RollbackRestoreFile
                | LogOperation::RollbackDeleteBackup
        )
    }
}

impl std::fmt::Display for LogOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    #[serde(serialize_with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub operation: LogOperation,
    pub path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn iso_millis<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// A compensating action that failed during rollback. Collected, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub operation: LogOperation,
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.path.display(), self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct TransactionJournal {
    entries: Vec<TransactionLogEntry>,
}

impl TransactionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        operation: LogOperation,
        path: &Path,
        success: bool,
        error: Option<String>,
    ) {
        let path = path.display().to_string();
        if success {
            tracing::debug!(op = %operation, %path, "transaction step");
        } else {
            tracing::warn!(
                op = %operation,
                %path,
                error = error.as_deref().unwrap_or(""),
                "transaction step failed"
            );
        }
        self.entries.push(TransactionLogEntry {
            timestamp: Utc::now(),
            operation,
            path,
            success,
            error,
        });
    }

    pub fn ok(&mut self, operation: LogOperation, path: &Path) {
        self.record(operation, path, true, None);
    }

    pub fn failed(&mut self, operation: LogOperation, path: &Path, error: impl ToString) {
        self.record(operation, path, false, Some(error.to_string()));
    }

    /// Runs one compensating action and logs it, win or lose. A failure is
    /// pushed onto `failures` instead of being returned.
    pub fn compensate<F>(
        &mut self,
        operation: LogOperation,
        path: &Path,
        failures: &mut Vec<RollbackFailure>,
        action: F,
    ) where
        F: FnOnce() -> std::io::Result<()>,
    {
        match action() {
            Ok(()) => self.ok(operation, path),
            Err(e) => {
                let message = e.to_string();
                self.failed(operation, path, &message);
                failures.push(RollbackFailure {
                    operation,
                    path: path.to_path_buf(),
                    message,
                });
            }
        }
    }

    pub fn entries(&self) -> &[TransactionLogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TransactionLogEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensation_failures_are_logged_and_collected() {
        let mut journal = TransactionJournal::new();
        let mut failures = Vec::new();
        journal.compensate(
            LogOperation::RollbackDeleteFile,
            Path::new("a"),
            &mut failures,
            || Ok(()),
        );
        journal.compensate(LogOperation::RollbackDeleteDir, Path::new("b"), &mut failures, || {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "busy"))
        });

        assert_eq!(journal.len(), 2);
        assert!(journal.entries()[0].success);
        assert!(!journal.entries()[1].success);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, PathBuf::from("b"));
        assert_eq!(failures[0].to_string(), "rollback_delete_dir b: busy");
    }

    #[test]
    fn entries_serialize_with_snake_case_operation() {
        let mut journal = TransactionJournal::new();
        journal.ok(LogOperation::CreateDir, Path::new("x/y"));
        let v = serde_json::to_value(journal.entries()).unwrap();
        assert_eq!(v[0]["operation"], "create_dir");
        assert_eq!(v[0]["path"], "x/y");
        assert!(v[0].get("error").is_none());
        assert!(v[0]["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}
