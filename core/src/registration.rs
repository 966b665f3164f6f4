//! One registration transaction: directory/file creation through a
//! [`DrawingLayout`], index upserts through an [`IndexStorage`], and a single
//! commit or rollback at the end.
//!
//! Lifecycle: `new` → (`process_single_drawing`)* → `update_json_files`? →
//! `commit` | `rollback`. Both terminal calls consume the transaction. Any
//! error before `commit` must be answered with `rollback` by the caller;
//! [`crate::batch::process_drawings_with_transaction`] does that pairing.

use std::path::Path;

use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::journal::{LogOperation, RollbackFailure, TransactionJournal, TransactionLogEntry};
use crate::storage::{DrawingLayout, IndexStorage, IndexStorageFactory};
use crate::types::{DrawingRequest, ProcessedDrawing};

/// What a rollback left behind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    /// Compensating actions that failed; empty for a clean rollback.
    pub failures: Vec<RollbackFailure>,
    pub logs: Vec<TransactionLogEntry>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct RegistrationTransaction {
    layout: Box<dyn DrawingLayout>,
    index_factory: Box<dyn IndexStorageFactory>,
    /// Opened on first use; one store per transaction.
    index: Option<Box<dyn IndexStorage>>,
    journal: TransactionJournal,
    finished: bool,
}

impl RegistrationTransaction {
    pub fn new(
        layout: Box<dyn DrawingLayout>,
        index_factory: Box<dyn IndexStorageFactory>,
    ) -> Self {
        let mut journal = TransactionJournal::new();
        journal.ok(LogOperation::TransactionStart, Path::new(""));
        Self {
            layout,
            index_factory,
            index: None,
            journal,
            finished: false,
        }
    }

    fn index_store(&mut self) -> &mut dyn IndexStorage {
        let factory = &self.index_factory;
        self.index.get_or_insert_with(|| factory.open()).as_mut()
    }

    /// Resolves ids and creates the drawing's directories and
    /// `instruction.json`. The shared indices are not touched here.
    pub fn process_single_drawing(&mut self, input: &DrawingRequest) -> Result<ProcessedDrawing> {
        let processed = self.index_store().process_drawing_data(input)?;

        self.layout
            .create_drawing_structure(&processed.drawing_number, &mut self.journal)?;
        self.layout
            .create_instruction_file(&processed, &mut self.journal)?;

        Ok(processed)
    }

    /// Applies the index upserts for every processed drawing, in input order.
    pub fn update_json_files(&mut self, processed: &[ProcessedDrawing]) -> Result<()> {
        let index = self.index.as_mut().ok_or(RegistryError::IndexNotInitialized)?;
        for data in processed {
            index.update_companies_file(data, &mut self.journal)?;
            index.update_search_index(data, &mut self.journal)?;
        }
        Ok(())
    }

    /// Overwrites an arbitrary file under the transaction; the old bytes come
    /// back on rollback.
    pub fn update_file(&mut self, path: &Path, content: &[u8]) -> Result<()> {
        self.layout.update_file(path, content, &mut self.journal)
    }

    pub fn logs(&self) -> &[TransactionLogEntry] {
        self.journal.entries()
    }

    pub fn commit(mut self) -> Vec<TransactionLogEntry> {
        self.layout.commit(&mut self.journal);
        if let Some(mut index) = self.index.take() {
            index.commit(&mut self.journal);
        }
        self.journal.ok(LogOperation::TransactionCommit, Path::new(""));
        tracing::info!(steps = self.journal.len(), "transaction committed");

        self.finished = true;
        std::mem::take(&mut self.journal).into_entries()
    }

    /// Compensates in reverse: created files and directories first, then
    /// file snapshots, then the index store. A failing step never stops the
    /// remaining ones.
    pub fn rollback(mut self) -> RollbackReport {
        let mut failures = self.layout.rollback(&mut self.journal);
        if let Some(mut index) = self.index.take() {
            failures.extend(index.rollback(&mut self.journal));
        }

        let compensations = self
            .journal
            .entries()
            .iter()
            .filter(|e| e.operation.is_compensation())
            .count();
        if failures.is_empty() {
            self.journal.ok(LogOperation::TransactionRollback, Path::new(""));
            tracing::info!(compensations, "transaction rolled back");
        } else {
            let summary = format!("{} compensating action(s) failed", failures.len());
            self.journal
                .failed(LogOperation::TransactionRollback, Path::new(""), &summary);
            for f in &failures {
                tracing::warn!(failure = %f, "rollback left residue");
            }
        }

        self.finished = true;
        RollbackReport {
            failures,
            logs: std::mem::take(&mut self.journal).into_entries(),
        }
    }
}

impl Drop for RegistrationTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("registration transaction dropped without commit or rollback");
        }
    }
}
