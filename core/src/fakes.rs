//! In-memory stand-ins for the storage traits, used by orchestrator tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{RegistryError, Result};
use crate::journal::{LogOperation, RollbackFailure, TransactionJournal};
use crate::storage::{DrawingLayout, IndexStorage};
use crate::types::ProcessedDrawing;

#[derive(Default)]
struct State {
    calls: Vec<String>,
    fail_structure_for: Option<String>,
    fail_search_index: bool,
    fail_rollback: bool,
}

/// Shared call log plus failure switches.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<State>>);

impl Recorder {
    fn push(&self, call: impl Into<String>) {
        self.0.borrow_mut().calls.push(call.into());
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<String> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter(|c| c.contains(needle))
            .cloned()
            .collect()
    }

    pub fn fail_structure_for(&self, drawing_number: &str) {
        self.0.borrow_mut().fail_structure_for = Some(drawing_number.to_string());
    }

    pub fn fail_search_index(&self) {
        self.0.borrow_mut().fail_search_index = true;
    }

    pub fn fail_rollback(&self) {
        self.0.borrow_mut().fail_rollback = true;
    }
}

pub struct FakeLayout {
    rec: Recorder,
    created: Vec<PathBuf>,
}

impl FakeLayout {
    pub fn new(rec: Recorder) -> Self {
        Self {
            rec,
            created: Vec::new(),
        }
    }
}

impl DrawingLayout for FakeLayout {
    fn create_directory(&mut self, path: &Path, journal: &mut TransactionJournal) -> Result<()> {
        self.created.push(path.to_path_buf());
        journal.ok(LogOperation::CreateDir, path);
        Ok(())
    }

    fn create_file(
        &mut self,
        path: &Path,
        _content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.created.push(path.to_path_buf());
        journal.ok(LogOperation::CreateFile, path);
        Ok(())
    }

    fn update_file(
        &mut self,
        path: &Path,
        _content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.rec.push("layout.update");
        journal.ok(LogOperation::UpdateFile, path);
        Ok(())
    }

    fn create_drawing_structure(
        &mut self,
        drawing_number: &str,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.rec.push(format!("layout.structure {drawing_number}"));
        if self.rec.0.borrow().fail_structure_for.as_deref() == Some(drawing_number) {
            return Err(RegistryError::fs(
                crate::error::FsAction::CreateDir,
                format!("drawing-{drawing_number}"),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ));
        }
        self.create_directory(Path::new(&format!("drawing-{drawing_number}")), journal)
    }

    fn create_instruction_file(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.rec.push(format!("layout.instruction {}", data.drawing_number));
        let path = format!("drawing-{}/instruction.json", data.drawing_number);
        self.create_file(Path::new(&path), b"{}", journal)
    }

    fn commit(&mut self, _journal: &mut TransactionJournal) {
        self.rec.push("layout.commit");
        self.created.clear();
    }

    fn rollback(&mut self, journal: &mut TransactionJournal) -> Vec<RollbackFailure> {
        self.rec.push("layout.rollback");
        let fail = self.rec.0.borrow().fail_rollback;
        let mut failures = Vec::new();
        for (i, path) in self.created.drain(..).rev().enumerate() {
            journal.compensate(LogOperation::RollbackDeleteFile, &path, &mut failures, || {
                if fail && i == 0 {
                    Err(std::io::Error::new(std::io::ErrorKind::Other, "locked"))
                } else {
                    Ok(())
                }
            });
        }
        failures
    }
}

pub struct FakeIndex {
    rec: Recorder,
}

impl FakeIndex {
    pub fn new(rec: Recorder) -> Self {
        rec.push("index.open");
        Self { rec }
    }
}

impl IndexStorage for FakeIndex {
    fn update_companies_file(
        &mut self,
        data: &ProcessedDrawing,
        _journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.rec.push(format!("index.companies {}", data.drawing_number));
        Ok(())
    }

    fn update_search_index(
        &mut self,
        data: &ProcessedDrawing,
        _journal: &mut TransactionJournal,
    ) -> Result<()> {
        self.rec.push(format!("index.search {}", data.drawing_number));
        if self.rec.0.borrow().fail_search_index {
            return Err(RegistryError::json(
                "search-index.json",
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            ));
        }
        Ok(())
    }

    fn commit(&mut self, _journal: &mut TransactionJournal) {
        self.rec.push("index.commit");
    }

    fn rollback(&mut self, _journal: &mut TransactionJournal) -> Vec<RollbackFailure> {
        self.rec.push("index.rollback");
        Vec::new()
    }
}
