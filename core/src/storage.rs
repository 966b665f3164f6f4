use std::path::Path;

use crate::error::Result;
use crate::journal::{RollbackFailure, TransactionJournal};
use crate::types::{DrawingRequest, ProcessedDrawing};

/// Upserts one drawing into the shared `companies.json` / `search-index.json`
/// documents, snapshotting each file before it is overwritten.
pub trait IndexStorage {
    fn update_companies_file(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()>;
    fn update_search_index(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()>;

    /// Drops every backup taken so far. Cleanup failures are swallowed.
    fn commit(&mut self, journal: &mut TransactionJournal);

    /// Removes files this instance created and restores every snapshot, most
    /// recent first. Always attempts every step.
    fn rollback(&mut self, journal: &mut TransactionJournal) -> Vec<RollbackFailure>;

    fn process_drawing_data(&self, input: &DrawingRequest) -> Result<ProcessedDrawing> {
        crate::normalize::process_drawing_data(input)
    }
}

/// Opens the index store a transaction will use for its whole life.
pub trait IndexStorageFactory {
    fn open(&self) -> Box<dyn IndexStorage>;
}

impl<F> IndexStorageFactory for F
where
    F: Fn() -> Box<dyn IndexStorage>,
{
    fn open(&self) -> Box<dyn IndexStorage> {
        self()
    }
}

/// Materializes the on-disk shape of drawings. Every directory and file it
/// creates is registered for compensation in the same call that creates it.
pub trait DrawingLayout {
    fn create_directory(&mut self, path: &Path, journal: &mut TransactionJournal) -> Result<()>;

    /// Fails with `AlreadyExists` without writing if `path` is taken.
    fn create_file(
        &mut self,
        path: &Path,
        content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()>;

    /// Overwrites `path`, keeping the previous bytes for rollback.
    fn update_file(
        &mut self,
        path: &Path,
        content: &[u8],
        journal: &mut TransactionJournal,
    ) -> Result<()>;

    fn create_drawing_structure(
        &mut self,
        drawing_number: &str,
        journal: &mut TransactionJournal,
    ) -> Result<()>;
    fn create_instruction_file(
        &mut self,
        data: &ProcessedDrawing,
        journal: &mut TransactionJournal,
    ) -> Result<()>;

    fn commit(&mut self, journal: &mut TransactionJournal);

    /// Undoes every registered action in reverse order of creation.
    fn rollback(&mut self, journal: &mut TransactionJournal) -> Vec<RollbackFailure>;
}

/// Held while a transaction owns write access to one index file; released on drop.
pub trait LockLease: Send {}

/// Serializes writers of a shared index file.
pub trait IndexLock: Send + Sync {
    /// Blocks until `path` is free, then hands out its lease.
    fn acquire(&self, path: &Path) -> Box<dyn LockLease>;
}

/// No serialization at all: concurrent writers may lose each other's updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unserialized;

struct NoLease;

impl LockLease for NoLease {}

impl IndexLock for Unserialized {
    fn acquire(&self, _path: &Path) -> Box<dyn LockLease> {
        Box::new(NoLease)
    }
}
