// core/src/lib.rs
pub mod batch;
pub mod config;
pub mod documents;
pub mod error;
pub mod ids;
pub mod instruction;
pub mod journal;
pub mod machine_type;
pub mod normalize;
pub mod registration;
pub mod storage;
pub mod types;
pub mod validation;

#[cfg(test)]
mod fakes;

pub use batch::{process_drawings_with_transaction, BatchOutcome};
pub use config::RegistryConfig;
pub use error::{FsAction, RegistryError, Result};
pub use journal::{LogOperation, RollbackFailure, TransactionJournal, TransactionLogEntry};
pub use machine_type::{ListInput, MachineType};
pub use registration::{RegistrationTransaction, RollbackReport};
pub use storage::{
    DrawingLayout, IndexLock, IndexStorage, IndexStorageFactory, LockLease, Unserialized,
};
pub use types::*;
