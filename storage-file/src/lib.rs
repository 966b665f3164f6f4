//! Filesystem backing for the registration transaction: drawing directories
//! and files through [`FsLayout`], the two shared indices through
//! [`JsonIndexStore`].

pub mod integrity;
pub mod json_storage;
pub mod layout;
pub mod lock;
pub mod paths;

use std::sync::Arc;

use wi_core::{
    process_drawings_with_transaction, BatchOutcome, DrawingRequest, IndexLock,
    RegistrationTransaction, RegistryConfig, Unserialized,
};

pub use integrity::{existing_drawings, verify_integrity, IntegrityReport};
pub use json_storage::{JsonIndexStore, JsonIndexStoreFactory};
pub use layout::FsLayout;
pub use lock::PathLocks;

/// The process-wide lock, or none when serialization is switched off.
pub fn index_lock(config: &RegistryConfig) -> Arc<dyn IndexLock> {
    if config.serialize_index_writes {
        Arc::new(PathLocks::global())
    } else {
        Arc::new(Unserialized)
    }
}

pub fn open_index_store(config: &RegistryConfig) -> JsonIndexStore {
    JsonIndexStore::new(config.data_root.clone(), index_lock(config))
}

pub fn open_transaction(config: &RegistryConfig) -> RegistrationTransaction {
    tracing::debug!(root = %config.data_root.display(), "opening registration transaction");
    RegistrationTransaction::new(
        Box::new(FsLayout::new(config.data_root.clone())),
        Box::new(JsonIndexStoreFactory::new(
            config.data_root.clone(),
            index_lock(config),
        )),
    )
}

/// Registers the whole batch under one transaction.
pub fn register_drawings(config: &RegistryConfig, drawings: &[DrawingRequest]) -> BatchOutcome {
    process_drawings_with_transaction(open_transaction(config), drawings)
}
