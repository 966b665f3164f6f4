//! Single-writer leases on index files, shared by every transaction in the
//! process. A lease is taken before the first backup of a file and held until
//! the owning transaction commits or rolls back, so a rollback can never
//! overwrite another transaction's update.
//!
//! This does not coordinate separate processes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};

use wi_core::{IndexLock, LockLease};

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

#[derive(Clone, Default)]
pub struct PathLocks {
    table: Arc<LockTable>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<PathLocks> = OnceLock::new();
        GLOBAL.get_or_init(PathLocks::new).clone()
    }

    pub fn is_held(&self, path: &Path) -> bool {
        let held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.contains(&lock_key(path))
    }
}

/// Same file, same key, however the caller spelled the path.
fn lock_key(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

struct PathLease {
    table: Arc<LockTable>,
    key: PathBuf,
}

impl LockLease for PathLease {}

impl Drop for PathLease {
    fn drop(&mut self) {
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
        drop(held);
        self.table.released.notify_all();
        tracing::debug!(path = %self.key.display(), "index lease released");
    }
}

impl IndexLock for PathLocks {
    fn acquire(&self, path: &Path) -> Box<dyn LockLease> {
        let key = lock_key(path);
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&key) {
            tracing::debug!(path = %key.display(), "waiting for index lease");
            held = self
                .table
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());
        tracing::debug!(path = %key.display(), "index lease acquired");
        Box::new(PathLease {
            table: Arc::clone(&self.table),
            key,
        })
    }
}
