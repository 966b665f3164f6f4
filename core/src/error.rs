use std::path::PathBuf;

use thiserror::Error;

/// Filesystem action that failed, carried by [`RegistryError::Fs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsAction {
    CreateDir,
    WriteFile,
    ReadFile,
    CopyFile,
    RemoveFile,
    RemoveDir,
}

impl std::fmt::Display for FsAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FsAction::CreateDir => "create directory",
            FsAction::WriteFile => "write file",
            FsAction::ReadFile => "read file",
            FsAction::CopyFile => "copy file",
            FsAction::RemoveFile => "remove file",
            FsAction::RemoveDir => "remove directory",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Rejected input. Raised before anything touches the disk.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("failed to {action} {}: {source}", path.display())]
    Fs {
        action: FsAction,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("no search index entry for drawing {0}")]
    MissingIndexEntry(String),

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("index store has not been initialized for this transaction")]
    IndexNotInitialized,
}

impl RegistryError {
    pub fn fs(action: FsAction, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Fs {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        RegistryError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RegistryError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
