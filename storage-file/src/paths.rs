//! On-disk layout of the registry data root.

use std::path::{Path, PathBuf};

use chrono::Utc;

pub const COMPANIES_FILE: &str = "companies.json";
pub const SEARCH_INDEX_FILE: &str = "search-index.json";
pub const WORK_INSTRUCTIONS_DIR: &str = "work-instructions";

/// Created under every drawing directory, in this order.
pub const DRAWING_SUBFOLDERS: [&str; 6] = [
    "images",
    "videos",
    "pdfs",
    "programs",
    "contributions/files/images",
    "contributions/files/videos",
];

/// Must exist for a drawing to count as intact.
pub const REQUIRED_SUBFOLDERS: [&str; 4] = ["images", "videos", "pdfs", "programs"];

pub fn companies_path(root: &Path) -> PathBuf {
    root.join(COMPANIES_FILE)
}

pub fn search_index_path(root: &Path) -> PathBuf {
    root.join(SEARCH_INDEX_FILE)
}

pub fn drawing_dir(root: &Path, drawing_number: &str) -> PathBuf {
    root.join(WORK_INSTRUCTIONS_DIR)
        .join(format!("drawing-{drawing_number}"))
}

pub fn instruction_path(root: &Path, drawing_number: &str) -> PathBuf {
    drawing_dir(root, drawing_number).join(wi_core::instruction::INSTRUCTION_FILE)
}

/// `<path>.backup.<epoch ms>`, bumped past any name already taken so two
/// backups of one file within the same millisecond stay distinct.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut stamp = Utc::now().timestamp_millis();
    loop {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".backup.{stamp}"));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        stamp += 1;
    }
}

/// Sibling temp file used for replace-by-rename writes.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
