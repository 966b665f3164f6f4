//! Read-only checks over a data root: duplicate detection before a batch, and
//! a post-hoc consistency report for registered drawings.

use std::path::Path;

use serde::Serialize;

use wi_core::documents::{CompaniesDocument, SearchIndexDocument};
use wi_core::Result;

use crate::json_storage::load_document;
use crate::paths::{
    companies_path, drawing_dir, instruction_path, search_index_path, REQUIRED_SUBFOLDERS,
};

/// Drawing numbers whose directory is already on disk.
pub fn existing_drawings<S: AsRef<str>>(root: &Path, drawing_numbers: &[S]) -> Vec<String> {
    drawing_numbers
        .iter()
        .map(AsRef::as_ref)
        .filter(|n| drawing_dir(root, n).exists())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub drawing_number: String,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Fails only when an index document exists but cannot be parsed.
pub fn verify_integrity(root: &Path, drawing_number: &str) -> Result<IntegrityReport> {
    let mut issues = Vec::new();

    let dir = drawing_dir(root, drawing_number);
    if !dir.is_dir() {
        issues.push(format!("drawing directory missing: {}", dir.display()));
    } else {
        if !instruction_path(root, drawing_number).is_file() {
            issues.push("instruction.json missing".to_string());
        }
        for sub in REQUIRED_SUBFOLDERS {
            if !dir.join(sub).is_dir() {
                issues.push(format!("subfolder missing: {sub}"));
            }
        }
    }

    let companies: Option<CompaniesDocument> = load_document(&companies_path(root))?;
    if !companies.is_some_and(|doc| doc.contains_drawing(drawing_number)) {
        issues.push("not listed in companies.json".to_string());
    }

    let index: Option<SearchIndexDocument> = load_document(&search_index_path(root))?;
    if !index.is_some_and(|doc| doc.contains_drawing(drawing_number)) {
        issues.push("not listed in search-index.json".to_string());
    }

    if !issues.is_empty() {
        tracing::warn!(drawing = %drawing_number, issues = issues.len(), "integrity check failed");
    }
    Ok(IntegrityReport {
        drawing_number: drawing_number.to_string(),
        is_valid: issues.is_empty(),
        issues,
    })
}
