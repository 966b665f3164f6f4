//! Request checks run by the caller before a batch reaches the transaction.

use std::collections::HashSet;

use crate::machine_type::normalize_machine_types;
use crate::normalize::{check_drawing_number, parse_difficulty, parse_estimated_minutes};
use crate::types::DrawingRequest;

/// Every problem with one request; empty when the request is acceptable.
pub fn validate_request(req: &DrawingRequest) -> Vec<String> {
    let mut errors = Vec::new();

    if let Err(e) = check_drawing_number(&req.drawing_number) {
        errors.push(detail(e));
    }
    if req.title.trim().is_empty() {
        errors.push("title is required".to_string());
    }
    if req.company.name.trim().is_empty() {
        errors.push("company name is required".to_string());
    }
    if req.product.name.trim().is_empty() {
        errors.push("product name is required".to_string());
    }
    if req.product.category.trim().is_empty() {
        errors.push("product category is required".to_string());
    }
    if normalize_machine_types(&req.machine_type).is_empty() {
        errors.push("machine type is required".to_string());
    }
    if let Err(e) = parse_estimated_minutes(&req.estimated_time) {
        errors.push(detail(e));
    }
    if let Err(e) = parse_difficulty(&req.difficulty) {
        errors.push(detail(e));
    }

    errors
}

/// Per-request problems prefixed with their 1-based position, plus drawing
/// numbers repeated within the batch.
pub fn validate_batch(reqs: &[DrawingRequest]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    if reqs.is_empty() {
        errors.push("no drawings supplied".to_string());
    }

    for (i, req) in reqs.iter().enumerate() {
        let problems = validate_request(req);
        if !problems.is_empty() {
            errors.push(format!("drawing {}: {}", i + 1, problems.join(", ")));
        }
        if !req.drawing_number.is_empty() && !seen.insert(req.drawing_number.as_str()) {
            errors.push(format!(
                "drawing number {} appears more than once",
                req.drawing_number
            ));
        }
    }

    errors
}

fn detail(e: crate::error::RegistryError) -> String {
    match e {
        crate::error::RegistryError::Validation(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::tests::request;

    #[test]
    fn accepts_a_complete_request() {
        assert!(validate_request(&request("A-1")).is_empty());
    }

    #[test]
    fn collects_every_problem() {
        let mut req = request("bad number");
        req.title = " ".into();
        req.difficulty = "expert".into();
        let errors = validate_request(&req);
        assert_eq!(errors.len(), 3, "{errors:?}");
    }

    #[test]
    fn flags_duplicates_within_batch() {
        let errors = validate_batch(&[request("A-1"), request("A-2"), request("A-1")]);
        assert_eq!(errors, vec!["drawing number A-1 appears more than once"]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(validate_batch(&[]), vec!["no drawings supplied"]);
    }
}
