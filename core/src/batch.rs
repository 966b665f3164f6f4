//! All-or-nothing registration of a batch of drawings.

use serde::Serialize;

use crate::journal::{RollbackFailure, TransactionLogEntry};
use crate::registration::{RegistrationTransaction, RollbackReport};
use crate::types::{DrawingRequest, ProcessedDrawing};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success: bool,
    pub processed: Vec<ProcessedDrawing>,
    pub errors: Vec<String>,
    pub logs: Vec<TransactionLogEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rollback_failures: Vec<RollbackFailure>,
}

impl BatchOutcome {
    fn rolled_back(errors: Vec<String>, report: RollbackReport) -> Self {
        Self {
            success: false,
            processed: Vec::new(),
            errors,
            logs: report.logs,
            rollback_failures: report.failures,
        }
    }
}

/// Every drawing in the batch is registered, or none is left on disk or in
/// the indices.
///
/// A failing drawing does not stop the loop, so the error list covers the
/// whole batch; the rollback then undoes the drawings that did succeed too.
pub fn process_drawings_with_transaction(
    mut tx: RegistrationTransaction,
    drawings: &[DrawingRequest],
) -> BatchOutcome {
    let mut processed = Vec::with_capacity(drawings.len());
    let mut errors = Vec::new();

    for drawing in drawings {
        match tx.process_single_drawing(drawing) {
            Ok(p) => processed.push(p),
            Err(e) => {
                tracing::warn!(drawing = %drawing.drawing_number, error = %e, "drawing failed");
                errors.push(format!("drawing {}: {}", drawing.drawing_number, e));
            }
        }
    }

    if !errors.is_empty() {
        let report = tx.rollback();
        return BatchOutcome::rolled_back(errors, report);
    }

    if let Err(e) = tx.update_json_files(&processed) {
        tracing::warn!(error = %e, "index update failed");
        let report = tx.rollback();
        return BatchOutcome::rolled_back(vec![e.to_string()], report);
    }

    let logs = tx.commit();
    tracing::info!(count = processed.len(), "batch registered");
    BatchOutcome {
        success: true,
        processed,
        errors: Vec::new(),
        logs,
        rollback_failures: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeIndex, FakeLayout, Recorder};
    use crate::journal::LogOperation;
    use crate::normalize::tests::request;
    use crate::storage::IndexStorage;

    fn run(rec: &Recorder, drawings: &[DrawingRequest]) -> BatchOutcome {
        let rec2 = rec.clone();
        let tx = RegistrationTransaction::new(
            Box::new(FakeLayout::new(rec.clone())),
            Box::new(move || Box::new(FakeIndex::new(rec2.clone())) as Box<dyn IndexStorage>),
        );
        process_drawings_with_transaction(tx, drawings)
    }

    #[test]
    fn success_commits_and_returns_processed() {
        let rec = Recorder::default();
        let out = run(&rec, &[request("A-1"), request("A-2")]);

        assert!(out.success);
        assert_eq!(out.processed.len(), 2);
        assert!(out.errors.is_empty());
        assert_eq!(
            rec.calls_matching("index."),
            vec![
                "index.open",
                "index.companies A-1",
                "index.search A-1",
                "index.companies A-2",
                "index.search A-2",
                "index.commit"
            ]
        );
    }

    #[test]
    fn one_bad_drawing_rolls_back_the_whole_batch() {
        let rec = Recorder::default();
        let out = run(&rec, &[request("A-1"), request("A-2"), request("")]);

        assert!(!out.success);
        assert!(out.processed.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].starts_with("drawing : validation failed"), "{}", out.errors[0]);
        assert_eq!(rec.count("index.companies"), 0);
        assert_eq!(rec.count("layout.rollback"), 1);
        // both good drawings were built and then compensated
        let compensations = out
            .logs
            .iter()
            .filter(|l| l.operation == LogOperation::RollbackDeleteFile)
            .count();
        assert_eq!(compensations, 4);
    }

    #[test]
    fn loop_continues_past_failures() {
        let rec = Recorder::default();
        rec.fail_structure_for("A-1");
        let out = run(&rec, &[request("A-1"), request("A-2"), request("bad/x")]);

        assert_eq!(out.errors.len(), 2);
        assert_eq!(rec.count("layout.structure A-2"), 1);
    }

    #[test]
    fn index_failure_is_reported_once_and_rolled_back() {
        let rec = Recorder::default();
        rec.fail_search_index();
        let out = run(&rec, &[request("A-1"), request("A-2")]);

        assert!(!out.success);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].contains("search-index.json"));
        assert_eq!(rec.count("index.rollback"), 1);
        assert_eq!(rec.count("index.commit"), 0);
    }
}
