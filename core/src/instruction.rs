//! The per-drawing `instruction.json` document as created at registration.
//!
//! Procedure sections start empty; a separate editor fills them in later, so
//! they are carried as raw JSON values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ProcessedDrawing;

pub const INSTRUCTION_FILE: &str = "instruction.json";
const AUTHOR: &str = "管理画面";
const MAX_PREPARATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionMetadata {
    pub drawing_number: String,
    pub title: String,
    pub company_id: String,
    pub product_id: String,
    pub created_date: String,
    pub updated_date: String,
    pub author: String,
    pub estimated_time: String,
    pub machine_type: Vec<String>,
    pub difficulty: String,
    #[serde(default)]
    pub tools_required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionOverview {
    pub description: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub preparation_time: String,
    pub processing_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub date: String,
    pub author: String,
    pub changes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionDocument {
    pub metadata: InstructionMetadata,
    pub overview: InstructionOverview,
    #[serde(default)]
    pub work_steps: Vec<Value>,
    #[serde(default)]
    pub related_drawings: Vec<Value>,
    #[serde(default)]
    pub troubleshooting: Vec<Value>,
    #[serde(default)]
    pub revision_history: Vec<Revision>,
}

/// Splits the total into preparation (`min(30, floor(total * 0.2))`) and the rest.
pub fn split_minutes(total: u32) -> (u32, u32) {
    let prep = (total / 5).min(MAX_PREPARATION_MINUTES);
    (prep, total - prep)
}

pub fn generate_basic_instruction(
    data: &ProcessedDrawing,
    today: NaiveDate,
) -> InstructionDocument {
    let date = today.format("%Y-%m-%d").to_string();
    let (prep, processing) = split_minutes(data.estimated_minutes());
    let description = data
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}の加工を行います", data.title));

    InstructionDocument {
        metadata: InstructionMetadata {
            drawing_number: data.drawing_number.clone(),
            title: data.title.clone(),
            company_id: data.company_id.clone(),
            product_id: data.product_id.clone(),
            created_date: date.clone(),
            updated_date: date.clone(),
            author: AUTHOR.to_string(),
            estimated_time: format!("{}分", data.estimated_time),
            machine_type: data.machine_type.iter().map(|m| m.key().to_string()).collect(),
            difficulty: data.difficulty.label().to_string(),
            tools_required: Vec::new(),
        },
        overview: InstructionOverview {
            description,
            warnings: data.warnings.clone(),
            preparation_time: format!("{prep}分"),
            processing_time: format!("{processing}分"),
        },
        work_steps: Vec::new(),
        related_drawings: Vec::new(),
        troubleshooting: Vec::new(),
        revision_history: vec![Revision {
            date,
            author: AUTHOR.to_string(),
            changes: "新規作成".to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::process_drawing_data;
    use crate::normalize::tests::request;

    #[test]
    fn preparation_is_a_fifth_capped_at_thirty() {
        assert_eq!(split_minutes(60), (12, 48));
        assert_eq!(split_minutes(180), (30, 150));
        assert_eq!(split_minutes(4), (0, 4));
        assert_eq!(split_minutes(149), (29, 120));
    }

    #[test]
    fn builds_document_with_empty_procedure() {
        let data = process_drawing_data(&request("TEST-001")).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let doc = generate_basic_instruction(&data, today);

        assert_eq!(doc.metadata.drawing_number, "TEST-001");
        assert_eq!(doc.metadata.created_date, "2026-10-16");
        assert_eq!(doc.metadata.estimated_time, "60分");
        assert_eq!(doc.overview.preparation_time, "12分");
        assert_eq!(doc.overview.processing_time, "48分");
        assert!(doc.work_steps.is_empty());
        assert_eq!(doc.revision_history.len(), 1);
    }

    #[test]
    fn default_description_uses_title() {
        let mut data = process_drawing_data(&request("TEST-001")).unwrap();
        data.description = None;
        let doc = generate_basic_instruction(&data, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(doc.overview.description, "テスト部品の加工を行います");
    }
}
