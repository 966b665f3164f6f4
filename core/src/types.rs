use serde::{Deserialize, Serialize};

use crate::machine_type::{ListInput, MachineType};

/// Whether a company/product refers to an existing record or asks for a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityMode {
    Existing,
    New,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInput {
    #[serde(rename = "type")]
    pub mode: EntityMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(rename = "type")]
    pub mode: EntityMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
}

/// One drawing-registration request as submitted by the admin form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingRequest {
    #[serde(default)]
    pub drawing_number: String,
    #[serde(default)]
    pub title: String,
    pub company: CompanyInput,
    pub product: ProductInput,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub estimated_time: String,
    #[serde(default)]
    pub machine_type: ListInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<ListInput>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "初級")]
    Beginner,
    #[serde(rename = "中級")]
    #[default]
    Intermediate,
    #[serde(rename = "上級")]
    Advanced,
}

impl Difficulty {
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Beginner => "初級",
            Difficulty::Intermediate => "中級",
            Difficulty::Advanced => "上級",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "初級" => Some(Difficulty::Beginner),
            "中級" => Some(Difficulty::Intermediate),
            "上級" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

/// A request after id resolution and normalization; this is what the
/// transaction writes to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDrawing {
    pub drawing_number: String,
    pub title: String,
    pub company_id: String,
    pub company_name: String,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Minutes, as a decimal string.
    pub estimated_time: String,
    pub machine_type: Vec<MachineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ProcessedDrawing {
    pub fn machine_type_labels(&self) -> Vec<String> {
        self.machine_type.iter().map(|m| m.label().to_string()).collect()
    }

    pub fn estimated_minutes(&self) -> u32 {
        self.estimated_time.parse().unwrap_or(crate::normalize::DEFAULT_ESTIMATED_MINUTES)
    }
}
