//! Shapes of `companies.json` and `search-index.json`, and the in-memory
//! upserts the index store applies to them.
//!
//! Fields the registry does not know about are kept in `extra` so a rewrite
//! never drops data written by other tools.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::ProcessedDrawing;

pub const COMPANIES_VERSION: &str = "1.0.0";
pub const SEARCH_INDEX_VERSION: &str = "1.0";

/// Step count recorded for a freshly registered drawing.
pub const INITIAL_STEP_COUNT: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub drawing_count: usize,
    #[serde(default)]
    pub drawings: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: usize,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompaniesMetadata {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompaniesDocument {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub metadata: CompaniesMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompaniesDocument {
    pub fn empty(now: &str) -> Self {
        Self {
            companies: Vec::new(),
            metadata: CompaniesMetadata {
                last_updated: now.to_string(),
                version: COMPANIES_VERSION.to_string(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Adds the company and product if their ids are unknown, then lists the
    /// drawing under the product once. `drawingCount` always ends equal to
    /// `drawings.len()`.
    pub fn upsert_drawing(&mut self, data: &ProcessedDrawing, now: &str) {
        let priority = self.companies.len() + 1;
        let company_idx = match self.companies.iter().position(|c| c.id == data.company_id) {
            Some(i) => i,
            None => {
                tracing::info!(
                    company = %data.company_id,
                    name = %data.company_name,
                    "adding company"
                );
                self.companies.push(Company {
                    id: data.company_id.clone(),
                    name: data.company_name.clone(),
                    short_name: data.company_name.clone(),
                    description: data.company_name.clone(),
                    priority,
                    products: Vec::new(),
                    extra: Map::new(),
                });
                self.companies.len() - 1
            }
        };
        let company = &mut self.companies[company_idx];

        let product_idx = match company.products.iter().position(|p| p.id == data.product_id) {
            Some(i) => i,
            None => {
                tracing::info!(
                    product = %data.product_id,
                    name = %data.product_name,
                    "adding product"
                );
                company.products.push(Product {
                    id: data.product_id.clone(),
                    name: data.product_name.clone(),
                    category: data.category.clone(),
                    description: data.category.clone(),
                    drawing_count: 0,
                    drawings: Vec::new(),
                    extra: Map::new(),
                });
                company.products.len() - 1
            }
        };
        let product = &mut company.products[product_idx];

        if !product.drawings.contains(&data.drawing_number) {
            product.drawings.push(data.drawing_number.clone());
        }
        product.drawing_count = product.drawings.len();

        self.metadata.last_updated = now.to_string();
        if self.metadata.version.is_empty() {
            self.metadata.version = COMPANIES_VERSION.to_string();
        }
    }

    pub fn contains_drawing(&self, drawing_number: &str) -> bool {
        self.companies.iter().any(|c| {
            c.products
                .iter()
                .any(|p| p.drawings.iter().any(|d| d == drawing_number))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexEntry {
    pub drawing_number: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub folder_path: String,
    #[serde(default)]
    pub has_images: bool,
    #[serde(default)]
    pub has_videos: bool,
    #[serde(default)]
    pub has_drawing: bool,
    #[serde(default, deserialize_with = "count_or_text")]
    pub step_count: u32,
    #[serde(default)]
    pub difficulty: String,
    /// Older entries store plain minutes as a number.
    #[serde(default, deserialize_with = "text_or_number")]
    pub estimated_time: String,
    /// Kept as raw strings so historical values survive a rewrite.
    #[serde(default)]
    pub machine_type: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or a number, got {other}"
        ))),
    }
}

fn count_or_text<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("stepCount out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("stepCount is not a number: {s:?}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected a count, got {other}"
        ))),
    }
}

impl SearchIndexEntry {
    pub fn for_drawing(data: &ProcessedDrawing) -> Self {
        let labels = data.machine_type_labels();
        let keywords = if data.keywords.is_empty() {
            let mut kw = vec![
                data.category.clone(),
                data.product_name.clone(),
                data.company_name.clone(),
            ];
            kw.extend(labels);
            kw.push(data.difficulty.label().to_string());
            kw
        } else {
            let mut kw = data.keywords.clone();
            for label in labels {
                if !kw.contains(&label) {
                    kw.push(label);
                }
            }
            kw
        };

        Self {
            drawing_number: data.drawing_number.clone(),
            product_name: data.product_name.clone(),
            company_name: data.company_name.clone(),
            company_id: data.company_id.clone(),
            product_id: data.product_id.clone(),
            title: data.title.clone(),
            category: data.category.clone(),
            keywords,
            folder_path: format!("drawing-{}", data.drawing_number),
            has_images: false,
            has_videos: false,
            has_drawing: false,
            step_count: INITIAL_STEP_COUNT,
            difficulty: data.difficulty.label().to_string(),
            estimated_time: format!("{}分", data.estimated_time),
            machine_type: data.machine_type.iter().map(|m| m.key().to_string()).collect(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexMetadata {
    #[serde(default)]
    pub total_drawings: usize,
    #[serde(default)]
    pub last_indexed: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexDocument {
    #[serde(default)]
    pub drawings: Vec<SearchIndexEntry>,
    #[serde(default)]
    pub metadata: SearchIndexMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SearchIndexDocument {
    pub fn empty(now: &str) -> Self {
        Self {
            drawings: Vec::new(),
            metadata: SearchIndexMetadata {
                total_drawings: 0,
                last_indexed: now.to_string(),
                version: SEARCH_INDEX_VERSION.to_string(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Replaces the entry with the same drawing number, or appends.
    pub fn upsert_entry(&mut self, entry: SearchIndexEntry, now: &str) {
        match self
            .drawings
            .iter_mut()
            .find(|d| d.drawing_number == entry.drawing_number)
        {
            Some(existing) => {
                tracing::info!(drawing = %entry.drawing_number, "replacing search index entry");
                *existing = entry;
            }
            None => {
                tracing::info!(drawing = %entry.drawing_number, "adding search index entry");
                self.drawings.push(entry);
            }
        }
        self.touch(now);
    }

    pub fn entry_mut(&mut self, drawing_number: &str) -> Option<&mut SearchIndexEntry> {
        self.drawings
            .iter_mut()
            .find(|d| d.drawing_number == drawing_number)
    }

    pub fn contains_drawing(&self, drawing_number: &str) -> bool {
        self.drawings.iter().any(|d| d.drawing_number == drawing_number)
    }

    pub fn touch(&mut self, now: &str) {
        self.metadata.total_drawings = self.drawings.len();
        self.metadata.last_indexed = now.to_string();
        self.metadata.version = SEARCH_INDEX_VERSION.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::process_drawing_data;
    use crate::normalize::tests::request;

    const NOW: &str = "2026-01-01T00:00:00.000Z";

    #[test]
    fn upsert_creates_company_product_and_drawing_once() {
        let mut doc = CompaniesDocument::empty(NOW);
        let data = process_drawing_data(&request("TEST-001")).unwrap();
        doc.upsert_drawing(&data, NOW);
        doc.upsert_drawing(&data, NOW);

        assert_eq!(doc.companies.len(), 1);
        let product = &doc.companies[0].products[0];
        assert_eq!(product.drawings, vec!["TEST-001"]);
        assert_eq!(product.drawing_count, 1);
        assert_eq!(doc.companies[0].priority, 1);
    }

    #[test]
    fn drawing_count_is_recomputed_from_list() {
        let mut doc = CompaniesDocument::empty(NOW);
        let first = process_drawing_data(&request("A-1")).unwrap();
        doc.upsert_drawing(&first, NOW);
        // simulate a stale count written by something else
        doc.companies[0].products[0].drawing_count = 7;
        let second = process_drawing_data(&request("A-2")).unwrap();
        doc.upsert_drawing(&second, NOW);
        let product = &doc.companies[0].products[0];
        assert_eq!(product.drawing_count, product.drawings.len());
        assert_eq!(product.drawing_count, 2);
    }

    #[test]
    fn unknown_fields_survive_roundtrip() {
        let raw = r#"{"companies":[{"id":"c","name":"C","logo":"c.png","products":[]}],
                      "metadata":{"lastUpdated":"x","version":"2.0.0"},"note":"keep"}"#;
        let doc: CompaniesDocument = serde_json::from_str(raw).unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["note"], "keep");
        assert_eq!(back["companies"][0]["logo"], "c.png");
        assert_eq!(back["metadata"]["version"], "2.0.0");
    }

    #[test]
    fn search_entry_replaces_same_drawing() {
        let mut doc = SearchIndexDocument::empty(NOW);
        let data = process_drawing_data(&request("TEST-001")).unwrap();
        doc.upsert_entry(SearchIndexEntry::for_drawing(&data), NOW);
        let mut renamed = data.clone();
        renamed.title = "改訂".into();
        doc.upsert_entry(SearchIndexEntry::for_drawing(&renamed), NOW);

        assert_eq!(doc.drawings.len(), 1);
        assert_eq!(doc.drawings[0].title, "改訂");
        assert_eq!(doc.metadata.total_drawings, 1);
        assert_eq!(doc.drawings[0].estimated_time, "60分");
        assert_eq!(doc.drawings[0].machine_type, vec!["turning"]);
    }

    #[test]
    fn documents_without_metadata_still_load() {
        let companies: CompaniesDocument = serde_json::from_str(r#"{"companies": []}"#).unwrap();
        assert_eq!(companies.metadata, CompaniesMetadata::default());
        let index: SearchIndexDocument = serde_json::from_str(r#"{"drawings": []}"#).unwrap();
        assert_eq!(index.metadata.total_drawings, 0);
    }

    #[test]
    fn legacy_entry_field_types_are_accepted() {
        let raw = r#"{"drawingNumber": "OLD-1", "estimatedTime": 120, "stepCount": "5"}"#;
        let entry: SearchIndexEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.estimated_time, "120");
        assert_eq!(entry.step_count, 5);

        let bad = r#"{"drawingNumber": "OLD-2", "stepCount": "many"}"#;
        assert!(serde_json::from_str::<SearchIndexEntry>(bad).is_err());
    }

    #[test]
    fn default_keywords_when_none_given() {
        let mut data = process_drawing_data(&request("TEST-001")).unwrap();
        data.keywords.clear();
        let entry = SearchIndexEntry::for_drawing(&data);
        assert_eq!(
            entry.keywords,
            vec!["テストカテゴリ", "テスト製品", "テスト会社", "ターニング", "中級"]
        );
    }
}
