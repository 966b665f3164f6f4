//! Machine-type vocabulary.
//!
//! Stored documents always carry the English keys; the Japanese labels are
//! what operators type and what ends up in search keywords.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    Machining,
    Turning,
    Yokonaka,
    Radial,
    Other,
}

impl MachineType {
    pub const ALL: [MachineType; 5] = [
        MachineType::Machining,
        MachineType::Turning,
        MachineType::Yokonaka,
        MachineType::Radial,
        MachineType::Other,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MachineType::Machining => "machining",
            MachineType::Turning => "turning",
            MachineType::Yokonaka => "yokonaka",
            MachineType::Radial => "radial",
            MachineType::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MachineType::Machining => "マシニング",
            MachineType::Turning => "ターニング",
            MachineType::Yokonaka => "横中",
            MachineType::Radial => "ラジアル",
            MachineType::Other => "その他",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    fn from_alias(alias: &str) -> Option<Self> {
        let m = match alias {
            "マシニング" | "マシニングセンタ" => MachineType::Machining,
            "ターニング" | "ターニングセンタ" => MachineType::Turning,
            "横中" | "横中ぐり盤" => MachineType::Yokonaka,
            "ラジアル" | "ラジアルボール盤" => MachineType::Radial,
            "フライス" | "フライス盤" | "その他" => MachineType::Other,
            _ => return None,
        };
        Some(m)
    }

    /// Maps one raw value to a key. Unknown values fall back to `Other`.
    pub fn parse_lenient(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return MachineType::Other;
        }
        let lower = trimmed.to_lowercase();
        let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();

        Self::from_key(trimmed)
            .or_else(|| Self::from_key(&lower))
            .or_else(|| Self::from_alias(trimmed))
            .or_else(|| Self::from_alias(&lower))
            .or_else(|| Self::from_alias(&compact))
            .unwrap_or(MachineType::Other)
    }
}

/// Either a single (possibly comma-separated) string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListInput {
    One(String),
    Many(Vec<String>),
}

impl Default for ListInput {
    fn default() -> Self {
        ListInput::Many(Vec::new())
    }
}

impl ListInput {
    /// Splits a single string on commas; list items are taken as they are.
    /// Blank items are dropped in both forms.
    pub fn items(&self) -> Vec<String> {
        match self {
            ListInput::One(s) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            ListInput::Many(v) => v
                .iter()
                .filter(|s| !s.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

impl From<&str> for ListInput {
    fn from(s: &str) -> Self {
        ListInput::One(s.to_string())
    }
}

impl From<Vec<&str>> for ListInput {
    fn from(v: Vec<&str>) -> Self {
        ListInput::Many(v.into_iter().map(str::to_string).collect())
    }
}

/// Canonical machine-type set in first-seen order.
pub fn normalize_machine_types(input: &ListInput) -> Vec<MachineType> {
    let mut out: Vec<MachineType> = Vec::new();
    for raw in input.items() {
        let m = MachineType::parse_lenient(&raw);
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_aliases_and_unknowns() {
        assert_eq!(MachineType::parse_lenient("turning"), MachineType::Turning);
        assert_eq!(MachineType::parse_lenient(" RADIAL "), MachineType::Radial);
        assert_eq!(MachineType::parse_lenient("マシニングセンタ"), MachineType::Machining);
        assert_eq!(MachineType::parse_lenient("横中 ぐり盤"), MachineType::Yokonaka);
        assert_eq!(MachineType::parse_lenient("lathe"), MachineType::Other);
    }

    #[test]
    fn comma_string_and_array_normalize_alike() {
        let from_str = normalize_machine_types(&"turning, ラジアル,turning".into());
        let from_vec = normalize_machine_types(&vec!["turning", "ラジアル"].into());
        assert_eq!(from_str, vec![MachineType::Turning, MachineType::Radial]);
        assert_eq!(from_str, from_vec);
    }

    #[test]
    fn blank_input_yields_empty_set() {
        assert!(normalize_machine_types(&" , ".into()).is_empty());
        assert!(normalize_machine_types(&ListInput::default()).is_empty());
    }

    #[test]
    fn deserializes_both_shapes() {
        let one: ListInput = serde_json::from_str("\"machining,other\"").unwrap();
        let many: ListInput = serde_json::from_str("[\"machining\"]").unwrap();
        assert_eq!(one.items(), vec!["machining", "other"]);
        assert_eq!(many.items(), vec!["machining"]);
    }
}
