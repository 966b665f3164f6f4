//! Company and product id resolution.
//!
//! Caller-supplied ids are trusted verbatim. No lookup against existing ids
//! happens here: an id that matches an existing company is treated as that
//! company by the index store.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::types::{CompanyInput, EntityMode, ProductInput};

const COMPANY_SLUG_MAX: usize = 30;
const PRODUCT_NAME_MAX: usize = 10;

pub fn resolve_company_id(input: &CompanyInput) -> String {
    if let Some(id) = supplied(&input.id) {
        return id;
    }
    tracing::warn!(company = %input.name, "company id not supplied, deriving one from the name");
    company_slug(&input.name)
}

pub fn resolve_product_id(input: &ProductInput) -> String {
    if input.mode == EntityMode::Existing {
        if let Some(id) = supplied(&input.id) {
            return id;
        }
    }
    generate_product_id(&input.name)
}

fn supplied(id: &Option<String>) -> Option<String> {
    id.as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Lowercase, non-alphanumerics to `-`, runs collapsed, edges trimmed, cut to 30.
///
/// Names with no ASCII alphanumerics at all (e.g. pure kanji) would slug to
/// nothing, so those get a time-based id instead.
pub fn company_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_matches('-').chars().take(COMPANY_SLUG_MAX).collect();
    if slug.is_empty() {
        format!("company-{}", Utc::now().timestamp_millis())
    } else {
        slug
    }
}

/// `product-<name>-<epoch ms>-<4 random chars>`; unique in practice without a lookup.
pub fn generate_product_id(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || is_japanese(*c))
        .take(PRODUCT_NAME_MAX)
        .collect();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!(
        "product-{}-{}-{}",
        sanitized,
        Utc::now().timestamp_millis(),
        suffix
    )
}

fn is_japanese(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}' | '\u{4E00}'..='\u{9FAF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(mode: EntityMode, id: Option<&str>, name: &str) -> CompanyInput {
        CompanyInput {
            mode,
            id: id.map(str::to_string),
            name: name.to_string(),
        }
    }

    #[test]
    fn supplied_company_id_is_used_verbatim() {
        assert_eq!(
            resolve_company_id(&company(EntityMode::New, Some("Acme_01"), "whatever")),
            "Acme_01"
        );
        assert_eq!(
            resolve_company_id(&company(EntityMode::Existing, Some("acme"), "")),
            "acme"
        );
        assert_eq!(
            resolve_company_id(&company(EntityMode::New, Some(" Acme "), "whatever")),
            " Acme "
        );
    }

    #[test]
    fn blank_company_id_falls_back_to_slug() {
        assert_eq!(
            resolve_company_id(&company(EntityMode::New, Some("   "), "Acme Tooling")),
            "acme-tooling"
        );
    }

    #[test]
    fn slug_collapses_and_trims() {
        assert_eq!(company_slug("  Acme -- Tooling, Inc. "), "acme-tooling-inc");
        assert_eq!(company_slug("ABC株式会社"), "abc");
    }

    #[test]
    fn slug_is_truncated_to_thirty_chars() {
        let slug = company_slug(&"a".repeat(50));
        assert_eq!(slug.len(), 30);
    }

    #[test]
    fn slug_never_empty() {
        let slug = company_slug("株式会社");
        assert!(slug.starts_with("company-"));
    }

    #[test]
    fn new_product_ids_are_generated_even_when_supplied() {
        let input = ProductInput {
            mode: EntityMode::New,
            id: Some("fixed".into()),
            name: "ギア Box".into(),
            category: "gear".into(),
        };
        let a = resolve_product_id(&input);
        let b = resolve_product_id(&input);
        assert!(a.starts_with("product-ギアBox-"));
        assert_ne!(a, b);
    }

    #[test]
    fn existing_product_id_passes_through() {
        let input = ProductInput {
            mode: EntityMode::Existing,
            id: Some("p-1".into()),
            name: "x".into(),
            category: "c".into(),
        };
        assert_eq!(resolve_product_id(&input), "p-1");

        let padded = ProductInput {
            id: Some(" p-2\t".into()),
            ..input
        };
        assert_eq!(resolve_product_id(&padded), " p-2\t");
    }
}
