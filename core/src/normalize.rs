use crate::error::{RegistryError, Result};
use crate::ids::{resolve_company_id, resolve_product_id};
use crate::machine_type::normalize_machine_types;
use crate::types::{Difficulty, DrawingRequest, ProcessedDrawing};

pub const DRAWING_NUMBER_MAX: usize = 100;
pub const DEFAULT_ESTIMATED_MINUTES: u32 = 180;

pub fn check_drawing_number(number: &str) -> Result<()> {
    if number.is_empty() {
        return Err(RegistryError::validation("drawing number is required"));
    }
    if number.chars().count() > DRAWING_NUMBER_MAX {
        return Err(RegistryError::validation(format!(
            "drawing number exceeds {DRAWING_NUMBER_MAX} characters"
        )));
    }
    if !number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RegistryError::validation(format!(
            "drawing number {number:?} may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// Positive whole minutes. Blank input means the default.
pub fn parse_estimated_minutes(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_ESTIMATED_MINUTES);
    }
    match trimmed.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RegistryError::validation(format!(
            "estimated time {raw:?} is not a positive number of minutes"
        ))),
    }
}

pub fn parse_difficulty(raw: &str) -> Result<Difficulty> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Difficulty::default());
    }
    Difficulty::from_label(trimmed).ok_or_else(|| {
        RegistryError::validation(format!(
            "difficulty {raw:?} must be one of 初級, 中級, 上級"
        ))
    })
}

/// Pure transform from request to [`ProcessedDrawing`]: resolves ids,
/// canonicalizes machine types and folds their labels into the keywords.
pub fn process_drawing_data(input: &DrawingRequest) -> Result<ProcessedDrawing> {
    check_drawing_number(&input.drawing_number)?;

    let machine_type = normalize_machine_types(&input.machine_type);
    if machine_type.is_empty() {
        return Err(RegistryError::validation("no machine type selected"));
    }
    let minutes = parse_estimated_minutes(&input.estimated_time)?;
    let difficulty = parse_difficulty(&input.difficulty)?;

    let company_id = resolve_company_id(&input.company);
    let product_id = resolve_product_id(&input.product);

    let mut keywords: Vec<String> = Vec::new();
    let given = input.keywords.as_ref().map(|k| k.items()).unwrap_or_default();
    for kw in given
        .into_iter()
        .chain(machine_type.iter().map(|m| m.label().to_string()))
    {
        if !keywords.contains(&kw) {
            keywords.push(kw);
        }
    }

    Ok(ProcessedDrawing {
        drawing_number: input.drawing_number.clone(),
        title: input.title.clone(),
        company_id,
        company_name: input.company.name.clone(),
        product_id,
        product_name: input.product.name.clone(),
        category: input.product.category.clone(),
        difficulty,
        estimated_time: minutes.to_string(),
        machine_type,
        description: input.description.clone(),
        warnings: input.warnings.clone().unwrap_or_default(),
        keywords,
    })
}
