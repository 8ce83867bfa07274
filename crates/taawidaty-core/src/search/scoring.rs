//! Tiered relevance scoring.
//!
//! Tiers, highest applicable wins (no summation):
//! - name starts with query: 100
//! - active ingredient starts with query: 90
//! - name contains query: 50
//! - active ingredient contains query: 40

use crate::models::{MatchedField, MedicationRecord};

pub const NAME_PREFIX_SCORE: u32 = 100;
pub const INGREDIENT_PREFIX_SCORE: u32 = 90;
pub const NAME_CONTAINS_SCORE: u32 = 50;
pub const INGREDIENT_CONTAINS_SCORE: u32 = 40;

/// Normalize text for comparison: trimmed and lowercased.
///
/// Accents are compared as-is ("é" does not match "e").
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Score a record against an already normalized, non-empty query.
///
/// Returns `None` when neither field matches.
pub fn score_record(record: &MedicationRecord, query: &str) -> Option<(u32, MatchedField)> {
    let name = record.name.to_lowercase();
    let ingredient = record.active_ingredient.to_lowercase();

    if name.starts_with(query) {
        Some((NAME_PREFIX_SCORE, MatchedField::Name))
    } else if ingredient.starts_with(query) {
        Some((INGREDIENT_PREFIX_SCORE, MatchedField::ActiveIngredient))
    } else if name.contains(query) {
        Some((NAME_CONTAINS_SCORE, MatchedField::Name))
    } else if ingredient.contains(query) {
        Some((INGREDIENT_CONTAINS_SCORE, MatchedField::ActiveIngredient))
    } else {
        None
    }
}
