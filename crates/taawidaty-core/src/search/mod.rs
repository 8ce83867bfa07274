//! Free-text relevance search over the medication catalog.
//!
//! Pure functions over an immutable record slice; safe to call from any
//! number of threads without locking.

mod scoring;

pub use scoring::*;

use crate::models::{MedicationRecord, SearchHit};

/// Result count used when the caller has no preference.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Rank catalog records against a free-text query.
///
/// Blank queries and a zero `limit` return no hits. Hits are ordered by
/// descending score; equal scores keep catalog order.
pub fn search(query: &str, all_records: &[MedicationRecord], limit: usize) -> Vec<SearchHit> {
    let query = normalize(query);
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, u32, _)> = all_records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            score_record(record, &query).map(|(score, field)| (index, score, field))
        })
        .collect();

    // sort_by is stable, ties stay in catalog order
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let hits: Vec<SearchHit> = scored
        .into_iter()
        .take(limit)
        .map(|(index, score, matched_field)| SearchHit {
            record: all_records[index].clone(),
            score,
            matched_field,
        })
        .collect();

    tracing::debug!(query = %query, hits = hits.len(), "catalog search");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchedField;
    use rust_decimal_macros::dec;

    fn record(name: &str, ingredient: &str) -> MedicationRecord {
        let mut record = MedicationRecord::new(name.into(), dec!(10.00));
        record.active_ingredient = ingredient.into();
        record
    }

    fn catalog() -> Vec<MedicationRecord> {
        vec![
            record("Efferalgan 500mg", "Paracetamol"),
            record("Doliprane 1000mg", "Paracetamol"),
            record("Advil", "Ibuprofene"),
            record("Doliprane 500mg", "Paracetamol"),
            record("Paracetamol Biogaran", "Paracetamol"),
        ]
    }

    #[test]
    fn test_blank_query_is_empty() {
        let records = catalog();
        assert!(search("", &records, 10).is_empty());
        assert!(search("   \t", &records, 10).is_empty());
    }

    #[test]
    fn test_zero_limit_is_empty() {
        assert!(search("dolip", &catalog(), 0).is_empty());
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        let records = catalog();
        let hits = search("  DOLIP ", &records, 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == 100));
    }

    #[test]
    fn test_ranking_and_stable_ties() {
        let records = catalog();
        let hits = search("paracetamol", &records, 10);
        let names: Vec<&str> = hits.iter().map(|h| h.record.name.as_str()).collect();

        // Name prefix first, then ingredient prefixes in catalog order
        assert_eq!(
            names,
            vec![
                "Paracetamol Biogaran",
                "Efferalgan 500mg",
                "Doliprane 1000mg",
                "Doliprane 500mg",
            ]
        );
        assert_eq!(hits[0].matched_field, MatchedField::Name);
        assert_eq!(hits[1].score, 90);
        assert_eq!(hits[1].matched_field, MatchedField::ActiveIngredient);
    }

    #[test]
    fn test_limit_truncates() {
        let records = catalog();
        let hits = search("paracetamol", &records, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.name, "Paracetamol Biogaran");
    }

    #[test]
    fn test_no_match() {
        assert!(search("xyz-nonexistent", &catalog(), 10).is_empty());
    }
}
