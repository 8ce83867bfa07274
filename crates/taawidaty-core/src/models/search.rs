//! Search result models.

use serde::{Deserialize, Serialize};

use super::medication::MedicationRecord;

/// Which field of a record produced its relevance score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MatchedField {
    Name,
    ActiveIngredient,
    None,
}

/// A catalog record ranked against a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The matching record
    pub record: MedicationRecord,
    /// Relevance score, higher is better
    pub score: u32,
    /// Field the score came from
    pub matched_field: MatchedField,
}
