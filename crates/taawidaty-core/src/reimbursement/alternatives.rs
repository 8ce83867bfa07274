//! Generic substitutes for a selected medication.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{InsuranceScheme, MedicationRecord, ReimbursementRule};

/// A generic product that could replace the selected medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenericAlternative {
    pub record: MedicationRecord,
    /// Coverage under the requested scheme, `None` when not covered
    pub rule: Option<ReimbursementRule>,
}

impl GenericAlternative {
    /// What the patient ends up paying for this product.
    pub fn out_of_pocket(&self) -> Decimal {
        self.rule
            .as_ref()
            .map(|r| r.patient_pays)
            .unwrap_or(self.record.public_price)
    }
}

/// Find generics sharing the record's active ingredient, cheapest first.
///
/// The record itself is never returned. Records with an empty active
/// ingredient have no alternatives.
pub fn generic_alternatives(
    record: &MedicationRecord,
    all_records: &[MedicationRecord],
    scheme: InsuranceScheme,
) -> Vec<GenericAlternative> {
    let mut alternatives: Vec<GenericAlternative> = all_records
        .iter()
        .filter(|candidate| candidate.is_generic())
        .filter(|candidate| *candidate != record)
        .filter(|candidate| record.shares_ingredient_with(candidate))
        .map(|candidate| GenericAlternative {
            record: candidate.clone(),
            rule: candidate.coverage(scheme).cloned(),
        })
        .collect();

    // Stable: equal costs keep catalog order
    alternatives.sort_by_key(|a| a.out_of_pocket());
    alternatives
}
