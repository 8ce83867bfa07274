//! Medication catalog models.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// National insurance scheme a reimbursement is computed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InsuranceScheme {
    SchemeA,
    SchemeB,
}

impl InsuranceScheme {
    /// Every supported scheme, in display order.
    pub const ALL: [InsuranceScheme; 2] = [InsuranceScheme::SchemeA, InsuranceScheme::SchemeB];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsuranceScheme::SchemeA => "SchemeA",
            InsuranceScheme::SchemeB => "SchemeB",
        }
    }

    /// Parse a scheme name as stored in catalog sources.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for InsuranceScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a product is the originator brand or a generic copy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MedicationKind {
    Brand,
    Generic,
}

impl MedicationKind {
    /// Parse the free-text product type found in catalog sources.
    ///
    /// Accepts English and French spellings, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "brand" | "princeps" | "original" | "originator" => Some(MedicationKind::Brand),
            "generic" | "générique" | "generique" => Some(MedicationKind::Generic),
            _ => None,
        }
    }
}

/// Reimbursement terms of one scheme for one medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementRule {
    /// Percentage of the price covered (0 - 100)
    pub rate: u8,
    /// Amount paid back by the scheme
    pub reimbursed_amount: Decimal,
    /// Amount left for the patient
    pub patient_pays: Decimal,
}

impl ReimbursementRule {
    /// A zero rate means the scheme knows the product but does not reimburse it.
    pub fn is_reimbursable(&self) -> bool {
        self.rate > 0
    }
}

/// A single entry of the medication catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    /// Commercial name, never empty
    pub name: String,
    /// DCI / INN of the active substance, may be empty
    pub active_ingredient: String,
    /// Strength (e.g., "1000mg")
    pub dosage: String,
    /// Galenic form (e.g., "Comprimé")
    pub form: String,
    /// Box contents (e.g., "Boîte de 8")
    pub packaging: String,
    /// Public selling price in MAD
    pub public_price: Decimal,
    /// Reference price used by the schemes
    pub reference_price: Decimal,
    pub kind: MedicationKind,
    /// Per-scheme reimbursement, absent when the scheme has no data
    pub scheme_coverage: BTreeMap<InsuranceScheme, ReimbursementRule>,
}

impl MedicationRecord {
    /// Create a record with required fields and no coverage.
    pub fn new(name: String, public_price: Decimal) -> Self {
        Self {
            name,
            active_ingredient: String::new(),
            dosage: String::new(),
            form: String::new(),
            packaging: String::new(),
            public_price,
            reference_price: public_price,
            kind: MedicationKind::Brand,
            scheme_coverage: BTreeMap::new(),
        }
    }

    /// Coverage entry for a scheme, if the catalog has one.
    pub fn coverage(&self, scheme: InsuranceScheme) -> Option<&ReimbursementRule> {
        self.scheme_coverage.get(&scheme)
    }

    pub fn is_generic(&self) -> bool {
        self.kind == MedicationKind::Generic
    }

    /// Check whether two records carry the same active substance.
    pub fn shares_ingredient_with(&self, other: &MedicationRecord) -> bool {
        let mine = self.active_ingredient.trim();
        if mine.is_empty() {
            return false;
        }
        mine.to_lowercase() == other.active_ingredient.trim().to_lowercase()
    }
}
