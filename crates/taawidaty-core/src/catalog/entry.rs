//! Raw catalog entries as supplied by a source, and their validation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{SourceError, SourceResult};
use crate::models::{InsuranceScheme, MedicationKind, MedicationRecord, ReimbursementRule};
use crate::reimbursement::{compute_rule, MAX_RATE};

/// Largest gap tolerated between stored amounts and the public price.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// A medication as it appears in a catalog source, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationEntry {
    pub name: String,
    #[serde(default)]
    pub active_ingredient: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub packaging: String,
    pub public_price: Decimal,
    /// Falls back to the public price when absent
    #[serde(default)]
    pub reference_price: Option<Decimal>,
    /// Free-text product type; "Brand" when absent
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub scheme_coverage: BTreeMap<InsuranceScheme, CoverageEntry>,
}

/// Raw coverage of one scheme. Both amounts may be omitted and are then
/// computed from the rate; supplying only one of them is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoverageEntry {
    pub rate: i64,
    #[serde(default)]
    pub reimbursed_amount: Option<Decimal>,
    #[serde(default)]
    pub patient_pays: Option<Decimal>,
}

impl MedicationEntry {
    /// Validate this entry into a catalog record.
    ///
    /// `index` is the entry position in its source, used in error reports.
    pub fn into_record(self, index: usize) -> SourceResult<MedicationRecord> {
        let invalid = |reason: String| SourceError::InvalidRecord { index, reason };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("empty name".into()));
        }
        if is_negative(self.public_price) {
            return Err(invalid(format!("negative public price {}", self.public_price)));
        }
        let reference_price = self.reference_price.unwrap_or(self.public_price);
        if is_negative(reference_price) {
            return Err(invalid(format!("negative reference price {}", reference_price)));
        }

        let kind = match self.kind.as_deref() {
            None => MedicationKind::Brand,
            Some(raw) => MedicationKind::parse(raw)
                .ok_or_else(|| invalid(format!("unknown medication type '{}'", raw)))?,
        };

        let mut scheme_coverage = BTreeMap::new();
        for (scheme, coverage) in self.scheme_coverage {
            let rule = coverage
                .into_rule(self.public_price)
                .map_err(|reason| invalid(format!("{}: {}", scheme, reason)))?;
            scheme_coverage.insert(scheme, rule);
        }

        Ok(MedicationRecord {
            name,
            active_ingredient: self.active_ingredient.trim().to_string(),
            dosage: self.dosage,
            form: self.form,
            packaging: self.packaging,
            public_price: self.public_price,
            reference_price,
            kind,
            scheme_coverage,
        })
    }
}

impl CoverageEntry {
    fn into_rule(self, public_price: Decimal) -> Result<ReimbursementRule, String> {
        let rate = u8::try_from(self.rate)
            .ok()
            .filter(|rate| *rate <= MAX_RATE)
            .ok_or_else(|| format!("rate {} outside 0-100", self.rate))?;

        let (reimbursed_amount, patient_pays) = match (self.reimbursed_amount, self.patient_pays) {
            (Some(reimbursed), Some(patient)) => (reimbursed, patient),
            (None, None) => {
                return compute_rule(public_price, rate).map_err(|err| err.to_string());
            }
            (Some(_), None) => return Err("reimbursed amount without patient share".into()),
            (None, Some(_)) => return Err("patient share without reimbursed amount".into()),
        };

        if is_negative(reimbursed_amount) || is_negative(patient_pays) {
            return Err("negative amount".into());
        }
        if rate == 0 && !reimbursed_amount.is_zero() {
            return Err("zero rate with a reimbursed amount".into());
        }
        let total = reimbursed_amount
            .checked_add(patient_pays)
            .and_then(|total| total.checked_sub(public_price))
            .ok_or_else(|| format!("amounts {} + {} overflow", reimbursed_amount, patient_pays))?;
        if total.abs() > AMOUNT_TOLERANCE {
            return Err(format!(
                "amounts {} + {} do not add up to {}",
                reimbursed_amount, patient_pays, public_price
            ));
        }

        Ok(ReimbursementRule {
            rate,
            reimbursed_amount,
            patient_pays,
        })
    }
}

fn is_negative(amount: Decimal) -> bool {
    amount.is_sign_negative() && !amount.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(json: &str) -> MedicationEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_entry_computes_amounts() {
        let record = entry(
            r#"{"name": "Doliprane 1000mg", "activeIngredient": "Paracetamol",
                "publicPrice": 15.0, "schemeCoverage": {"SchemeA": {"rate": 70}}}"#,
        )
        .into_record(0)
        .unwrap();

        assert_eq!(record.kind, MedicationKind::Brand);
        assert_eq!(record.reference_price, dec!(15));
        let rule = record.coverage(InsuranceScheme::SchemeA).unwrap();
        assert_eq!(rule.reimbursed_amount, dec!(10.50));
        assert_eq!(rule.patient_pays, dec!(4.50));
        assert!(record.coverage(InsuranceScheme::SchemeB).is_none());
    }

    #[test]
    fn test_type_alias_and_stored_amounts() {
        let record = entry(
            r#"{"name": "Amoxiclav", "type": "Générique", "publicPrice": "60.00",
                "schemeCoverage": {"SchemeB": {"rate": 80, "reimbursedAmount": 48.00, "patientPays": 12.00}}}"#,
        )
        .into_record(3)
        .unwrap();

        assert_eq!(record.kind, MedicationKind::Generic);
        let rule = record.coverage(InsuranceScheme::SchemeB).unwrap();
        assert_eq!(rule.rate, 80);
        assert_eq!(rule.patient_pays, dec!(12.00));
    }

    #[test]
    fn test_rejects_empty_name() {
        let result = entry(r#"{"name": "  ", "publicPrice": 1}"#).into_record(7);
        assert!(matches!(result, Err(SourceError::InvalidRecord { index: 7, .. })));
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        let result = entry(
            r#"{"name": "X", "publicPrice": 1, "schemeCoverage": {"SchemeA": {"rate": 120}}}"#,
        )
        .into_record(0);
        assert!(matches!(result, Err(SourceError::InvalidRecord { .. })));
    }

    #[test]
    fn test_rejects_inconsistent_amounts() {
        let result = entry(
            r#"{"name": "X", "publicPrice": 10,
                "schemeCoverage": {"SchemeA": {"rate": 50, "reimbursedAmount": 5, "patientPays": 6}}}"#,
        )
        .into_record(0);
        assert!(matches!(result, Err(SourceError::InvalidRecord { .. })));
    }

    #[test]
    fn test_rejects_half_specified_amounts() {
        for coverage in [
            r#"{"rate": 50, "reimbursedAmount": 5}"#,
            r#"{"rate": 50, "patientPays": 5}"#,
        ] {
            let json = format!(
                r#"{{"name": "X", "publicPrice": 10, "schemeCoverage": {{"SchemeA": {}}}}}"#,
                coverage
            );
            let result = entry(&json).into_record(2);
            assert!(
                matches!(result, Err(SourceError::InvalidRecord { index: 2, .. })),
                "{} was accepted",
                coverage
            );
        }
    }

    #[test]
    fn test_huge_price_is_invalid_not_a_panic() {
        let max = Decimal::MAX.to_string();
        let computed = entry(&format!(
            r#"{{"name": "X", "publicPrice": "{}", "schemeCoverage": {{"SchemeA": {{"rate": 70}}}}}}"#,
            max
        ))
        .into_record(0);
        assert!(matches!(computed, Err(SourceError::InvalidRecord { index: 0, .. })));

        let stored = entry(&format!(
            r#"{{"name": "X", "publicPrice": "1",
                "schemeCoverage": {{"SchemeA": {{"rate": 50, "reimbursedAmount": "{}", "patientPays": "{}"}}}}}}"#,
            max, max
        ))
        .into_record(0);
        assert!(matches!(stored, Err(SourceError::InvalidRecord { index: 0, .. })));

        // Zero rate needs no multiplication
        let free = entry(&format!(
            r#"{{"name": "X", "publicPrice": "{}", "schemeCoverage": {{"SchemeA": {{"rate": 0}}}}}}"#,
            max
        ))
        .into_record(0)
        .unwrap();
        assert_eq!(
            free.coverage(InsuranceScheme::SchemeA).unwrap().patient_pays,
            Decimal::MAX
        );
    }

    #[test]
    fn test_rejects_unknown_type() {
        let result = entry(r#"{"name": "X", "publicPrice": 1, "kind": "herbal"}"#).into_record(0);
        assert!(matches!(result, Err(SourceError::InvalidRecord { .. })));
    }
}
