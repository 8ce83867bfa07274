//! Taawidaty Core Library
//!
//! Medication catalog search and insurance reimbursement engine.
//!
//! # Architecture
//!
//! ```text
//!   Catalog source (JSON / SQLite asset / pre-parsed list)
//!                 │
//!                 ▼  one load, validated, cached
//!   ┌───────────────────────────┐
//!   │       CatalogStore        │  immutable Catalog snapshot
//!   └─────────────┬─────────────┘
//!                 │
//!      ┌──────────┴──────────┐
//!      ▼                     ▼
//!   search()           calculate()          pure, lock-free
//!      │                     │
//!      └──────────┬──────────┘
//!                 ▼
//!   Wizard: SelectScheme → SearchMedication → ShowResult
//! ```
//!
//! # Core Principle
//!
//! **The catalog is read-only after load.** A reload swaps in a complete new
//! snapshot; nothing is ever partially updated.
//!
//! # Modules
//!
//! - [`catalog`]: Catalog sources, validation and the cached store
//! - [`models`]: Domain types (MedicationRecord, ReimbursementRule, SearchHit)
//! - [`search`]: Tiered relevance matcher
//! - [`reimbursement`]: Reimbursement calculator and generic alternatives
//! - [`wizard`]: Three-step selection state machine
//! - [`config`]: Engine configuration
//! - [`engine`]: Facade used by calling applications

pub mod catalog;
pub mod config;
pub mod engine;
pub mod models;
pub mod reimbursement;
pub mod search;
pub mod wizard;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, CatalogSource, CatalogStore};
pub use config::EngineConfig;
pub use engine::Engine;
pub use models::{
    InsuranceScheme, MatchedField, MedicationKind, MedicationRecord, ReimbursementRule, SearchHit,
};
pub use wizard::{Wizard, WizardState, WizardStep};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use catalog::JsonCatalogSource;
use reimbursement::{GenericAlternative, ReimbursementError};
use wizard::WizardError;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum TaawidatyError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Not covered: {0}")]
    NotCovered(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Not produced yet: blank queries return no hits rather than an error.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CatalogError> for TaawidatyError {
    fn from(e: CatalogError) -> Self {
        TaawidatyError::CatalogUnavailable(e.to_string())
    }
}

impl From<ReimbursementError> for TaawidatyError {
    fn from(e: ReimbursementError) -> Self {
        let message = e.to_string();
        match e {
            ReimbursementError::NotCovered { .. } => TaawidatyError::NotCovered(message),
            ReimbursementError::InvalidPrice(_) => TaawidatyError::InvalidInput(message),
        }
    }
}

impl From<WizardError> for TaawidatyError {
    fn from(e: WizardError) -> Self {
        match e {
            e @ WizardError::InvalidTransition { .. } => {
                TaawidatyError::InvalidTransition(e.to_string())
            }
            WizardError::Catalog(e) => e.into(),
            WizardError::Reimbursement(e) => e.into(),
        }
    }
}

impl From<config::ConfigError> for TaawidatyError {
    fn from(e: config::ConfigError) -> Self {
        TaawidatyError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for TaawidatyError {
    fn from(e: serde_json::Error) -> Self {
        TaawidatyError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for TaawidatyError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        TaawidatyError::Internal(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Create an engine from a JSON configuration.
#[uniffi::export]
pub fn open_engine(config_json: String) -> Result<Arc<TaawidatyCore>, TaawidatyError> {
    let config = EngineConfig::from_json_str(&config_json)?;
    Ok(Arc::new(TaawidatyCore {
        engine: Engine::from_config(config),
    }))
}

/// Create an engine over a JSON catalog already in memory (bundled asset).
#[uniffi::export]
pub fn open_engine_from_json_bytes(
    catalog_json: Vec<u8>,
    search_limit: u32,
) -> Result<Arc<TaawidatyCore>, TaawidatyError> {
    if search_limit == 0 {
        return Err(TaawidatyError::InvalidInput(
            "search_limit must be positive".into(),
        ));
    }
    Ok(Arc::new(TaawidatyCore {
        engine: Engine::with_source(
            JsonCatalogSource::from_bytes(catalog_json),
            search_limit as usize,
        ),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe engine handle for FFI.
#[derive(uniffi::Object)]
pub struct TaawidatyCore {
    engine: Engine,
}

impl TaawidatyCore {
    fn find_medication(&self, name: &str) -> Result<MedicationRecord, TaawidatyError> {
        let catalog = self.engine.store().load()?;
        catalog
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| TaawidatyError::InvalidInput(format!("Unknown medication: {}", name)))
    }
}

#[uniffi::export]
impl TaawidatyCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Load the catalog now (no-op if already loaded).
    pub fn warm_up(&self) -> Result<FfiCatalogInfo, TaawidatyError> {
        Ok(self.engine.warm_up()?.info().into())
    }

    /// Summary of the loaded catalog, `None` before the first load.
    pub fn catalog_info(&self) -> Option<FfiCatalogInfo> {
        self.engine.store().cached().map(|c| c.info().into())
    }

    /// Re-read the catalog source and replace the cached catalog.
    pub fn reload_catalog(&self) -> Result<FfiCatalogInfo, TaawidatyError> {
        Ok(self.engine.store().reload()?.info().into())
    }

    // =========================================================================
    // Search Operations
    // =========================================================================

    /// Search medications by name or active ingredient.
    ///
    /// `limit` defaults to the configured search limit.
    pub fn search(
        &self,
        query: String,
        limit: Option<u32>,
    ) -> Result<Vec<FfiSearchHit>, TaawidatyError> {
        let limit = limit
            .map(|l| l as usize)
            .unwrap_or(self.engine.search_limit());
        let hits = self.engine.search(&query, limit)?;
        Ok(hits.into_iter().map(|h| h.into()).collect())
    }

    // =========================================================================
    // Reimbursement Operations
    // =========================================================================

    /// Reimbursement of a medication (by exact name) under a scheme.
    pub fn calculate(
        &self,
        medication_name: String,
        scheme: FfiInsuranceScheme,
    ) -> Result<FfiReimbursement, TaawidatyError> {
        let record = self.find_medication(&medication_name)?;
        let rule = self.engine.calculate(&record, scheme.into())?;
        Ok(FfiReimbursement::new(scheme, &rule))
    }

    /// Reimbursement of a medication at a custom price.
    pub fn calculate_with_price(
        &self,
        medication_name: String,
        scheme: FfiInsuranceScheme,
        price: f64,
    ) -> Result<FfiReimbursement, TaawidatyError> {
        let price = Decimal::from_f64(price)
            .ok_or_else(|| TaawidatyError::InvalidInput(format!("Invalid price: {}", price)))?;
        let record = self.find_medication(&medication_name)?;
        let rule = self
            .engine
            .calculate_with_price(&record, scheme.into(), price)?;
        Ok(FfiReimbursement::new(scheme, &rule))
    }

    /// Generic substitutes for a medication, cheapest for the patient first.
    pub fn generic_alternatives(
        &self,
        medication_name: String,
        scheme: FfiInsuranceScheme,
    ) -> Result<Vec<FfiGenericAlternative>, TaawidatyError> {
        let record = self.find_medication(&medication_name)?;
        let alternatives = self.engine.generic_alternatives(&record, scheme.into())?;
        Ok(alternatives
            .into_iter()
            .map(|a| FfiGenericAlternative::new(scheme, a))
            .collect())
    }

    // =========================================================================
    // Wizard Operations
    // =========================================================================

    /// Start a new selection session.
    pub fn new_wizard(&self) -> Arc<FfiWizard> {
        Arc::new(FfiWizard {
            inner: Mutex::new(self.engine.new_wizard()),
        })
    }
}

/// Selection wizard handle for FFI. One per user session.
#[derive(uniffi::Object)]
pub struct FfiWizard {
    inner: Mutex<Wizard>,
}

#[uniffi::export]
impl FfiWizard {
    pub fn session_id(&self) -> Result<String, TaawidatyError> {
        Ok(self.inner.lock()?.session_id().to_string())
    }

    /// Snapshot of the current state, for polling UIs.
    pub fn state(&self) -> Result<FfiWizardState, TaawidatyError> {
        Ok(self.inner.lock()?.state().clone().into())
    }

    pub fn select_scheme(&self, scheme: FfiInsuranceScheme) -> Result<(), TaawidatyError> {
        Ok(self.inner.lock()?.select_scheme(scheme.into())?)
    }

    pub fn update_query(&self, text: String) -> Result<(), TaawidatyError> {
        Ok(self.inner.lock()?.update_query(&text)?)
    }

    /// Select the search hit at `index` in the current results.
    pub fn select_result(&self, index: u32) -> Result<(), TaawidatyError> {
        let mut wizard = self.inner.lock()?;
        let record = wizard
            .state()
            .results
            .get(index as usize)
            .map(|hit| hit.record.clone())
            .ok_or_else(|| TaawidatyError::InvalidInput(format!("No result at index {}", index)))?;
        Ok(wizard.select_medication(&record)?)
    }

    pub fn previous_step(&self) -> Result<(), TaawidatyError> {
        self.inner.lock()?.previous_step();
        Ok(())
    }

    pub fn reset(&self) -> Result<(), TaawidatyError> {
        self.inner.lock()?.reset();
        Ok(())
    }

    /// Reimbursement for the selected medication and scheme.
    pub fn result(&self) -> Result<FfiReimbursement, TaawidatyError> {
        let wizard = self.inner.lock()?;
        let rule = wizard.result()?;
        let scheme = wizard
            .state()
            .selected_scheme
            .ok_or_else(|| TaawidatyError::Internal("No scheme selected".into()))?;
        Ok(FfiReimbursement::new(scheme.into(), &rule))
    }
}

// =========================================================================
// FFI Types
// =========================================================================

fn money(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// FFI-safe insurance scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiInsuranceScheme {
    SchemeA,
    SchemeB,
}

impl From<FfiInsuranceScheme> for InsuranceScheme {
    fn from(scheme: FfiInsuranceScheme) -> Self {
        match scheme {
            FfiInsuranceScheme::SchemeA => InsuranceScheme::SchemeA,
            FfiInsuranceScheme::SchemeB => InsuranceScheme::SchemeB,
        }
    }
}

impl From<InsuranceScheme> for FfiInsuranceScheme {
    fn from(scheme: InsuranceScheme) -> Self {
        match scheme {
            InsuranceScheme::SchemeA => FfiInsuranceScheme::SchemeA,
            InsuranceScheme::SchemeB => FfiInsuranceScheme::SchemeB,
        }
    }
}

/// FFI-safe reimbursement breakdown.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReimbursement {
    pub scheme: FfiInsuranceScheme,
    pub rate: u8,
    pub reimbursed_amount: f64,
    pub patient_pays: f64,
    pub reimbursable: bool,
}

impl FfiReimbursement {
    fn new(scheme: FfiInsuranceScheme, rule: &ReimbursementRule) -> Self {
        Self {
            scheme,
            rate: rule.rate,
            reimbursed_amount: money(rule.reimbursed_amount),
            patient_pays: money(rule.patient_pays),
            reimbursable: rule.is_reimbursable(),
        }
    }
}

/// FFI-safe medication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub name: String,
    pub active_ingredient: String,
    pub dosage: String,
    pub form: String,
    pub packaging: String,
    pub public_price: f64,
    pub reference_price: f64,
    pub generic: bool,
    pub coverage: Vec<FfiReimbursement>,
}

impl From<MedicationRecord> for FfiMedication {
    fn from(record: MedicationRecord) -> Self {
        let coverage = record
            .scheme_coverage
            .iter()
            .map(|(scheme, rule)| FfiReimbursement::new((*scheme).into(), rule))
            .collect();
        Self {
            generic: record.is_generic(),
            public_price: money(record.public_price),
            reference_price: money(record.reference_price),
            name: record.name,
            active_ingredient: record.active_ingredient,
            dosage: record.dosage,
            form: record.form,
            packaging: record.packaging,
            coverage,
        }
    }
}

/// FFI-safe search hit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSearchHit {
    pub medication: FfiMedication,
    pub score: u32,
    pub matched_field: String,
}

impl From<SearchHit> for FfiSearchHit {
    fn from(hit: SearchHit) -> Self {
        Self {
            medication: hit.record.into(),
            score: hit.score,
            matched_field: format!("{:?}", hit.matched_field),
        }
    }
}

/// FFI-safe generic alternative.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGenericAlternative {
    pub medication: FfiMedication,
    pub reimbursement: Option<FfiReimbursement>,
    pub out_of_pocket: f64,
}

impl FfiGenericAlternative {
    fn new(scheme: FfiInsuranceScheme, alternative: GenericAlternative) -> Self {
        Self {
            out_of_pocket: money(alternative.out_of_pocket()),
            reimbursement: alternative
                .rule
                .as_ref()
                .map(|rule| FfiReimbursement::new(scheme, rule)),
            medication: alternative.record.into(),
        }
    }
}

/// FFI-safe wizard state.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiWizardState {
    pub step: String,
    pub selected_scheme: Option<FfiInsuranceScheme>,
    pub query: String,
    pub results: Vec<FfiSearchHit>,
    pub selected_medication: Option<FfiMedication>,
}

impl From<WizardState> for FfiWizardState {
    fn from(state: WizardState) -> Self {
        Self {
            step: state.step.to_string(),
            selected_scheme: state.selected_scheme.map(|s| s.into()),
            query: state.query,
            results: state.results.into_iter().map(|h| h.into()).collect(),
            selected_medication: state.selected_medication.map(|m| m.into()),
        }
    }
}

/// FFI-safe catalog summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCatalogInfo {
    pub record_count: u32,
    pub fingerprint: String,
    pub loaded_at: String,
    pub source: String,
}

impl From<catalog::CatalogInfo> for FfiCatalogInfo {
    fn from(info: catalog::CatalogInfo) -> Self {
        Self {
            record_count: u32::try_from(info.record_count).unwrap_or(u32::MAX),
            fingerprint: info.fingerprint,
            loaded_at: info.loaded_at,
            source: info.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"name": "Doliprane 1000mg", "activeIngredient": "Paracetamol", "publicPrice": 15.0,
         "schemeCoverage": {"SchemeA": {"rate": 70}}}
    ]"#;

    fn open_test_engine() -> Arc<TaawidatyCore> {
        open_engine_from_json_bytes(CATALOG.as_bytes().to_vec(), 10).unwrap()
    }

    #[test]
    fn test_ffi_search_and_calculate() {
        let core = open_test_engine();
        assert!(core.catalog_info().is_none());

        let hits = core.search("dolip".into(), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 100);
        assert_eq!(hits[0].matched_field, "Name");

        let r = core
            .calculate("Doliprane 1000mg".into(), FfiInsuranceScheme::SchemeA)
            .unwrap();
        assert_eq!(r.reimbursed_amount, 10.5);
        assert_eq!(r.patient_pays, 4.5);
        assert_eq!(core.catalog_info().unwrap().record_count, 1);
    }

    #[test]
    fn test_ffi_error_mapping() {
        let core = open_test_engine();
        assert!(matches!(
            core.calculate("Doliprane 1000mg".into(), FfiInsuranceScheme::SchemeB),
            Err(TaawidatyError::NotCovered(_))
        ));
        assert!(matches!(
            core.calculate_with_price("Doliprane 1000mg".into(), FfiInsuranceScheme::SchemeA, -2.0),
            Err(TaawidatyError::InvalidInput(_))
        ));

        let wizard = core.new_wizard();
        assert!(matches!(
            wizard.update_query("x".into()),
            Err(TaawidatyError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_ffi_huge_prices_are_errors() {
        let core = open_test_engine();
        assert!(matches!(
            core.calculate_with_price("Doliprane 1000mg".into(), FfiInsuranceScheme::SchemeA, 1e28),
            Err(TaawidatyError::InvalidInput(_))
        ));

        let catalog = format!(
            r#"[{{"name": "X", "publicPrice": "{}", "schemeCoverage": {{"SchemeA": {{"rate": 70}}}}}}]"#,
            Decimal::MAX
        );
        let core = open_engine_from_json_bytes(catalog.into_bytes(), 10).unwrap();
        assert!(matches!(
            core.search("x".into(), None),
            Err(TaawidatyError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn test_catalog_info_record_count_saturates() {
        let info = catalog::CatalogInfo {
            record_count: usize::MAX,
            fingerprint: "abc".into(),
            loaded_at: "2026-01-01T00:00:00Z".into(),
            source: "test".into(),
        };
        assert_eq!(FfiCatalogInfo::from(info).record_count, u32::MAX);
    }

    #[test]
    fn test_ffi_wizard_flow() {
        let wizard = open_test_engine().new_wizard();
        wizard.select_scheme(FfiInsuranceScheme::SchemeA).unwrap();
        wizard.update_query("para".into()).unwrap();
        assert!(wizard.select_result(5).is_err());
        wizard.select_result(0).unwrap();

        let state = wizard.state().unwrap();
        assert_eq!(state.step, "ShowResult");
        assert_eq!(state.selected_scheme, Some(FfiInsuranceScheme::SchemeA));

        let result = wizard.result().unwrap();
        assert_eq!(result.rate, 70);

        wizard.reset().unwrap();
        assert_eq!(wizard.state().unwrap().step, "SelectScheme");
    }

    #[test]
    fn test_unavailable_catalog() {
        let core = open_engine_from_json_bytes(b"not json".to_vec(), 10).unwrap();
        assert!(matches!(
            core.search("dolip".into(), None),
            Err(TaawidatyError::CatalogUnavailable(_))
        ));
    }
}
