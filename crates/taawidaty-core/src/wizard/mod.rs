//! Three-step selection flow: insurance scheme → medication → result.
//!
//! ```text
//!  SelectScheme ──select_scheme──▶ SearchMedication ──select_medication──▶ ShowResult
//!       ▲                           │  ▲    update_query                        │
//!       └──────previous_step────────┘  └──────────previous_step─────────────────┘
//!
//!  reset(): any step ──▶ SelectScheme, all fields cleared
//! ```
//!
//! A [`Wizard`] is owned by a single session and mutated sequentially; give
//! each concurrent user their own instance. Calling a transition from the
//! wrong step returns [`WizardError::InvalidTransition`] and leaves the state
//! untouched.

mod state;

pub use state::*;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogStore};
use crate::models::{InsuranceScheme, MedicationRecord, ReimbursementRule};
use crate::reimbursement::{self, ReimbursementError};
use crate::search::{self, DEFAULT_SEARCH_LIMIT};

/// Wizard errors.
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("Cannot {action} while in step {step}")]
    InvalidTransition { action: WizardAction, step: WizardStep },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Reimbursement(#[from] ReimbursementError),
}

pub type WizardResult<T> = Result<T, WizardError>;

/// Receives the new state after every successful transition.
pub trait WizardObserver: Send + Sync {
    fn on_state_changed(&self, state: &WizardState);
}

/// Selection state machine for one session.
pub struct Wizard {
    session_id: Uuid,
    store: Arc<CatalogStore>,
    search_limit: usize,
    state: WizardState,
    observer: Option<Box<dyn WizardObserver>>,
}

impl Wizard {
    /// Start a session at `SelectScheme`.
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self::with_search_limit(store, DEFAULT_SEARCH_LIMIT)
    }

    pub fn with_search_limit(store: Arc<CatalogStore>, search_limit: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            store,
            search_limit,
            state: WizardState::default(),
            observer: None,
        }
    }

    /// Register a callback notified after each state change.
    pub fn set_observer<O: WizardObserver + 'static>(&mut self, observer: O) {
        self.observer = Some(Box::new(observer));
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    /// Choose the insurance scheme and move on to the search step.
    pub fn select_scheme(&mut self, scheme: InsuranceScheme) -> WizardResult<()> {
        self.require(WizardAction::SelectScheme, WizardStep::SelectScheme)?;
        self.state.selected_scheme = Some(scheme);
        self.advance(WizardStep::SearchMedication);
        Ok(())
    }

    /// Run a search against the full catalog and replace the results.
    ///
    /// Stays in `SearchMedication`. If the catalog cannot be loaded the error
    /// is returned and the previous query and results are kept.
    pub fn update_query(&mut self, text: &str) -> WizardResult<()> {
        self.require(WizardAction::UpdateQuery, WizardStep::SearchMedication)?;

        let records = self.store.get_all()?;
        let results = search::search(text, &records, self.search_limit);

        self.state.query = text.to_string();
        self.state.results = results;
        self.notify();
        Ok(())
    }

    /// Pick one of the current search hits and show its reimbursement.
    pub fn select_medication(&mut self, record: &MedicationRecord) -> WizardResult<()> {
        self.require(WizardAction::SelectMedication, WizardStep::SearchMedication)?;
        if !self.state.has_result(record) {
            return Err(self.invalid(WizardAction::SelectMedication));
        }
        self.state.selected_medication = Some(record.clone());
        self.advance(WizardStep::ShowResult);
        Ok(())
    }

    /// Go back one step; a no-op on the first step.
    ///
    /// Leaving `ShowResult` drops the selected medication but keeps the
    /// query and results.
    pub fn previous_step(&mut self) {
        let previous = self.state.step.previous();
        if previous == self.state.step {
            return;
        }
        if self.state.step == WizardStep::ShowResult {
            self.state.selected_medication = None;
        }
        self.advance(previous);
    }

    /// Return to `SelectScheme` with every field cleared.
    pub fn reset(&mut self) {
        let from = self.state.step;
        self.state = WizardState::default();
        tracing::debug!(session = %self.session_id, from = %from, "wizard reset");
        self.notify();
    }

    /// Reimbursement breakdown for the selection. Only valid in `ShowResult`.
    pub fn result(&self) -> WizardResult<ReimbursementRule> {
        let (Some(scheme), Some(record), WizardStep::ShowResult) = (
            self.state.selected_scheme,
            self.state.selected_medication.as_ref(),
            self.state.step,
        ) else {
            return Err(self.invalid(WizardAction::ShowResult));
        };
        Ok(reimbursement::calculate(record, scheme)?)
    }

    fn require(&self, action: WizardAction, expected: WizardStep) -> WizardResult<()> {
        if self.state.step == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: WizardAction) -> WizardError {
        tracing::debug!(
            session = %self.session_id,
            action = %action,
            step = %self.state.step,
            "rejected wizard transition"
        );
        WizardError::InvalidTransition {
            action,
            step: self.state.step,
        }
    }

    fn advance(&mut self, to: WizardStep) {
        tracing::debug!(
            session = %self.session_id,
            from = %self.state.step,
            to = %to,
            "wizard transition"
        );
        self.state.step = to;
        self.notify();
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer.on_state_changed(&self.state);
        }
    }
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("session_id", &self.session_id)
            .field("search_limit", &self.search_limit)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonCatalogSource, StaticCatalogSource};
    use std::sync::Mutex;

    const CATALOG: &str = r#"[
        {"name": "Doliprane 1000mg", "activeIngredient": "Paracetamol", "publicPrice": 15.0,
         "schemeCoverage": {"SchemeA": {"rate": 70}}},
        {"name": "Dolitabs 500mg", "activeIngredient": "Paracetamol", "publicPrice": 9.0, "kind": "Generic"}
    ]"#;

    fn store() -> Arc<CatalogStore> {
        Arc::new(CatalogStore::new(JsonCatalogSource::from_bytes(
            CATALOG.as_bytes().to_vec(),
        )))
    }

    fn at_results() -> Wizard {
        let mut wizard = Wizard::new(store());
        wizard.select_scheme(InsuranceScheme::SchemeA).unwrap();
        wizard.update_query("dolip").unwrap();
        wizard
    }

    #[test]
    fn test_starts_at_select_scheme() {
        let wizard = Wizard::new(store());
        assert_eq!(wizard.step(), WizardStep::SelectScheme);
        assert_eq!(wizard.state(), &WizardState::default());
    }

    #[test]
    fn test_query_before_scheme_is_rejected() {
        let mut wizard = Wizard::new(store());
        let err = wizard.update_query("x").unwrap_err();
        assert!(matches!(
            err,
            WizardError::InvalidTransition {
                action: WizardAction::UpdateQuery,
                step: WizardStep::SelectScheme
            }
        ));
        assert_eq!(wizard.state(), &WizardState::default());
    }

    #[test]
    fn test_select_scheme_twice_is_rejected() {
        let mut wizard = Wizard::new(store());
        wizard.select_scheme(InsuranceScheme::SchemeA).unwrap();
        assert!(wizard.select_scheme(InsuranceScheme::SchemeB).is_err());
        assert_eq!(wizard.state().selected_scheme, Some(InsuranceScheme::SchemeA));
    }

    #[test]
    fn test_update_query_stays_on_search() {
        let wizard = at_results();
        assert_eq!(wizard.step(), WizardStep::SearchMedication);
        assert_eq!(wizard.state().query, "dolip");
        assert_eq!(wizard.state().results.len(), 1);
    }

    #[test]
    fn test_select_unknown_medication_is_rejected() {
        let mut wizard = at_results();
        let catalog = wizard.store.load().unwrap();
        // Dolitabs is in the catalog but not among the "dolip" hits
        let outsider = catalog.find_by_name("Dolitabs 500mg").unwrap().clone();

        assert!(wizard.select_medication(&outsider).is_err());
        assert_eq!(wizard.step(), WizardStep::SearchMedication);
        assert!(wizard.state().selected_medication.is_none());
    }

    #[test]
    fn test_select_with_empty_results_is_rejected() {
        let mut wizard = at_results();
        let record = wizard.state().results[0].record.clone();
        wizard.update_query("   ").unwrap();
        assert!(wizard.state().results.is_empty());
        assert!(wizard.select_medication(&record).is_err());
    }

    #[test]
    fn test_result_only_in_show_result() {
        let mut wizard = at_results();
        assert!(matches!(
            wizard.result(),
            Err(WizardError::InvalidTransition { .. })
        ));

        let record = wizard.state().results[0].record.clone();
        wizard.select_medication(&record).unwrap();
        let rule = wizard.result().unwrap();
        assert_eq!(rule.rate, 70);
    }

    #[test]
    fn test_result_not_covered() {
        let mut wizard = Wizard::new(store());
        wizard.select_scheme(InsuranceScheme::SchemeB).unwrap();
        wizard.update_query("doliprane").unwrap();
        let record = wizard.state().results[0].record.clone();
        wizard.select_medication(&record).unwrap();

        assert!(matches!(
            wizard.result(),
            Err(WizardError::Reimbursement(ReimbursementError::NotCovered { .. }))
        ));
    }

    #[test]
    fn test_previous_step_clamps() {
        let mut wizard = at_results();
        let record = wizard.state().results[0].record.clone();
        wizard.select_medication(&record).unwrap();

        wizard.previous_step();
        assert_eq!(wizard.step(), WizardStep::SearchMedication);
        assert!(wizard.state().selected_medication.is_none());
        assert_eq!(wizard.state().results.len(), 1);

        wizard.previous_step();
        assert_eq!(wizard.step(), WizardStep::SelectScheme);
        wizard.previous_step();
        assert_eq!(wizard.step(), WizardStep::SelectScheme);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut wizard = at_results();
        let record = wizard.state().results[0].record.clone();
        wizard.select_medication(&record).unwrap();

        wizard.reset();
        assert_eq!(wizard.state(), &WizardState::default());
    }

    #[test]
    fn test_catalog_failure_keeps_state() {
        let store = Arc::new(CatalogStore::new(StaticCatalogSource::default()));
        let mut wizard = Wizard::new(store);
        wizard.select_scheme(InsuranceScheme::SchemeA).unwrap();

        assert!(matches!(
            wizard.update_query("dolip"),
            Err(WizardError::Catalog(CatalogError::Unavailable(_)))
        ));
        assert_eq!(wizard.state().query, "");
        assert_eq!(wizard.step(), WizardStep::SearchMedication);
    }

    struct Recorder(Arc<Mutex<Vec<WizardStep>>>);

    impl WizardObserver for Recorder {
        fn on_state_changed(&self, state: &WizardState) {
            self.0.lock().unwrap().push(state.step);
        }
    }

    #[test]
    fn test_observer_sees_transitions() {
        let steps = Arc::new(Mutex::new(Vec::new()));
        let mut wizard = Wizard::new(store());
        wizard.set_observer(Recorder(Arc::clone(&steps)));

        wizard.select_scheme(InsuranceScheme::SchemeA).unwrap();
        wizard.update_query("dolip").unwrap();
        wizard.update_query("x").unwrap();
        wizard.reset();
        // Rejected transitions are not reported
        let _ = wizard.update_query("late");

        assert_eq!(
            *steps.lock().unwrap(),
            vec![
                WizardStep::SearchMedication,
                WizardStep::SearchMedication,
                WizardStep::SearchMedication,
                WizardStep::SelectScheme,
            ]
        );
    }
}
