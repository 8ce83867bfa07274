//! Wizard state types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{InsuranceScheme, MedicationRecord, SearchHit};

/// Step of the selection flow, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum WizardStep {
    SelectScheme,
    SearchMedication,
    ShowResult,
}

impl WizardStep {
    /// The step before this one, clamped at the first step.
    pub fn previous(self) -> Self {
        match self {
            WizardStep::SelectScheme | WizardStep::SearchMedication => WizardStep::SelectScheme,
            WizardStep::ShowResult => WizardStep::SearchMedication,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardStep::SelectScheme => "SelectScheme",
            WizardStep::SearchMedication => "SearchMedication",
            WizardStep::ShowResult => "ShowResult",
        };
        f.write_str(name)
    }
}

/// Wizard operations, as named in transition errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WizardAction {
    SelectScheme,
    UpdateQuery,
    SelectMedication,
    ShowResult,
}

impl fmt::Display for WizardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardAction::SelectScheme => "select_scheme",
            WizardAction::UpdateQuery => "update_query",
            WizardAction::SelectMedication => "select_medication",
            WizardAction::ShowResult => "result",
        };
        f.write_str(name)
    }
}

/// Transient selection state of one wizard session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardState {
    pub step: WizardStep,
    pub selected_scheme: Option<InsuranceScheme>,
    pub query: String,
    pub results: Vec<SearchHit>,
    pub selected_medication: Option<MedicationRecord>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: WizardStep::SelectScheme,
            selected_scheme: None,
            query: String::new(),
            results: Vec::new(),
            selected_medication: None,
        }
    }
}

impl WizardState {
    /// Whether `record` is one of the current search hits.
    pub fn has_result(&self, record: &MedicationRecord) -> bool {
        self.results.iter().any(|hit| hit.record == *record)
    }
}
