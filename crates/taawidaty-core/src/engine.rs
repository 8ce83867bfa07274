//! Engine facade tying the catalog store to search, reimbursement and wizards.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::catalog::{Catalog, CatalogResult, CatalogSource, CatalogStore};
use crate::config::{CatalogSourceConfig, EngineConfig};
use crate::models::{InsuranceScheme, MedicationRecord, ReimbursementRule, SearchHit};
use crate::reimbursement::{self, GenericAlternative, ReimbursementResult};
use crate::search;
use crate::wizard::Wizard;

/// Shared, thread-safe entry point for calling applications.
#[derive(Debug)]
pub struct Engine {
    store: Arc<CatalogStore>,
    search_limit: usize,
}

impl Engine {
    /// Build an engine from configuration. The catalog is not read yet.
    pub fn from_config(config: EngineConfig) -> Self {
        let EngineConfig {
            search_limit,
            catalog,
        } = config;
        Self::with_source(catalog.into_source(), search_limit)
    }

    /// Build an engine over any catalog source.
    pub fn with_source<S: CatalogSource + 'static>(source: S, search_limit: usize) -> Self {
        Self {
            store: Arc::new(CatalogStore::new(source)),
            search_limit,
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    /// Load the catalog now, e.g. at startup, instead of on first search.
    pub fn warm_up(&self) -> CatalogResult<Arc<Catalog>> {
        self.store.load()
    }

    /// Search the catalog with an explicit result limit.
    pub fn search(&self, query: &str, limit: usize) -> CatalogResult<Vec<SearchHit>> {
        let records = self.store.get_all()?;
        Ok(search::search(query, &records, limit))
    }

    /// Search the catalog with the configured result limit.
    pub fn search_default(&self, query: &str) -> CatalogResult<Vec<SearchHit>> {
        self.search(query, self.search_limit)
    }

    pub fn calculate(
        &self,
        record: &MedicationRecord,
        scheme: InsuranceScheme,
    ) -> ReimbursementResult<ReimbursementRule> {
        reimbursement::calculate(record, scheme)
    }

    pub fn calculate_with_price(
        &self,
        record: &MedicationRecord,
        scheme: InsuranceScheme,
        override_price: Decimal,
    ) -> ReimbursementResult<ReimbursementRule> {
        reimbursement::calculate_with_price(record, scheme, override_price)
    }

    /// Cheaper generic substitutes for a record, from the loaded catalog.
    pub fn generic_alternatives(
        &self,
        record: &MedicationRecord,
        scheme: InsuranceScheme,
    ) -> CatalogResult<Vec<GenericAlternative>> {
        let records = self.store.get_all()?;
        Ok(reimbursement::generic_alternatives(record, &records, scheme))
    }

    /// Start an independent selection session.
    pub fn new_wizard(&self) -> Wizard {
        Wizard::with_search_limit(Arc::clone(&self.store), self.search_limit)
    }
}

impl From<CatalogSourceConfig> for Engine {
    fn from(catalog: CatalogSourceConfig) -> Self {
        Self::from_config(EngineConfig::new(catalog))
    }
}
