//! Medication catalog: sources, validation and the cached store.
//!
//! The catalog is read once from a [`CatalogSource`], validated into
//! [`MedicationRecord`]s and kept as an immutable [`Catalog`] snapshot.
//! Snapshots are never modified; a reload swaps in a complete new one.

mod entry;
mod source;
mod sqlite;

pub use entry::*;
pub use source::*;
pub use sqlite::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::MedicationRecord;

/// Catalog store errors.
///
/// Cloning is cheap; callers that waited on the same failed load share one
/// underlying [`SourceError`].
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(#[source] Arc<SourceError>),
}

impl CatalogError {
    /// The source failure behind this error.
    pub fn source_error(&self) -> &SourceError {
        match self {
            CatalogError::Unavailable(e) => e,
        }
    }
}

impl From<SourceError> for CatalogError {
    fn from(e: SourceError) -> Self {
        CatalogError::Unavailable(Arc::new(e))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// An immutable, fully validated set of medication records.
#[derive(Debug)]
pub struct Catalog {
    records: Arc<[MedicationRecord]>,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
    source: String,
}

/// Summary of a loaded catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogInfo {
    pub record_count: usize,
    /// SHA-256 of the canonical record JSON
    pub fingerprint: String,
    /// RFC 3339 load timestamp
    pub loaded_at: String,
    pub source: String,
}

impl Catalog {
    /// Validate raw entries into a catalog. Any invalid entry fails the whole set.
    pub fn from_entries(entries: Vec<MedicationEntry>, source: String) -> SourceResult<Self> {
        if entries.is_empty() {
            return Err(SourceError::Empty(source));
        }
        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_record(index))
            .collect::<SourceResult<Vec<_>>>()?;
        Self::from_records(records, source)
    }

    /// Wrap already validated records.
    pub fn from_records(records: Vec<MedicationRecord>, source: String) -> SourceResult<Self> {
        let fingerprint = fingerprint(&records)?;
        Ok(Self {
            records: records.into(),
            fingerprint,
            loaded_at: Utc::now(),
            source,
        })
    }

    pub fn records(&self) -> &[MedicationRecord] {
        &self.records
    }

    /// Shared handle on the record slice; clones point at the same data.
    pub fn shared_records(&self) -> Arc<[MedicationRecord]> {
        Arc::clone(&self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Find a record by exact name, ignoring case and surrounding whitespace.
    pub fn find_by_name(&self, name: &str) -> Option<&MedicationRecord> {
        let wanted = name.trim().to_lowercase();
        self.records
            .iter()
            .find(|record| record.name.to_lowercase() == wanted)
    }

    pub fn info(&self) -> CatalogInfo {
        CatalogInfo {
            record_count: self.records.len(),
            fingerprint: self.fingerprint.clone(),
            loaded_at: self.loaded_at.to_rfc3339(),
            source: self.source.clone(),
        }
    }
}

fn fingerprint(records: &[MedicationRecord]) -> SourceResult<String> {
    let canonical = serde_json::to_vec(records)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Lazily loaded, shared catalog.
///
/// Construct once at startup and hand out by reference (or `Arc`). The first
/// [`load`](Self::load) reads the source; concurrent first callers wait for
/// that single read and all receive its outcome, the same snapshot on success
/// or the same error on failure. Failures are not cached: a call that starts
/// after a failed read has finished retries it.
///
/// The snapshot pointer sits behind an `RwLock` that is held only long enough
/// to clone or assign an `Arc`. Source reads happen under a separate gate, so
/// readers never wait on an in-flight load or reload, and the record slice a
/// reader holds is immutable and used without any lock.
pub struct CatalogStore {
    source: Box<dyn CatalogSource>,
    snapshot: RwLock<Option<Arc<Catalog>>>,
    /// Serializes source reads; holds the last attempt when it failed.
    load_gate: Mutex<Option<FailedAttempt>>,
    /// Completed source reads, successful or not.
    loads: AtomicUsize,
}

struct FailedAttempt {
    /// Value of `loads` once this attempt completed
    attempt: usize,
    error: CatalogError,
}

impl CatalogStore {
    /// Create a store over a source. Nothing is read until first access.
    pub fn new<S: CatalogSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            snapshot: RwLock::new(None),
            load_gate: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// The current snapshot, without triggering a load.
    pub fn cached(&self) -> Option<Arc<Catalog>> {
        // Writers only ever assign a whole snapshot, so a poisoned lock still
        // holds consistent data.
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the cached catalog, loading it on first call.
    pub fn load(&self) -> CatalogResult<Arc<Catalog>> {
        if let Some(catalog) = self.cached() {
            return Ok(catalog);
        }

        let arrived_after = self.load_count();
        let mut gate = self.load_gate.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished loading while we waited
        if let Some(catalog) = self.cached() {
            return Ok(catalog);
        }
        if let Some(failed) = gate.as_ref().filter(|f| f.attempt > arrived_after) {
            return Err(failed.error.clone());
        }

        self.attempt_load(&mut gate)
    }

    /// All records, loading the catalog on first call.
    ///
    /// Every call after a successful load returns the same shared slice.
    pub fn get_all(&self) -> CatalogResult<Arc<[MedicationRecord]>> {
        Ok(self.load()?.shared_records())
    }

    /// Read the source again and swap in the new catalog.
    ///
    /// On failure the previous snapshot (if any) stays in place.
    pub fn reload(&self) -> CatalogResult<Arc<Catalog>> {
        let mut gate = self.load_gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.attempt_load(&mut gate)
    }

    /// Number of physical source reads completed so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Read the source once. Must be called with the load gate held.
    fn attempt_load(&self, last_failure: &mut Option<FailedAttempt>) -> CatalogResult<Arc<Catalog>> {
        let result = self.read_source();
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst) + 1;

        match result {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                *last_failure = None;
                self.publish(Arc::clone(&catalog));
                Ok(catalog)
            }
            Err(error) => {
                *last_failure = Some(FailedAttempt {
                    attempt,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn read_source(&self) -> CatalogResult<Catalog> {
        let description = self.source.describe();

        let result = self
            .source
            .read()
            .and_then(|entries| Catalog::from_entries(entries, description.clone()));

        match result {
            Ok(catalog) => {
                tracing::info!(
                    source = %description,
                    records = catalog.len(),
                    fingerprint = %catalog.fingerprint(),
                    "catalog loaded"
                );
                Ok(catalog)
            }
            Err(e) => {
                tracing::warn!(source = %description, error = %e, "catalog load failed");
                Err(e.into())
            }
        }
    }

    fn publish(&self, catalog: Arc<Catalog>) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(catalog);
    }
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("source", &self.source.describe())
            .field("loaded", &self.cached().is_some())
            .field("loads", &self.load_count())
            .finish()
    }
}
