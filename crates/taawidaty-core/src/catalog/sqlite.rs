//! Bundled SQLite catalog assets.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::str::FromStr;

use rusqlite::{Connection, OpenFlags};
use rust_decimal::Decimal;

use super::{CatalogSource, CoverageEntry, MedicationEntry, SourceError, SourceResult};
use crate::models::InsuranceScheme;

/// Schema of a catalog asset. Catalog order is `id` order.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS medications (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    active_ingredient TEXT NOT NULL DEFAULT '',
    dosage TEXT NOT NULL DEFAULT '',
    form TEXT NOT NULL DEFAULT '',
    packaging TEXT NOT NULL DEFAULT '',
    public_price TEXT NOT NULL,                  -- decimal string, MAD
    reference_price TEXT,                        -- decimal string, NULL = public price
    kind TEXT                                    -- 'Brand' / 'Generic', NULL = Brand
);

CREATE TABLE IF NOT EXISTS scheme_coverage (
    medication_id INTEGER NOT NULL REFERENCES medications(id),
    scheme TEXT NOT NULL,                        -- 'SchemeA' / 'SchemeB'
    rate INTEGER NOT NULL,
    reimbursed_amount TEXT,
    patient_pays TEXT,
    PRIMARY KEY (medication_id, scheme)
);
"#;

/// Read-only catalog stored in a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteCatalogSource {
    path: PathBuf,
}

impl SqliteCatalogSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn open(&self) -> SourceResult<Connection> {
        if !self.path.exists() {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", self.path.display()),
            )));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

impl CatalogSource for SqliteCatalogSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn read(&self) -> SourceResult<Vec<MedicationEntry>> {
        let conn = self.open()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, active_ingredient, dosage, form, packaging,
                   public_price, reference_price, kind
            FROM medications
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MedicationRow {
                id: row.get(0)?,
                name: row.get(1)?,
                active_ingredient: row.get(2)?,
                dosage: row.get(3)?,
                form: row.get(4)?,
                packaging: row.get(5)?,
                public_price: row.get(6)?,
                reference_price: row.get(7)?,
                kind: row.get(8)?,
            })
        })?;

        let mut medications = Vec::new();
        for row in rows {
            medications.push(row?);
        }

        let positions: HashMap<i64, usize> = medications
            .iter()
            .enumerate()
            .map(|(index, row)| (row.id, index))
            .collect();

        let mut stmt = conn.prepare(
            r#"
            SELECT medication_id, scheme, rate, reimbursed_amount, patient_pays
            FROM scheme_coverage
            ORDER BY medication_id, scheme
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CoverageRow {
                medication_id: row.get(0)?,
                scheme: row.get(1)?,
                rate: row.get(2)?,
                reimbursed_amount: row.get(3)?,
                patient_pays: row.get(4)?,
            })
        })?;

        let mut coverage: Vec<BTreeMap<InsuranceScheme, CoverageEntry>> =
            vec![BTreeMap::new(); medications.len()];
        for row in rows {
            let row = row?;
            let index = *positions.get(&row.medication_id).ok_or_else(|| {
                SourceError::InvalidRecord {
                    index: medications.len(),
                    reason: format!("coverage for unknown medication id {}", row.medication_id),
                }
            })?;
            let (scheme, entry) = row.into_entry(index)?;
            coverage[index].insert(scheme, entry);
        }

        medications
            .into_iter()
            .zip(coverage)
            .enumerate()
            .map(|(index, (row, coverage))| row.into_entry(index, coverage))
            .collect()
    }
}

/// Intermediate row struct for the medications table.
struct MedicationRow {
    id: i64,
    name: String,
    active_ingredient: String,
    dosage: String,
    form: String,
    packaging: String,
    public_price: String,
    reference_price: Option<String>,
    kind: Option<String>,
}

impl MedicationRow {
    fn into_entry(
        self,
        index: usize,
        scheme_coverage: BTreeMap<InsuranceScheme, CoverageEntry>,
    ) -> SourceResult<MedicationEntry> {
        Ok(MedicationEntry {
            name: self.name,
            active_ingredient: self.active_ingredient,
            dosage: self.dosage,
            form: self.form,
            packaging: self.packaging,
            public_price: parse_amount(&self.public_price, index)?,
            reference_price: self
                .reference_price
                .map(|s| parse_amount(&s, index))
                .transpose()?,
            kind: self.kind,
            scheme_coverage,
        })
    }
}

/// Intermediate row struct for the scheme_coverage table.
struct CoverageRow {
    medication_id: i64,
    scheme: String,
    rate: i64,
    reimbursed_amount: Option<String>,
    patient_pays: Option<String>,
}

impl CoverageRow {
    fn into_entry(self, index: usize) -> SourceResult<(InsuranceScheme, CoverageEntry)> {
        let scheme =
            InsuranceScheme::parse(&self.scheme).ok_or_else(|| SourceError::InvalidRecord {
                index,
                reason: format!("unknown scheme '{}'", self.scheme),
            })?;
        let entry = CoverageEntry {
            rate: self.rate,
            reimbursed_amount: self
                .reimbursed_amount
                .map(|s| parse_amount(&s, index))
                .transpose()?,
            patient_pays: self
                .patient_pays
                .map(|s| parse_amount(&s, index))
                .transpose()?,
        };
        Ok((scheme, entry))
    }
}

fn parse_amount(raw: &str, index: usize) -> SourceResult<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|e| SourceError::InvalidRecord {
        index,
        reason: format!("invalid amount '{}': {}", raw, e),
    })
}
