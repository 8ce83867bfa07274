//! Catalog data sources.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::MedicationEntry;

/// Errors raised while reading a catalog source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid record at position {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Catalog source is empty: {0}")]
    Empty(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Something the catalog can be read from.
///
/// Implementations may block on I/O; the store calls `read` at most once per
/// load attempt.
pub trait CatalogSource: Send + Sync {
    /// Human-readable origin, used in logs and catalog metadata.
    fn describe(&self) -> String;

    /// Read every entry, in catalog order.
    fn read(&self) -> SourceResult<Vec<MedicationEntry>>;
}

impl<S: CatalogSource + ?Sized> CatalogSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn read(&self) -> SourceResult<Vec<MedicationEntry>> {
        (**self).read()
    }
}

#[derive(Debug, Clone)]
enum JsonInput {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// A JSON array of medication objects, from a file or a bundled buffer.
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    input: JsonInput,
}

impl JsonCatalogSource {
    /// Read the catalog from a JSON file on each load.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            input: JsonInput::Path(path.into()),
        }
    }

    /// Read the catalog from bytes already in memory (e.g., an app asset).
    pub fn from_bytes<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Self {
            input: JsonInput::Bytes(bytes.into()),
        }
    }
}

impl CatalogSource for JsonCatalogSource {
    fn describe(&self) -> String {
        match &self.input {
            JsonInput::Path(path) => format!("json:{}", path.display()),
            JsonInput::Bytes(bytes) => format!("json:<{} bytes>", bytes.len()),
        }
    }

    fn read(&self) -> SourceResult<Vec<MedicationEntry>> {
        let entries = match &self.input {
            JsonInput::Path(path) => {
                let bytes = std::fs::read(path)?;
                serde_json::from_slice(&bytes)?
            }
            JsonInput::Bytes(bytes) => serde_json::from_slice(bytes)?,
        };
        Ok(entries)
    }
}

/// A list already parsed by an external loader.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    entries: Vec<MedicationEntry>,
}

impl StaticCatalogSource {
    pub fn new(entries: Vec<MedicationEntry>) -> Self {
        Self { entries }
    }
}

impl CatalogSource for StaticCatalogSource {
    fn describe(&self) -> String {
        format!("static:<{} entries>", self.entries.len())
    }

    fn read(&self) -> SourceResult<Vec<MedicationEntry>> {
        Ok(self.entries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {"name": "Doliprane 1000mg", "activeIngredient": "Paracetamol", "publicPrice": 15.0,
         "schemeCoverage": {"SchemeA": {"rate": 70}}},
        {"name": "Advil 400mg", "activeIngredient": "Ibuprofene", "publicPrice": "22.40"}
    ]"#;

    #[test]
    fn test_json_from_bytes() {
        let source = JsonCatalogSource::from_bytes(SAMPLE.as_bytes().to_vec());
        let entries = source.read().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "Advil 400mg");
        assert!(source.describe().starts_with("json:<"));
    }

    #[test]
    fn test_json_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = JsonCatalogSource::from_path(file.path());
        assert_eq!(source.read().unwrap().len(), 2);
    }

    #[test]
    fn test_json_missing_file() {
        let source = JsonCatalogSource::from_path("/nonexistent/catalog.json");
        assert!(matches!(source.read(), Err(SourceError::Io(_))));
    }

    #[test]
    fn test_json_malformed() {
        let source = JsonCatalogSource::from_bytes(b"[{\"name\": ".to_vec());
        assert!(matches!(source.read(), Err(SourceError::Json(_))));
    }
}
