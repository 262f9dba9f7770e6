// 📄 Record - one spreadsheet row as delivered by a data source
// Header names vary between forms, so a row is kept as a plain map instead
// of being bound to a fixed struct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record - one row from a form-responses sheet
///
/// Fields are `header → text`. Nothing is validated here; the field
/// resolver decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Column header → cell text
    pub fields: HashMap<String, String>,

    // Provenance
    pub source: String, // Which sheet/file the row came from
    pub row: usize,     // 1-based sheet row (header is row 1)
}

impl Record {
    /// Create an empty record with provenance only
    pub fn new(source: impl Into<String>, row: usize) -> Self {
        Record {
            fields: HashMap::new(),
            source: source.into(),
            row,
        }
    }

    /// Build a record from `(header, value)` pairs
    pub fn from_pairs<K, V, I>(source: impl Into<String>, row: usize, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Record::new(source, row);
        for (key, value) in pairs {
            record.fields.insert(key.into(), value.into());
        }
        record
    }

    /// Builder pattern: add one field
    pub fn with_field(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(header.into(), value.into());
        self
    }

    /// Raw cell text for an exact header, if present
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(header).map(String::as_str)
    }

    /// First present, non-blank value among `keys`, trimmed
    ///
    /// Keys are tried in order; a header that exists but holds only
    /// whitespace counts as absent.
    pub fn first_present(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.get(key))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// Short provenance label for logs: `source#row`
    pub fn origin(&self) -> String {
        format!("{}#{}", self.source, self.row)
    }
}
