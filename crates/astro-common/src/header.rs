//! Raw header key/value pairs as handed over by the file reader.
//!
//! The map is only consulted once, when typed structures such as the WCS
//! descriptor are built from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AstroError, AstroResult};

/// Header keywords of a loaded volume.
///
/// Keys are normalised to upper case; string values have surrounding FITS
/// quotes and padding removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct HeaderMap {
    entries: BTreeMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a keyword.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.entries
            .insert(normalize_key(key.as_ref()), normalize_value(value.as_ref()));
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl ToString) -> Self {
        self.insert(key, value.to_string());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    /// Raw string value of a keyword.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(String::as_str)
    }

    /// Parse a keyword as a float. Missing keywords are `Ok(None)`.
    pub fn get_f64(&self, key: &str) -> AstroResult<Option<f64>> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => parse_fits_float(raw)
                .map(Some)
                .ok_or_else(|| AstroError::invalid_header(key, format!("'{}' is not a number", raw))),
        }
    }

    /// Parse a keyword as an integer. Missing keywords are `Ok(None)`.
    pub fn get_i64(&self, key: &str) -> AstroResult<Option<i64>> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| AstroError::invalid_header(key, format!("'{}' is not an integer", raw))),
        }
    }

    /// Float keyword with a default for missing values.
    pub fn f64_or(&self, key: &str, default: f64) -> AstroResult<f64> {
        Ok(self.get_f64(key)?.unwrap_or(default))
    }

    /// Float keyword that must be present.
    pub fn require_f64(&self, key: &str) -> AstroResult<f64> {
        self.get_f64(key)?
            .ok_or_else(|| AstroError::invalid_header(key, "keyword is missing"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl From<BTreeMap<String, String>> for HeaderMap {
    fn from(raw: BTreeMap<String, String>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<HeaderMap> for BTreeMap<String, String> {
    fn from(header: HeaderMap) -> Self {
        header.entries
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

fn normalize_value(value: &str) -> String {
    let trimmed = value.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// FITS allows Fortran-style `D` exponents.
fn parse_fits_float(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(['D', 'd'], "E");
    cleaned.parse::<f64>().ok()
}
