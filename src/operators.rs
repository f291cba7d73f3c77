//! Network operator reference table
//!
//! Resolves (mobile country code, mobile network code) pairs to operator
//! identities out of a bundled, gzip-compressed JSON dataset. The table is
//! built once at startup and read-only afterwards; a missing or corrupt
//! dataset degrades to an empty table so ingestion keeps running.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One reference entry from the operator dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkOperator {
    /// Mobile country code
    pub country: i64,
    /// Mobile network code
    pub network: i64,
    /// ISO 3166-1 alpha-2 country code
    pub iso: String,
    pub country_name: String,
    #[serde(default)]
    pub country_numeric: Option<i64>,
    /// Operator brand name; the dataset leaves this empty for some entries
    #[serde(default)]
    pub network_name: Option<String>,
}

/// Country fields returned when no (country, network) match exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryInfo {
    pub iso: String,
    pub name: String,
}

/// Immutable two-level lookup table: country code → network code → entries
#[derive(Debug, Default)]
pub struct OperatorTable {
    networks: HashMap<i64, HashMap<i64, Vec<NetworkOperator>>>,
    /// First dataset entry seen per country, for the country-only fallback
    countries: HashMap<i64, CountryInfo>,
}

impl OperatorTable {
    /// Build the table from a gzip-compressed JSON array of entries.
    ///
    /// Any load or decode failure yields an empty table; the error is
    /// logged, never propagated.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(path.as_ref()) {
            Ok(table) => {
                info!(
                    "Loaded operator dataset: {} countries",
                    table.countries.len()
                );
                table
            }
            Err(e) => {
                warn!(
                    "Failed to load operator dataset from {}: {}. Resolving against an empty table.",
                    path.as_ref().display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(GzDecoder::new(file));
        let entries: Vec<NetworkOperator> = serde_json::from_reader(reader)?;
        Ok(Self::from_entries(entries))
    }

    /// Build the table from already-decoded entries, preserving input order
    pub fn from_entries(entries: Vec<NetworkOperator>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            table
                .countries
                .entry(entry.country)
                .or_insert_with(|| CountryInfo {
                    iso: entry.iso.clone(),
                    name: entry.country_name.clone(),
                });
            table
                .networks
                .entry(entry.country)
                .or_default()
                .entry(entry.network)
                .or_default()
                .push(entry);
        }
        table
    }

    /// Resolve an operator for a (country, network) pair.
    ///
    /// When several dataset entries share the pair, the first one carrying a
    /// non-empty network name wins; otherwise the first entry in dataset
    /// order is returned.
    pub fn resolve(&self, country: i64, network: i64) -> Option<&NetworkOperator> {
        let candidates = self.networks.get(&country)?.get(&network)?;
        candidates
            .iter()
            .find(|op| op.network_name.as_deref().is_some_and(|n| !n.is_empty()))
            .or_else(|| candidates.first())
    }

    /// Country-only fallback when no (country, network) entry matches
    pub fn resolve_country(&self, country: i64) -> Option<&CountryInfo> {
        self.countries.get(&country)
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(country: i64, network: i64, name: Option<&str>) -> NetworkOperator {
        NetworkOperator {
            country,
            network,
            iso: "de".to_string(),
            country_name: "Germany".to_string(),
            country_numeric: Some(276),
            network_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_resolve_prefers_named_entry() {
        // named entry must win regardless of insertion order
        let forward = OperatorTable::from_entries(vec![
            entry(262, 1, Some("Telekom")),
            entry(262, 1, None),
        ]);
        let reverse = OperatorTable::from_entries(vec![
            entry(262, 1, None),
            entry(262, 1, Some("Telekom")),
        ]);
        for table in [&forward, &reverse] {
            let op = table.resolve(262, 1).unwrap();
            assert_eq!(op.network_name.as_deref(), Some("Telekom"));
        }
    }

    #[test]
    fn test_resolve_falls_back_to_first() {
        let table = OperatorTable::from_entries(vec![
            entry(262, 2, None),
            entry(262, 2, Some("")),
        ]);
        let op = table.resolve(262, 2).unwrap();
        assert!(op.network_name.is_none());
    }

    #[test]
    fn test_resolve_missing_levels() {
        let table = OperatorTable::from_entries(vec![entry(262, 1, Some("Telekom"))]);
        assert!(table.resolve(262, 99).is_none());
        assert!(table.resolve(310, 1).is_none());
    }

    #[test]
    fn test_resolve_country() {
        let table = OperatorTable::from_entries(vec![entry(262, 1, Some("Telekom"))]);
        let info = table.resolve_country(262).unwrap();
        assert_eq!(info.iso, "de");
        assert_eq!(info.name, "Germany");
        assert!(table.resolve_country(1).is_none());
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let table = OperatorTable::load("/nonexistent/operators.json.gz");
        assert!(table.is_empty());
        assert!(table.resolve(262, 1).is_none());
    }
}
