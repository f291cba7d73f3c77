//! Cell measurement model
//!
//! A [`CellMeasurement`] is one observed serving or neighbor cell at a point
//! in time, normalized from whichever capture source produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Radio access technology of an observed cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Technology {
    Gsm,
    Scdma,
    Cdma,
    Umts,
    Lte,
    Nr,
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Technology::Gsm => write!(f, "GSM"),
            Technology::Scdma => write!(f, "SCDMA"),
            Technology::Cdma => write!(f, "CDMA"),
            Technology::Umts => write!(f, "UMTS"),
            Technology::Lte => write!(f, "LTE"),
            Technology::Nr => write!(f, "NR"),
        }
    }
}

impl std::str::FromStr for Technology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GSM" => Ok(Technology::Gsm),
            "SCDMA" | "TD-SCDMA" => Ok(Technology::Scdma),
            "CDMA" => Ok(Technology::Cdma),
            "UMTS" | "WCDMA" => Ok(Technology::Umts),
            "LTE" => Ok(Technology::Lte),
            "NR" | "5G" => Ok(Technology::Nr),
            other => Err(format!("unknown radio access technology: {}", other)),
        }
    }
}

/// Whether the device was camped on the cell or merely saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRole {
    Serving,
    Neighbor,
}

/// Where the measurement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Live baseband capture from the local capture process
    Baseband,
    /// Imported from an offline diagnostic log archive
    LogArchive,
}

/// Compound cell identifier split into its structural components
///
/// Derived from [`CellMeasurement::cell_id`] by the decoder; never stored
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedIdentifier {
    /// Macro base station id (BTS / RNC / eNodeB / gNodeB)
    pub station: i64,
    /// Sector / sub-cell id within the station
    pub sector: i64,
}

/// One observed serving or neighbor cell at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellMeasurement {
    pub technology: Technology,
    /// Mobile country code
    pub country: i64,
    /// Mobile network code
    pub network: i64,
    /// Compound cell identifier, technology-specific bit layout.
    /// Absent for neighbor cells that only report physical-layer fields.
    pub cell_id: Option<i64>,
    /// Location / tracking area code
    pub area: i64,
    /// Physical cell id / PSC / sector scrambling identity
    pub physical_cell_id: i64,
    /// ARFCN / EARFCN / NR-ARFCN
    pub frequency: i64,
    /// Channel bandwidth as reported by the baseband
    pub bandwidth: i64,
    /// Reference signal received power (or technology equivalent)
    pub rsrp: i64,
    /// Reference signal received quality (or technology equivalent)
    pub rsrq: i64,
    /// Deployment type flag; for LTE a value > 0 indicates 5G NSA anchoring
    pub deployment_type: i64,
    pub role: CellRole,
    pub source: CaptureSource,
    /// SIM slot the measurement belongs to (multi-SIM devices)
    pub slot: u8,
    /// When the baseband observed the cell
    pub collected_at: DateTime<Utc>,
    /// When cellmon ingested the record
    pub imported_at: DateTime<Utc>,
    /// Attached after ingest; present for all serving cells with a cell id
    pub decoded: Option<DecodedIdentifier>,
}

impl CellMeasurement {
    /// Empty record for a given role and source, fields defaulting to zero
    pub fn new(
        technology: Technology,
        role: CellRole,
        source: CaptureSource,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            technology,
            country: 0,
            network: 0,
            cell_id: None,
            area: 0,
            physical_cell_id: 0,
            frequency: 0,
            bandwidth: 0,
            rsrp: 0,
            rsrq: 0,
            deployment_type: 0,
            role,
            source,
            slot: 0,
            collected_at,
            imported_at: Utc::now(),
            decoded: None,
        }
    }

    /// Whether this LTE cell anchors a 5G NSA deployment
    pub fn supports_nsa(&self) -> bool {
        self.technology == Technology::Lte && self.deployment_type > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technology_roundtrip() {
        for s in ["GSM", "UMTS", "LTE", "NR"] {
            let tech: Technology = s.parse().unwrap();
            assert_eq!(tech.to_string(), s);
        }
        assert!("FOO".parse::<Technology>().is_err());
    }

    #[test]
    fn test_nsa_flag() {
        let mut m = CellMeasurement::new(
            Technology::Lte,
            CellRole::Serving,
            CaptureSource::Baseband,
            Utc::now(),
        );
        assert!(!m.supports_nsa());
        m.deployment_type = 2;
        assert!(m.supports_nsa());
        m.technology = Technology::Nr;
        assert!(!m.supports_nsa());
    }
}
