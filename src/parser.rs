//! Diagnostic log record parser
//!
//! Turns one `CellMonitor` diagnostic log line into canonical
//! [`CellMeasurement`] records. The textual schema of these lines changed
//! incompatibly across OS releases: older builds emit verbose
//! `kCTCellMonitor*` keys, newer builds short keys (`cellID`, `rsrp`).
//! Both conventions can appear in the same input, so every field is looked
//! up through an ordered key-fallback list that is easy to extend when yet
//! another schema variant shows up.

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CellmonError, Result};
use crate::types::{CaptureSource, CellMeasurement, CellRole, Technology};

/// Ordered key aliases for one canonical field, newest convention first
struct FieldKeys {
    canonical: &'static str,
    fallbacks: &'static [&'static str],
}

const CELL_TYPE: FieldKeys = FieldKeys {
    canonical: "cellType",
    fallbacks: &["kCTCellMonitorCellType"],
};
const RAT: FieldKeys = FieldKeys {
    canonical: "radioAccessTechnology",
    fallbacks: &["kCTCellMonitorRadioAccessTechnology"],
};
const CELL_ID: FieldKeys = FieldKeys {
    canonical: "cellID",
    fallbacks: &["kCTCellMonitorCellId"],
};
const MCC: FieldKeys = FieldKeys {
    canonical: "mcc",
    fallbacks: &["kCTCellMonitorMCC"],
};
const MNC: FieldKeys = FieldKeys {
    canonical: "mnc",
    fallbacks: &["kCTCellMonitorMNC"],
};
const AREA: FieldKeys = FieldKeys {
    canonical: "tac",
    fallbacks: &["lac", "kCTCellMonitorTAC", "kCTCellMonitorLAC"],
};
const PCI: FieldKeys = FieldKeys {
    canonical: "pci",
    fallbacks: &["kCTCellMonitorPCI", "kCTCellMonitorPSC"],
};
const FREQUENCY: FieldKeys = FieldKeys {
    canonical: "uarfcn",
    fallbacks: &["arfcn", "kCTCellMonitorUARFCN", "kCTCellMonitorARFCN"],
};
const BANDWIDTH: FieldKeys = FieldKeys {
    canonical: "bandwidth",
    fallbacks: &["kCTCellMonitorBandwidth"],
};
const RSRP: FieldKeys = FieldKeys {
    canonical: "rsrp",
    fallbacks: &["kCTCellMonitorRSRP"],
};
const RSRQ: FieldKeys = FieldKeys {
    canonical: "rsrq",
    fallbacks: &["kCTCellMonitorRSRQ"],
};
const DEPLOYMENT: FieldKeys = FieldKeys {
    canonical: "deploymentType",
    fallbacks: &["kCTCellMonitorDeploymentType"],
};

const LEGACY_RAT_PREFIX: &str = "kCTCellMonitorRadioAccessTechnology";
const SERVING_VALUES: &[&str] = &["serving", "kCTCellMonitorCellTypeServing"];
const NEIGHBOR_VALUES: &[&str] = &[
    "neighbor",
    "neighbour",
    "kCTCellMonitorCellTypeNeighbor",
    "kCTCellMonitorCellTypeNeighbour",
];

/// Parser for CellMonitor diagnostic log lines
pub struct CellParser {
    kv_regex: Regex,
}

impl Default for CellParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CellParser {
    pub fn new() -> Self {
        // `key = value;` plist style as well as `key: value,` JSON-ish style,
        // keys and values optionally quoted
        let kv_regex = Regex::new(
            r#""?([A-Za-z][A-Za-z0-9_]*)"?\s*[=:]\s*"?([A-Za-z0-9+\-\.]+)"?\s*[;,]?"#,
        )
        .expect("key-value regex is valid");
        Self { kv_regex }
    }

    /// Parse one log line into its embedded cell entries.
    ///
    /// The first block is expected to be the serving cell; trailing blocks
    /// are neighbors. `timestamp` is the collection time attributed to every
    /// record from this line. A malformed first block fails the whole line,
    /// but a malformed trailing block only loses that block: the serving
    /// cell already parsed is still worth keeping.
    pub fn parse(&self, message: &str, timestamp: DateTime<Utc>) -> Result<Vec<CellMeasurement>> {
        let blocks = extract_blocks(message);
        if blocks.is_empty() {
            return Err(CellmonError::MalformedRecord(
                "no cell block found in message".to_string(),
            ));
        }

        let mut cells = Vec::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            match self.parse_block(block, timestamp) {
                Ok(cell) => cells.push(cell),
                Err(e) if i > 0 => warn!("Skipping malformed trailing cell block: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(cells)
    }

    /// Parse a batch of lines, skipping malformed ones.
    ///
    /// A single bad line must never abort the rest of an archive import.
    pub fn parse_batch(
        &self,
        lines: impl IntoIterator<Item = (String, DateTime<Utc>)>,
    ) -> Vec<CellMeasurement> {
        let mut cells = Vec::new();
        for (line, timestamp) in lines {
            match self.parse(&line, timestamp) {
                Ok(mut parsed) => cells.append(&mut parsed),
                Err(e) => warn!("Skipping malformed log line: {}", e),
            }
        }
        cells
    }

    fn parse_block(&self, block: &str, timestamp: DateTime<Utc>) -> Result<CellMeasurement> {
        let fields = self.extract_fields(block);

        let role = match lookup(&fields, &CELL_TYPE) {
            Some(v) if SERVING_VALUES.contains(&v) => CellRole::Serving,
            Some(v) if NEIGHBOR_VALUES.contains(&v) => CellRole::Neighbor,
            // absent type field: treat as serving, matching the oldest logs
            None => CellRole::Serving,
            Some(other) => {
                return Err(CellmonError::MalformedRecord(format!(
                    "unknown cell type: {}",
                    other
                )))
            }
        };

        let technology = parse_technology(lookup(&fields, &RAT).ok_or_else(|| {
            CellmonError::MalformedRecord("missing radio access technology".to_string())
        })?)?;

        let mut cell =
            CellMeasurement::new(technology, role, CaptureSource::LogArchive, timestamp);

        cell.cell_id = match lookup(&fields, &CELL_ID) {
            Some(raw) => Some(parse_int(CELL_ID.canonical, raw)?),
            None if role == CellRole::Serving => {
                return Err(CellmonError::MalformedRecord(
                    "serving cell without cell identifier".to_string(),
                ))
            }
            None => None,
        };
        cell.country = int_or_zero(&fields, &MCC)?;
        cell.network = int_or_zero(&fields, &MNC)?;
        cell.area = int_or_zero(&fields, &AREA)?;
        cell.physical_cell_id = int_or_zero(&fields, &PCI)?;
        cell.frequency = int_or_zero(&fields, &FREQUENCY)?;
        cell.bandwidth = int_or_zero(&fields, &BANDWIDTH)?;
        cell.rsrp = int_or_zero(&fields, &RSRP)?;
        cell.rsrq = int_or_zero(&fields, &RSRQ)?;
        cell.deployment_type = int_or_zero(&fields, &DEPLOYMENT)?;

        debug!(
            "Parsed {} {:?} cell (mcc={}, mnc={})",
            cell.technology, cell.role, cell.country, cell.network
        );
        Ok(cell)
    }

    fn extract_fields<'a>(&self, block: &'a str) -> Vec<(&'a str, &'a str)> {
        self.kv_regex
            .captures_iter(block)
            .filter_map(|cap| {
                let key = cap.get(1)?.as_str();
                let value = cap.get(2)?.as_str();
                Some((key, value.trim()))
            })
            .collect()
    }
}

/// Find the value for a field by trying its canonical key, then each
/// fallback in order
fn lookup<'a>(fields: &[(&'a str, &'a str)], keys: &FieldKeys) -> Option<&'a str> {
    std::iter::once(keys.canonical)
        .chain(keys.fallbacks.iter().copied())
        .find_map(|key| fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v))
}

fn parse_int(field: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| {
        CellmonError::MalformedRecord(format!("field {} is not an integer: {}", field, raw))
    })
}

fn int_or_zero(fields: &[(&str, &str)], keys: &FieldKeys) -> Result<i64> {
    match lookup(fields, keys) {
        Some(raw) => parse_int(keys.canonical, raw),
        None => Ok(0),
    }
}

fn parse_technology(raw: &str) -> Result<Technology> {
    let name = raw.strip_prefix(LEGACY_RAT_PREFIX).unwrap_or(raw);
    name.parse()
        .map_err(|e: String| CellmonError::MalformedRecord(e))
}

/// Extract top-level brace-delimited blocks from the message.
///
/// Blocks may span embedded newlines and carry arbitrary whitespace around
/// the delimiters; nested braces stay inside their enclosing block.
fn extract_blocks(message: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in message.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        blocks.push(&message[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    blocks
}
