//! Configuration
//!
//! TOML configuration with defaults for every section, loaded from the
//! usual locations or a path given on the command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::verify::VerificationWeights;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub operators: OperatorsConfig,

    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds between capture polls in daemon mode
    pub poll_interval_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Loopback TCP port of the local capture process
    pub port: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { port: 3367 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorsConfig {
    /// Path to the gzip-compressed operator dataset
    pub dataset_path: String,
}

impl Default for OperatorsConfig {
    fn default() -> Self {
        Self {
            dataset_path: "operators.json.gz".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Pipeline whose score/finished state is authoritative
    pub primary_pipeline: String,
    /// Upper bound of the accumulated score
    pub max_score: i64,
    /// Minimum score for a trusted classification
    pub trusted_min: i64,
    /// Minimum score for a suspicious (rather than untrusted) classification
    pub suspicious_min: i64,
    /// Tower directory endpoint. Must speak the station-query contract:
    /// GET with technology/mcc/mnc/station parameters answered by a JSON
    /// array of tower records. The default assumes a self-hosted directory
    /// on the local machine.
    pub lookup_endpoint: String,
    pub lookup_timeout_secs: u64,
    /// NR sector-id bit width used when decoding NCIs
    pub nr_sector_bits: u8,
    #[serde(default)]
    pub weights: VerificationWeights,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            primary_pipeline: "default".to_string(),
            max_score: 100,
            trusted_min: 60,
            suspicious_min: 30,
            lookup_endpoint: "http://127.0.0.1:8090/v1/stations".to_string(),
            lookup_timeout_secs: 10,
            nr_sector_bits: 4,
            weights: VerificationWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/cellmon/config.toml"),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.capture.port, config.capture.port);
        assert_eq!(parsed.verification.primary_pipeline, "default");
    }

    #[test]
    fn test_default_endpoint_is_a_station_query() {
        // the HTTP lookup sends station parameters and expects a tower
        // array back; the shipped default must point at such a directory
        let config = VerificationConfig::default();
        assert!(config.lookup_endpoint.ends_with("/stations"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str("[capture]\nport = 4242\n").unwrap();
        assert_eq!(parsed.capture.port, 4242);
        assert_eq!(parsed.verification.max_score, 100);
        assert_eq!(parsed.general.poll_interval_secs, 15);
    }
}
