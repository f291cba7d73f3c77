//! External tower reference lookup
//!
//! Consumed interface to the crowd-sourced directory of known cell towers.
//! A lookup failure is never fatal: the engine maps it to a neutral check
//! outcome and keeps going.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CellmonError, Result};
use crate::types::Technology;

/// Approximate device location passed alongside a lookup
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApproxLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// A known tower returned by the reference directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowerRecord {
    pub technology: Technology,
    pub country: i64,
    pub network: i64,
    pub station: i64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Reference-lookup collaborator consumed by the verification engine
#[async_trait]
pub trait TowerLookup: Send + Sync {
    /// Find a known station matching the decoded identifier near the given
    /// prior location. `Ok(None)` means the directory does not know the
    /// station; `Err(LookupUnavailable)` means the directory could not be
    /// asked at all.
    async fn find_station(
        &self,
        technology: Technology,
        country: i64,
        network: i64,
        station: i64,
        near: Option<ApproxLocation>,
    ) -> Result<Option<TowerRecord>>;
}

/// HTTP implementation against a cell-directory web API
pub struct HttpTowerLookup {
    client: Client,
    endpoint: String,
}

impl HttpTowerLookup {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("cellmon/0.3")
            .build()
            .map_err(|e| CellmonError::LookupUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TowerLookup for HttpTowerLookup {
    async fn find_station(
        &self,
        technology: Technology,
        country: i64,
        network: i64,
        station: i64,
        near: Option<ApproxLocation>,
    ) -> Result<Option<TowerRecord>> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("technology", technology.to_string())])
            .query(&[
                ("mcc", country),
                ("mnc", network),
                ("station", station),
            ]);
        if let Some(loc) = near {
            request = request.query(&[("lat", loc.latitude), ("lon", loc.longitude)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CellmonError::LookupUnavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| CellmonError::LookupUnavailable(e.to_string()))?;

        let towers: Vec<TowerRecord> = response
            .json()
            .await
            .map_err(|e| CellmonError::LookupUnavailable(e.to_string()))?;

        debug!(
            "Tower lookup for station {} returned {} records",
            station,
            towers.len()
        );
        Ok(towers.into_iter().next())
    }
}

/// Fixed-answer lookup for tests and offline use
pub struct StaticTowerLookup {
    towers: Vec<TowerRecord>,
    /// When set, every call fails as unreachable
    pub unreachable: bool,
}

impl StaticTowerLookup {
    pub fn new(towers: Vec<TowerRecord>) -> Self {
        Self {
            towers,
            unreachable: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            towers: Vec::new(),
            unreachable: true,
        }
    }
}

#[async_trait]
impl TowerLookup for StaticTowerLookup {
    async fn find_station(
        &self,
        technology: Technology,
        country: i64,
        network: i64,
        station: i64,
        _near: Option<ApproxLocation>,
    ) -> Result<Option<TowerRecord>> {
        if self.unreachable {
            return Err(CellmonError::LookupUnavailable(
                "no network reachability".to_string(),
            ));
        }
        Ok(self
            .towers
            .iter()
            .find(|t| {
                t.technology == technology
                    && t.country == country
                    && t.network == network
                    && t.station == station
            })
            .cloned())
    }
}
