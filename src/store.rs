//! Persistence seam
//!
//! The core never owns storage. Everything it persists goes through
//! [`MeasurementStore`]; the in-memory implementation backs tests and the
//! CLI demo, real deployments plug in their own engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{CellMeasurement, ConnectivityEvent, PacketRecord};
use crate::verify::VerificationState;

/// Repository interface for everything the pipeline persists
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Persist a measurement, returning its storage id
    async fn save_measurement(&self, measurement: &CellMeasurement) -> Result<i64>;

    /// Persist a raw diagnostic packet, returning its storage id
    async fn save_packet(&self, packet: &PacketRecord) -> Result<i64>;

    /// Record a connectivity event
    async fn record_event(&self, event: &ConnectivityEvent) -> Result<()>;

    /// Create or replace the verification state of a measurement for the
    /// state's pipeline
    async fn save_verification(&self, measurement_id: i64, state: &VerificationState)
        -> Result<()>;

    /// Verification state of a measurement under one pipeline, if any
    async fn verification_by_pipeline(
        &self,
        measurement_id: i64,
        pipeline: &str,
    ) -> Result<Option<VerificationState>>;

    /// All verification states recorded for a measurement
    async fn verifications(&self, measurement_id: i64) -> Result<Vec<VerificationState>>;

    /// How often the (country, network, station) triple has been observed
    async fn count_cells(&self, country: i64, network: i64, station: i64) -> Result<u64>;

    /// How many packets a SIM slot has produced
    async fn count_packets(&self, slot: u8) -> Result<u64>;
}

/// In-memory store for tests and the CLI demo
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    measurements: RwLock<HashMap<i64, CellMeasurement>>,
    packets: RwLock<HashMap<i64, PacketRecord>>,
    events: RwLock<Vec<ConnectivityEvent>>,
    verifications: RwLock<HashMap<(i64, String), VerificationState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn measurement(&self, id: i64) -> Option<CellMeasurement> {
        self.measurements.read().await.get(&id).cloned()
    }

    pub async fn events(&self) -> Vec<ConnectivityEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    async fn save_measurement(&self, measurement: &CellMeasurement) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.measurements.write().await.insert(id, measurement.clone());
        Ok(id)
    }

    async fn save_packet(&self, packet: &PacketRecord) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.packets.write().await.insert(id, packet.clone());
        Ok(id)
    }

    async fn record_event(&self, event: &ConnectivityEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn save_verification(
        &self,
        measurement_id: i64,
        state: &VerificationState,
    ) -> Result<()> {
        self.verifications
            .write()
            .await
            .insert((measurement_id, state.pipeline.clone()), state.clone());
        Ok(())
    }

    async fn verification_by_pipeline(
        &self,
        measurement_id: i64,
        pipeline: &str,
    ) -> Result<Option<VerificationState>> {
        Ok(self
            .verifications
            .read()
            .await
            .get(&(measurement_id, pipeline.to_string()))
            .cloned())
    }

    async fn verifications(&self, measurement_id: i64) -> Result<Vec<VerificationState>> {
        Ok(self
            .verifications
            .read()
            .await
            .iter()
            .filter(|((id, _), _)| *id == measurement_id)
            .map(|(_, state)| state.clone())
            .collect())
    }

    async fn count_cells(&self, country: i64, network: i64, station: i64) -> Result<u64> {
        Ok(self
            .measurements
            .read()
            .await
            .values()
            .filter(|m| {
                m.country == country
                    && m.network == network
                    && m.decoded.map(|d| d.station) == Some(station)
            })
            .count() as u64)
    }

    async fn count_packets(&self, slot: u8) -> Result<u64> {
        Ok(self
            .packets
            .read()
            .await
            .values()
            .filter(|p| p.slot == slot)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CaptureSource, CellRole, DecodedIdentifier, Technology};
    use chrono::Utc;

    #[tokio::test]
    async fn test_count_cells_by_triple() {
        let store = MemoryStore::new();
        let mut m = CellMeasurement::new(
            Technology::Lte,
            CellRole::Serving,
            CaptureSource::Baseband,
            Utc::now(),
        );
        m.country = 262;
        m.network = 1;
        m.decoded = Some(DecodedIdentifier {
            station: 4822,
            sector: 119,
        });

        store.save_measurement(&m).await.unwrap();
        store.save_measurement(&m).await.unwrap();

        assert_eq!(store.count_cells(262, 1, 4822).await.unwrap(), 2);
        assert_eq!(store.count_cells(262, 1, 9999).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_verification_lookup_by_pipeline() {
        let store = MemoryStore::new();
        let state = VerificationState::new("primary", 100);
        store.save_verification(7, &state).await.unwrap();

        assert!(store
            .verification_by_pipeline(7, "primary")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .verification_by_pipeline(7, "secondary")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.verifications(7).await.unwrap().len(), 1);
    }
}
