pub mod capture;
pub mod config;
pub mod decoder;
pub mod error;
pub mod operators;
pub mod parser;
pub mod store;
pub mod types;
pub mod verify;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use capture::CaptureClient;
use config::Config;
use error::{CellmonError, Result};
use operators::OperatorTable;
use parser::CellParser;
use store::MeasurementStore;
use types::{CellMeasurement, ConnectivityEvent};
use verify::{TowerLookup, Verdict, VerificationEngine};

/// Core cellmon instance wiring the capture-normalize-decode-verify pipeline
pub struct Cellmon {
    config: Config,
    parser: CellParser,
    engine: VerificationEngine,
    store: Arc<dyn MeasurementStore>,
    /// Last observed capture availability, for connectivity events
    capture_active: Mutex<Option<bool>>,
}

impl Cellmon {
    /// Create a new cellmon instance.
    ///
    /// Loads the operator reference table once; a missing dataset degrades
    /// to an empty table and is only logged.
    pub fn new(
        config: Config,
        store: Arc<dyn MeasurementStore>,
        lookup: Arc<dyn TowerLookup>,
    ) -> Self {
        let operators = Arc::new(OperatorTable::load(&config.operators.dataset_path));
        let engine = VerificationEngine::new(
            config.verification.clone(),
            operators,
            lookup,
            store.clone(),
        );

        Self {
            config,
            parser: CellParser::new(),
            engine,
            store,
            capture_active: Mutex::new(None),
        }
    }

    /// Ingest one diagnostic log line: parse, decode, persist, verify.
    ///
    /// Returns the storage id and verdict of every cell the line contained.
    pub async fn ingest_log_line(
        &self,
        line: &str,
        collected_at: DateTime<Utc>,
    ) -> Result<Vec<(i64, Verdict)>> {
        let cells = self.parser.parse(line, collected_at)?;
        let mut results = Vec::with_capacity(cells.len());
        for cell in cells {
            results.push(self.ingest_measurement(cell).await?);
        }
        Ok(results)
    }

    /// Ingest an already parsed measurement
    pub async fn ingest_measurement(
        &self,
        mut cell: CellMeasurement,
    ) -> Result<(i64, Verdict)> {
        if let Some(id) = cell.cell_id {
            match decoder::decode(
                cell.technology,
                id,
                Some(self.config.verification.nr_sector_bits),
            ) {
                Ok(decoded) => cell.decoded = Some(decoded),
                // out-of-domain id: keep the raw measurement, skip the
                // directory checks that need the decomposition
                Err(e) => warn!("Identifier decode failed: {}", e),
            }
        }

        let measurement_id = self.store.save_measurement(&cell).await?;
        let verdict = self.engine.verify(measurement_id, &cell).await?;
        Ok((measurement_id, verdict))
    }

    /// Forward a raw diagnostic packet to the store; the core never
    /// interprets the payload
    pub async fn ingest_packet(&self, packet: types::PacketRecord) -> Result<i64> {
        self.store.save_packet(&packet).await
    }

    /// Import a batch of archived log lines, skipping malformed ones
    pub async fn import_archive(
        &self,
        lines: impl IntoIterator<Item = (String, DateTime<Utc>)>,
    ) -> Result<Vec<(i64, Verdict)>> {
        let cells = self.parser.parse_batch(lines);
        let mut results = Vec::with_capacity(cells.len());
        for cell in cells {
            results.push(self.ingest_measurement(cell).await?);
        }
        info!("Imported {} cells from archive", results.len());
        Ok(results)
    }

    /// Poll the capture process once and ingest whatever it delivers.
    ///
    /// The capture payload is newline-separated diagnostic records, each
    /// timestamped at receipt. Connection-refused is an expected idle state
    /// and yields `Ok(None)`; availability flips are recorded as
    /// connectivity events.
    pub async fn poll_capture(&self) -> Result<Option<Vec<(i64, Verdict)>>> {
        let mut client = CaptureClient::new(self.config.capture.port);
        match client.query().await {
            Ok(payload) => {
                self.record_capture_transition(true).await?;
                let now = Utc::now();
                let lines = String::from_utf8_lossy(&payload)
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| (l.to_string(), now))
                    .collect::<Vec<_>>();
                Ok(Some(self.import_archive(lines).await?))
            }
            Err(CellmonError::ConnectionRefused) => {
                self.record_capture_transition(false).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Record a connectivity event when capture availability flips
    async fn record_capture_transition(&self, active: bool) -> Result<()> {
        let flipped = {
            let mut last = self.capture_active.lock().await;
            let flipped = *last != Some(active);
            *last = Some(active);
            flipped
        };
        if flipped {
            let event = ConnectivityEvent::new(active, None);
            info!("Capture link changed: {}", event.label());
            self.store.record_event(&event).await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn MeasurementStore> {
        &self.store
    }
}
