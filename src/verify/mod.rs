//! Verification engine
//!
//! Runs the configured verification pipelines against each ingested
//! measurement, maintains the primary-pipeline designation, and derives the
//! externally visible score and classification.

pub mod lookup;
pub mod pipeline;
pub mod state;

pub use lookup::{ApproxLocation, HttpTowerLookup, StaticTowerLookup, TowerLookup, TowerRecord};
pub use pipeline::{CheckContext, DefaultPipeline, VerificationPipeline, VerificationWeights};
pub use state::{CheckOutcome, CheckResolution, VerificationState};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::VerificationConfig;
use crate::error::Result;
use crate::operators::OperatorTable;
use crate::store::MeasurementStore;
use crate::types::CellMeasurement;

/// Trust classification derived from the primary score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellClassification {
    Trusted,
    Suspicious,
    Untrusted,
}

impl std::fmt::Display for CellClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellClassification::Trusted => write!(f, "trusted"),
            CellClassification::Suspicious => write!(f, "suspicious"),
            CellClassification::Untrusted => write!(f, "untrusted"),
        }
    }
}

/// Externally visible verification result of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub score: i64,
    pub finished: bool,
    pub classification: CellClassification,
}

/// Runs every configured pipeline and exposes the primary one
pub struct VerificationEngine {
    pipelines: Vec<Box<dyn VerificationPipeline>>,
    config: VerificationConfig,
    operators: Arc<OperatorTable>,
    lookup: Arc<dyn TowerLookup>,
    store: Arc<dyn MeasurementStore>,
    location: Option<ApproxLocation>,
}

impl VerificationEngine {
    pub fn new(
        config: VerificationConfig,
        operators: Arc<OperatorTable>,
        lookup: Arc<dyn TowerLookup>,
        store: Arc<dyn MeasurementStore>,
    ) -> Self {
        let pipelines: Vec<Box<dyn VerificationPipeline>> = vec![Box::new(DefaultPipeline::new(
            config.primary_pipeline.clone(),
            config.max_score,
            config.weights.clone(),
        ))];
        Self {
            pipelines,
            config,
            operators,
            lookup,
            store,
            location: None,
        }
    }

    /// Register an additional pipeline; the primary designation is purely
    /// by identifier, extra pipelines only add secondary states.
    pub fn add_pipeline(&mut self, pipeline: Box<dyn VerificationPipeline>) {
        self.pipelines.push(pipeline);
    }

    /// Supply the approximate device location handed to lookups
    pub fn set_location(&mut self, location: Option<ApproxLocation>) {
        self.location = location;
    }

    /// Run all pipelines for a stored measurement, persist each state, and
    /// return the primary verdict
    pub async fn verify(&self, measurement_id: i64, m: &CellMeasurement) -> Result<Verdict> {
        let ctx = CheckContext {
            operators: &self.operators,
            lookup: self.lookup.as_ref(),
            store: self.store.as_ref(),
            location: self.location,
        };

        let mut states = Vec::with_capacity(self.pipelines.len());
        for pipeline in &self.pipelines {
            let state = pipeline.run(m, &ctx).await?;
            self.store.save_verification(measurement_id, &state).await?;
            states.push(state);
        }

        let verdict = self.verdict_from(&states);
        info!(
            "Verified {} cell (mcc={}, mnc={}): score {} ({})",
            m.technology, m.country, m.network, verdict.score, verdict.classification
        );
        Ok(verdict)
    }

    /// Verdict for an already verified measurement, read back from the store
    pub async fn verdict_for(&self, measurement_id: i64) -> Result<Verdict> {
        let states = self.store.verifications(measurement_id).await?;
        Ok(self.verdict_from(&states))
    }

    /// Score and finished flag come exclusively from the primary pipeline's
    /// state, defaulting to 0/unfinished when it does not exist yet.
    pub fn verdict_from(&self, states: &[VerificationState]) -> Verdict {
        let primary = states
            .iter()
            .find(|s| s.pipeline == self.config.primary_pipeline);
        let (score, finished) = match primary {
            Some(state) => (state.score, state.finished),
            None => (0, false),
        };
        Verdict {
            score,
            finished,
            classification: self.classify(score),
        }
    }

    pub fn classify(&self, score: i64) -> CellClassification {
        if score >= self.config.trusted_min {
            CellClassification::Trusted
        } else if score >= self.config.suspicious_min {
            CellClassification::Suspicious
        } else {
            CellClassification::Untrusted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> VerificationEngine {
        let config = VerificationConfig::default();
        VerificationEngine::new(
            config,
            Arc::new(OperatorTable::default()),
            Arc::new(StaticTowerLookup::new(vec![])),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn test_primary_state_wins_over_secondary() {
        let engine = engine();
        let mut primary = VerificationState::new("default", 100);
        primary.record("operator", CheckResolution::Passed, 5, None);
        primary.finish();
        let secondary = VerificationState::new("experimental", 100);

        let verdict = engine.verdict_from(&[secondary, primary]);
        assert_eq!(verdict.score, 5);
        assert!(verdict.finished);
    }

    #[test]
    fn test_missing_primary_defaults_to_zero_unfinished() {
        let engine = engine();
        let secondary = VerificationState::new("experimental", 100);
        let verdict = engine.verdict_from(&[secondary]);
        assert_eq!(verdict.score, 0);
        assert!(!verdict.finished);
        assert_eq!(verdict.classification, CellClassification::Untrusted);
    }

    #[test]
    fn test_classification_thresholds() {
        let engine = engine();
        assert_eq!(engine.classify(0), CellClassification::Untrusted);
        assert_eq!(engine.classify(30), CellClassification::Suspicious);
        assert_eq!(engine.classify(59), CellClassification::Suspicious);
        assert_eq!(engine.classify(60), CellClassification::Trusted);
        assert_eq!(engine.classify(100), CellClassification::Trusted);
    }
}
