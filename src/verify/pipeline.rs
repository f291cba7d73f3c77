//! Verification pipelines and their checks
//!
//! A pipeline is a named sequence of independent checks run against one
//! measurement. Every check must resolve (pass, fail, or neutral); a check
//! that cannot produce evidence records a neutral outcome instead of
//! blocking the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lookup::{ApproxLocation, TowerLookup};
use super::state::{CheckResolution, VerificationState};
use crate::error::{CellmonError, Result};
use crate::operators::OperatorTable;
use crate::store::MeasurementStore;
use crate::types::{CellMeasurement, CellRole};

/// Score deltas contributed by the individual checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationWeights {
    /// Operator resolved from the reference table
    pub operator_known: i64,
    /// Neither operator nor country known
    pub operator_unknown: i64,
    /// Decoded station confirmed by the tower directory
    pub tower_found: i64,
    /// Directory reachable but does not know the station
    pub tower_unknown: i64,
    /// The (country, network, station) triple was observed before
    pub seen_before: i64,
}

impl Default for VerificationWeights {
    fn default() -> Self {
        Self {
            operator_known: 25,
            operator_unknown: 10,
            tower_found: 50,
            tower_unknown: 25,
            seen_before: 25,
        }
    }
}

/// Shared collaborators handed to every pipeline run
pub struct CheckContext<'a> {
    pub operators: &'a OperatorTable,
    pub lookup: &'a dyn TowerLookup,
    pub store: &'a dyn MeasurementStore,
    /// Approximate device location at collection time, when known
    pub location: Option<ApproxLocation>,
}

/// A named, independently scored verification pipeline
#[async_trait]
pub trait VerificationPipeline: Send + Sync {
    fn id(&self) -> &str;

    /// Run all checks against the measurement. The returned state has every
    /// check resolved and `finished` set.
    async fn run(&self, measurement: &CellMeasurement, ctx: &CheckContext<'_>)
        -> Result<VerificationState>;
}

/// Default pipeline: operator table, tower directory, observation history,
/// plus the informational 5G-NSA flag
pub struct DefaultPipeline {
    id: String,
    max_score: i64,
    weights: VerificationWeights,
}

impl DefaultPipeline {
    pub fn new(id: impl Into<String>, max_score: i64, weights: VerificationWeights) -> Self {
        Self {
            id: id.into(),
            max_score,
            weights,
        }
    }

    async fn check_operator(&self, state: &mut VerificationState, m: &CellMeasurement, ctx: &CheckContext<'_>) {
        match ctx.operators.resolve(m.country, m.network) {
            Some(op) => state.record(
                "operator",
                CheckResolution::Passed,
                self.weights.operator_known,
                op.network_name.clone(),
            ),
            None => match ctx.operators.resolve_country(m.country) {
                // country known but not the network: no evidence either way
                Some(info) => state.record(
                    "operator",
                    CheckResolution::Neutral,
                    0,
                    Some(format!("country only: {}", info.name)),
                ),
                None => state.record(
                    "operator",
                    CheckResolution::Failed,
                    -self.weights.operator_unknown,
                    None,
                ),
            },
        }
    }

    async fn check_tower(&self, state: &mut VerificationState, m: &CellMeasurement, ctx: &CheckContext<'_>) {
        let Some(decoded) = m.decoded else {
            state.record(
                "tower_lookup",
                CheckResolution::Neutral,
                0,
                Some("no decoded identifier".to_string()),
            );
            return;
        };

        match ctx
            .lookup
            .find_station(m.technology, m.country, m.network, decoded.station, ctx.location)
            .await
        {
            Ok(Some(_)) => state.record(
                "tower_lookup",
                CheckResolution::Passed,
                self.weights.tower_found,
                None,
            ),
            Ok(None) => state.record(
                "tower_lookup",
                CheckResolution::Failed,
                -self.weights.tower_unknown,
                Some("station unknown to directory".to_string()),
            ),
            Err(CellmonError::LookupUnavailable(reason)) => state.record(
                "tower_lookup",
                CheckResolution::Neutral,
                0,
                Some(reason),
            ),
            Err(e) => state.record(
                "tower_lookup",
                CheckResolution::Neutral,
                0,
                Some(e.to_string()),
            ),
        }
    }

    async fn check_seen_before(&self, state: &mut VerificationState, m: &CellMeasurement, ctx: &CheckContext<'_>) {
        let Some(decoded) = m.decoded else {
            state.record("seen_before", CheckResolution::Neutral, 0, None);
            return;
        };

        match ctx.store.count_cells(m.country, m.network, decoded.station).await {
            Ok(count) if count > 1 => state.record(
                "seen_before",
                CheckResolution::Passed,
                self.weights.seen_before,
                Some(format!("{} prior observations", count - 1)),
            ),
            Ok(_) => state.record(
                "seen_before",
                CheckResolution::Neutral,
                0,
                Some("first observation".to_string()),
            ),
            Err(e) => state.record("seen_before", CheckResolution::Neutral, 0, Some(e.to_string())),
        }
    }

    /// Informational only, contributes no score
    fn check_nsa(&self, state: &mut VerificationState, m: &CellMeasurement) {
        if m.supports_nsa() {
            state.record(
                "nsa",
                CheckResolution::Passed,
                0,
                Some("supports 5G NSA".to_string()),
            );
        } else {
            state.record("nsa", CheckResolution::Neutral, 0, None);
        }
    }
}

#[async_trait]
impl VerificationPipeline for DefaultPipeline {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(
        &self,
        measurement: &CellMeasurement,
        ctx: &CheckContext<'_>,
    ) -> Result<VerificationState> {
        let mut state = VerificationState::new(&self.id, self.max_score);

        self.check_operator(&mut state, measurement, ctx).await;
        if measurement.role == CellRole::Serving {
            self.check_tower(&mut state, measurement, ctx).await;
            self.check_seen_before(&mut state, measurement, ctx).await;
        } else {
            // neighbor cells carry too few fields for directory checks
            state.record("tower_lookup", CheckResolution::Neutral, 0, None);
            state.record("seen_before", CheckResolution::Neutral, 0, None);
        }
        self.check_nsa(&mut state, measurement);

        state.finish();
        debug!(
            "Pipeline {} finished for {} cell: score {}",
            self.id, measurement.technology, state.score
        );
        Ok(state)
    }
}
