//! Verification state per (measurement, pipeline) pair

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an individual check resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResolution {
    /// Evidence in favor of the cell being legitimate
    Passed,
    /// Evidence against the cell
    Failed,
    /// Check could not produce evidence (lookup unreachable, field missing)
    Neutral,
}

/// Outcome of one verification check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: String,
    pub resolution: CheckResolution,
    /// Signed score contribution, already applied to the pipeline score
    pub delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of one verification pipeline run against one measurement.
///
/// Mutated while checks resolve, immutable once `finished`. The score is
/// clamped to `[0, max_score]` after every delta so partial reads never see
/// an out-of-bounds value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationState {
    pub pipeline: String,
    pub score: i64,
    pub finished: bool,
    pub outcomes: Vec<CheckOutcome>,
    pub started_at: DateTime<Utc>,
    max_score: i64,
}

impl VerificationState {
    pub fn new(pipeline: impl Into<String>, max_score: i64) -> Self {
        Self {
            pipeline: pipeline.into(),
            score: 0,
            finished: false,
            outcomes: Vec::new(),
            started_at: Utc::now(),
            max_score,
        }
    }

    /// Record a resolved check and fold its delta into the bounded score
    pub fn record(
        &mut self,
        check: impl Into<String>,
        resolution: CheckResolution,
        delta: i64,
        note: Option<String>,
    ) {
        self.score = (self.score + delta).clamp(0, self.max_score);
        self.outcomes.push(CheckOutcome {
            check: check.into(),
            resolution,
            delta,
            note,
        });
    }

    /// Mark every check as resolved; the state is immutable afterwards
    pub fn finish(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_stays_bounded() {
        let mut state = VerificationState::new("primary", 100);
        state.record("a", CheckResolution::Failed, -50, None);
        assert_eq!(state.score, 0);
        state.record("b", CheckResolution::Passed, 150, None);
        assert_eq!(state.score, 100);
        assert_eq!(state.outcomes.len(), 2);
        assert!(!state.finished);
        state.finish();
        assert!(state.finished);
    }

    #[test]
    fn test_neutral_outcome_contributes_nothing() {
        let mut state = VerificationState::new("primary", 100);
        state.record("lookup", CheckResolution::Neutral, 0, Some("unreachable".into()));
        assert_eq!(state.score, 0);
        assert_eq!(state.outcomes[0].resolution, CheckResolution::Neutral);
    }
}
