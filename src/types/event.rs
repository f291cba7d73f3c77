//! Connectivity events
//!
//! Discrete state changes derived from the capture connection and SIM
//! signals. The human-readable title is a deterministic function of the
//! (active, sim_unlocked) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A discrete connectivity or SIM state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityEvent {
    /// Whether the capture link / modem was active
    pub active: bool,
    /// SIM unlocked state; `None` when the signal was not observable
    pub sim_unlocked: Option<bool>,
    pub occurred_at: DateTime<Utc>,
}

impl ConnectivityEvent {
    pub fn new(active: bool, sim_unlocked: Option<bool>) -> Self {
        Self {
            active,
            sim_unlocked,
            occurred_at: Utc::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        connectivity_label(self.active, self.sim_unlocked)
    }
}

/// Map the (active, sim_unlocked) signal pair to its event title
pub fn connectivity_label(active: bool, sim_unlocked: Option<bool>) -> &'static str {
    match (active, sim_unlocked) {
        (true, None) => "Connected",
        (true, Some(false)) => "SIM Inserted",
        (true, Some(true)) => "SIM Unlocked",
        (false, None) => "Disconnected",
        (false, Some(_)) => "SIM Removed",
    }
}
