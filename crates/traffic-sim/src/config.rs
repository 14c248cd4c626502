//! Tunables for background-traffic management.
//!
//! These were hard-coded empirical values in older traffic engines; their
//! exact tuning is a feel decision, so they stay configurable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// Radius around the observer, in nautical miles, inside which an enroute
    /// schedule is promoted to a fully simulated entity.
    pub activation_radius_nm: f64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            activation_radius_nm: 150.0,
        }
    }
}
