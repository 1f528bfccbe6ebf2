//! Directional antenna declarations and node capability aggregation.

use serde::{Deserialize, Serialize};

use super::types::LaserRanges;

/// Operating mode of a directional antenna.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AntennaMode {
    /// Forwards only the node's own traffic toward its next hop.
    #[default]
    Terminal,
    /// Selects among peers to forward third-party traffic.
    Relay,
}

fn default_true() -> bool {
    true
}

/// A directional antenna fitted to a node.
#[derive(Debug, Clone, Deserialize)]
pub struct AntennaConfig {
    /// Beam range in meters.
    pub range: f64,
    #[serde(default)]
    pub mode: AntennaMode,
    #[serde(default = "default_true")]
    pub is_on: bool,
    #[serde(default = "default_true")]
    pub has_power: bool,
    /// Whether a pointing mechanism is attached. Antennas without one never get targets.
    #[serde(default = "default_true")]
    pub has_tracking: bool,
}

impl AntennaConfig {
    pub fn new(range: f64, mode: AntennaMode) -> Self {
        Self {
            range,
            mode,
            is_on: true,
            has_power: true,
            has_tracking: true,
        }
    }

    /// Switched on and powered.
    pub fn can_comm(&self) -> bool {
        self.is_on && self.has_power
    }

    /// Whether data can be sent to a peer radiating `peer_power` at squared distance `distance2`.
    pub fn can_science_to(&self, peer_power: f64, distance2: f64) -> bool {
        let reach = peer_power.max(self.range);
        reach * reach > distance2
    }
}

/// Laser capabilities of a node from its usable antennas.
///
/// Every usable antenna can receive; only relay-mode antennas can retransmit.
pub fn aggregate_ranges(antennas: &[AntennaConfig]) -> LaserRanges {
    antennas
        .iter()
        .filter(|antenna| antenna.can_comm())
        .fold(LaserRanges::NONE, |ranges, antenna| LaserRanges {
            receive: ranges.receive.max(antenna.range),
            relay: match antenna.mode {
                AntennaMode::Relay => ranges.relay.max(antenna.range),
                AntennaMode::Terminal => ranges.relay,
            },
        })
}
