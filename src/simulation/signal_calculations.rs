//! Signal strength calculations.
//!
//! Contains helpers for:
//! - Laser strength over a usable range (linear falloff)
//! - The standard radio range model used when the host supplies no radio layer
//! - Strength to quality conversion shared by routing and targeting
//!
//! Units:
//! - Distance and ranges: meters
//! - Strength: dimensionless in [0, 1]

use serde::Serialize;

use super::types::Node;

/// Usable laser range in one direction: the relaying end's relay range capped
/// by the receiving end's receive range.
pub fn usable_range(relay_range: f64, receive_range: f64) -> f64 {
    relay_range.min(receive_range)
}

/// Laser strength `1 - d / range`, zero when the direction is infeasible.
///
/// # Returns
///
/// - 0.0 when `range` is zero/negative or `distance` exceeds it
/// - 1.0 for an unlimited range
/// - `1 - distance / range` otherwise (exactly 0.0 at `distance == range`)
pub fn laser_strength(distance: f64, range: f64) -> f64 {
    if !(range > 0.0) || !(distance <= range) {
        return 0.0;
    }
    if range.is_infinite() {
        return 1.0;
    }
    (1.0 - distance / range).clamp(0.0, 1.0)
}

/// Normalized radio strength for a pair of antenna powers.
///
/// The maximum range of a pair is the geometric mean `sqrt(power_a * power_b)`.
/// The linear remainder `x = 1 - d / range` is shaped with `(3 - 2x)·x²`
/// so that strength falls off gently near the receiver and steeply near the
/// range limit.
pub fn radio_strength(power_a: f64, power_b: f64, distance: f64) -> f64 {
    let range = (power_a * power_b).sqrt();
    if !(range > 0.0) {
        return 0.0;
    }
    let x = (1.0 - distance / range).clamp(0.0, 1.0);
    (3.0 - 2.0 * x) * x * x
}

/// Strength fields produced by a radio layer for one node pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RadioStrengths {
    pub strength_rr: f64,
    pub strength_ar: f64,
    pub strength_br: f64,
    pub a_can_relay: bool,
    pub b_can_relay: bool,
}

impl RadioStrengths {
    pub fn best(&self) -> f64 {
        self.strength_rr.max(self.strength_ar).max(self.strength_br)
    }
}

/// The omnidirectional network the directional layer sits on.
///
/// The host normally owns this; the core only asks it for a pair's verdict and
/// falls back to that verdict whenever no directional link is possible.
pub trait RadioLinkModel {
    /// `None` when the radio layer does not connect the pair.
    fn evaluate(&self, a: &Node, b: &Node, distance: f64) -> Option<RadioStrengths>;
}

/// Radio layer that never connects anything (laser-only networks and tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRadio;

impl RadioLinkModel for NoRadio {
    fn evaluate(&self, _a: &Node, _b: &Node, _distance: f64) -> Option<RadioStrengths> {
        None
    }
}

/// Standard range model over each node's radio and radio relay power.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRangeModel;

impl StandardRangeModel {
    fn total_power(node: &Node) -> f64 {
        node.radio_power.max(node.radio_relay_power)
    }
}

impl RadioLinkModel for StandardRangeModel {
    fn evaluate(&self, a: &Node, b: &Node, distance: f64) -> Option<RadioStrengths> {
        let strengths = RadioStrengths {
            strength_rr: radio_strength(a.radio_relay_power, b.radio_relay_power, distance),
            strength_ar: radio_strength(a.radio_relay_power, Self::total_power(b), distance),
            strength_br: radio_strength(b.radio_relay_power, Self::total_power(a), distance),
            a_can_relay: a.radio_relay_power > 0.0,
            b_can_relay: b.radio_relay_power > 0.0,
        };
        (strengths.best() > 0.0).then_some(strengths)
    }
}

/// Coarse signal quality as shown to players and used for link comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SignalQuality {
    None,
    Red,
    Orange,
    Yellow,
    Green,
}

impl SignalQuality {
    pub fn from_strength(strength: f64) -> Self {
        if !(strength > 0.0) {
            SignalQuality::None
        } else if strength < 0.25 {
            SignalQuality::Red
        } else if strength < 0.5 {
            SignalQuality::Orange
        } else if strength < 0.75 {
            SignalQuality::Yellow
        } else {
            SignalQuality::Green
        }
    }
}
