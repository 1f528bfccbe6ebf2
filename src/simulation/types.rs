//! Type definitions for the optical network core.
//!
//! Contains the data structures shared across the simulation:
//! - Node handles and network endpoints
//! - Radio and directional (laser) link variants behind one strength interface
//! - Pointing targets produced for directional antennas

use nalgebra::Vector3;
use serde::Serialize;

/// World-space position in meters. Double precision: distances span planetary scales.
pub type Position = Vector3<f64>;

/// Stable handle of a node inside the network arena.
///
/// The generation is bumped whenever a slot is reused, so a handle to a
/// removed node never aliases a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Identity of one link instance. Replacing a link always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkId(pub u64);

/// Unordered node pair, stored with the smaller handle first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(NodeHandle, NodeHandle);

impl PairKey {
    pub fn new(a: NodeHandle, b: NodeHandle) -> Self {
        if a <= b { PairKey(a, b) } else { PairKey(b, a) }
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.0 == node || self.1 == node
    }
}

/// Laser capabilities of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LaserRanges {
    /// Max distance at which the node can receive a beam.
    pub receive: f64,
    /// Max distance at which the node can receive and retransmit a beam.
    pub relay: f64,
}

impl LaserRanges {
    pub const NONE: LaserRanges = LaserRanges { receive: 0.0, relay: 0.0 };
    pub const UNLIMITED: LaserRanges = LaserRanges {
        receive: f64::INFINITY,
        relay: f64::INFINITY,
    };
}

/// Network endpoint (vessel or ground station).
///
/// Owned exclusively by the network graph; the host pushes live positions and
/// capabilities into it before each topology epoch.
#[derive(Debug, Clone)]
pub struct Node {
    /// External identity assigned by the host.
    pub node_id: u32,
    /// Display name used for pointing targets and logs.
    pub name: String,
    pub position: Position,
    /// Fixed ground infrastructure.
    pub is_home: bool,
    /// Actively simulated by the host (as opposed to on-rails).
    pub loaded: bool,
    /// Where a peer's directional antenna should aim at close range, if exposed.
    pub aim_point: Option<Position>,
    /// Omnidirectional antenna power (range units, meters).
    pub radio_power: f64,
    /// Omnidirectional relay antenna power; zero when the node cannot relay by radio.
    pub radio_relay_power: f64,
    pub laser: LaserRanges,
}

impl Node {
    pub fn new(node_id: u32, name: impl Into<String>, position: Position) -> Self {
        Self {
            node_id,
            name: name.into(),
            position,
            is_home: false,
            loaded: true,
            aim_point: None,
            radio_power: 0.0,
            radio_relay_power: 0.0,
            laser: LaserRanges::NONE,
        }
    }

    pub fn home(mut self) -> Self {
        self.is_home = true;
        self
    }

    pub fn unloaded(mut self) -> Self {
        self.loaded = false;
        self
    }

    pub fn with_laser(mut self, receive: f64, relay: f64) -> Self {
        self.laser = LaserRanges { receive, relay };
        self
    }

    pub fn with_radio(mut self, power: f64, relay_power: f64) -> Self {
        self.radio_power = power;
        self.radio_relay_power = relay_power;
        self
    }

    pub fn with_aim_point(mut self, aim_point: Position) -> Self {
        self.aim_point = Some(aim_point);
        self
    }
}

/// Shared interface for "signal strength" over both link variants.
///
/// Direction is named by the relaying end: `strength_from(x)` is the strength
/// of the signal that `x` sends (or relays) to the opposite endpoint.
pub trait SignalStrength {
    fn strength_from(&self, from: NodeHandle) -> f64;

    /// Best strength over every relay combination of the link.
    fn best_signal(&self) -> f64;
}

/// Omnidirectional link as decided by the radio layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadioLink {
    pub a: NodeHandle,
    pub b: NodeHandle,
    pub distance: f64,
    /// Both ends relay.
    pub strength_rr: f64,
    /// `a` relays towards `b`.
    pub strength_ar: f64,
    /// `b` relays towards `a`.
    pub strength_br: f64,
    pub a_can_relay: bool,
    pub b_can_relay: bool,
    pub both_relay: bool,
}

impl RadioLink {
    /// A link without any radio contribution.
    pub fn silent(a: NodeHandle, b: NodeHandle, distance: f64) -> Self {
        Self {
            a,
            b,
            distance,
            strength_rr: 0.0,
            strength_ar: 0.0,
            strength_br: 0.0,
            a_can_relay: false,
            b_can_relay: false,
            both_relay: false,
        }
    }
}

impl SignalStrength for RadioLink {
    fn strength_from(&self, from: NodeHandle) -> f64 {
        if from == self.a { self.strength_ar } else { self.strength_br }
    }

    fn best_signal(&self) -> f64 {
        self.strength_rr.max(self.strength_ar).max(self.strength_br)
    }
}

/// Directional (laser) link layered on top of the radio fields of its pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionalLink {
    /// Radio fields from the radio layer's verdict for the same evaluation
    /// (zero when the radio layer has none). Relay flags are the union of
    /// radio and laser relay capability.
    pub radio: RadioLink,
    pub strength_a_to_b: f64,
    pub strength_b_to_a: f64,
    /// Occlusion multiplier the strengths were scaled by.
    pub attenuation: f64,
    pub laser_a_can_relay: bool,
    pub laser_b_can_relay: bool,
}

impl DirectionalLink {
    pub fn a(&self) -> NodeHandle {
        self.radio.a
    }

    pub fn b(&self) -> NodeHandle {
        self.radio.b
    }

    pub fn distance(&self) -> f64 {
        self.radio.distance
    }

    /// Laser-only strength of the beam relayed by `from`.
    pub fn laser_strength_from(&self, from: NodeHandle) -> f64 {
        if from == self.radio.a { self.strength_a_to_b } else { self.strength_b_to_a }
    }

    /// Best laser-only strength in either direction.
    pub fn strength_laser(&self) -> f64 {
        self.strength_a_to_b.max(self.strength_b_to_a)
    }
}

impl SignalStrength for DirectionalLink {
    fn strength_from(&self, from: NodeHandle) -> f64 {
        self.radio.strength_from(from).max(self.laser_strength_from(from))
    }

    fn best_signal(&self) -> f64 {
        self.radio.best_signal().max(self.strength_laser())
    }
}

/// Link variants selected explicitly at the call site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommLink {
    Radio(RadioLink),
    Directional(DirectionalLink),
}

impl CommLink {
    pub fn radio(&self) -> &RadioLink {
        match self {
            CommLink::Radio(link) => link,
            CommLink::Directional(link) => &link.radio,
        }
    }

    pub fn directional(&self) -> Option<&DirectionalLink> {
        match self {
            CommLink::Radio(_) => None,
            CommLink::Directional(link) => Some(link),
        }
    }

    pub fn endpoints(&self) -> (NodeHandle, NodeHandle) {
        let radio = self.radio();
        (radio.a, radio.b)
    }

    pub fn other_end(&self, node: NodeHandle) -> NodeHandle {
        let (a, b) = self.endpoints();
        if node == a { b } else { a }
    }

    pub fn distance(&self) -> f64 {
        self.radio().distance
    }

    /// Relay capability of `node` on this link (radio or laser).
    pub fn can_relay(&self, node: NodeHandle) -> bool {
        let radio = self.radio();
        if node == radio.a { radio.a_can_relay } else { radio.b_can_relay }
    }
}

impl SignalStrength for CommLink {
    fn strength_from(&self, from: NodeHandle) -> f64 {
        match self {
            CommLink::Radio(link) => link.strength_from(from),
            CommLink::Directional(link) => link.strength_from(from),
        }
    }

    fn best_signal(&self) -> f64 {
        match self {
            CommLink::Radio(link) => link.best_signal(),
            CommLink::Directional(link) => link.best_signal(),
        }
    }
}

/// A link instance in the published or staged link table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkEntry {
    pub id: LinkId,
    pub link: CommLink,
}

/// Where a pointing request takes its live position from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSource {
    /// The peer's node position.
    Node(NodeHandle),
    /// The peer's own directional-antenna aim point.
    AimPoint(NodeHandle),
    /// A fixed world position.
    Fixed(Position),
}

/// Pointing request for a directional antenna. Recomputed every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingTarget {
    pub source: TargetSource,
    pub name: String,
}
