//! Pointing target selection for directional antennas.
//!
//! Runs once per tick per antenna against the committed link table and the
//! routing state of the same epoch:
//! - Terminal antennas point at their next routing hop, but only when the
//!   laser beats the radio link to that hop by at least one quality level
//! - Relay antennas follow a strict priority order: the active node routed
//!   through this node, then any loaded node routed through it, then the
//!   furthest laser-linked peer that has no direct home link of its own
//!
//! Every missing piece of state (no route, no link, no tracking mechanism)
//! degrades to clearing the target.

use super::antenna::AntennaMode;
use super::geometry::distance2;
use super::network::NetworkGraph;
use super::routing::RoutingTable;
use super::signal_calculations::SignalQuality;
use super::types::{NodeHandle, Position, SignalStrength, TargetSource, TrackingTarget};

/// Below this separation a peer's aim point is preferred over its node position.
pub const CLOSE_RANGE_AIM_DISTANCE: f64 = 1000.0;

/// Live state of one directional antenna, supplied by the host each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AntennaState {
    /// Node carrying the antenna.
    pub node: NodeHandle,
    pub mode: AntennaMode,
    pub is_on: bool,
    pub has_power: bool,
    /// A tracking mechanism is attached; without one the antenna cannot point.
    pub has_tracking: bool,
}

impl AntennaState {
    /// Create a switched-on, powered antenna with a tracking mechanism.
    ///
    /// # Parameters
    ///
    /// * `node` - Handle of the node carrying the antenna
    /// * `mode` - Terminal or relay behaviour
    pub fn new(node: NodeHandle, mode: AntennaMode) -> Self {
        Self {
            node,
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
}

/// Everything target selection reads, for one committed epoch.
#[derive(Debug, Clone, Copy)]
pub struct NetworkContext<'a> {
    pub graph: &'a NetworkGraph,
    pub routes: &'a RoutingTable,
    /// Node the player is currently controlling, if any.
    pub active_node: Option<NodeHandle>,
}

/// Outcome of one target selection.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetDecision {
    /// Point at this target.
    Track(TrackingTarget),
    /// Drop any previous target and point nowhere.
    Clear,
}

/// Choose where a directional antenna points for this tick.
///
/// Terminal antennas follow their node's next routing hop when the laser is
/// strictly better than the radio link to that hop. Relay antennas pick, in
/// order: the active node when it routes through this node, the first loaded
/// node routing through this node, then the furthest laser-linked vessel
/// without a direct home link.
///
/// # Parameters
///
/// * `ctx` - Committed link table, routes and active node of the current epoch
/// * `antenna` - Live state of the antenna being updated
///
/// # Returns
///
/// * `TargetDecision::Track` with the peer (or its aim point when close)
/// * `TargetDecision::Clear` when the antenna cannot point (off, unpowered,
///   no tracking mechanism, node gone) or no peer qualifies
pub fn select_target(ctx: &NetworkContext<'_>, antenna: &AntennaState) -> TargetDecision {
    if !antenna.has_tracking || !antenna.can_comm() || ctx.graph.node(antenna.node).is_none() {
        return TargetDecision::Clear;
    }
    let target = match antenna.mode {
        AntennaMode::Terminal => terminal_target(ctx, antenna.node),
        AntennaMode::Relay => relay_target(ctx, antenna.node),
    };
    target
        .map(|peer| TargetDecision::Track(point_at(ctx.graph, antenna.node, peer)))
        .unwrap_or(TargetDecision::Clear)
}

/// Next hop of `node`'s route, when the laser to it beats the radio by a quality level.
fn terminal_target(ctx: &NetworkContext<'_>, node: NodeHandle) -> Option<NodeHandle> {
    let next_hop = ctx.routes.first_hop(node)?;
    let entry = ctx.graph.link_between(node, next_hop)?;
    let laser = entry.link.directional()?;

    let radio_quality = SignalQuality::from_strength(laser.radio.strength_from(next_hop));
    let laser_quality = SignalQuality::from_strength(laser.laser_strength_from(next_hop));
    (laser_quality > radio_quality).then_some(next_hop)
}

/// Relay priority tiers. `None` when no tier yields a peer.
fn relay_target(ctx: &NetworkContext<'_>, node: NodeHandle) -> Option<NodeHandle> {
    if let Some(active) = ctx.active_node.filter(|&active| active != node) {
        if ctx.routes.first_hop(active) == Some(node) {
            return Some(active);
        }
    }

    let routed_through: Vec<NodeHandle> = ctx
        .graph
        .nodes()
        .filter(|(handle, peer)| *handle != node && peer.loaded)
        .filter(|(handle, _)| ctx.routes.first_hop(*handle) == Some(node))
        .map(|(handle, _)| handle)
        .collect();
    if let Some(&first) = routed_through.first() {
        return Some(first);
    }

    furthest_laser_peer(ctx.graph, node, &routed_through)
}

/// Furthest directly linked peer (by squared distance) eligible for a relay beam.
fn furthest_laser_peer(graph: &NetworkGraph, node: NodeHandle, exclude: &[NodeHandle]) -> Option<NodeHandle> {
    let origin = graph.node(node)?.position;
    let mut furthest: Option<NodeHandle> = None;
    let mut furthest_d2 = f64::NEG_INFINITY;

    for (peer, entry) in graph.neighbours(node) {
        let Some(peer_node) = graph.node(peer) else {
            continue;
        };
        if peer_node.is_home || exclude.contains(&peer) || entry.link.directional().is_none() {
            continue;
        }
        if linked_to_home(graph, peer) {
            continue;
        }
        let d2 = distance2(&origin, &peer_node.position);
        if d2 > furthest_d2 {
            furthest = Some(peer);
            furthest_d2 = d2;
        }
    }
    furthest
}

fn linked_to_home(graph: &NetworkGraph, node: NodeHandle) -> bool {
    graph
        .neighbours(node)
        .iter()
        .any(|(peer, _)| graph.node(*peer).is_some_and(|n| n.is_home))
}

/// Build the tracking target for `peer`, preferring a moving vessel's aim point at close range.
fn point_at(graph: &NetworkGraph, from: NodeHandle, peer: NodeHandle) -> TrackingTarget {
    let Some(peer_node) = graph.node(peer) else {
        return TrackingTarget {
            source: TargetSource::Node(peer),
            name: String::new(),
        };
    };
    let close = graph
        .node(from)
        .is_some_and(|n| distance2(&n.position, &peer_node.position) <= CLOSE_RANGE_AIM_DISTANCE * CLOSE_RANGE_AIM_DISTANCE);

    let source = if !peer_node.is_home && close && peer_node.aim_point.is_some() {
        TargetSource::AimPoint(peer)
    } else {
        TargetSource::Node(peer)
    };
    TrackingTarget {
        source,
        name: peer_node.name.clone(),
    }
}

impl TrackingTarget {
    /// Current world position to point at. `None` once the peer has left the network.
    pub fn resolve(&self, graph: &NetworkGraph) -> Option<Position> {
        match self.source {
            TargetSource::Node(peer) => graph.node(peer).map(|n| n.position),
            TargetSource::AimPoint(peer) => graph.node(peer).map(|n| n.aim_point.unwrap_or(n.position)),
            TargetSource::Fixed(position) => Some(position),
        }
    }

    /// Handle of the tracked peer, if the target follows a node.
    pub fn peer(&self) -> Option<NodeHandle> {
        match self.source {
            TargetSource::Node(peer) | TargetSource::AimPoint(peer) => Some(peer),
            TargetSource::Fixed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::occluder::OccluderSet;
    use crate::simulation::signal_calculations::{NoRadio, StandardRangeModel};
    use crate::simulation::types::Node;

    fn p(x: f64, y: f64, z: f64) -> Position {
        Position::new(x, y, z)
    }

    fn tracked(decision: TargetDecision) -> Option<TargetSource> {
        match decision {
            TargetDecision::Track(target) => Some(target.source),
            _ => None,
        }
    }

    #[test]
    fn relay_picks_the_furthest_eligible_peer() {
        let mut graph = NetworkGraph::new();
        let relay = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)).with_laser(100.0, 100.0));
        graph.add_node(Node::new(1, "d10", p(10f64.sqrt(), 0.0, 0.0)).with_laser(100.0, 100.0));
        let far = graph.add_node(Node::new(2, "d50", p(0.0, 50f64.sqrt(), 0.0)).with_laser(100.0, 100.0));
        graph.add_node(Node::new(3, "d30", p(0.0, 0.0, 30f64.sqrt())).with_laser(100.0, 100.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());

        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        let decision = select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay));
        // 7 m apart: inside the close range, but the peer exposes no aim point.
        assert_eq!(tracked(decision), Some(TargetSource::Node(far)));
    }

    #[test]
    fn relay_skips_peers_with_their_own_home_link() {
        let mut graph = NetworkGraph::new();
        let relay = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)).with_laser(5000.0, 5000.0));
        let near = graph.add_node(Node::new(1, "near", p(2000.0, 0.0, 0.0)).with_laser(5000.0, 0.0));
        // `far` is further from the relay but sees home directly.
        let far = graph.add_node(Node::new(2, "far", p(-4000.0, 0.0, 0.0)).with_laser(6000.0, 0.0));
        graph.add_node(Node::new(3, "ksc", p(-9000.0, 0.0, 0.0)).home().with_laser(8000.0, 8000.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());

        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert!(routes.route(near).is_none());
        assert!(routes.first_hop(far).is_some_and(|hop| hop != relay));
        let decision = select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay));
        assert_eq!(tracked(decision), Some(TargetSource::Node(near)));
    }

    #[test]
    fn relay_prefers_active_then_loaded_routed_nodes() {
        let mut graph = NetworkGraph::new();
        graph.add_node(Node::new(0, "ksc", p(0.0, 0.0, 0.0)).home().with_laser(f64::INFINITY, f64::INFINITY));
        let relay = graph.add_node(Node::new(1, "relay", p(900.0, 0.0, 0.0)).with_laser(1000.0, 1000.0));
        let loaded = graph.add_node(Node::new(2, "loaded", p(1800.0, 0.0, 0.0)).with_laser(1000.0, 0.0));
        let active = graph.add_node(Node::new(3, "active", p(900.0, 900.0, 0.0)).with_laser(1000.0, 0.0).unloaded());
        graph.rebuild(&NoRadio, &OccluderSet::new());
        let routes = RoutingTable::compute(&graph);
        assert_eq!(routes.first_hop(loaded), Some(relay));
        assert_eq!(routes.first_hop(active), Some(relay));

        let antenna = AntennaState::new(relay, AntennaMode::Relay);
        let mut ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: Some(active),
        };
        assert_eq!(tracked(select_target(&ctx, &antenna)), Some(TargetSource::Node(active)));

        ctx.active_node = None;
        assert_eq!(tracked(select_target(&ctx, &antenna)), Some(TargetSource::Node(loaded)));
    }

    #[test]
    fn relay_without_candidates_clears() {
        let mut graph = NetworkGraph::new();
        let relay = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)).with_laser(1000.0, 1000.0));
        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay)), TargetDecision::Clear);
    }

    #[test]
    fn terminal_tracks_next_hop_only_when_laser_is_better() {
        let mut graph = NetworkGraph::new();
        let home = graph.add_node(Node::new(0, "ksc", p(0.0, 0.0, 0.0)).home().with_laser(f64::INFINITY, f64::INFINITY));
        let probe = graph.add_node(Node::new(1, "probe", p(500.0, 0.0, 0.0)).with_laser(1000.0, 0.0));
        let antenna = AntennaState::new(probe, AntennaMode::Terminal);

        graph.rebuild(&NoRadio, &OccluderSet::new());
        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(tracked(select_target(&ctx, &antenna)), Some(TargetSource::Node(home)));

        // A strong radio link makes the laser pointless.
        let mut graph = NetworkGraph::new();
        graph.add_node(Node::new(0, "ksc", p(0.0, 0.0, 0.0)).home().with_laser(f64::INFINITY, f64::INFINITY).with_radio(0.0, 1e9));
        let probe = graph.add_node(Node::new(1, "probe", p(500.0, 0.0, 0.0)).with_laser(1000.0, 0.0).with_radio(1e9, 0.0));
        graph.rebuild(&StandardRangeModel, &OccluderSet::new());
        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(select_target(&ctx, &AntennaState::new(probe, AntennaMode::Terminal)), TargetDecision::Clear);
    }

    #[test]
    fn terminal_without_route_clears() {
        let mut graph = NetworkGraph::new();
        let probe = graph.add_node(Node::new(1, "probe", p(0.0, 0.0, 0.0)).with_laser(1000.0, 0.0));
        let routes = RoutingTable::new();
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(select_target(&ctx, &AntennaState::new(probe, AntennaMode::Terminal)), TargetDecision::Clear);
    }

    #[test]
    fn close_peers_are_tracked_by_aim_point() {
        let mut graph = NetworkGraph::new();
        let relay = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)).with_laser(5000.0, 5000.0));
        let docked = graph.add_node(
            Node::new(1, "docked", p(0.0, 800.0, 0.0))
                .with_laser(5000.0, 0.0)
                .with_aim_point(p(0.0, 790.0, 3.0)),
        );
        graph.rebuild(&NoRadio, &OccluderSet::new());
        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };

        let TargetDecision::Track(target) = select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay)) else {
            panic!("expected a target");
        };
        assert_eq!(target.source, TargetSource::AimPoint(docked));
        assert_eq!(target.name, "docked");
        assert_eq!(target.resolve(&graph), Some(p(0.0, 790.0, 3.0)));
        assert_eq!(target.peer(), Some(docked));

        graph.set_position(docked, p(0.0, 1500.0, 0.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(
            tracked(select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay))),
            Some(TargetSource::Node(docked))
        );
    }

    #[test]
    fn unusable_antennas_clear() {
        let mut graph = NetworkGraph::new();
        let node = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)));
        let routes = RoutingTable::new();
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };

        let mut antenna = AntennaState::new(node, AntennaMode::Relay);
        antenna.has_power = false;
        assert_eq!(select_target(&ctx, &antenna), TargetDecision::Clear);
        antenna.has_power = true;
        antenna.has_tracking = false;
        assert_eq!(select_target(&ctx, &antenna), TargetDecision::Clear);
    }

    #[test]
    fn relay_ignores_further_home_and_radio_only_peers() {
        let mut graph = NetworkGraph::new();
        let relay = graph.add_node(Node::new(0, "relay", p(0.0, 0.0, 0.0)).with_laser(5000.0, 5000.0).with_radio(0.0, 1e8));
        // Receive range too short to reach `ksc` directly.
        let near = graph.add_node(Node::new(1, "near", p(1000.0, 0.0, 0.0)).with_laser(1500.0, 0.0));
        // Radio only: no laser terminal at all.
        let chatter = graph.add_node(Node::new(2, "chatter", p(-4000.0, 0.0, 0.0)).with_radio(1e8, 0.0));
        // Laser-capable ground station, further than `near`.
        let ksc = graph.add_node(Node::new(3, "ksc", p(0.0, 3000.0, 0.0)).home().with_laser(f64::INFINITY, f64::INFINITY));
        graph.rebuild(&StandardRangeModel, &OccluderSet::new());

        assert!(graph.link_between(relay, chatter).is_some_and(|e| e.link.directional().is_none()));
        assert!(graph.link_between(relay, ksc).is_some_and(|e| e.link.directional().is_some()));
        assert!(graph.link_between(near, ksc).is_none());

        // Routes only matter for the earlier tiers; an empty table leaves the furthest-peer search.
        let routes = RoutingTable::new();
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };
        assert_eq!(
            tracked(select_target(&ctx, &AntennaState::new(relay, AntennaMode::Relay))),
            Some(TargetSource::Node(near))
        );
    }

    #[test]
    fn close_home_peers_are_tracked_by_node_position() {
        let mut graph = NetworkGraph::new();
        let ksc = graph.add_node(
            Node::new(0, "ksc", p(0.0, 0.0, 0.0))
                .home()
                .with_laser(f64::INFINITY, f64::INFINITY)
                .with_aim_point(p(0.0, 0.0, 15.0)),
        );
        let probe = graph.add_node(Node::new(1, "probe", p(600.0, 0.0, 0.0)).with_laser(1000.0, 0.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());
        let routes = RoutingTable::compute(&graph);
        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node: None,
        };

        let TargetDecision::Track(target) = select_target(&ctx, &AntennaState::new(probe, AntennaMode::Terminal)) else {
            panic!("expected a target");
        };
        assert_eq!(target.source, TargetSource::Node(ksc));
        assert_eq!(target.resolve(&graph), Some(p(0.0, 0.0, 0.0)));
    }
}
