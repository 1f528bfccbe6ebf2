//! Headless scene runner.
//!
//! Builds the occluder set, nodes and antennas from a scene, then for every
//! tick moves bodies and nodes, rebuilds the topology as one epoch, computes
//! routes and runs the antenna scheduler against the committed state.

use serde::Serialize;
use std::collections::HashMap;

use super::antenna::{AntennaConfig, AntennaMode, aggregate_ranges};
use super::geometry::distance2;
use super::network::NetworkGraph;
use super::occluder::{Occluder, OccluderSet};
use super::routing::RoutingTable;
use super::scheduler::{TickReport, TickScheduler};
use super::signal_calculations::{SignalQuality, StandardRangeModel};
use super::targeting::{AntennaState, NetworkContext};
use super::types::{CommLink, Node, NodeHandle, Position, SignalStrength, TargetSource};
use crate::common::scene::Scene;
use crate::common::settings::LaserSettings;

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub id: u64,
    pub a: String,
    pub b: String,
    /// `laser` or `radio`.
    pub kind: &'static str,
    pub distance: f64,
    /// Combined best-of-radio-and-laser strength, `a` relaying.
    pub strength_a_to_b: f64,
    pub strength_b_to_a: f64,
    pub quality: SignalQuality,
    pub a_can_relay: bool,
    pub b_can_relay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attenuation: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub node: String,
    pub path: Vec<String>,
    pub cost: f64,
    /// Some usable antenna of the node can send data over the first hop.
    pub can_transmit_science: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub antenna: String,
    pub mode: AntennaMode,
    pub target: Option<String>,
    pub aim_point: bool,
    pub position: Option<[f64; 3]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetChange {
    pub tick: u64,
    pub antenna: String,
    pub target: Option<String>,
}

/// Final state of a run, printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub epochs: u64,
    pub links: Vec<LinkSummary>,
    pub routes: Vec<RouteSummary>,
    pub targets: Vec<TargetSummary>,
    pub target_changes: Vec<TargetChange>,
}

/// Bodies of the scene as occluders, with their configured atmospheres.
pub fn initialize_occluders(scene: &Scene, settings: &LaserSettings) -> OccluderSet {
    let mut occluders = OccluderSet::new();
    for body in &scene.bodies {
        occluders.push(Occluder::new(body.name.clone(), body.position.into(), body.radius));
    }
    let with_atmosphere = settings.apply_opaqueness_curves(&mut occluders);
    log::info!("Initialized {} occluders ({} with atmosphere)", occluders.len(), with_atmosphere);
    occluders
}

/// Add every scene node to the graph and register its antennas.
///
/// Ground stations get their laser ranges from the settings and no steerable
/// antennas; vessels aggregate the ranges of their usable antennas.
///
/// # Returns
///
/// Handle of every node, keyed by its scene id.
pub fn initialize_nodes(scene: &Scene, settings: &LaserSettings, graph: &mut NetworkGraph, scheduler: &mut TickScheduler) -> HashMap<u32, NodeHandle> {
    let mut handles = HashMap::new();
    for config in &scene.nodes {
        let mut node = Node::new(config.node_id, config.name.clone(), config.position.into())
            .with_radio(config.radio_power, config.radio_relay_power);
        node.loaded = config.loaded;
        node.aim_point = config.aim_point.map(Position::from);
        if config.is_home {
            node.is_home = true;
            node.laser = settings.home_ranges(config.primary);
        } else {
            node.laser = aggregate_ranges(&config.antennas);
        }

        let handle = graph.add_node(node);
        handles.insert(config.node_id, handle);

        if config.is_home {
            continue;
        }
        for (idx, antenna) in config.antennas.iter().enumerate() {
            let state = AntennaState {
                node: handle,
                mode: antenna.mode,
                is_on: antenna.is_on,
                has_power: antenna.has_power,
                has_tracking: antenna.has_tracking,
            };
            scheduler.register(state, format!("{}#{}", config.name, idx));
        }
    }
    log::info!("Initialized {} nodes with {} directional antennas", graph.node_count(), scheduler.len());
    handles
}

/// Run a scene for its configured number of ticks.
pub fn run_scene(scene: &Scene, settings: &LaserSettings) -> RunSummary {
    let mut occluders = initialize_occluders(scene, settings);
    let mut graph = NetworkGraph::new();
    let mut scheduler = TickScheduler::new();
    let handles = initialize_nodes(scene, settings, &mut graph, &mut scheduler);
    let active_node = scene.active_node.and_then(|id| handles.get(&id).copied());

    let radio = StandardRangeModel;
    let mut routes = RoutingTable::new();
    let mut target_changes = Vec::new();
    let mut last_report = None;

    for tick in 0..scene.ticks {
        if tick > 0 {
            advance(scene, &handles, &mut graph, &mut occluders);
        }
        graph.rebuild(&radio, &occluders);
        routes = RoutingTable::compute(&graph);

        let ctx = NetworkContext {
            graph: &graph,
            routes: &routes,
            active_node,
        };
        let report = scheduler.tick(&ctx);
        for change in report.changes() {
            let target = change.target.as_ref().map(|t| t.name.clone());
            log::info!(
                "Tick {}: {} -> {}",
                report.tick,
                change.name,
                target.as_deref().unwrap_or("no target")
            );
            target_changes.push(TargetChange {
                tick: report.tick,
                antenna: change.name.clone(),
                target,
            });
        }
        last_report = Some(report);
    }

    let antennas: HashMap<NodeHandle, &[AntennaConfig]> = scene
        .nodes
        .iter()
        .filter_map(|config| handles.get(&config.node_id).map(|&h| (h, config.antennas.as_slice())))
        .collect();

    RunSummary {
        ticks: scheduler.ticks(),
        epochs: graph.epoch(),
        links: summarize_links(&graph),
        routes: summarize_routes(&graph, &routes, &antennas),
        targets: last_report.map(|report| summarize_targets(&graph, &report)).unwrap_or_default(),
        target_changes,
    }
}

fn advance(scene: &Scene, handles: &HashMap<u32, NodeHandle>, graph: &mut NetworkGraph, occluders: &mut OccluderSet) {
    let dt = scene.tick_seconds;
    for body in &scene.bodies {
        let Some(velocity) = body.velocity else {
            continue;
        };
        if let Some(current) = occluders.get(&body.name).map(|o| *o.position()) {
            occluders.update_position(&body.name, current + Position::from(velocity) * dt);
        }
    }
    for config in &scene.nodes {
        let (Some(velocity), Some(&handle)) = (config.velocity, handles.get(&config.node_id)) else {
            continue;
        };
        if let Some(current) = graph.node(handle).map(|n| n.position) {
            graph.set_position(handle, current + Position::from(velocity) * dt);
        }
    }
}

fn node_name(graph: &NetworkGraph, handle: NodeHandle) -> String {
    graph.node(handle).map(|n| n.name.clone()).unwrap_or_default()
}

fn summarize_links(graph: &NetworkGraph) -> Vec<LinkSummary> {
    graph
        .links()
        .into_iter()
        .map(|entry| {
            let (a, b) = entry.link.endpoints();
            let radio = entry.link.radio();
            LinkSummary {
                id: entry.id.0,
                a: node_name(graph, a),
                b: node_name(graph, b),
                kind: match entry.link {
                    CommLink::Radio(_) => "radio",
                    CommLink::Directional(_) => "laser",
                },
                distance: entry.link.distance(),
                strength_a_to_b: entry.link.strength_from(a),
                strength_b_to_a: entry.link.strength_from(b),
                quality: SignalQuality::from_strength(entry.link.best_signal()),
                a_can_relay: radio.a_can_relay,
                b_can_relay: radio.b_can_relay,
                attenuation: entry.link.directional().map(|d| d.attenuation),
            }
        })
        .collect()
}

fn summarize_routes(graph: &NetworkGraph, routes: &RoutingTable, antennas: &HashMap<NodeHandle, &[AntennaConfig]>) -> Vec<RouteSummary> {
    graph
        .nodes()
        .filter_map(|(handle, node)| {
            let route = routes.route(handle)?;
            let hop = route.first_hop().and_then(|hop| graph.node(hop));
            let can_transmit_science = hop.is_some_and(|hop| {
                let d2 = distance2(&node.position, &hop.position);
                let peer_power = hop.radio_power.max(hop.radio_relay_power);
                antennas
                    .get(&handle)
                    .is_some_and(|list| list.iter().any(|a| a.can_comm() && a.can_science_to(peer_power, d2)))
            });
            Some(RouteSummary {
                node: node.name.clone(),
                path: route.path.iter().map(|&h| node_name(graph, h)).collect(),
                cost: route.cost,
                can_transmit_science,
            })
        })
        .collect()
}

fn summarize_targets(graph: &NetworkGraph, report: &TickReport) -> Vec<TargetSummary> {
    report
        .antennas
        .iter()
        .map(|antenna| {
            let target = antenna.target.as_ref();
            TargetSummary {
                antenna: antenna.name.clone(),
                mode: antenna.mode,
                target: target.map(|t| t.name.clone()),
                aim_point: target.is_some_and(|t| matches!(t.source, TargetSource::AimPoint(_))),
                position: target.and_then(|t| t.resolve(graph)).map(|p| [p.x, p.y, p.z]),
            }
        })
        .collect()
}
