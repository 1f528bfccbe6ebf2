//! Control paths from every endpoint to the nearest home node.
//!
//! Routes are computed over the published link table with a multi-source
//! shortest-path search seeded at every home node:
//! - Cost is the summed link distance
//! - A link is traversed only when the end nearer home relays over it with
//!   positive combined strength
//! - Intermediate hops must be relay-capable on the link they forward over
//!
//! Hosts with their own routing may install routes directly instead.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use super::network::NetworkGraph;
use super::types::{LinkId, NodeHandle, SignalStrength};

/// Best control path of one node, ordered from the node towards home.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Every node on the path, starting with the routed node and ending at a home node.
    pub path: Vec<NodeHandle>,
    /// Link traversed between consecutive path nodes.
    pub links: Vec<LinkId>,
    /// Summed link distance in meters.
    pub cost: f64,
}

impl Route {
    /// Next node towards home. `None` for a path that never leaves its node.
    pub fn first_hop(&self) -> Option<NodeHandle> {
        self.path.get(1).copied()
    }

    pub fn first_link(&self) -> Option<LinkId> {
        self.links.first().copied()
    }

    /// Home node the path ends at.
    pub fn home(&self) -> Option<NodeHandle> {
        self.path.last().copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    node: NodeHandle,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed: BinaryHeap pops the cheapest (then lowest handle) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
    }
}

/// Routes of every routable node for one committed epoch.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<NodeHandle, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shortest control paths over the graph's published links.
    ///
    /// Home nodes are the sources of the search and get no route themselves.
    /// Links staged in an open epoch are not considered.
    ///
    /// # Parameters
    ///
    /// * `graph` - Network whose committed link table is routed over
    ///
    /// # Returns
    ///
    /// Table holding a route for every node that can reach a home node.
    pub fn compute(graph: &NetworkGraph) -> Self {
        let mut cost: HashMap<NodeHandle, f64> = HashMap::new();
        // node -> (next hop towards home, link used)
        let mut towards_home: HashMap<NodeHandle, (NodeHandle, LinkId)> = HashMap::new();
        let mut queue = BinaryHeap::new();

        for (handle, node) in graph.nodes() {
            if node.is_home {
                cost.insert(handle, 0.0);
                queue.push(Candidate { cost: 0.0, node: handle });
            }
        }

        while let Some(Candidate { cost: reached, node: hop }) = queue.pop() {
            if cost.get(&hop).is_some_and(|&best| reached > best) {
                continue;
            }
            let hop_is_home = graph.node(hop).is_some_and(|n| n.is_home);

            for (peer, entry) in graph.neighbours(hop) {
                if graph.node(peer).is_none_or(|n| n.is_home) {
                    continue;
                }
                // `hop` relays (or, at home, receives) on behalf of `peer`.
                if entry.link.strength_from(hop) <= 0.0 {
                    continue;
                }
                if !hop_is_home && !entry.link.can_relay(hop) {
                    continue;
                }
                let through = reached + entry.link.distance();
                let better = match cost.get(&peer) {
                    Some(&known) => through < known,
                    None => true,
                };
                if better {
                    cost.insert(peer, through);
                    towards_home.insert(peer, (hop, entry.id));
                    queue.push(Candidate { cost: through, node: peer });
                }
            }
        }

        let mut routes = HashMap::new();
        for &start in towards_home.keys() {
            let mut path = vec![start];
            let mut links = Vec::new();
            let mut current = start;
            while let Some(&(next, link)) = towards_home.get(&current) {
                path.push(next);
                links.push(link);
                current = next;
            }
            let route_cost = cost.get(&start).copied().unwrap_or(f64::INFINITY);
            routes.insert(start, Route { path, links, cost: route_cost });
        }
        log::debug!("Computed routes for {} nodes", routes.len());
        Self { routes }
    }

    /// Route of `node`, if it reaches home.
    pub fn route(&self, node: NodeHandle) -> Option<&Route> {
        self.routes.get(&node)
    }

    /// Next hop of `node` towards home.
    pub fn first_hop(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.routes.get(&node).and_then(Route::first_hop)
    }

    /// Install a host-provided route for `node`.
    pub fn set_route(&mut self, node: NodeHandle, route: Route) {
        self.routes.insert(node, route);
    }

    /// Remove the route of `node`, returning it.
    pub fn clear_route(&mut self, node: NodeHandle) -> Option<Route> {
        self.routes.remove(&node)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::occluder::OccluderSet;
    use crate::simulation::signal_calculations::{NoRadio, StandardRangeModel};
    use crate::simulation::types::{Node, Position};

    fn p(x: f64) -> Position {
        Position::new(x, 0.0, 0.0)
    }

    #[test]
    fn relay_chain_routes_through_relays() {
        let mut graph = NetworkGraph::new();
        let home = graph.add_node(Node::new(0, "ksc", p(0.0)).home().with_laser(f64::INFINITY, f64::INFINITY));
        let relay = graph.add_node(Node::new(1, "relay", p(900.0)).with_laser(1000.0, 1000.0));
        let probe = graph.add_node(Node::new(2, "probe", p(1800.0)).with_laser(1000.0, 0.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());

        let routes = RoutingTable::compute(&graph);
        let route = routes.route(probe).unwrap();
        assert_eq!(route.path, vec![probe, relay, home]);
        assert_eq!(route.cost, 1800.0);
        assert_eq!(route.first_hop(), Some(relay));
        assert_eq!(route.home(), Some(home));
        assert_eq!(route.first_link(), graph.link_between(probe, relay).map(|e| e.id));
        assert_eq!(routes.first_hop(relay), Some(home));
        assert!(routes.route(home).is_none());
    }

    #[test]
    fn terminal_nodes_do_not_forward() {
        let mut graph = NetworkGraph::new();
        let home = graph.add_node(Node::new(0, "ksc", p(0.0)).home().with_laser(f64::INFINITY, f64::INFINITY));
        // The middle node can only receive, so nothing behind it reaches home.
        let middle = graph.add_node(Node::new(1, "terminal", p(900.0)).with_laser(1000.0, 0.0));
        let far = graph.add_node(Node::new(2, "far", p(1800.0)).with_laser(1000.0, 1000.0));
        graph.rebuild(&NoRadio, &OccluderSet::new());

        let routes = RoutingTable::compute(&graph);
        assert!(routes.route(far).is_none());
        assert_eq!(routes.first_hop(middle), Some(home));
    }

    #[test]
    fn direct_link_beats_equal_cost_detour() {
        let mut graph = NetworkGraph::new();
        let home = graph.add_node(Node::new(0, "ksc", p(0.0)).home().with_radio(0.0, 1e6));
        let near = graph.add_node(Node::new(1, "near", p(400.0)).with_radio(0.0, 1e6));
        let probe = graph.add_node(Node::new(2, "probe", p(800.0)).with_radio(0.0, 1e6));
        graph.rebuild(&StandardRangeModel, &OccluderSet::new());

        let routes = RoutingTable::compute(&graph);
        // Direct (800) and via `near` (400 + 400) tie; the first route found is kept.
        let route = routes.route(probe).unwrap();
        assert_eq!(route.cost, 800.0);
        assert_eq!(routes.first_hop(near), Some(home));
    }

    #[test]
    fn installed_routes_override_computed_ones() {
        let mut graph = NetworkGraph::new();
        let home = graph.add_node(Node::new(0, "ksc", p(0.0)).home());
        let probe = graph.add_node(Node::new(1, "probe", p(10.0)));
        let mut routes = RoutingTable::compute(&graph);
        assert!(routes.is_empty());

        routes.set_route(
            probe,
            Route {
                path: vec![probe, home],
                links: vec![LinkId(42)],
                cost: 10.0,
            },
        );
        assert_eq!(routes.first_hop(probe), Some(home));
        assert_eq!(routes.len(), 1);
        assert!(routes.clear_route(probe).is_some());
        assert!(routes.first_hop(probe).is_none());
    }
}
