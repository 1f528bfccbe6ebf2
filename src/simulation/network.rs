//! Network graph: node arena, link tables and pair evaluation.
//!
//! High-level flow of one topology epoch:
//! 1) The host pushes live node positions and laser ranges (and occluder
//!    positions) into the graph.
//! 2) `begin_epoch` stages a copy of the published link table.
//! 3) `set_node_connection` is called for every pair the radio layer wants
//!    re-tested. The radio verdict is taken first; the directional layer then
//!    upgrades it to a laser link when range, reciprocal relay capability and
//!    occlusion allow.
//! 4) `commit_epoch` publishes the staged table. Readers (routing, targeting)
//!    never observe a partially evaluated epoch.

use std::collections::HashMap;

use super::geometry::{distance_from_d2, distance2};
use super::occluder::OccluderSet;
use super::signal_calculations::{RadioLinkModel, laser_strength, usable_range};
use super::types::{CommLink, DirectionalLink, LaserRanges, LinkEntry, LinkId, Node, NodeHandle, PairKey, Position, RadioLink, SignalStrength};

/// Verdict for one node pair, before it is written to a link table.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    Disconnected,
    Radio(RadioLink),
    Directional(DirectionalLink),
}

/// Decide the connection between `a` and `b`.
///
/// Pure function of the two nodes, the radio layer and the occluders; calling
/// it twice with the same inputs gives identical results.
///
/// # Parameters
///
/// * `a`, `b` - Handles and node data of both endpoints
/// * `radio` - Radio layer verdict provider; its result is the fallback
/// * `occluders` - Bodies that may block or attenuate the beam
///
/// # Returns
///
/// The directional link when the laser layer can improve on the radio layer,
/// otherwise the radio verdict (possibly `Disconnected`).
pub fn evaluate_pair(
    (ha, a): (NodeHandle, &Node),
    (hb, b): (NodeHandle, &Node),
    radio: &dyn RadioLinkModel,
    occluders: &OccluderSet,
) -> PairOutcome {
    if a.is_home && b.is_home {
        return PairOutcome::Disconnected;
    }

    let d2 = distance2(&a.position, &b.position);
    let distance = distance_from_d2(d2);

    let radio_link = radio.evaluate(a, b, distance).map(|s| RadioLink {
        a: ha,
        b: hb,
        distance,
        strength_rr: s.strength_rr,
        strength_ar: s.strength_ar,
        strength_br: s.strength_br,
        a_can_relay: s.a_can_relay,
        b_can_relay: s.b_can_relay,
        both_relay: s.a_can_relay && s.b_can_relay,
    });
    let fallback = || match &radio_link {
        Some(link) => PairOutcome::Radio(link.clone()),
        None => PairOutcome::Disconnected,
    };

    let a_can_relay = can_relay_to(&a.laser, &b.laser, d2);
    let b_can_relay = can_relay_to(&b.laser, &a.laser, d2);
    if !a_can_relay && !b_can_relay {
        return fallback();
    }

    let attenuation = occluders.attenuation(&a.position, &b.position);
    if attenuation == 0.0 {
        log::trace!("{} <-> {}: beam occluded", a.name, b.name);
        return fallback();
    }

    let direction_strength = |can_relay: bool, from: &LaserRanges, to: &LaserRanges| {
        if can_relay {
            laser_strength(distance, usable_range(from.relay, to.receive)) * attenuation
        } else {
            0.0
        }
    };

    let mut carried = radio_link.clone().unwrap_or_else(|| RadioLink::silent(ha, hb, distance));
    carried.a_can_relay |= a_can_relay;
    carried.b_can_relay |= b_can_relay;
    carried.both_relay = carried.a_can_relay && carried.b_can_relay;

    PairOutcome::Directional(DirectionalLink {
        radio: carried,
        strength_a_to_b: direction_strength(a_can_relay, &a.laser, &b.laser),
        strength_b_to_a: direction_strength(b_can_relay, &b.laser, &a.laser),
        attenuation,
        laser_a_can_relay: a_can_relay,
        laser_b_can_relay: b_can_relay,
    })
}

/// `from` can relay a beam that `to` can receive at squared distance `d2`.
fn can_relay_to(from: &LaserRanges, to: &LaserRanges, d2: f64) -> bool {
    from.relay > 0.0 && to.receive > 0.0 && d2 <= from.relay * from.relay && d2 <= to.receive * to.receive
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

type LinkTable = HashMap<PairKey, LinkEntry>;

/// Owner of every node and link of the network.
#[derive(Debug, Default)]
pub struct NetworkGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    ids: HashMap<u32, NodeHandle>,
    links: LinkTable,
    staging: Option<LinkTable>,
    next_link_id: u64,
    epoch: u64,
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint. A node with an already registered `node_id` replaces
    /// the previous data and keeps its handle.
    ///
    /// Links are not evaluated here; the new node is connected by the next
    /// `set_node_connection` or `rebuild`.
    ///
    /// # Parameters
    ///
    /// * `node` - Endpoint data, keyed by its `node_id`
    ///
    /// # Returns
    ///
    /// Handle of the node, valid until it is removed.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        if let Some(&handle) = self.ids.get(&node.node_id) {
            log::warn!("Node {} ({}) added twice, replacing its data", node.node_id, node.name);
            if let Some(slot) = self.slots.get_mut(handle.index as usize) {
                slot.node = Some(node);
            }
            return handle;
        }

        let (node_id, name) = (node.node_id, node.name.clone());
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeHandle {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        log::debug!("Node {} ({}) joined the network", node_id, name);
        self.ids.insert(node_id, handle);
        handle
    }

    /// Remove an endpoint and every link touching it, in both the published
    /// and the staged table.
    pub fn remove_node(&mut self, handle: NodeHandle) -> Option<Node> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.ids.remove(&node.node_id);

        self.links.retain(|key, _| !key.contains(handle));
        if let Some(staged) = self.staging.as_mut() {
            staged.retain(|key, _| !key.contains(handle));
        }
        log::debug!("Node {} ({}) left the network", node.node_id, node.name);
        Some(node)
    }

    /// Look up a node by handle.
    ///
    /// # Returns
    ///
    /// `None` when the handle is stale (the node was removed) or unknown.
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    /// Mutable access to a node. Link tables are unaffected until re-evaluated.
    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Handle of the node registered under `node_id`.
    pub fn handle_for(&self, node_id: u32) -> Option<NodeHandle> {
        self.ids.get(&node_id).copied()
    }

    /// Live nodes in handle order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Move a node.
    ///
    /// # Returns
    ///
    /// `false` for a stale handle.
    pub fn set_position(&mut self, handle: NodeHandle, position: Position) -> bool {
        match self.node_mut(handle) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Replace a node's laser ranges, e.g. after an antenna was switched off.
    ///
    /// # Returns
    ///
    /// `false` for a stale handle.
    pub fn set_laser_ranges(&mut self, handle: NodeHandle, ranges: LaserRanges) -> bool {
        match self.node_mut(handle) {
            Some(node) => {
                node.laser = ranges;
                true
            }
            None => false,
        }
    }

    /// Start staging pair evaluations. No-op when an epoch is already open.
    pub fn begin_epoch(&mut self) {
        if self.staging.is_none() {
            self.staging = Some(self.links.clone());
        }
    }

    /// Publish the staged link table.
    pub fn commit_epoch(&mut self) {
        if let Some(staged) = self.staging.take() {
            self.links = staged;
            self.epoch += 1;
            log::debug!("Epoch {} committed with {} links", self.epoch, self.links.len());
        }
    }

    /// Number of committed epochs.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Re-evaluate the connection between `a` and `b` into the staged table.
    ///
    /// Opens an epoch if none is open. The result becomes visible to readers
    /// only after `commit_epoch`.
    ///
    /// # Returns
    ///
    /// `true` when the pair ends up connected (by radio or laser).
    pub fn set_node_connection(&mut self, a: NodeHandle, b: NodeHandle, radio: &dyn RadioLinkModel, occluders: &OccluderSet) -> bool {
        if a == b {
            return false;
        }
        let outcome = match (self.node(a), self.node(b)) {
            (Some(node_a), Some(node_b)) => evaluate_pair((a, node_a), (b, node_b), radio, occluders),
            _ => return false,
        };

        self.begin_epoch();
        let mut next_link_id = self.next_link_id;
        let mut fresh_id = || {
            let id = LinkId(next_link_id);
            next_link_id += 1;
            id
        };

        let key = PairKey::new(a, b);
        let Some(staged) = self.staging.as_mut() else {
            return false;
        };
        let connected = match outcome {
            PairOutcome::Disconnected => {
                if let Some(removed) = staged.remove(&key) {
                    log::debug!("Link {:?} between {:?} and {:?} removed", removed.id, a, b);
                }
                false
            }
            PairOutcome::Radio(link) => {
                match staged.get_mut(&key) {
                    Some(LinkEntry {
                        link: CommLink::Radio(existing),
                        ..
                    }) => *existing = link,
                    Some(entry) => {
                        *entry = LinkEntry {
                            id: fresh_id(),
                            link: CommLink::Radio(link),
                        };
                        log::debug!("Link {:?} between {:?} and {:?} fell back to radio", entry.id, a, b);
                    }
                    None => {
                        staged.insert(
                            key,
                            LinkEntry {
                                id: fresh_id(),
                                link: CommLink::Radio(link),
                            },
                        );
                    }
                }
                true
            }
            PairOutcome::Directional(link) => {
                let entry = LinkEntry {
                    id: fresh_id(),
                    link: CommLink::Directional(link),
                };
                log::debug!(
                    "Laser link {:?} between {:?} and {:?} (strength {:.3})",
                    entry.id,
                    a,
                    b,
                    entry.link.best_signal()
                );
                staged.insert(key, entry);
                true
            }
        };
        self.next_link_id = next_link_id;
        connected
    }

    /// Evaluate every node pair and publish the result as one epoch.
    pub fn rebuild(&mut self, radio: &dyn RadioLinkModel, occluders: &OccluderSet) {
        let handles: Vec<NodeHandle> = self.nodes().map(|(handle, _)| handle).collect();
        self.begin_epoch();
        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                self.set_node_connection(a, b, radio, occluders);
            }
        }
        self.commit_epoch();
    }

    /// Published link between two nodes, if any.
    pub fn link_between(&self, a: NodeHandle, b: NodeHandle) -> Option<&LinkEntry> {
        self.links.get(&PairKey::new(a, b))
    }

    /// Published link by id. Ids of replaced links no longer resolve.
    pub fn link(&self, id: LinkId) -> Option<&LinkEntry> {
        self.links.values().find(|entry| entry.id == id)
    }

    /// Published links ordered by id.
    pub fn links(&self) -> Vec<&LinkEntry> {
        let mut links: Vec<&LinkEntry> = self.links.values().collect();
        links.sort_by_key(|entry| entry.id);
        links
    }

    /// Peers directly connected to `node`, ordered by handle.
    pub fn neighbours(&self, node: NodeHandle) -> Vec<(NodeHandle, &LinkEntry)> {
        let mut peers: Vec<(NodeHandle, &LinkEntry)> = self
            .links
            .iter()
            .filter(|(key, _)| key.contains(node))
            .map(|(_, entry)| (entry.link.other_end(node), entry))
            .collect();
        peers.sort_by_key(|(peer, _)| *peer);
        peers
    }

    /// Directional link for the same pair as a radio link.
    pub fn find_directional_link(&self, radio: &RadioLink) -> Option<&DirectionalLink> {
        self.link_between(radio.a, radio.b).and_then(|entry| entry.link.directional())
    }

    /// Combined best-of-radio-and-laser strength of the signal `from` sends to `to`.
    pub fn strength_between(&self, from: NodeHandle, to: NodeHandle) -> f64 {
        self.link_between(from, to).map_or(0.0, |entry| entry.link.strength_from(from))
    }
}
