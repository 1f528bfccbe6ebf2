//! Optical network core.
//!
//! Decides which node pairs of a radio network can additionally form a
//! directional (laser) link, and where each directional antenna should point
//! every tick. It integrates:
//! - Ray-sphere occlusion with ray-marched atmosphere attenuation
//! - Pair evaluation over range, reciprocal relay capability and occlusion
//! - An arena-backed network graph published one topology epoch at a time
//! - Control-path routing and per-antenna target selection
//!
//! ## Module Organization
//!
//! - `types`: Nodes, handles, link variants and pointing targets
//! - `geometry`: Distance helpers and ray-sphere intersection
//! - `opacity_curve`: Altitude to scattering coefficient profile
//! - `occluder`: Single-body occlusion test and the occluder set
//! - `signal_calculations`: Laser and radio strength models, signal quality
//! - `antenna`: Antenna declarations and range aggregation
//! - `network`: Node arena, link tables and the pair evaluator
//! - `routing`: Shortest control paths to home nodes
//! - `targeting`: Pointing target selection for one antenna
//! - `scheduler`: Per-tick antenna updates
//! - `runner`: Headless scene execution

pub mod antenna;
pub mod geometry;
pub mod network;
pub mod occluder;
pub mod opacity_curve;
pub mod routing;
pub mod runner;
pub mod scheduler;
pub mod signal_calculations;
pub mod targeting;
pub mod types;

// Re-export commonly used types
pub use network::NetworkGraph;
pub use occluder::{Occluder, OccluderSet};
pub use routing::RoutingTable;
pub use scheduler::TickScheduler;
pub use targeting::{AntennaState, NetworkContext, TargetDecision, select_target};
pub use types::{CommLink, LaserRanges, Node, NodeHandle, Position, SignalStrength, TrackingTarget};
