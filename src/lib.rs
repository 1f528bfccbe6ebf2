//! Directional (laser) links layered over an omnidirectional radio network.

pub mod common;
pub mod simulation;
