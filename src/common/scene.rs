//! Scene loading, parsing, and validation logic.
//!
//! A scene lists the occluding bodies and the network endpoints (vessels and
//! ground stations) with their antennas. It is the input of the headless
//! runner and a convenient fixture format for hosts.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::simulation::antenna::AntennaConfig;
use crate::simulation::types::Position;

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// 3D point in meters.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Point3> for Position {
    fn from(p: Point3) -> Self {
        Position::new(p.x, p.y, p.z)
    }
}

/// Celestial body acting as an occluder.
#[derive(Debug, Deserialize, Clone)]
pub struct BodyConfig {
    pub name: String,
    pub position: Point3,
    /// Opaque core radius in meters.
    pub radius: f64,
    /// Meters per second, applied every tick.
    #[serde(default)]
    pub velocity: Option<Point3>,
}

/// Network endpoint as declared in the scene.
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub node_id: u32,
    pub name: String,
    pub position: Point3,
    #[serde(default)]
    pub velocity: Option<Point3>,
    /// Ground station.
    #[serde(default)]
    pub is_home: bool,
    /// The primary ground station, the only one with lasers unless configured otherwise.
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_loaded")]
    pub loaded: bool,
    #[serde(default)]
    pub aim_point: Option<Point3>,
    #[serde(default)]
    pub radio_power: f64,
    #[serde(default)]
    pub radio_relay_power: f64,
    #[serde(default)]
    pub antennas: Vec<AntennaConfig>,
}

fn default_loaded() -> bool {
    true
}

fn default_ticks() -> u32 {
    1
}

fn default_tick_seconds() -> f64 {
    1.0
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub bodies: Vec<BodyConfig>,
    pub nodes: Vec<NodeConfig>,
    /// Node the player controls during the run.
    #[serde(default)]
    pub active_node: Option<u32>,
    #[serde(default = "default_ticks")]
    pub ticks: u32,
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: f64,
    /// Settings TOML. Relative paths are resolved against the scene file's directory.
    #[serde(default)]
    pub settings: Option<String>,
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    let mut scene = parse_scene(&data)?;

    if let Some(ref settings) = scene.settings {
        if let Some(parent_dir) = Path::new(path).parent() {
            let full_path = parent_dir.join(settings);
            scene.settings = Some(full_path.to_string_lossy().to_string());
        }
    }

    Ok(scene)
}

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(e.to_string()))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;
    Ok(scene)
}

/// Validate scene configuration.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    if scene.nodes.is_empty() {
        return Err("Scene must contain at least one node".to_string());
    }
    if !(scene.tick_seconds.is_finite() && scene.tick_seconds >= 0.0) {
        return Err(format!("Invalid tick_seconds {}, must be a non-negative number", scene.tick_seconds));
    }

    let mut body_names = HashSet::new();
    for body in &scene.bodies {
        if !body_names.insert(body.name.as_str()) {
            return Err(format!("Duplicate body found: {}", body.name));
        }
        if !body.position.is_finite() || body.velocity.is_some_and(|v| !v.is_finite()) {
            return Err(format!("Body {} has a non-finite position or velocity", body.name));
        }
        if !(body.radius.is_finite() && body.radius >= 0.0) {
            return Err(format!("Body {} has invalid radius {}", body.name, body.radius));
        }
    }

    let mut node_ids = HashSet::new();
    for node in &scene.nodes {
        if !node_ids.insert(node.node_id) {
            return Err(format!("Duplicate node_id found: {}", node.node_id));
        }
    }

    for node in &scene.nodes {
        let finite_points = node.position.is_finite()
            && node.velocity.is_none_or(|v| v.is_finite())
            && node.aim_point.is_none_or(|p| p.is_finite());
        if !finite_points {
            return Err(format!("Node {} has a non-finite position, velocity or aim point", node.node_id));
        }
        for (label, power) in [("radio_power", node.radio_power), ("radio_relay_power", node.radio_relay_power)] {
            if !(power.is_finite() && power >= 0.0) {
                return Err(format!("Node {} has invalid {} {}", node.node_id, label, power));
            }
        }
        for (idx, antenna) in node.antennas.iter().enumerate() {
            if !(antenna.range >= 0.0) {
                return Err(format!("Node {} antenna {} has invalid range {}", node.node_id, idx, antenna.range));
            }
        }
    }

    if let Some(active) = scene.active_node {
        if !node_ids.contains(&active) {
            return Err(format!("Active node {} is not part of the scene", active));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "bodies": [ { "name": "Kerbin", "position": { "x": 0, "y": 0, "z": 0 }, "radius": 600000 } ],
        "nodes": [
            { "node_id": 1, "name": "KSC", "position": { "x": 600000, "y": 0, "z": 0 }, "is_home": true, "primary": true },
            { "node_id": 2, "name": "Relay", "position": { "x": 0, "y": 2000000, "z": 0 },
              "radio_relay_power": 1e9,
              "antennas": [ { "range": 5e6, "mode": "relay" } ] }
        ],
        "active_node": 2
    }"#;

    #[test]
    fn parses_a_minimal_scene_with_defaults() {
        let scene = parse_scene(MINIMAL).unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.ticks, 1);
        assert_eq!(scene.tick_seconds, 1.0);
        assert!(scene.nodes[1].loaded);
        assert_eq!(scene.nodes[1].antennas.len(), 1);
        assert_eq!(Position::from(scene.nodes[0].position), Position::new(600000.0, 0.0, 0.0));
    }

    #[test]
    fn rejects_invalid_scenes() {
        let cases = [
            r#"{ "nodes": [] }"#,
            r#"{ "nodes": [ { "node_id": 1, "name": "a", "position": { "x": 0, "y": 0, "z": 0 } },
                           { "node_id": 1, "name": "b", "position": { "x": 1, "y": 0, "z": 0 } } ] }"#,
            r#"{ "nodes": [ { "node_id": 1, "name": "a", "position": { "x": 0, "y": 0, "z": 0 }, "radio_power": -1 } ] }"#,
            r#"{ "nodes": [ { "node_id": 1, "name": "a", "position": { "x": 0, "y": 0, "z": 0 },
                             "antennas": [ { "range": -5 } ] } ] }"#,
            r#"{ "nodes": [ { "node_id": 1, "name": "a", "position": { "x": 0, "y": 0, "z": 0 } } ], "active_node": 9 }"#,
            r#"{ "bodies": [ { "name": "Mun", "position": { "x": 0, "y": 0, "z": 0 }, "radius": 1 },
                            { "name": "Mun", "position": { "x": 9, "y": 0, "z": 0 }, "radius": 1 } ],
                 "nodes": [ { "node_id": 1, "name": "a", "position": { "x": 0, "y": 0, "z": 0 } } ] }"#,
        ];
        for case in cases {
            assert!(matches!(parse_scene(case), Err(SceneLoadError::ValidationError(_))), "accepted: {case}");
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_scene("{ nodes: "), Err(SceneLoadError::ParseError(_))));
    }

    #[test]
    fn settings_path_is_resolved_next_to_the_scene() {
        let dir = std::env::temp_dir().join(format!("optical-scene-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scene.json");
        let scene_json = MINIMAL.replacen("\"active_node\": 2", "\"active_node\": 2, \"settings\": \"config.toml\"", 1);
        fs::write(&path, scene_json).unwrap();

        let scene = load_scene(path.to_str().unwrap()).unwrap();
        assert_eq!(scene.settings.as_deref().map(Path::new), Some(dir.join("config.toml").as_path()));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_scene("/definitely/not/here/scene.json").unwrap_err();
        assert!(matches!(err, SceneLoadError::FileReadError(_)));
        assert!(err.to_string().starts_with("Failed to read file"));
    }
}
