//! Headless optical link simulator.
//!
//! Usage: `optical-link-simulator <scene.json> [settings.toml]`
//!
//! The settings path falls back to the scene's `settings` entry, then to a
//! `config.toml` next to the scene; without any settings file the defaults
//! are used. The run summary is printed to stdout as JSON.

use anyhow::Context;
use env_logger::Builder;
use log::{LevelFilter, info, warn};
use std::path::{Path, PathBuf};

use optical_link_simulator::common::{LaserSettings, load_scene};
use optical_link_simulator::simulation::runner::run_scene;

/// Resolve the settings file path from the command line or the scene.
fn settings_path(explicit: Option<String>, scene_settings: Option<&str>, scene_path: &str) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if let Some(path) = scene_settings {
        return PathBuf::from(path);
    }
    Path::new(scene_path).parent().unwrap_or(Path::new(".")).join("config.toml")
}

fn main() -> anyhow::Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("optical_link_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let scene_path = args.next().context("Usage: optical-link-simulator <scene.json> [settings.toml]")?;
    let explicit_settings = args.next();

    let scene = load_scene(&scene_path).with_context(|| format!("Failed to load scene {}", scene_path))?;
    info!("Loaded scene {} with {} nodes and {} bodies", scene_path, scene.nodes.len(), scene.bodies.len());

    let path = settings_path(explicit_settings.clone(), scene.settings.as_deref(), &scene_path);
    let settings = match LaserSettings::load(&path) {
        Ok(settings) => {
            info!("Loaded settings from {}", path.display());
            settings
        }
        Err(e) if explicit_settings.is_some() || scene.settings.is_some() => {
            return Err(anyhow::anyhow!(e)).with_context(|| format!("Failed to load settings {}", path.display()));
        }
        Err(e) => {
            warn!("{}; using default settings", e);
            LaserSettings::default()
        }
    };

    let summary = run_scene(&scene, &settings);
    info!("Finished {} ticks with {} links", summary.ticks, summary.links.len());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
