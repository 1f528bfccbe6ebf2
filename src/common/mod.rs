//! Configuration shared by the headless runner and host integrations.
//!
//! - `scene`: JSON scene with bodies, endpoints and their antennas
//! - `settings`: TOML laser settings and atmosphere opacity curves

pub mod scene;
pub mod settings;

pub use scene::{Scene, SceneLoadError, load_scene};
pub use settings::LaserSettings;
