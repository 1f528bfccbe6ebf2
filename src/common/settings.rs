//! Laser settings loaded from TOML.
//!
//! Controls which ground stations carry directional terminals and declares
//! the atmosphere opacity curve of each body. Curve problems never abort
//! loading: they are logged once and the body keeps an opaque core only.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::simulation::occluder::OccluderSet;
use crate::simulation::opacity_curve::{CurveKey, OpacityCurve};
use crate::simulation::types::LaserRanges;

/// One `[[opaqueness-curve]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpaquenessCurveConfig {
    pub body: Option<String>,
    /// Each key is `[altitude, coefficient]` or `[altitude, coefficient, in_tangent, out_tangent]`.
    pub keys: Option<Vec<toml::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LaserSettings {
    /// Every ground station gets lasers, not only the primary one.
    pub all_ground_stations_have_lasers: bool,
    /// Ground station lasers need a tracking station upgrade.
    pub require_tracking_station_upgrade: bool,
    pub tracking_station_upgraded: bool,
    #[serde(rename = "opaqueness-curve")]
    pub opaqueness_curves: Vec<OpaquenessCurveConfig>,
}

impl Default for LaserSettings {
    fn default() -> Self {
        Self {
            all_ground_stations_have_lasers: false,
            require_tracking_station_upgrade: false,
            tracking_station_upgraded: true,
            opaqueness_curves: Vec::new(),
        }
    }
}

impl LaserSettings {
    /// Load settings from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the settings file
    ///
    /// # Returns
    /// * `Ok(LaserSettings)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Whether a ground station carries a directional relay terminal.
    pub fn home_has_lasers(&self, is_primary: bool) -> bool {
        if self.require_tracking_station_upgrade && !self.tracking_station_upgraded {
            return false;
        }
        self.all_ground_stations_have_lasers || is_primary
    }

    /// Laser ranges of a ground station: unlimited when it carries a terminal.
    pub fn home_ranges(&self, is_primary: bool) -> LaserRanges {
        if self.home_has_lasers(is_primary) {
            LaserRanges::UNLIMITED
        } else {
            LaserRanges::NONE
        }
    }

    /// Install the declared opacity curves on the matching occluders.
    ///
    /// # Returns
    ///
    /// Number of bodies that ended up with an atmosphere.
    pub fn apply_opaqueness_curves(&self, occluders: &mut OccluderSet) -> usize {
        let mut declarations: HashMap<&str, usize> = HashMap::new();
        for curve in &self.opaqueness_curves {
            if let Some(body) = curve.body.as_deref() {
                *declarations.entry(body).or_default() += 1;
            }
        }

        let mut reported_duplicates = HashSet::new();
        let mut applied = 0;
        for (idx, curve) in self.opaqueness_curves.iter().enumerate() {
            let Some(body) = curve.body.as_deref() else {
                log::error!("Opaqueness curve #{} has no body attribute", idx);
                continue;
            };
            let Some(occluder) = occluders.get_mut(body) else {
                log::warn!("Opaqueness curve for unknown body {}", body);
                continue;
            };
            if declarations.get(body).copied().unwrap_or(0) > 1 {
                if reported_duplicates.insert(body) {
                    log::error!("Duplicate opaqueness curve for {}, using no atmosphere", body);
                }
                occluder.set_atmosphere(None);
                continue;
            }

            match parse_curve(curve.keys.as_deref()) {
                Ok(opacity) => {
                    log::info!("Atmosphere of {} extends {:.0} m above the surface", body, opacity.max_altitude());
                    occluder.set_atmosphere(Some(opacity));
                    applied += 1;
                }
                Err(msg) => {
                    log::error!("Opaqueness curve for {}: {}, using no atmosphere", body, msg);
                    occluder.set_atmosphere(None);
                }
            }
        }
        applied
    }
}

fn parse_curve(keys: Option<&[toml::Value]>) -> Result<OpacityCurve, String> {
    let keys = keys.ok_or_else(|| "missing keys".to_string())?;
    let parsed = keys.iter().map(parse_key).collect::<Result<Vec<_>, _>>()?;
    OpacityCurve::new(parsed).ok_or_else(|| "no keys".to_string())
}

fn parse_key(value: &toml::Value) -> Result<CurveKey, String> {
    let items = value.as_array().ok_or_else(|| format!("key {} is not an array", value))?;
    let numbers = items
        .iter()
        .map(|item| match item {
            toml::Value::Integer(i) => Ok(*i as f64),
            toml::Value::Float(f) => Ok(*f),
            other => Err(format!("key value {} is not a number", other)),
        })
        .collect::<Result<Vec<f64>, String>>()?;
    CurveKey::from_values(&numbers)
}
