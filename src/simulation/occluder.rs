//! Occlusion of directional links by spherical bodies.
//!
//! Each body has an opaque core and an optional atmosphere shell whose
//! opacity profile partially attenuates a beam passing through it. The
//! occluder set combines every body's effect multiplicatively for one ray.

use super::geometry::{distance_from_d2, distance2, ray_sphere_intersections};
use super::opacity_curve::OpacityCurve;
use super::types::Position;

/// Number of equally spaced samples (both clipped endpoints included) used
/// to integrate attenuation through an atmosphere.
pub const RAY_MARCH_STEPS: usize = 10;

/// Spherical body that can block or attenuate a beam.
#[derive(Debug, Clone)]
pub struct Occluder {
    body: String,
    position: Position,
    radius: f64,
    atmosphere: Option<OpacityCurve>,
}

impl Occluder {
    /// Create an occluder with an opaque core and no atmosphere.
    ///
    /// # Parameters
    ///
    /// * `body` - Body name, used to match opacity curves
    /// * `position` - Body center in world coordinates
    /// * `radius` - Opaque core radius in meters
    pub fn new(body: impl Into<String>, position: Position, radius: f64) -> Self {
        Self {
            body: body.into(),
            position,
            radius,
            atmosphere: None,
        }
    }

    /// Attach an atmosphere; its shell extends to the curve's highest key.
    pub fn with_atmosphere(mut self, curve: OpacityCurve) -> Self {
        self.atmosphere = Some(curve);
        self
    }

    /// Replace or remove the atmosphere.
    pub fn set_atmosphere(&mut self, curve: Option<OpacityCurve>) {
        self.atmosphere = curve;
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Bodies move; the host pushes the authoritative position before each epoch.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn atmosphere(&self) -> Option<&OpacityCurve> {
        self.atmosphere.as_ref()
    }

    /// Atmosphere shell thickness beyond the core. Zero without an atmosphere.
    pub fn extra_radius(&self) -> f64 {
        self.atmosphere.as_ref().map_or(0.0, OpacityCurve::max_altitude)
    }

    /// Cheap pre-check: can a segment of `length` starting at `source` reach this body at all?
    pub fn in_range(&self, source: &Position, length: f64) -> bool {
        let reach = length + self.radius + self.extra_radius();
        distance2(source, &self.position) <= reach * reach
    }

    /// Fraction of signal surviving this body on the segment `a`–`b`.
    ///
    /// Returns 1.0 for no effect and 0.0 for full occlusion.
    pub fn raycast(&self, a: &Position, b: &Position) -> f64 {
        let mut source = a - self.position;
        let mut dest = b - self.position;
        if source.norm_squared() > dest.norm_squared() {
            std::mem::swap(&mut source, &mut dest);
        }

        let segment = dest - source;
        let length = segment.norm();
        if length <= 0.0 {
            return 1.0;
        }
        let ray = segment / length;
        let half_b = source.dot(&ray);
        let source_norm2 = source.norm_squared();

        let extra_radius = self.extra_radius();
        let outer_radius = self.radius + extra_radius;

        if let Some(core) = ray_sphere_intersections(half_b, source_norm2, self.radius) {
            if core.ahead() {
                if core.near <= length {
                    return 0.0;
                }
                // The segment ends before reaching the core; only the shell can matter.
            } else if source_norm2 >= outer_radius * outer_radius {
                // Facing away from the body from outside its atmosphere.
                return 1.0;
            }
        }

        let curve = match &self.atmosphere {
            Some(curve) if extra_radius > 0.0 => curve,
            _ => return 1.0,
        };

        let Some(shell) = ray_sphere_intersections(half_b, source_norm2, outer_radius) else {
            return 1.0;
        };
        let Some((enter, exit)) = shell.clip(length) else {
            return 1.0;
        };

        let start = source + ray * enter;
        let end = if exit >= length { dest } else { source + ray * exit };
        self.ray_march(&start, &end, curve)
    }

    /// Integrate exponential decay along body-centered `start`–`end`.
    fn ray_march(&self, start: &Position, end: &Position, curve: &OpacityCurve) -> f64 {
        let step = (end - start) / (RAY_MARCH_STEPS - 1) as f64;
        let step_km = step.norm() / 1000.0;

        let mut light = 1.0;
        for i in 0..RAY_MARCH_STEPS {
            let altitude = (start + step * i as f64).norm() - self.radius;
            let scattered = curve.evaluate(altitude.max(0.0));
            light *= transmittance(scattered, step_km);
            if light <= 0.0 {
                return 0.0;
            }
        }
        light.clamp(0.0, 1.0)
    }
}

/// Surviving fraction over `step_km` kilometers for a per-kilometer scattering coefficient.
fn transmittance(scattered_per_km: f64, step_km: f64) -> f64 {
    if scattered_per_km >= 1.0 {
        return 0.0;
    }
    let scattered = scattered_per_km.max(0.0);
    (step_km * (1.0 - scattered).ln()).exp()
}

/// Occluders registered for one topology epoch.
///
/// Registration is append-only while an epoch is being evaluated; positions
/// and atmospheres are refreshed between epochs.
#[derive(Debug, Clone, Default)]
pub struct OccluderSet {
    occluders: Vec<Occluder>,
}

impl OccluderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an occluder for the current epoch.
    pub fn push(&mut self, occluder: Occluder) {
        log::debug!(
            "Registered occluder {} (radius {:.0} m, atmosphere {:.0} m)",
            occluder.body,
            occluder.radius,
            occluder.extra_radius()
        );
        self.occluders.push(occluder);
    }

    pub fn len(&self) -> usize {
        self.occluders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occluders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Occluder> {
        self.occluders.iter()
    }

    /// Occluder registered for `body`.
    pub fn get(&self, body: &str) -> Option<&Occluder> {
        self.occluders.iter().find(|o| o.body == body)
    }

    pub fn get_mut(&mut self, body: &str) -> Option<&mut Occluder> {
        self.occluders.iter_mut().find(|o| o.body == body)
    }

    /// Returns `false` when no occluder is registered for `body`.
    pub fn update_position(&mut self, body: &str, position: Position) -> bool {
        match self.get_mut(body) {
            Some(occluder) => {
                occluder.set_position(position);
                true
            }
            None => false,
        }
    }

    /// Combined attenuation multiplier for the segment `a`–`b`.
    ///
    /// Product of every in-range occluder's factor; stops at the first full occlusion.
    pub fn attenuation(&self, a: &Position, b: &Position) -> f64 {
        let length = distance_from_d2(distance2(a, b));
        let mut multiplier = 1.0;
        for occluder in &self.occluders {
            if !occluder.in_range(a, length) {
                continue;
            }
            multiplier *= occluder.raycast(a, b);
            if multiplier == 0.0 {
                log::trace!("Ray fully occluded by {}", occluder.body);
                return 0.0;
            }
        }
        multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    const KERBIN_RADIUS: f64 = 600_000.0;

    fn p(x: f64, y: f64, z: f64) -> Position {
        Position::new(x, y, z)
    }

    fn opaque(body: &str, center: Position, radius: f64) -> Occluder {
        Occluder::new(body, center, radius)
    }

    fn hazy(body: &str, center: Position, radius: f64, coefficient: f64, thickness: f64) -> Occluder {
        Occluder::new(body, center, radius).with_atmosphere(OpacityCurve::uniform(coefficient, thickness))
    }

    #[test]
    fn opaque_core_blocks_ray_through_it() {
        let body = opaque("Mun", p(0.0, 0.0, 0.0), 200_000.0);
        assert_eq!(body.raycast(&p(-1_000_000.0, 0.0, 0.0), &p(1_000_000.0, 0.0, 0.0)), 0.0);
        // Argument order does not matter.
        assert_eq!(body.raycast(&p(1_000_000.0, 0.0, 0.0), &p(-1_000_000.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn ray_outside_shell_is_untouched() {
        let body = hazy("Kerbin", p(0.0, 0.0, 0.0), KERBIN_RADIUS, 0.5, 70_000.0);
        let y = KERBIN_RADIUS + 80_000.0;
        assert_eq!(body.raycast(&p(-2_000_000.0, y, 0.0), &p(2_000_000.0, y, 0.0)), 1.0);
    }

    #[test]
    fn facing_away_from_body_is_untouched() {
        let body = hazy("Kerbin", p(0.0, 0.0, 0.0), KERBIN_RADIUS, 0.5, 70_000.0);
        assert_eq!(body.raycast(&p(1_000_000.0, 0.0, 0.0), &p(3_000_000.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn segment_ending_before_core_is_not_blocked() {
        let body = opaque("Mun", p(0.0, 0.0, 0.0), 200_000.0);
        assert_eq!(body.raycast(&p(-1_000_000.0, 0.0, 0.0), &p(-500_000.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn coincident_endpoints_are_degenerate_pass() {
        let body = opaque("Mun", p(0.0, 0.0, 0.0), 200_000.0);
        let at = p(300_000.0, 0.0, 0.0);
        assert_eq!(body.raycast(&at, &at), 1.0);
    }

    #[test]
    fn grazing_atmosphere_attenuates_partially() {
        let body = hazy("Kerbin", p(0.0, 0.0, 0.0), KERBIN_RADIUS, 0.01, 70_000.0);
        let y = KERBIN_RADIUS + 35_000.0;
        let light = body.raycast(&p(-2_000_000.0, y, 0.0), &p(2_000_000.0, y, 0.0));
        assert!(light > 0.0 && light < 1.0, "light = {light}");
    }

    #[test]
    fn uniform_atmosphere_matches_closed_form() {
        // Both endpoints inside the shell: the clipped segment is the full segment.
        let coefficient = 0.02;
        let body = hazy("Kerbin", p(0.0, 0.0, 0.0), KERBIN_RADIUS, coefficient, 70_000.0);
        let y = KERBIN_RADIUS + 50_000.0;
        let a = p(-90_000.0, y, 0.0);
        let b = p(90_000.0, y, 0.0);
        let step_km = 180.0 / (RAY_MARCH_STEPS - 1) as f64;
        let expected = (RAY_MARCH_STEPS as f64 * step_km * (1.0 - coefficient).ln()).exp();
        assert!((body.raycast(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn total_absorption_coefficient_blocks() {
        let body = hazy("Eve", p(0.0, 0.0, 0.0), KERBIN_RADIUS, 1.0, 90_000.0);
        let y = KERBIN_RADIUS + 45_000.0;
        assert_eq!(body.raycast(&p(-2_000_000.0, y, 0.0), &p(2_000_000.0, y, 0.0)), 0.0);
    }

    #[test]
    fn in_range_rejects_distant_bodies() {
        let body = hazy("Kerbin", p(0.0, 0.0, 0.0), KERBIN_RADIUS, 0.5, 70_000.0);
        assert!(body.in_range(&p(KERBIN_RADIUS + 100_000.0, 0.0, 0.0), 50_000.0));
        assert!(!body.in_range(&p(10_000_000.0, 0.0, 0.0), 1_000.0));
    }

    #[test]
    fn set_multiplies_and_short_circuits() {
        let mut set = OccluderSet::new();
        set.push(hazy("A", p(0.0, 0.0, 0.0), 100_000.0, 0.05, 20_000.0));
        set.push(hazy("B", p(1_000_000.0, 0.0, 0.0), 100_000.0, 0.05, 20_000.0));
        let a = p(-500_000.0, 110_000.0, 0.0);
        let b = p(1_500_000.0, 110_000.0, 0.0);

        let first = set.get("A").unwrap().raycast(&a, &b);
        let second = set.get("B").unwrap().raycast(&a, &b);
        assert!((set.attenuation(&a, &b) - first * second).abs() < 1e-12);

        set.push(opaque("Wall", p(500_000.0, 110_000.0, 0.0), 1_000.0));
        assert_eq!(set.attenuation(&a, &b), 0.0);
    }

    #[test]
    fn set_is_invariant_under_permutation() {
        let mut occluders = vec![
            hazy("A", p(0.0, 0.0, 0.0), 100_000.0, 0.05, 20_000.0),
            hazy("B", p(1_000_000.0, 0.0, 0.0), 100_000.0, 0.02, 30_000.0),
            hazy("C", p(2_000_000.0, -5_000.0, 0.0), 90_000.0, 0.08, 40_000.0),
            opaque("D", p(0.0, 5_000_000.0, 0.0), 50_000.0),
        ];
        let a = p(-500_000.0, 112_000.0, 0.0);
        let b = p(2_500_000.0, 100_000.0, 0.0);

        let reference = occluders.iter().cloned().fold(OccluderSet::new(), |mut set, o| {
            set.push(o);
            set
        });
        let expected = reference.attenuation(&a, &b);
        assert!(expected > 0.0 && expected < 1.0);

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            occluders.shuffle(&mut rng);
            let mut set = OccluderSet::new();
            for o in &occluders {
                set.push(o.clone());
            }
            assert!((set.attenuation(&a, &b) - expected).abs() < 1e-12);
            assert!((set.attenuation(&b, &a) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn update_position_moves_body() {
        let mut set = OccluderSet::new();
        set.push(opaque("Mun", p(0.0, 0.0, 0.0), 200_000.0));
        let a = p(-1_000_000.0, 0.0, 0.0);
        let b = p(1_000_000.0, 0.0, 0.0);
        assert_eq!(set.attenuation(&a, &b), 0.0);
        assert!(set.update_position("Mun", p(0.0, 5_000_000.0, 0.0)));
        assert_eq!(set.attenuation(&a, &b), 1.0);
        assert!(!set.update_position("Minmus", p(0.0, 0.0, 0.0)));
    }
}
