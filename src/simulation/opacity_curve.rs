//! Atmosphere opacity profile.
//!
//! A piecewise cubic Hermite curve mapping altitude above a body's core
//! surface (meters) to the fraction of light scattered per kilometer.
//! Keys may carry explicit in/out tangents; plain `(altitude, coefficient)`
//! samples get flat tangents, which eases smoothly between samples.
//! Lookups outside the declared altitude range clamp to the end keys.

/// One curve key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveKey {
    pub altitude: f64,
    pub coefficient: f64,
    pub in_tangent: f64,
    pub out_tangent: f64,
}

impl CurveKey {
    pub fn new(altitude: f64, coefficient: f64) -> Self {
        Self {
            altitude,
            coefficient,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    /// Build a key from 2 (`altitude coefficient`) or 4
    /// (`altitude coefficient in_tangent out_tangent`) numbers.
    pub fn from_values(values: &[f64]) -> Result<Self, String> {
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(format!("non-finite value {bad} in curve key"));
        }
        match values {
            [altitude, coefficient] => Ok(Self::new(*altitude, *coefficient)),
            [altitude, coefficient, in_tangent, out_tangent] => Ok(Self {
                altitude: *altitude,
                coefficient: *coefficient,
                in_tangent: *in_tangent,
                out_tangent: *out_tangent,
            }),
            _ => Err(format!("curve key needs 2 or 4 values, got {}", values.len())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpacityCurve {
    keys: Vec<CurveKey>,
}

impl OpacityCurve {
    /// Build a curve from keys in any order. Returns `None` for an empty key set.
    pub fn new(mut keys: Vec<CurveKey>) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        keys.sort_by(|a, b| a.altitude.total_cmp(&b.altitude));
        Some(Self { keys })
    }

    pub fn from_samples(samples: &[(f64, f64)]) -> Option<Self> {
        Self::new(samples.iter().map(|&(altitude, coefficient)| CurveKey::new(altitude, coefficient)).collect())
    }

    /// A curve that scatters the same fraction at every altitude up to `ceiling`.
    pub fn uniform(coefficient: f64, ceiling: f64) -> Self {
        Self {
            keys: vec![CurveKey::new(0.0, coefficient), CurveKey::new(ceiling, coefficient)],
        }
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Highest declared altitude, i.e. the atmosphere shell thickness.
    pub fn max_altitude(&self) -> f64 {
        self.keys.last().map_or(0.0, |k| k.altitude.max(0.0))
    }

    pub fn evaluate(&self, altitude: f64) -> f64 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if altitude <= first.altitude {
            return first.coefficient;
        }
        if altitude >= last.altitude {
            return last.coefficient;
        }

        // First key strictly above the altitude; guaranteed to be in 1..len.
        let upper = self.keys.partition_point(|k| k.altitude <= altitude);
        let k0 = &self.keys[upper - 1];
        let k1 = &self.keys[upper];
        hermite(k0, k1, altitude)
    }
}

fn hermite(k0: &CurveKey, k1: &CurveKey, altitude: f64) -> f64 {
    let span = k1.altitude - k0.altitude;
    if span <= 0.0 {
        return k1.coefficient;
    }
    if k0.coefficient == k1.coefficient && k0.out_tangent == 0.0 && k1.in_tangent == 0.0 {
        // Flat segment.
        return k0.coefficient;
    }
    let s = (altitude - k0.altitude) / span;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    h00 * k0.coefficient + h10 * span * k0.out_tangent + h01 * k1.coefficient + h11 * span * k1.in_tangent
}
