//! Brush parameter modulation.
//!
//! Maps normalized sensor readings onto multiplicative factors applied to
//! a brush parameter's base value. Several sensors may target the same
//! parameter; their factors combine as a product, so the result does not
//! depend on configuration order.

use crate::sensor::{ResponseCurve, SensorKind, SensorLimits, SensorSample};

/// Exponents below this are treated as this value so `1 / strength`
/// stays finite.
const MIN_STRENGTH: f32 = 1e-3;

/// Mapping from one sensor channel to a factor range for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationConfig {
    /// The sensor driving this mapping.
    pub sensor: SensorKind,
    /// Response curve applied to the sensor value.
    pub curve: ResponseCurve,
    /// Strength exponent; the curved value is raised to `1 / strength`.
    pub strength: f32,
    /// Factor produced when the shaped sensor value is 0.
    pub min: f32,
    /// Factor produced when the shaped sensor value is 1.
    pub max: f32,
}

impl ModulationConfig {
    /// A full-range linear mapping for a sensor: factor goes 0 → 1 with
    /// the raw sensor value.
    pub fn linear(sensor: SensorKind) -> Self {
        Self {
            sensor,
            curve: ResponseCurve::Linear,
            strength: 1.0,
            min: 0.0,
            max: 1.0,
        }
    }

    /// The multiplicative factor this mapping yields for a sample.
    pub fn factor(&self, sample: &SensorSample, limits: &SensorLimits) -> f32 {
        let value = self.sensor.compute(sample, limits);
        let shaped = self
            .curve
            .apply(value)
            .powf(1.0 / self.strength.max(MIN_STRENGTH));
        self.min + (self.max - self.min) * shaped
    }
}

/// Apply a set of modulation mappings to a base parameter value.
///
/// Each mapping contributes an independent factor; the factors multiply
/// into the base value. Multiplication is commutative, so the outcome is
/// independent of the order of `configs`. An empty set returns the base
/// value unchanged. The result is clamped to be non-negative.
pub fn modulate(
    base: f32,
    configs: &[ModulationConfig],
    sample: &SensorSample,
    limits: &SensorLimits,
) -> f32 {
    let mut value = base;
    for config in configs {
        value *= config.factor(sample, limits);
    }
    value.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressure_sample(pressure: f32) -> SensorSample {
        SensorSample {
            pressure,
            ..Default::default()
        }
    }

    #[test]
    fn empty_config_is_identity() {
        let limits = SensorLimits::default();
        let v = modulate(0.7, &[], &pressure_sample(0.3), &limits);
        assert_eq!(v, 0.7);
    }

    #[test]
    fn full_pressure_yields_max_factor() {
        let limits = SensorLimits::default();
        let config = ModulationConfig::linear(SensorKind::Pressure);
        let v = modulate(2.0, &[config], &pressure_sample(1.0), &limits);
        assert!((v - 2.0).abs() < 1e-6);
        let v = modulate(2.0, &[config], &pressure_sample(0.0), &limits);
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn strength_exponent_shapes_response() {
        let limits = SensorLimits::default();
        let weak = ModulationConfig {
            strength: 0.5,
            ..ModulationConfig::linear(SensorKind::Pressure)
        };
        // strength 0.5 → exponent 2: 0.5² = 0.25
        let v = weak.factor(&pressure_sample(0.5), &limits);
        assert!((v - 0.25).abs() < 1e-6);
    }

    #[test]
    fn zero_strength_stays_finite() {
        let limits = SensorLimits::default();
        let config = ModulationConfig {
            strength: 0.0,
            ..ModulationConfig::linear(SensorKind::Pressure)
        };
        let v = config.factor(&pressure_sample(0.5), &limits);
        assert!(v.is_finite());
        assert!((0.0..=1.0).contains(&v));
    }

    // The product-of-factors combination policy is assumed intentional
    // (rather than a weighted sum); this pins down its commutativity.
    #[test]
    fn combination_is_commutative() {
        let limits = SensorLimits::default();
        let sample = SensorSample {
            pressure: 0.6,
            speed: 0.8,
            ..Default::default()
        };
        let a = ModulationConfig {
            curve: ResponseCurve::EaseIn,
            strength: 0.7,
            min: 0.2,
            max: 1.0,
            ..ModulationConfig::linear(SensorKind::Pressure)
        };
        let b = ModulationConfig {
            curve: ResponseCurve::EaseOut,
            strength: 1.3,
            min: 0.5,
            max: 0.9,
            ..ModulationConfig::linear(SensorKind::Speed)
        };
        let forward = modulate(1.5, &[a, b], &sample, &limits);
        let reverse = modulate(1.5, &[b, a], &sample, &limits);
        assert!((forward - reverse).abs() < 1e-6);
    }

    #[test]
    fn result_never_negative() {
        let limits = SensorLimits::default();
        let inverted = ModulationConfig {
            min: -2.0,
            max: -1.0,
            ..ModulationConfig::linear(SensorKind::Pressure)
        };
        let v = modulate(3.0, &[inverted], &pressure_sample(0.5), &limits);
        assert!(v >= 0.0);
    }
}
