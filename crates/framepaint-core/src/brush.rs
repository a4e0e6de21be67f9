//! Brush configuration snapshot and the stamp unit.
//!
//! A [`BrushConfig`] is supplied by the host's brush collaborator and
//! treated as an immutable snapshot for the duration of one gesture. The
//! stroke tool resolves it, together with the current sensor sample, into
//! [`StampRequest`]s that are consumed immediately by the renderer —
//! stamps are never retained as objects, only their rasterized effect
//! persists.

use glam::Vec2;

use crate::color::Color;
use crate::modulate::{ModulationConfig, modulate};
use crate::sensor::{SensorLimits, SensorSample};

/// Index of one displayed frame of the video/image sequence.
pub type FrameIndex = u32;

/// Procedural brush tip shapes.
///
/// When a tip is set, the fragment stage samples the tip texture's red
/// channel as alpha instead of computing the analytic hardness falloff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrushTipShape {
    SoftCircle,
    HardCircle,
    Noise,
}

/// Immutable brush settings for one gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushConfig {
    /// Base stamp diameter as a fraction of the image extent.
    pub size: f32,
    /// Base opacity in `[0, 1]`.
    pub opacity: f32,
    /// Paint accumulation rate in `[0, 1]`; multiplies into stamp alpha.
    pub flow: f32,
    /// Edge falloff sharpness in `[0, 1]`.
    pub hardness: f32,
    /// Stamp spacing as a fraction of the current stamp size.
    pub spacing: f32,
    /// Paint color.
    pub color: Color,
    /// Optional tip texture; `None` uses the analytic falloff.
    pub tip: Option<BrushTipShape>,
    /// Sensor mappings modulating the stamp size.
    pub size_modulation: Vec<ModulationConfig>,
    /// Sensor mappings modulating the stamp opacity.
    pub opacity_modulation: Vec<ModulationConfig>,
    /// Sensor mappings modulating the flow.
    pub flow_modulation: Vec<ModulationConfig>,
    /// Normalization maxima for the rate/total sensors.
    pub sensor_limits: SensorLimits,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            size: 0.02,
            opacity: 1.0,
            flow: 1.0,
            hardness: 0.5,
            spacing: 0.15,
            color: Color::BLACK,
            tip: None,
            size_modulation: Vec::new(),
            opacity_modulation: Vec::new(),
            flow_modulation: Vec::new(),
            sensor_limits: SensorLimits::default(),
        }
    }
}

impl BrushConfig {
    /// The stamp size after sensor modulation for a sample.
    pub fn modulated_size(&self, sample: &SensorSample) -> f32 {
        modulate(self.size, &self.size_modulation, sample, &self.sensor_limits)
    }

    /// Resolve this brush and a sensor sample into a ready-to-render
    /// stamp at a normalized image-space position.
    pub fn resolve(&self, position: Vec2, sample: &SensorSample) -> StampRequest {
        let limits = &self.sensor_limits;
        StampRequest {
            position,
            size: self.modulated_size(sample),
            opacity: modulate(self.opacity, &self.opacity_modulation, sample, limits)
                .clamp(0.0, 1.0),
            flow: modulate(self.flow, &self.flow_modulation, sample, limits).clamp(0.0, 1.0),
            hardness: self.hardness.clamp(0.0, 1.0),
            color: self.color,
            tip: self.tip,
        }
    }
}

/// One resolved, ready-to-render stamp.
///
/// Position is always expressed in normalized image space by the time the
/// request reaches the renderer — never raw screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampRequest {
    /// Stamp center in normalized image space (`[0, 1]²` on-image).
    pub position: Vec2,
    /// Stamp diameter as a fraction of the image extent.
    pub size: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Flow in `[0, 1]`.
    pub flow: f32,
    /// Edge falloff sharpness in `[0, 1]`.
    pub hardness: f32,
    /// Paint color.
    pub color: Color,
    /// Optional tip texture.
    pub tip: Option<BrushTipShape>,
}

/// Consumer of resolved stamps.
///
/// The GPU brush renderer is the production implementation; tests drive
/// the stroke tool against a recording sink instead. Errors on a single
/// stamp (for example surface exhaustion) are handled inside the sink —
/// painting continues in a degraded state rather than aborting a gesture.
pub trait StampSink {
    /// Rasterize one stamp onto the accumulation surface for `frame`.
    fn stamp(&mut self, frame: FrameIndex, request: &StampRequest);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorKind;

    #[test]
    fn resolve_without_modulation_uses_base_values() {
        let brush = BrushConfig {
            size: 0.04,
            opacity: 0.8,
            flow: 0.5,
            ..Default::default()
        };
        let stamp = brush.resolve(Vec2::splat(0.5), &SensorSample::default());
        assert_eq!(stamp.size, 0.04);
        assert_eq!(stamp.opacity, 0.8);
        assert_eq!(stamp.flow, 0.5);
        assert_eq!(stamp.position, Vec2::splat(0.5));
    }

    #[test]
    fn pressure_modulates_size() {
        let brush = BrushConfig {
            size: 0.04,
            size_modulation: vec![ModulationConfig::linear(SensorKind::Pressure)],
            ..Default::default()
        };
        let half = SensorSample {
            pressure: 0.5,
            ..Default::default()
        };
        let stamp = brush.resolve(Vec2::ZERO, &half);
        assert!((stamp.size - 0.02).abs() < 1e-6);
    }

    #[test]
    fn resolved_scalars_are_clamped() {
        let brush = BrushConfig {
            opacity: 5.0,
            flow: -1.0,
            hardness: 2.0,
            ..Default::default()
        };
        let stamp = brush.resolve(Vec2::ZERO, &SensorSample::default());
        assert_eq!(stamp.opacity, 1.0);
        assert_eq!(stamp.flow, 0.0);
        assert_eq!(stamp.hardness, 1.0);
    }
}
