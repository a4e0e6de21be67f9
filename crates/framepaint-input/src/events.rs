//! Pointer events as delivered by the host.

use glam::Vec2;

use framepaint_core::SensorSample;

/// Phase of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Pen/button went down: a stroke may begin.
    Down,
    /// The pointer moved while down.
    Move,
    /// Pen/button released: the stroke ends normally.
    Up,
    /// The gesture was aborted by the host (focus loss, tool switch).
    Cancel,
}

/// One pointer event in screen space.
///
/// Positions are physical pixels with the origin at the viewport's
/// bottom-left corner. Sensor channels are optional: mice report none of
/// them and get full pressure with neutral tilt and rotation, matching a
/// stylus pressed flat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    /// Position in physical pixels, origin bottom-left.
    pub position: Vec2,
    /// Stylus pressure in `[0, 1]`; `None` for devices without pressure.
    pub pressure: Option<f32>,
    /// Stylus tilt (x, y) in degrees.
    pub tilt: Option<Vec2>,
    /// Barrel rotation in degrees.
    pub rotation: Option<f32>,
    /// Event time in seconds, from any monotonic host clock.
    pub timestamp: f64,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, position: Vec2, timestamp: f64) -> Self {
        Self {
            phase,
            position,
            pressure: None,
            tilt: None,
            rotation: None,
            timestamp,
        }
    }

    /// The raw device channels as a sensor sample.
    ///
    /// Speed, distance and elapsed time are gesture-level totals the
    /// stroke tool fills in afterwards; they start at zero here.
    pub fn sensor_sample(&self) -> SensorSample {
        let tilt = self.tilt.unwrap_or(Vec2::ZERO);
        SensorSample {
            pressure: self.pressure.unwrap_or(1.0),
            tilt_x: tilt.x,
            tilt_y: tilt.y,
            rotation: self.rotation.unwrap_or(0.0),
            ..Default::default()
        }
        .sanitize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_channels_default_to_flat_stylus() {
        let event = PointerEvent::new(PointerPhase::Down, Vec2::ZERO, 0.0);
        let sample = event.sensor_sample();
        assert_eq!(sample.pressure, 1.0);
        assert_eq!(sample.tilt_x, 0.0);
        assert_eq!(sample.rotation, 0.0);
    }

    #[test]
    fn malformed_pressure_is_sanitized() {
        let event = PointerEvent {
            pressure: Some(f32::NAN),
            ..PointerEvent::new(PointerPhase::Move, Vec2::ZERO, 0.0)
        };
        assert_eq!(event.sensor_sample().pressure, 1.0);
    }
}
