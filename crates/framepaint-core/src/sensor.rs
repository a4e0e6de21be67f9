//! Input sensor model.
//!
//! Converts raw stylus/pointer readings into normalized `[0, 1]` values
//! that drive brush parameter modulation. All sensors are pure functions
//! of a [`SensorSample`]; the running totals needed by the speed, distance
//! and time sensors (cumulative path length, elapsed gesture time) are
//! computed by the caller and carried inside the sample.

/// Raw readings for one input event.
///
/// Created once per event and never mutated afterwards. Values may come
/// straight from the device, so consumers should pass samples through
/// [`SensorSample::sanitize`] before trusting them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Stylus pressure in `[0, 1]`. Mouse input reports 1.0.
    pub pressure: f32,
    /// Stylus tilt around the X axis, in degrees.
    pub tilt_x: f32,
    /// Stylus tilt around the Y axis, in degrees.
    pub tilt_y: f32,
    /// Barrel rotation in degrees, `[0, 360)`.
    pub rotation: f32,
    /// Instantaneous speed in normalized image units per second,
    /// computed by the caller from consecutive events.
    pub speed: f32,
    /// Cumulative path length since gesture start, in normalized units.
    pub distance: f32,
    /// Seconds since gesture start.
    pub elapsed: f32,
}

impl Default for SensorSample {
    fn default() -> Self {
        Self {
            pressure: 1.0,
            tilt_x: 0.0,
            tilt_y: 0.0,
            rotation: 0.0,
            speed: 0.0,
            distance: 0.0,
            elapsed: 0.0,
        }
    }
}

impl SensorSample {
    /// Replace malformed readings with the nearest valid value.
    ///
    /// Non-finite channels fall back to their neutral default (pressure
    /// 1.0, everything else 0.0); finite out-of-range values are clamped.
    /// Malformed samples are recovered here rather than propagated as
    /// errors.
    pub fn sanitize(mut self) -> Self {
        self.pressure = if self.pressure.is_finite() {
            self.pressure.clamp(0.0, 1.0)
        } else {
            1.0
        };
        for v in [
            &mut self.tilt_x,
            &mut self.tilt_y,
            &mut self.rotation,
            &mut self.speed,
            &mut self.distance,
            &mut self.elapsed,
        ] {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        self.speed = self.speed.max(0.0);
        self.distance = self.distance.max(0.0);
        self.elapsed = self.elapsed.max(0.0);
        self
    }

    /// Linear interpolation between two samples, channel by channel.
    ///
    /// Used when a single input move is split into several stamps.
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let l = |x: f32, y: f32| x + (y - x) * t;
        Self {
            pressure: l(a.pressure, b.pressure),
            tilt_x: l(a.tilt_x, b.tilt_x),
            tilt_y: l(a.tilt_y, b.tilt_y),
            rotation: l(a.rotation, b.rotation),
            speed: l(a.speed, b.speed),
            distance: l(a.distance, b.distance),
            elapsed: l(a.elapsed, b.elapsed),
        }
    }
}

/// Normalization maxima for the rate/total sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorLimits {
    /// Tilt magnitude that maps to 1.0, in degrees.
    pub max_tilt_degrees: f32,
    /// Speed that maps to 1.0, in normalized units per second.
    pub max_speed: f32,
    /// Path length that maps to 1.0, in normalized units.
    pub max_distance: f32,
    /// Gesture duration that maps to 1.0, in seconds.
    pub max_duration: f32,
}

impl Default for SensorLimits {
    fn default() -> Self {
        Self {
            max_tilt_degrees: 60.0,
            max_speed: 2.0,
            max_distance: 10.0,
            max_duration: 5.0,
        }
    }
}

/// Response mode for the distance sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    /// 0 at gesture start, 1 at `max_distance`, clamped.
    #[default]
    Linear,
    /// 1 at gesture start, 0 at `max_distance` (running out of ink).
    Fade,
    /// Cycles 0→1 repeatedly every `max_distance`.
    Periodic,
}

/// Response mode for the time sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    /// 0 at gesture start, 1 at `max_duration`, clamped.
    #[default]
    Linear,
    /// 1 at gesture start, 0 at `max_duration`.
    Fade,
    /// Sine oscillation with one full cycle per `max_duration`.
    Oscillate,
}

/// The closed set of input sensors.
///
/// Every sensor maps a [`SensorSample`] to a normalized `[0, 1]` scalar
/// via [`SensorKind::compute`]. There is deliberately no open trait here:
/// all sensors share one trivial contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorKind {
    /// Raw stylus pressure, clamped.
    Pressure,
    /// Combined tilt magnitude of both axes, against `max_tilt_degrees`.
    Tilt,
    /// Barrel rotation over its full 360° range.
    Rotation,
    /// Drawing speed against `max_speed`.
    Speed,
    /// Cumulative stroke distance against `max_distance`.
    Distance(DistanceMode),
    /// Elapsed gesture time against `max_duration`.
    Time(TimeMode),
}

impl SensorKind {
    /// Compute the normalized sensor value for a sample.
    ///
    /// The result is always finite and in `[0, 1]`, even for out-of-range
    /// or malformed raw input.
    pub fn compute(&self, sample: &SensorSample, limits: &SensorLimits) -> f32 {
        let sample = sample.sanitize();
        let value = match *self {
            SensorKind::Pressure => sample.pressure,
            SensorKind::Tilt => {
                let magnitude = (sample.tilt_x * sample.tilt_x
                    + sample.tilt_y * sample.tilt_y)
                    .sqrt();
                magnitude / limits.max_tilt_degrees.max(f32::EPSILON)
            }
            SensorKind::Rotation => sample.rotation.rem_euclid(360.0) / 360.0,
            SensorKind::Speed => sample.speed / limits.max_speed.max(f32::EPSILON),
            SensorKind::Distance(mode) => {
                let n = sample.distance / limits.max_distance.max(f32::EPSILON);
                match mode {
                    DistanceMode::Linear => n,
                    DistanceMode::Fade => 1.0 - n,
                    DistanceMode::Periodic => n.rem_euclid(1.0),
                }
            }
            SensorKind::Time(mode) => {
                let n = sample.elapsed / limits.max_duration.max(f32::EPSILON);
                match mode {
                    TimeMode::Linear => n,
                    TimeMode::Fade => 1.0 - n,
                    TimeMode::Oscillate => {
                        ((std::f32::consts::TAU * n).sin() + 1.0) * 0.5
                    }
                }
            }
        };
        value.clamp(0.0, 1.0)
    }
}

/// Response curve applied to a normalized sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseCurve {
    #[default]
    Linear,
    /// Slow start, fast end: `v²`.
    EaseIn,
    /// Fast start, slow end: `1 - (1-v)²`.
    EaseOut,
    /// Slow start and end, fast middle.
    EaseInOut,
}

impl ResponseCurve {
    /// Apply the curve to a value in `[0, 1]`.
    pub fn apply(&self, v: f32) -> f32 {
        let v = v.clamp(0.0, 1.0);
        match self {
            ResponseCurve::Linear => v,
            ResponseCurve::EaseIn => v * v,
            ResponseCurve::EaseOut => 1.0 - (1.0 - v) * (1.0 - v),
            ResponseCurve::EaseInOut => {
                if v < 0.5 {
                    2.0 * v * v
                } else {
                    1.0 - 2.0 * (1.0 - v) * (1.0 - v)
                }
            }
        }
    }
}
