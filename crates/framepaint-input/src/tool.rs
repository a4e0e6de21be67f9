//! The raster stroke tool.
//!
//! Drives a brush across pointer gestures: a down event opens a stroke
//! session, moves emit evenly spaced interpolated stamps, and up/cancel
//! close the session. The tool owns no GPU state; it resolves stamps and
//! hands them to a [`StampSink`].

use glam::Vec2;

use framepaint_core::{
    BrushConfig, FrameIndex, SensorSample, StampSink, ViewportGeometry, screen_to_image,
};

use crate::events::{PointerEvent, PointerPhase};

const MIN_SPACING: f32 = 1e-6;

/// Per-gesture state, created on pen-down and discarded on up/cancel.
///
/// The brush configuration and the target frame are snapshotted at
/// gesture start: mid-stroke brush edits or frame changes affect the
/// next stroke, never the one in flight.
#[derive(Debug, Clone)]
struct StrokeSession {
    frame: FrameIndex,
    brush: BrushConfig,
    last_point: Vec2,
    last_sample: SensorSample,
    last_time: f64,
    start_time: f64,
    cumulative_distance: f32,
}

/// Stateful pointer-to-stamp translator.
pub struct StrokeTool {
    brush: BrushConfig,
    frame: FrameIndex,
    session: Option<StrokeSession>,
}

impl StrokeTool {
    pub fn new(brush: BrushConfig) -> Self {
        Self {
            brush,
            frame: 0,
            session: None,
        }
    }

    /// Whether a stroke is currently in flight.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Set the brush for subsequent strokes.
    pub fn set_brush(&mut self, brush: BrushConfig) {
        self.brush = brush;
    }

    pub fn brush(&self) -> &BrushConfig {
        &self.brush
    }

    /// Set the frame that new strokes paint onto.
    ///
    /// An active stroke keeps painting its original frame: the gesture
    /// committed to that frame when it started.
    pub fn set_frame(&mut self, frame: FrameIndex) {
        self.frame = frame;
    }

    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    /// Feed one pointer event through the tool.
    ///
    /// The viewport geometry is sampled fresh per event, so strokes land
    /// correctly even while the viewer pans or zooms mid-gesture. Events
    /// that cannot be mapped into image space are dropped.
    pub fn handle_event<S: StampSink>(
        &mut self,
        event: &PointerEvent,
        geometry: &ViewportGeometry,
        sink: &mut S,
    ) {
        match event.phase {
            PointerPhase::Down => self.begin(event, geometry, sink),
            PointerPhase::Move => self.advance(event, geometry, sink),
            PointerPhase::Up => {
                self.advance(event, geometry, sink);
                self.session = None;
            }
            PointerPhase::Cancel => {
                if self.session.take().is_some() {
                    tracing::debug!("Stroke cancelled");
                }
            }
        }
    }

    fn begin<S: StampSink>(
        &mut self,
        event: &PointerEvent,
        geometry: &ViewportGeometry,
        sink: &mut S,
    ) {
        let Some(point) = screen_to_image(event.position, geometry) else {
            tracing::debug!("Dropping pen-down: unmappable viewport geometry");
            return;
        };
        let sample = event.sensor_sample();
        let session = StrokeSession {
            frame: self.frame,
            brush: self.brush.clone(),
            last_point: point,
            last_sample: sample,
            last_time: event.timestamp,
            start_time: event.timestamp,
            cumulative_distance: 0.0,
        };
        sink.stamp(session.frame, &session.brush.resolve(point, &sample));
        self.session = Some(session);
    }

    fn advance<S: StampSink>(
        &mut self,
        event: &PointerEvent,
        geometry: &ViewportGeometry,
        sink: &mut S,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(point) = screen_to_image(event.position, geometry) else {
            tracing::debug!("Dropping move: unmappable viewport geometry");
            return;
        };

        let distance = point.distance(session.last_point);
        let dt = (event.timestamp - session.last_time).max(0.0) as f32;
        let speed = if dt > 0.0 { distance / dt } else { 0.0 };
        let end_sample = SensorSample {
            speed,
            distance: session.cumulative_distance + distance,
            elapsed: (event.timestamp - session.start_time).max(0.0) as f32,
            ..event.sensor_sample()
        }
        .sanitize();

        // Spacing scales with the modulated stamp size at the endpoint,
        // so a pressure-thinned stroke also stamps more densely.
        let spacing =
            (session.brush.spacing * session.brush.modulated_size(&end_sample)).max(MIN_SPACING);
        let count = (distance / spacing).floor() as u32;
        for i in 1..=count {
            let t = i as f32 / count as f32;
            let position = session.last_point.lerp(point, t);
            let sample = SensorSample::lerp(&session.last_sample, &end_sample, t);
            sink.stamp(session.frame, &session.brush.resolve(position, &sample));
        }

        // The session advances to the endpoint even when the move was
        // too short to stamp, so stamp density never exceeds the spacing.
        session.last_point = point;
        session.last_sample = end_sample;
        session.last_time = event.timestamp;
        session.cumulative_distance += distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framepaint_core::StampRequest;

    #[derive(Default)]
    struct RecordingSink {
        stamps: Vec<(FrameIndex, StampRequest)>,
    }

    impl StampSink for RecordingSink {
        fn stamp(&mut self, frame: FrameIndex, request: &StampRequest) {
            self.stamps.push((frame, *request));
        }
    }

    fn geometry() -> ViewportGeometry {
        ViewportGeometry {
            viewport_size: Vec2::new(1000.0, 1000.0),
            image_size: Vec2::new(1000.0, 1000.0),
            pan: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            device_pixel_ratio: 1.0,
        }
    }

    #[test]
    fn active_stroke_keeps_its_original_frame() {
        let mut tool = StrokeTool::new(BrushConfig::default());
        let mut sink = RecordingSink::default();
        tool.set_frame(3);
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Down, Vec2::new(500.0, 500.0), 0.0),
            &geometry(),
            &mut sink,
        );
        tool.set_frame(9);
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Move, Vec2::new(900.0, 500.0), 0.1),
            &geometry(),
            &mut sink,
        );
        assert!(!sink.stamps.is_empty());
        assert!(sink.stamps.iter().all(|(frame, _)| *frame == 3));

        // Only strokes started after the change paint the new frame.
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Up, Vec2::new(900.0, 500.0), 0.2),
            &geometry(),
            &mut sink,
        );
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Down, Vec2::new(500.0, 500.0), 1.0),
            &geometry(),
            &mut sink,
        );
        assert_eq!(sink.stamps.last().unwrap().0, 9);
    }

    #[test]
    fn move_without_down_is_ignored() {
        let mut tool = StrokeTool::new(BrushConfig::default());
        let mut sink = RecordingSink::default();
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Move, Vec2::new(500.0, 500.0), 0.0),
            &geometry(),
            &mut sink,
        );
        assert!(sink.stamps.is_empty());
        assert!(!tool.is_active());
    }

    #[test]
    fn cancel_discards_without_stamping() {
        let mut tool = StrokeTool::new(BrushConfig::default());
        let mut sink = RecordingSink::default();
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Down, Vec2::new(500.0, 500.0), 0.0),
            &geometry(),
            &mut sink,
        );
        let before = sink.stamps.len();
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Cancel, Vec2::new(600.0, 500.0), 0.1),
            &geometry(),
            &mut sink,
        );
        assert_eq!(sink.stamps.len(), before);
        assert!(!tool.is_active());
    }

    #[test]
    fn short_move_advances_without_stamping() {
        // Spacing for the default brush: 0.15 * 0.02 = 0.003 normalized,
        // i.e. 3px on a 1000px image.
        let mut tool = StrokeTool::new(BrushConfig::default());
        let mut sink = RecordingSink::default();
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Down, Vec2::new(500.0, 500.0), 0.0),
            &geometry(),
            &mut sink,
        );
        assert_eq!(sink.stamps.len(), 1);
        tool.handle_event(
            &PointerEvent::new(PointerPhase::Move, Vec2::new(501.0, 500.0), 0.01),
            &geometry(),
            &mut sink,
        );
        assert_eq!(sink.stamps.len(), 1, "sub-spacing move must not stamp");
        assert!(tool.is_active());
    }
}
