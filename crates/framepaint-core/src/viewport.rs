//! Screen ↔ image coordinate transform.
//!
//! Strokes are stored in a normalized image space with origin at the
//! image's bottom-left corner and `(1, 1)` at its top-right, independent
//! of both the source resolution and the viewport state. The transform is
//! stateless: the caller supplies the current [`ViewportGeometry`] on
//! every call, so strokes recompute correctly whenever the viewer pans,
//! zooms or rotates.

use glam::Vec2;

/// Viewport state at the moment of one event or display refresh.
///
/// Queried from the host per call and never cached here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    /// Viewport size in physical pixels.
    pub viewport_size: Vec2,
    /// Displayed image size in logical pixels at zoom 1.0.
    pub image_size: Vec2,
    /// Pan offset of the image center from the viewport center, in
    /// logical pixels.
    pub pan: Vec2,
    /// Zoom scale. 1.0 shows the image at `image_size`.
    pub zoom: f32,
    /// View rotation in radians, counter-clockwise.
    pub rotation: f32,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f32,
}

impl ViewportGeometry {
    /// Whether the geometry admits a valid screen ↔ image mapping.
    ///
    /// Zero or non-finite scale factors make the mapping non-invertible;
    /// callers drop the event instead of producing NaN positions.
    pub fn is_valid(&self) -> bool {
        let finite = self.viewport_size.is_finite()
            && self.image_size.is_finite()
            && self.pan.is_finite()
            && self.zoom.is_finite()
            && self.rotation.is_finite()
            && self.device_pixel_ratio.is_finite();
        finite
            && self.zoom.abs() > f32::EPSILON
            && self.device_pixel_ratio > f32::EPSILON
            && self.image_size.x > f32::EPSILON
            && self.image_size.y > f32::EPSILON
    }

    fn image_center_physical(&self) -> Vec2 {
        self.viewport_size * 0.5 + self.pan * self.device_pixel_ratio
    }
}

/// Map a screen position (physical pixels, origin bottom-left) to
/// normalized image space.
///
/// Returns `None` for degenerate geometry or a non-finite input point.
/// The result may lie outside `[0, 1]` when the cursor is off the image;
/// callers decide whether to clamp or ignore.
pub fn screen_to_image(point: Vec2, geom: &ViewportGeometry) -> Option<Vec2> {
    if !geom.is_valid() || !point.is_finite() {
        return None;
    }
    let delta = point - geom.image_center_physical();
    let unrotated = rotate(delta, -geom.rotation);
    let local = unrotated / (geom.zoom * geom.device_pixel_ratio);
    let norm = local / geom.image_size + Vec2::splat(0.5);
    norm.is_finite().then_some(norm)
}

/// Map a normalized image-space position back to screen space.
///
/// Inverse of [`screen_to_image`] for the same geometry.
pub fn image_to_screen(point: Vec2, geom: &ViewportGeometry) -> Option<Vec2> {
    if !geom.is_valid() || !point.is_finite() {
        return None;
    }
    let local = (point - Vec2::splat(0.5)) * geom.image_size;
    let scaled = local * geom.zoom * geom.device_pixel_ratio;
    let screen = rotate(scaled, geom.rotation) + geom.image_center_physical();
    screen.is_finite().then_some(screen)
}

fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_geometry() -> ViewportGeometry {
        ViewportGeometry {
            viewport_size: Vec2::new(1920.0, 1080.0),
            image_size: Vec2::new(1600.0, 900.0),
            pan: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            device_pixel_ratio: 1.0,
        }
    }

    #[test]
    fn viewport_center_maps_to_image_center() {
        let geom = plain_geometry();
        let norm = screen_to_image(Vec2::new(960.0, 540.0), &geom).unwrap();
        assert!((norm - Vec2::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn normalized_space_is_bottom_left_origin() {
        let geom = plain_geometry();
        // Bottom-left image corner sits below and left of viewport center.
        let corner = Vec2::new(960.0 - 800.0, 540.0 - 450.0);
        let norm = screen_to_image(corner, &geom).unwrap();
        assert!(norm.length() < 1e-5, "expected (0,0), got {norm:?}");
    }

    #[test]
    fn round_trip_under_arbitrary_geometry() {
        let geometries = [
            plain_geometry(),
            ViewportGeometry {
                pan: Vec2::new(-130.0, 42.5),
                zoom: 2.75,
                rotation: 0.6,
                device_pixel_ratio: 2.0,
                ..plain_geometry()
            },
            ViewportGeometry {
                zoom: 0.1,
                rotation: -2.2,
                ..plain_geometry()
            },
        ];
        let points = [
            Vec2::new(12.0, 900.0),
            Vec2::new(960.0, 540.0),
            Vec2::new(1800.0, 30.0),
        ];
        for geom in &geometries {
            for p in points {
                let norm = screen_to_image(p, geom).unwrap();
                let back = image_to_screen(norm, geom).unwrap();
                assert!(
                    (back - p).length() < 1e-2,
                    "round trip drift: {p:?} -> {norm:?} -> {back:?}"
                );
            }
        }
    }

    #[test]
    fn zero_zoom_yields_no_mapping() {
        let geom = ViewportGeometry {
            zoom: 0.0,
            ..plain_geometry()
        };
        assert_eq!(screen_to_image(Vec2::new(10.0, 10.0), &geom), None);
        assert_eq!(image_to_screen(Vec2::splat(0.5), &geom), None);
    }

    #[test]
    fn non_finite_geometry_yields_no_mapping() {
        let geom = ViewportGeometry {
            pan: Vec2::new(f32::NAN, 0.0),
            ..plain_geometry()
        };
        assert_eq!(screen_to_image(Vec2::ZERO, &geom), None);

        let geom = ViewportGeometry {
            device_pixel_ratio: 0.0,
            ..plain_geometry()
        };
        assert_eq!(screen_to_image(Vec2::ZERO, &geom), None);
    }

    #[test]
    fn non_finite_point_yields_no_mapping() {
        let geom = plain_geometry();
        assert_eq!(screen_to_image(Vec2::new(f32::INFINITY, 0.0), &geom), None);
    }
}
