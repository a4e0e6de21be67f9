//! Surface cache and renderer tests against a real GPU device.
//!
//! These are ignored by default and run with `cargo test -- --ignored`
//! on machines with a working adapter.

use glam::Vec2;

use framepaint_core::{Color, StampRequest};
use framepaint_render::{BrushRenderer, GraphicsContext, SurfaceCache, SurfaceError};

fn white_stamp() -> StampRequest {
    StampRequest {
        position: Vec2::splat(0.5),
        size: 0.5,
        opacity: 1.0,
        flow: 1.0,
        hardness: 1.0,
        color: Color::WHITE,
        tip: None,
    }
}

#[test]
#[ignore] // Requires GPU
fn context_creation() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    assert!(context.device().limits().max_texture_dimension_2d >= 1024);
}

#[test]
#[ignore] // Requires GPU
fn stamp_marks_surface_and_paints_center() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut renderer =
        BrushRenderer::new(context, 64, 64, wgpu::TextureFormat::Rgba8Unorm).unwrap();

    renderer.render_stamp(0, &white_stamp()).unwrap();
    assert!(renderer.surfaces().surface_for(0).unwrap().is_dirty());

    let pixels = renderer.surfaces().read_pixels(0).unwrap();
    let center = (32 * 64 + 32) * 4;
    assert!(pixels[center + 3] > 0, "center texel untouched");
    // Far corner is outside the stamp radius.
    assert_eq!(pixels[3], 0);
}

#[test]
#[ignore] // Requires GPU
fn clear_is_idempotent() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut renderer =
        BrushRenderer::new(context, 32, 32, wgpu::TextureFormat::Rgba8Unorm).unwrap();

    renderer.render_stamp(5, &white_stamp()).unwrap();
    renderer.clear_frame(5);
    let once = renderer.surfaces().read_pixels(5).unwrap();
    assert!(once.iter().all(|&b| b == 0), "clear left paint behind");

    renderer.clear_frame(5);
    let twice = renderer.surfaces().read_pixels(5).unwrap();
    assert_eq!(once, twice);
    assert!(!renderer.surfaces().surface_for(5).unwrap().is_dirty());
}

#[test]
#[ignore] // Requires GPU
fn cache_evicts_least_recently_used_frame() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut cache = SurfaceCache::with_capacity(context, 16, 16, 3);

    for frame in 1..=3 {
        cache.surface_for(frame).unwrap();
    }
    cache.touch(1); // 2 is now the oldest
    cache.surface_for(4).unwrap();

    assert_eq!(cache.len(), 3);
    assert!(!cache.contains(2));
    assert!(cache.contains(1));
    assert!(cache.contains(4));
}

#[test]
#[ignore] // Requires GPU
fn pixel_round_trip_through_persistence_api() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut cache = SurfaceCache::new(context, 8, 8);

    let mut pixels = vec![0u8; 8 * 8 * 4];
    pixels[0..4].copy_from_slice(&[255, 0, 0, 255]);
    cache.write_pixels(7, &pixels).unwrap();

    let back = cache.read_pixels(7).unwrap();
    assert_eq!(back, pixels);
}

#[test]
#[ignore] // Requires GPU
fn wrong_buffer_size_is_rejected() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut cache = SurfaceCache::new(context, 8, 8);
    let result = cache.write_pixels(0, &[0u8; 4]);
    assert!(matches!(result, Err(SurfaceError::PixelSize { .. })));
}

#[test]
#[ignore] // Requires GPU
fn media_resize_drops_all_surfaces() {
    let context = GraphicsContext::new_owned_sync().unwrap();
    let mut cache = SurfaceCache::new(context, 16, 16);
    cache.surface_for(0).unwrap();
    cache.surface_for(1).unwrap();

    cache.set_media_size(32, 32);
    assert!(cache.is_empty());

    let surface = cache.surface_for(0).unwrap();
    assert_eq!(surface.width(), 32);
}
