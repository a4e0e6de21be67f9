//! Procedural brush tip textures.
//!
//! Tips are single-channel alpha masks generated on the CPU once per
//! shape and cached for the lifetime of the atlas. The stamp pipeline
//! always binds a tip texture; stamps without a tip bind the 1x1 white
//! placeholder and select the analytic falloff in the shader instead.

use std::sync::Arc;

use ahash::HashMap;

use framepaint_core::BrushTipShape;

use crate::context::GraphicsContext;

/// Side length of generated tip masks, in texels.
pub const TIP_SIZE: u32 = 256;

/// Cache of generated tip textures, keyed by shape.
pub struct TipAtlas {
    context: Arc<GraphicsContext>,
    tips: HashMap<BrushTipShape, wgpu::TextureView>,
    placeholder: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl TipAtlas {
    pub fn new(context: Arc<GraphicsContext>) -> Self {
        let placeholder = upload_mask(&context, "Tip Placeholder", 1, &[255]);
        let sampler = context.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tip Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            context,
            tips: HashMap::default(),
            placeholder,
            sampler,
        }
    }

    /// The view to bind for a stamp's tip slot.
    ///
    /// `None` returns the placeholder; the shader ignores it when the
    /// analytic falloff is selected.
    pub fn view_for(&mut self, tip: Option<BrushTipShape>) -> &wgpu::TextureView {
        match tip {
            None => &self.placeholder,
            Some(shape) => {
                if !self.tips.contains_key(&shape) {
                    let mask = generate_mask(shape, TIP_SIZE);
                    let view = upload_mask(&self.context, tip_label(shape), TIP_SIZE, &mask);
                    self.tips.insert(shape, view);
                }
                &self.tips[&shape]
            }
        }
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

fn tip_label(shape: BrushTipShape) -> &'static str {
    match shape {
        BrushTipShape::SoftCircle => "Tip Soft Circle",
        BrushTipShape::HardCircle => "Tip Hard Circle",
        BrushTipShape::Noise => "Tip Noise",
    }
}

/// Generate a tip alpha mask as `size * size` bytes, row-major.
pub fn generate_mask(shape: BrushTipShape, size: u32) -> Vec<u8> {
    let mut mask = vec![0u8; (size * size) as usize];
    let half = (size as f32 - 1.0) * 0.5;
    for y in 0..size {
        for x in 0..size {
            // Radial distance normalized so 1.0 lands on the texel rim.
            let dx = (x as f32 - half) / half;
            let dy = (y as f32 - half) / half;
            let dist = (dx * dx + dy * dy).sqrt();
            let alpha = match shape {
                BrushTipShape::SoftCircle => smoothstep(1.0, 0.0, dist),
                BrushTipShape::HardCircle => {
                    if dist <= 1.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                BrushTipShape::Noise => {
                    let falloff = smoothstep(1.0, 0.3, dist);
                    falloff * hash_noise(x, y)
                }
            };
            mask[(y * size + x) as usize] = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }
    mask
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Deterministic per-texel noise in `[0, 1]`.
fn hash_noise(x: u32, y: u32) -> f32 {
    let mut h = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7FEB_352D);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846C_A68B);
    h ^= h >> 16;
    (h & 0xFFFF) as f32 / 65535.0
}

fn upload_mask(
    context: &GraphicsContext,
    label: &str,
    size: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let texture = context.device().create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    context.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size),
            rows_per_image: Some(size),
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_circle_peaks_at_center_and_vanishes_at_corner() {
        let size = 64;
        let mask = generate_mask(BrushTipShape::SoftCircle, size);
        let center = ((size / 2) * size + size / 2) as usize;
        assert!(mask[center] > 250);
        assert_eq!(mask[0], 0);
    }

    #[test]
    fn hard_circle_has_binary_edge() {
        let size = 64;
        let mask = generate_mask(BrushTipShape::HardCircle, size);
        let center = ((size / 2) * size + size / 2) as usize;
        assert_eq!(mask[center], 255);
        assert_eq!(mask[0], 0);
    }

    #[test]
    fn noise_is_deterministic() {
        let a = generate_mask(BrushTipShape::Noise, 32);
        let b = generate_mask(BrushTipShape::Noise, 32);
        assert_eq!(a, b);
        // Noise must actually vary inside the falloff.
        assert!(a.iter().any(|&v| v > 0 && v < 255));
    }
}
