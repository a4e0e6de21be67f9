//! Per-frame accumulation surfaces with bounded LRU caching.
//!
//! Every frame index that has been painted on owns exactly one
//! [`FrameSurface`] — an offscreen RGBA texture at the source media
//! resolution. Surfaces are created lazily on first stamp and evicted
//! least-recently-touched when the cache exceeds its capacity. Eviction
//! is pure memory management: an evicted frame recreates blank, and any
//! restoration of saved strokes is the persistence collaborator's job.
//!
//! The cache exclusively owns each surface's GPU texture; other
//! components only ever see borrowed references valid for one call.

use std::sync::Arc;

use ahash::HashMap;
use indexmap::IndexSet;

use framepaint_core::FrameIndex;

use crate::context::GraphicsContext;

/// Default maximum number of cached surfaces.
pub const DEFAULT_CAPACITY: usize = 50;

/// Texture format of accumulation surfaces.
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const BYTES_PER_PIXEL: u32 = 4;

/// Errors from surface management and persistence access.
#[derive(Debug)]
pub enum SurfaceError {
    /// GPU allocation failed even after forcing an eviction pass.
    ///
    /// The caller drops the stamp and painting continues degraded.
    Exhausted {
        frame: FrameIndex,
        width: u32,
        height: u32,
    },
    /// No surface exists for the frame.
    Missing { frame: FrameIndex },
    /// GPU → CPU readback failed.
    Readback { frame: FrameIndex, reason: String },
    /// Uploaded pixel buffer does not match the surface dimensions.
    PixelSize {
        frame: FrameIndex,
        expected: usize,
        actual: usize,
    },
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Exhausted {
                frame,
                width,
                height,
            } => write!(
                f,
                "GPU memory exhausted allocating {}x{} surface for frame {}",
                width, height, frame
            ),
            SurfaceError::Missing { frame } => {
                write!(f, "No surface cached for frame {}", frame)
            }
            SurfaceError::Readback { frame, reason } => {
                write!(f, "Readback of frame {} failed: {}", frame, reason)
            }
            SurfaceError::PixelSize {
                frame,
                expected,
                actual,
            } => write!(
                f,
                "Pixel buffer for frame {} has {} bytes, expected {}",
                frame, actual, expected
            ),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// One frame's accumulation surface.
#[derive(Debug)]
pub struct FrameSurface {
    frame: FrameIndex,
    width: u32,
    height: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    dirty: bool,
}

impl FrameSurface {
    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Whether the surface has been stamped since creation or last clear.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Least-recently-used ordering over frame indices.
///
/// Pure bookkeeping, split out from the GPU side so the eviction policy
/// can be verified without a device. The front of the set is the
/// least-recently-touched entry.
#[derive(Debug, Default)]
pub struct LruOrder {
    order: IndexSet<FrameIndex>,
}

impl LruOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a frame as most recently used, inserting it if absent.
    pub fn touch(&mut self, frame: FrameIndex) {
        if let Some(index) = self.order.get_index_of(&frame) {
            let last = self.order.len() - 1;
            self.order.move_index(index, last);
        } else {
            self.order.insert(frame);
        }
    }

    /// Remove a frame from the order. Returns whether it was present.
    pub fn remove(&mut self, frame: FrameIndex) -> bool {
        self.order.shift_remove(&frame)
    }

    /// The least-recently-touched frame.
    pub fn lru(&self) -> Option<FrameIndex> {
        self.order.first().copied()
    }

    /// The most-recently-touched frame.
    pub fn mru(&self) -> Option<FrameIndex> {
        self.order.last().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.order.contains(&frame)
    }
}

/// Bounded cache of per-frame accumulation surfaces.
pub struct SurfaceCache {
    context: Arc<GraphicsContext>,
    capacity: usize,
    width: u32,
    height: u32,
    surfaces: HashMap<FrameIndex, FrameSurface>,
    order: LruOrder,
}

impl SurfaceCache {
    /// Create a cache for the given media resolution with the default
    /// capacity.
    pub fn new(context: Arc<GraphicsContext>, width: u32, height: u32) -> Self {
        Self::with_capacity(context, width, height, DEFAULT_CAPACITY)
    }

    /// Create a cache with an explicit capacity (minimum 1).
    pub fn with_capacity(
        context: Arc<GraphicsContext>,
        width: u32,
        height: u32,
        capacity: usize,
    ) -> Self {
        Self {
            context,
            capacity: capacity.max(1),
            width,
            height,
            surfaces: HashMap::default(),
            order: LruOrder::new(),
        }
    }

    /// Update the source media resolution.
    ///
    /// A resolution change invalidates every cached surface: their pixel
    /// grids no longer match the media, so all surfaces are dropped.
    pub fn set_media_size(&mut self, width: u32, height: u32) {
        if (self.width, self.height) == (width, height) {
            return;
        }
        tracing::debug!(
            "Media resolution changed {}x{} -> {}x{}, dropping {} surfaces",
            self.width,
            self.height,
            width,
            height,
            self.surfaces.len()
        );
        self.drop_all();
        self.width = width;
        self.height = height;
    }

    /// Get the surface for a frame, creating a blank one if absent.
    ///
    /// The returned surface is marked most-recently-used before any
    /// eviction runs, so it can never be the eviction candidate of the
    /// pass its own creation triggered.
    pub fn surface_for(&mut self, frame: FrameIndex) -> Result<&FrameSurface, SurfaceError> {
        if !self.surfaces.contains_key(&frame) {
            let texture = self.allocate_texture(frame)?;
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.clear_view(&view);
            self.surfaces.insert(
                frame,
                FrameSurface {
                    frame,
                    width: self.width,
                    height: self.height,
                    texture,
                    view,
                    dirty: false,
                },
            );
            self.order.touch(frame);
            self.evict_excess();
        } else {
            self.order.touch(frame);
        }
        Ok(&self.surfaces[&frame])
    }

    /// Get a frame's surface without creating one.
    pub fn get(&mut self, frame: FrameIndex) -> Option<&FrameSurface> {
        if self.surfaces.contains_key(&frame) {
            self.order.touch(frame);
            self.surfaces.get(&frame)
        } else {
            None
        }
    }

    /// Update LRU bookkeeping for a frame without fetching it.
    pub fn touch(&mut self, frame: FrameIndex) {
        if self.surfaces.contains_key(&frame) {
            self.order.touch(frame);
        }
    }

    /// Mark a frame's surface as stamped.
    pub fn mark_dirty(&mut self, frame: FrameIndex) {
        if let Some(surface) = self.surfaces.get_mut(&frame) {
            surface.dirty = true;
        }
    }

    /// Wipe one surface to fully transparent, keeping it cached.
    ///
    /// Idempotent: clearing twice leaves the same blank surface as once.
    /// A frame with no surface is left untouched.
    pub fn clear(&mut self, frame: FrameIndex) {
        if let Some(surface) = self.surfaces.get_mut(&frame) {
            let view = surface.view.clone();
            surface.dirty = false;
            self.clear_view(&view);
        }
    }

    /// Wipe every cached surface to fully transparent.
    pub fn clear_all(&mut self) {
        let frames: Vec<FrameIndex> = self.surfaces.keys().copied().collect();
        for frame in frames {
            self.clear(frame);
        }
    }

    /// Remove one surface, releasing its GPU texture.
    pub fn remove(&mut self, frame: FrameIndex) {
        if let Some(surface) = self.surfaces.remove(&frame) {
            self.order.remove(frame);
            surface.texture.destroy();
        }
    }

    /// Remove every surface, releasing all GPU textures.
    pub fn drop_all(&mut self) {
        for (_, surface) in self.surfaces.drain() {
            surface.texture.destroy();
        }
        self.order = LruOrder::new();
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.surfaces.contains_key(&frame)
    }

    /// Estimated GPU memory held by cached surfaces, in bytes.
    pub fn estimated_bytes(&self) -> u64 {
        let per_surface = u64::from(self.width) * u64::from(self.height)
            * u64::from(BYTES_PER_PIXEL);
        per_surface * self.surfaces.len() as u64
    }

    /// Read a surface's pixels as tightly packed RGBA8, bottom row last.
    ///
    /// Exposed for the persistence collaborator; the saved file format is
    /// not this crate's concern.
    pub fn read_pixels(&mut self, frame: FrameIndex) -> Result<Vec<u8>, SurfaceError> {
        let Some(surface) = self.surfaces.get(&frame) else {
            return Err(SurfaceError::Missing { frame });
        };
        self.order.touch(frame);

        let device = self.context.device();
        let (width, height) = (surface.width, surface.height);

        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Surface Readback Buffer"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Surface Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue().submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(SurfaceError::Readback {
                    frame,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(SurfaceError::Readback {
                    frame,
                    reason: "map callback dropped".to_owned(),
                });
            }
        }

        let data = slice.get_mapped_range();
        let mut pixels =
            Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            let end = start + unpadded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..end]);
        }
        drop(data);
        buffer.unmap();

        Ok(pixels)
    }

    /// Upload tightly packed RGBA8 pixels into a frame's surface.
    ///
    /// Creates the surface if absent, so the persistence collaborator can
    /// restore a saved frame before any new stamping.
    pub fn write_pixels(&mut self, frame: FrameIndex, data: &[u8]) -> Result<(), SurfaceError> {
        let expected =
            (self.width * self.height * BYTES_PER_PIXEL) as usize;
        if data.len() != expected {
            return Err(SurfaceError::PixelSize {
                frame,
                expected,
                actual: data.len(),
            });
        }

        self.surface_for(frame)?;
        let surface = &self.surfaces[&frame];
        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(surface.width * BYTES_PER_PIXEL),
                rows_per_image: Some(surface.height),
            },
            wgpu::Extent3d {
                width: surface.width,
                height: surface.height,
                depth_or_array_layers: 1,
            },
        );
        self.mark_dirty(frame);
        Ok(())
    }

    /// Allocate a surface texture, evicting and retrying once on GPU
    /// memory exhaustion.
    fn allocate_texture(&mut self, frame: FrameIndex) -> Result<wgpu::Texture, SurfaceError> {
        match self.try_allocate(frame) {
            Some(texture) => Ok(texture),
            None => {
                tracing::warn!(
                    "Surface allocation for frame {} failed, evicting and retrying",
                    frame
                );
                if let Some(lru) = self.order.lru() {
                    self.remove(lru);
                }
                self.try_allocate(frame).ok_or(SurfaceError::Exhausted {
                    frame,
                    width: self.width,
                    height: self.height,
                })
            }
        }
    }

    fn try_allocate(&self, frame: FrameIndex) -> Option<wgpu::Texture> {
        let device = self.context.device();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Accumulation Surface"),
            size: wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        match pollster::block_on(device.pop_error_scope()) {
            None => Some(texture),
            Some(error) => {
                tracing::warn!("Surface allocation failed for frame {}: {}", frame, error);
                None
            }
        }
    }

    /// Evict least-recently-touched surfaces while over capacity.
    fn evict_excess(&mut self) {
        while self.surfaces.len() > self.capacity {
            let Some(lru) = self.order.lru() else {
                break;
            };
            tracing::debug!("Evicting surface for frame {}", lru);
            self.remove(lru);
        }
    }

    fn clear_view(&self, view: &wgpu::TextureView) {
        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Surface Clear Encoder"),
                });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Surface Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.context.queue().submit(std::iter::once(encoder.finish()));
    }
}

impl Drop for SurfaceCache {
    fn drop(&mut self) {
        self.drop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_moves_frame_to_back() {
        let mut lru = LruOrder::new();
        lru.touch(1);
        lru.touch(2);
        lru.touch(3);
        assert_eq!(lru.lru(), Some(1));
        assert_eq!(lru.mru(), Some(3));

        lru.touch(1);
        assert_eq!(lru.lru(), Some(2));
        assert_eq!(lru.mru(), Some(1));
    }

    #[test]
    fn touch_is_idempotent_on_mru() {
        let mut lru = LruOrder::new();
        lru.touch(7);
        lru.touch(7);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.lru(), Some(7));
    }

    #[test]
    fn remove_preserves_remaining_order() {
        let mut lru = LruOrder::new();
        for frame in 0..5 {
            lru.touch(frame);
        }
        assert!(lru.remove(0));
        assert!(!lru.remove(0));
        assert_eq!(lru.lru(), Some(1));
        assert_eq!(lru.len(), 4);
    }

    // Pure rehearsal of the cache's eviction loop: 51 inserts at
    // capacity 50 must evict exactly the first-touched frame, and the
    // just-touched frame is never the candidate.
    #[test]
    fn eviction_order_matches_insertion_overflow() {
        let capacity = 50;
        let mut lru = LruOrder::new();
        let mut evicted = Vec::new();
        for frame in 1..=51 {
            lru.touch(frame);
            while lru.len() > capacity {
                let victim = lru.lru().unwrap();
                assert_ne!(victim, frame, "just-touched frame must never evict");
                lru.remove(victim);
                evicted.push(victim);
            }
        }
        assert_eq!(evicted, vec![1]);
        assert_eq!(lru.len(), 50);
        assert!(!lru.contains(1));
        assert!(lru.contains(2));
        assert!(lru.contains(51));
    }
}
