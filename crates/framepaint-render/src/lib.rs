//! Framepaint Render
//!
//! The GPU side of the framepaint engine: context bring-up, shader
//! program management, per-frame accumulation surfaces with LRU caching,
//! and the brush renderer that turns resolved stamps into pixels.

pub mod context;
pub mod program;
pub mod renderer;
pub mod surface;
pub mod tips;

pub use context::{GraphicsContext, GraphicsError};
pub use program::{ProgramManager, ShaderError};
pub use renderer::BrushRenderer;
pub use surface::{DEFAULT_CAPACITY, FrameSurface, LruOrder, SurfaceCache, SurfaceError};
pub use tips::TipAtlas;
