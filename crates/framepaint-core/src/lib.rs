//! Framepaint Core
//!
//! GPU-independent building blocks of the framepaint engine: the input
//! sensor model, brush parameter modulation, the viewport coordinate
//! transform, and the brush configuration snapshot types.

pub mod brush;
pub mod color;
pub mod logging;
pub mod modulate;
pub mod sensor;
pub mod viewport;

pub use brush::{BrushConfig, BrushTipShape, FrameIndex, StampRequest, StampSink};
pub use color::Color;
pub use modulate::ModulationConfig;
pub use sensor::{DistanceMode, ResponseCurve, SensorKind, SensorLimits, SensorSample, TimeMode};
pub use viewport::{ViewportGeometry, image_to_screen, screen_to_image};
