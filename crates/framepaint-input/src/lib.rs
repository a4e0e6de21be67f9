//! Framepaint Input
//!
//! Pointer event types and the raster stroke tool that converts gestures
//! into stamp requests.

pub mod events;
pub mod tool;

pub use events::{PointerEvent, PointerPhase};
pub use tool::StrokeTool;
