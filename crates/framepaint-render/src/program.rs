//! Shader program compilation and caching.
//!
//! Programs are compiled once, cached by name, and immutable afterwards;
//! per-draw state flows through vertex attributes and uniform bindings,
//! never through recompilation. Compilation failures are caught through
//! wgpu validation scopes and reported with the failing stage and the
//! driver's diagnostic log — a failed program is never cached, so callers
//! can never draw with a partially built handle.

use std::sync::Arc;

use ahash::HashMap;

use crate::context::GraphicsContext;

/// Name of the stamp program.
pub const BRUSH_STAMP: &str = "brush_stamp";
/// Name of the composite program.
pub const COMPOSITE: &str = "composite";

/// A shader program failed to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The WGSL module failed validation.
    Compile { program: String, log: String },
    /// Pipeline creation (linking against the fixed layout) failed.
    Link { program: String, log: String },
}

impl std::fmt::Display for ShaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderError::Compile { program, log } => {
                write!(f, "Shader '{}' failed to compile: {}", program, log)
            }
            ShaderError::Link { program, log } => {
                write!(f, "Shader '{}' failed to link: {}", program, log)
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// Compile-once cache of shader modules, keyed by program name.
pub struct ProgramManager {
    context: Arc<GraphicsContext>,
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ProgramManager {
    pub fn new(context: Arc<GraphicsContext>) -> Self {
        Self {
            context,
            modules: HashMap::default(),
        }
    }

    /// Get the module for a built-in program, compiling on first use.
    pub fn get(&mut self, name: &str) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        let source = match name {
            BRUSH_STAMP => BRUSH_STAMP_SHADER,
            COMPOSITE => COMPOSITE_SHADER,
            _ => {
                return Err(ShaderError::Compile {
                    program: name.to_owned(),
                    log: "unknown program name".to_owned(),
                });
            }
        };
        self.get_or_compile(name, source)
    }

    /// Get a cached module or compile `source` under a validation scope.
    pub fn get_or_compile(
        &mut self,
        name: &str,
        source: &str,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        if let Some(module) = self.modules.get(name) {
            return Ok(Arc::clone(module));
        }

        let device = self.context.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            tracing::error!("Shader '{}' failed to compile: {}", name, error);
            return Err(ShaderError::Compile {
                program: name.to_owned(),
                log: error.to_string(),
            });
        }

        let module = Arc::new(module);
        self.modules.insert(name.to_owned(), Arc::clone(&module));
        tracing::debug!("Compiled shader program '{}'", name);
        Ok(module)
    }

    /// Create a render pipeline under a validation scope.
    ///
    /// Wraps `create_render_pipeline` so layout/interface mismatches are
    /// surfaced as [`ShaderError::Link`] instead of a delayed panic.
    pub fn link_pipeline(
        &self,
        name: &str,
        descriptor: &wgpu::RenderPipelineDescriptor,
    ) -> Result<wgpu::RenderPipeline, ShaderError> {
        let device = self.context.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(descriptor);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            tracing::error!("Shader '{}' failed to link: {}", name, error);
            return Err(ShaderError::Link {
                program: name.to_owned(),
                log: error.to_string(),
            });
        }
        Ok(pipeline)
    }

    /// Number of cached programs.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no program has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// WGSL for the stamp program.
///
/// The vertex stage positions a unit quad at the stamp center, scaled by
/// the stamp size in normalized image space ((0,0) bottom-left mapped to
/// NDC). The fragment stage computes alpha from an analytic hardness
/// falloff — opaque core below `hardness * 0.5` of the radius, Hermite
/// falloff to the rim — or samples the brush tip texture's red channel
/// instead when `use_tip` is set.
pub const BRUSH_STAMP_SHADER: &str = r#"
struct StampInput {
    @location(0) corner: vec2<f32>,     // unit quad, -0.5..0.5
    @location(1) center: vec2<f32>,     // normalized image space
    @location(2) size_opacity: vec2<f32>,
    @location(3) color: vec4<f32>,
    @location(4) hardness_tip: vec2<f32>,
}

struct StampOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) local: vec2<f32>,      // -0.5..0.5 across the quad
    @location(1) color: vec4<f32>,
    @location(2) opacity: f32,
    @location(3) hardness: f32,
    @location(4) use_tip: f32,
}

@group(0) @binding(0) var tip_texture: texture_2d<f32>;
@group(0) @binding(1) var tip_sampler: sampler;

@vertex
fn vs_main(input: StampInput) -> StampOutput {
    var output: StampOutput;

    let pos = input.center + input.corner * input.size_opacity.x;
    output.position = vec4<f32>(pos * 2.0 - vec2<f32>(1.0, 1.0), 0.0, 1.0);
    output.local = input.corner;
    output.color = input.color;
    output.opacity = input.size_opacity.y;
    output.hardness = input.hardness_tip.x;
    output.use_tip = input.hardness_tip.y;

    return output;
}

@fragment
fn fs_main(input: StampOutput) -> @location(0) vec4<f32> {
    var alpha: f32;
    if input.use_tip > 0.5 {
        alpha = textureSample(tip_texture, tip_sampler, input.local + vec2<f32>(0.5, 0.5)).r;
    } else {
        // Distance from center, 1.0 at the quad rim.
        let dist = length(input.local) * 2.0;
        let core = input.hardness * 0.5;
        alpha = 1.0 - smoothstep(core, 1.0, dist);
    }
    let a = alpha * input.opacity * input.color.a;
    return vec4<f32>(input.color.rgb, a);
}
"#;

/// WGSL for the composite program.
///
/// Draws an accumulation surface as a screen-space quad, multiplying the
/// sampled alpha by a global opacity.
pub const COMPOSITE_SHADER: &str = r#"
struct CompositeUniform {
    global_opacity: f32,
    _pad: vec3<f32>,
}

@group(0) @binding(0) var surface_texture: texture_2d<f32>;
@group(0) @binding(1) var surface_sampler: sampler;
@group(0) @binding(2) var<uniform> composite: CompositeUniform;

struct CompositeInput {
    @location(0) position: vec2<f32>,   // NDC
    @location(1) uv: vec2<f32>,
}

struct CompositeOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: CompositeInput) -> CompositeOutput {
    var output: CompositeOutput;
    output.position = vec4<f32>(input.position, 0.0, 1.0);
    output.uv = input.uv;
    return output;
}

@fragment
fn fs_main(input: CompositeOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(surface_texture, surface_sampler, input.uv);
    return vec4<f32>(texel.rgb, texel.a * composite.global_opacity);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_program_reports_compile_stage() {
        // Error construction and formatting are GPU-independent.
        let err = ShaderError::Compile {
            program: "nope".into(),
            log: "unknown program name".into(),
        };
        let text = err.to_string();
        assert!(text.contains("nope"));
        assert!(text.contains("compile"));
    }

    #[test]
    fn link_error_names_the_stage() {
        let err = ShaderError::Link {
            program: BRUSH_STAMP.into(),
            log: "layout mismatch".into(),
        };
        assert!(err.to_string().contains("link"));
    }
}
