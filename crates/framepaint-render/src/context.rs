//! GPU context lifecycle.

use std::sync::Arc;

/// Errors raised while bringing up the GPU context.
///
/// These are fatal at initialization: the host must be told before any
/// painting is enabled.
#[derive(Debug)]
pub enum GraphicsError {
    /// No suitable GPU adapter was found.
    NoAdapter { reason: String },
    /// The adapter refused to create a device.
    NoDevice { reason: String },
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphicsError::NoAdapter { reason } => {
                write!(f, "No suitable GPU adapter: {}", reason)
            }
            GraphicsError::NoDevice { reason } => {
                write!(f, "Failed to create GPU device: {}", reason)
            }
        }
    }
}

impl std::error::Error for GraphicsError {}

/// A shared graphics context.
///
/// Owned through `Arc` so the surface cache, program manager and brush
/// renderer can each hold a cheap handle to the same device and queue.
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GraphicsContext {
    /// Create a context asynchronously.
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GraphicsError::NoAdapter {
                reason: e.to_string(),
            })?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: Some("Framepaint Device"),
                ..Default::default()
            })
            .await
            .map_err(|e| GraphicsError::NoDevice {
                reason: e.to_string(),
            })?;

        tracing::info!("Created graphics context on {:?}", adapter.get_info().name);

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
        }))
    }

    /// Create a context synchronously, blocking on the async path.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsError> {
        pollster::block_on(Self::new_owned())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
