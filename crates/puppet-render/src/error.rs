//! Error types for texture creation and the GPU backend

use thiserror::Error;

/// Errors surfaced by setup-time render operations.
///
/// `SkeletonMesh::refresh` never returns these: per-slot failures hide the
/// slot and log instead.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("texture '{name}' expects {expected} bytes of RGBA8 data, got {actual}")]
    PixelSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("texture '{name}' has zero size")]
    EmptyTexture { name: String },

    #[cfg(feature = "gpu")]
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[cfg(feature = "gpu")]
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[cfg(feature = "gpu")]
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[cfg(feature = "gpu")]
    #[error("failed to map readback buffer: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("readback callback was not invoked")]
    ReadbackPending,
}
