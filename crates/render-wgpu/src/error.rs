/// Failures acquiring a frame from the window surface.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The surface must be reconfigured before the next frame.
    #[error("surface lost or outdated")]
    Lost,
    #[error("timed out waiting for the next surface texture")]
    Timeout,
    #[error("GPU out of memory")]
    OutOfMemory,
    #[error("surface error: {0}")]
    Other(wgpu::SurfaceError),
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => RenderError::Lost,
            wgpu::SurfaceError::Timeout => RenderError::Timeout,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
            other => RenderError::Other(other),
        }
    }
}

/// Get the next surface texture, classifying the failure.
pub fn acquire_frame(surface: &wgpu::Surface<'_>) -> Result<wgpu::SurfaceTexture, RenderError> {
    Ok(surface.get_current_texture()?)
}
