//! Error types.
//!
//! Initialization failures are fatal and surface as [`ViewerError`] before the
//! frame loop starts. Per-frame backend failures are reported as
//! [`RenderError`] and handled inside the loop. Asset I/O uses `anyhow` and is
//! downgraded to a log line at the environment boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("no mount surface was provided")]
    MissingSurface,
    #[error("could not create a drawing surface: {0}")]
    SurfaceCreation(String),
    #[error("no compatible graphics adapter: {0}")]
    AdapterUnavailable(String),
    #[error("graphics device request failed: {0}")]
    DeviceRequest(String),
    #[error("invalid camera: {0}")]
    InvalidCamera(String),
    #[error("invalid movement controls: {0}")]
    InvalidControls(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("the drawing surface was lost")]
    SurfaceLost,
    #[error("the drawing surface is outdated")]
    SurfaceOutdated,
    #[error("render failed: {0}")]
    Other(String),
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost => Self::SurfaceLost,
            wgpu::SurfaceError::Outdated => Self::SurfaceOutdated,
            other => Self::Other(other.to_string()),
        }
    }
}
