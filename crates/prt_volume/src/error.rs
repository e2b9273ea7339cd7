//! Error type shared by the probe volume modules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    /// The asset was baked for a different grid.
    #[error("precomputed asset probe count mismatch: expected {expected}, got {got}")]
    ProbeCountMismatch { expected: usize, got: usize },

    #[error("precomputed asset carries no probe data")]
    EmptyAsset,

    #[error("invalid volume settings: {0}")]
    InvalidSettings(String),

    #[error("probe volume is not allocated")]
    NotAllocated,

    /// A GPU resource could not be created.
    #[error("GPU resource error: {0}")]
    Resource(String),
}
