// src/lib.rs
//! Probe volume scheduling for precomputed radiance transfer global illumination.
//!
//! The full probe grid is static; only a window of it around the viewer is
//! resident in the GPU coefficient volume. Every frame the volume decides which
//! resident probes to relight under a fixed budget and which bricks of
//! precomputed surfels those probes depend on.

pub mod adjustment;
pub mod advance;
pub mod allocator;
pub mod bounds;
pub mod config;
pub mod error;
pub mod gpu;
pub mod grid;
pub mod probe;
pub mod scheduler;
pub mod volume;

// Re-export commonly used types for convenience.
pub use self::adjustment::{AdjustmentVolume, BoxAdjustment, ProbeAdjustment};
pub use self::config::VolumeSettings;
pub use self::error::VolumeError;
pub use self::gpu::{BufferHandle, GpuResources, HeadlessResources, TextureHandle};
pub use self::grid::Grid;
pub use self::probe::{Probe, Visibility};
pub use self::volume::{FrameOutput, ProbeVolume};
