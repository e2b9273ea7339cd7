//! GPU resources owned by the probe volume.
//!
//! The volume only ever sees opaque handles; a backend decides what they
//! refer to. Consumers get the handles read-only for the duration of a frame.

mod headless;
#[cfg(feature = "gpu")]
mod wgpu_backend;

pub use self::headless::HeadlessResources;
#[cfg(feature = "gpu")]
pub use self::wgpu_backend::WgpuResources;

use crate::error::VolumeError;
use crate::grid::Grid;
use prt_asset::Surfel;

/// Depth slices per probe row: one per L2 spherical-harmonic coefficient.
pub const SH_COEFFICIENTS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Extent of the coefficient volume texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeTextureDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl VolumeTextureDesc {
    /// Layout `[window.x, window.z, window.y * 9]`, sized to the resident
    /// window so the texture can be addressed toroidally as the window slides.
    pub fn for_window(window: &Grid) -> Self {
        Self {
            width: window.x,
            height: window.z,
            depth: window.y * SH_COEFFICIENTS,
        }
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }
}

pub trait GpuResources {
    fn create_volume_texture(
        &mut self,
        desc: &VolumeTextureDesc,
    ) -> Result<TextureHandle, VolumeError>;

    /// Replace `handle` with a texture of the new extent.
    fn resize_volume_texture(
        &mut self,
        handle: TextureHandle,
        desc: &VolumeTextureDesc,
    ) -> Result<TextureHandle, VolumeError> {
        self.release_texture(handle);
        self.create_volume_texture(desc)
    }

    /// Upload `surfels` into a storage buffer sized to their count.
    fn create_surfel_buffer(&mut self, surfels: &[Surfel]) -> Result<BufferHandle, VolumeError>;

    fn release_texture(&mut self, handle: TextureHandle);

    fn release_buffer(&mut self, handle: BufferHandle);
}
