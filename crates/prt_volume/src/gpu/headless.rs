use super::{BufferHandle, GpuResources, TextureHandle, VolumeTextureDesc};
use crate::error::VolumeError;
use prt_asset::Surfel;
use std::collections::HashMap;

/// Bookkeeping-only backend for tools and tests that run without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessResources {
    next_id: u64,
    textures: HashMap<u64, VolumeTextureDesc>,
    buffers: HashMap<u64, usize>,
}

impl HeadlessResources {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn texture_desc(&self, handle: TextureHandle) -> Option<VolumeTextureDesc> {
        self.textures.get(&handle.0).copied()
    }

    /// Size in bytes of a live buffer.
    pub fn buffer_len(&self, handle: BufferHandle) -> Option<usize> {
        self.buffers.get(&handle.0).copied()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl GpuResources for HeadlessResources {
    fn create_volume_texture(
        &mut self,
        desc: &VolumeTextureDesc,
    ) -> Result<TextureHandle, VolumeError> {
        if desc.texel_count() == 0 {
            return Err(VolumeError::Resource(format!(
                "zero-sized coefficient volume {:?}",
                desc
            )));
        }
        let id = self.next_id();
        self.textures.insert(id, *desc);
        Ok(TextureHandle(id))
    }

    fn create_surfel_buffer(&mut self, surfels: &[Surfel]) -> Result<BufferHandle, VolumeError> {
        let id = self.next_id();
        self.buffers.insert(id, surfels.len() * Surfel::STRIDE);
        Ok(BufferHandle(id))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle.0);
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        self.buffers.remove(&handle.0);
    }
}
