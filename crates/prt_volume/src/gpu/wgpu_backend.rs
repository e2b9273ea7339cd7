//! `wgpu` backend: the coefficient volume is a 3D storage texture, the
//! surfels live in a storage buffer read by the relight compute pass.

use super::{BufferHandle, GpuResources, TextureHandle, VolumeTextureDesc};
use crate::error::VolumeError;
use prt_asset::Surfel;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

pub struct WgpuResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,
    textures: HashMap<u64, wgpu::Texture>,
    buffers: HashMap<u64, wgpu::Buffer>,
}

impl WgpuResources {
    /// Texel format of the coefficient volume: one RGB SH channel per slice.
    pub const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            next_id: 0,
            textures: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    /// Request a headless device on the best available adapter.
    pub async fn headless() -> Result<Self, VolumeError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| VolumeError::Resource("no suitable GPU adapter".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("PRT Probe Volume Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| VolumeError::Resource(e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.textures.get(&handle.0)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle.0)
    }
}

impl GpuResources for WgpuResources {
    fn create_volume_texture(
        &mut self,
        desc: &VolumeTextureDesc,
    ) -> Result<TextureHandle, VolumeError> {
        let limit = self.device.limits().max_texture_dimension_3d;
        if desc.width.max(desc.height).max(desc.depth) > limit {
            return Err(VolumeError::Resource(format!(
                "coefficient volume {:?} exceeds 3D texture limit {}",
                desc, limit
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Coefficient Voxel Texture"),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: desc.depth.max(1),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: Self::VOLUME_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let id = self.next_id();
        self.textures.insert(id, texture);
        Ok(TextureHandle(id))
    }

    fn create_surfel_buffer(&mut self, surfels: &[Surfel]) -> Result<BufferHandle, VolumeError> {
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        // Storage bindings reject zero-sized buffers; keep one empty record.
        let buffer = if surfels.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Global Surfel Buffer"),
                size: Surfel::STRIDE as u64,
                usage,
                mapped_at_creation: false,
            })
        } else {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Global Surfel Buffer"),
                    contents: bytemuck::cast_slice(surfels),
                    usage,
                })
        };

        let id = self.next_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.textures.remove(&handle.0) {
            texture.destroy();
        }
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle.0) {
            buffer.destroy();
        }
    }
}
