//! Lifecycle of the probe array, the coefficient volume and the loaded
//! precomputed tables.

use crate::config::VolumeSettings;
use crate::error::VolumeError;
use crate::gpu::{BufferHandle, GpuResources, TextureHandle, VolumeTextureDesc};
use crate::grid::{full_grid, window_grid, Grid};
use crate::probe::Probe;
use glam::Vec3;
use prt_asset::PrtAsset;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ProbeAllocator {
    probes: Vec<Probe>,
    probe_grid: Option<Grid>,
    window_grid: Option<Grid>,

    /// Layout: `[window.x, window.z, window.y * 9]`.
    coefficient_volume: Option<TextureHandle>,
    surfel_buffer: Option<BufferHandle>,
    tables: Option<Arc<PrtAsset>>,
}

impl ProbeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the probe array and coefficient volume for `settings`.
    ///
    /// Existing probes and loaded data are dropped; the caller reloads the
    /// asset and resets scheduling afterwards.
    pub fn allocate(
        &mut self,
        settings: &VolumeSettings,
        gpu: &mut impl GpuResources,
    ) -> Result<(), VolumeError> {
        self.release_probes();
        self.release_data(gpu);

        let probe_grid = full_grid(settings);
        let window = window_grid(settings);

        let mut probes = Vec::with_capacity(probe_grid.probe_count());
        for x in 0..probe_grid.x {
            for y in 0..probe_grid.y {
                for z in 0..probe_grid.z {
                    let index = probes.len();
                    let local = Vec3::new(x as f32, y as f32, z as f32) * probe_grid.cell_size;
                    probes.push(Probe::new(index, local));
                }
            }
        }

        let desc = VolumeTextureDesc::for_window(&window);
        let volume = match self.coefficient_volume.take() {
            Some(old) => gpu.resize_volume_texture(old, &desc)?,
            None => gpu.create_volume_texture(&desc)?,
        };

        tracing::info!(
            probes = probes.len(),
            grid = ?probe_grid.size(),
            window = ?window.size(),
            volume = ?desc,
            "Allocated probe volume"
        );

        self.probes = probes;
        self.probe_grid = Some(probe_grid);
        self.window_grid = Some(window);
        self.coefficient_volume = Some(volume);

        Ok(())
    }

    /// Drop probes, the coefficient volume and any loaded data. Safe to call
    /// repeatedly.
    pub fn release(&mut self, gpu: &mut impl GpuResources) {
        self.release_probes();
        self.release_data(gpu);

        if let Some(volume) = self.coefficient_volume.take() {
            gpu.release_texture(volume);
        }
        self.probe_grid = None;
        self.window_grid = None;
    }

    fn release_probes(&mut self) {
        self.probes.clear();
    }

    fn release_data(&mut self, gpu: &mut impl GpuResources) {
        if let Some(buffer) = self.surfel_buffer.take() {
            gpu.release_buffer(buffer);
        }
        self.tables = None;
    }

    /// Take the precomputed tables of `asset` and upload its surfels.
    ///
    /// All or nothing: on any failure the volume is left without data.
    pub fn load_precomputed(
        &mut self,
        asset: Arc<PrtAsset>,
        gpu: &mut impl GpuResources,
    ) -> Result<(), VolumeError> {
        self.release_data(gpu);

        if self.probe_grid.is_none() {
            return Err(VolumeError::NotAllocated);
        }
        if !asset.has_valid_data() {
            return Err(VolumeError::EmptyAsset);
        }

        let expected = self.probes.len();
        if asset.probes.len() != expected {
            tracing::warn!(
                expected,
                got = asset.probes.len(),
                "Precomputed asset probe count mismatch; volume left uninitialized"
            );
            return Err(VolumeError::ProbeCountMismatch {
                expected,
                got: asset.probes.len(),
            });
        }

        let buffer = gpu.create_surfel_buffer(&asset.surfels)?;

        tracing::info!(
            probes = asset.probes.len(),
            factors = asset.factors.len(),
            bricks = asset.bricks.len(),
            surfels = asset.surfels.len(),
            "Loaded precomputed radiance transfer data"
        );

        self.surfel_buffer = Some(buffer);
        self.tables = Some(asset);

        Ok(())
    }

    /// Probes exist and the coefficient volume is live.
    pub fn is_valid(&self) -> bool {
        !self.probes.is_empty() && self.coefficient_volume.is_some()
    }

    pub fn is_data_initialized(&self) -> bool {
        self.tables.is_some() && self.surfel_buffer.is_some()
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub(crate) fn probes_mut(&mut self) -> &mut [Probe] {
        &mut self.probes
    }

    pub fn probe_grid(&self) -> Option<Grid> {
        self.probe_grid
    }

    pub fn window_grid(&self) -> Option<Grid> {
        self.window_grid
    }

    pub fn coefficient_volume(&self) -> Option<TextureHandle> {
        self.coefficient_volume
    }

    pub fn surfel_buffer(&self) -> Option<BufferHandle> {
        self.surfel_buffer
    }

    pub fn tables(&self) -> Option<&PrtAsset> {
        self.tables.as_deref()
    }
}
