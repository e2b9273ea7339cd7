//! The probe volume: owns the grid, the resident window and the relight
//! rotation, and turns a viewer position into this frame's relight lists.
//!
//! A frame is driven as:
//!
//! ```text
//! volume.tick(Some(viewer), &mut output);   // probes + bricks to relight
//! relight_pass.run(&volume, &output);       // external
//! volume.end_frame(Some(viewer));           // advance the rotation
//! ```

use crate::adjustment::{adjust, AdjustmentVolume, ProbeAdjustment};
use crate::advance::{self, LocalProbes};
use crate::allocator::ProbeAllocator;
use crate::bounds::{Aabb, BoundingBoxTracker};
use crate::config::VolumeSettings;
use crate::error::VolumeError;
use crate::gpu::{BufferHandle, GpuResources, TextureHandle};
use crate::grid::{full_grid, window_grid, Grid};
use crate::probe::Probe;
use crate::scheduler::{self, FrameScratch, PriorityQueue, Rotation, SelectionInput};
use glam::{IVec3, UVec3, Vec3};
use prt_asset::PrtAsset;
use std::sync::Arc;

/// Relight work for one frame. Owned by the caller and reused across frames.
#[derive(Debug, Default, Clone)]
pub struct FrameOutput {
    /// Probes to relight, in selection order; no duplicates.
    pub probes: Vec<Probe>,
    /// Bricks the selected probes depend on, ascending; no duplicates.
    pub bricks: Vec<u32>,
}

impl FrameOutput {
    pub fn clear(&mut self) {
        self.probes.clear();
        self.bricks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty() && self.bricks.is_empty()
    }
}

pub struct ProbeVolume<R: GpuResources> {
    settings: VolumeSettings,
    gpu: R,
    allocator: ProbeAllocator,
    tracker: BoundingBoxTracker,
    rotation: Rotation,
    queue: PriorityQueue,
    local: LocalProbes,
    scratch: FrameScratch,
    asset: Option<Arc<PrtAsset>>,
}

impl<R: GpuResources> ProbeVolume<R> {
    pub fn new(settings: VolumeSettings, gpu: R) -> Self {
        Self {
            settings,
            gpu,
            allocator: ProbeAllocator::new(),
            tracker: BoundingBoxTracker::new(),
            rotation: Rotation::default(),
            queue: PriorityQueue::default(),
            local: LocalProbes::default(),
            scratch: FrameScratch::default(),
            asset: None,
        }
    }

    /// Allocate the grid and load `asset`.
    ///
    /// An asset that does not fit the grid is reported and leaves the volume
    /// allocated but inactive; only resource failures are returned.
    pub fn init(&mut self, asset: Option<Arc<PrtAsset>>) -> Result<(), VolumeError> {
        self.asset = asset;

        if !self.settings.enabled {
            tracing::info!("Probe volume disabled; skipping allocation");
            return Ok(());
        }

        self.allocate()
    }

    fn allocate(&mut self) -> Result<(), VolumeError> {
        self.allocator.allocate(&self.settings, &mut self.gpu)?;
        self.tracker.clear(self.allocator.probes_mut());
        self.queue.clear();
        self.local.clear();
        self.reset_rotation();

        if let Some(asset) = self.asset.clone() {
            if let Err(e) = self.allocator.load_precomputed(asset, &mut self.gpu) {
                tracing::debug!(error = %e, "Probe volume running without precomputed data");
            }
        }

        Ok(())
    }

    /// Replace the precomputed data. On error the volume keeps running with
    /// no data loaded.
    pub fn load_asset(&mut self, asset: Arc<PrtAsset>) -> Result<(), VolumeError> {
        self.asset = Some(asset.clone());
        self.allocator.load_precomputed(asset, &mut self.gpu)
    }

    /// Apply new settings, rebuilding the grid only when its shape changed.
    pub fn apply_settings(&mut self, settings: VolumeSettings) -> Result<(), VolumeError> {
        let old = std::mem::replace(&mut self.settings, settings);

        if !self.settings.enabled {
            self.shutdown();
            return Ok(());
        }

        let reshaped = self.allocator.probe_grid() != Some(full_grid(&self.settings))
            || self.allocator.window_grid() != Some(window_grid(&self.settings));

        if reshaped || !self.allocator.is_valid() {
            tracing::info!("Probe grid shape changed; reallocating");
            self.allocator.release(&mut self.gpu);
            return self.allocate();
        }

        if old.origin != self.settings.origin {
            self.tracker.clear(self.allocator.probes_mut());
        }
        // Distances are measured from the origin in cell units.
        if old.origin != self.settings.origin
            || old.cell_size != self.settings.cell_size
            || old.local_probe_count != self.settings.local_probe_count
        {
            self.local.clear();
        }
        self.reset_rotation();

        Ok(())
    }

    /// Restart the relight rotation and the toroidal origin.
    pub fn reset_rotation(&mut self) {
        self.tracker.reset_origin();
        advance::reset_rotation(
            &mut self.rotation,
            &self.settings,
            self.tracker.members().len(),
        );
    }

    /// Release every probe and GPU resource. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.tracker.clear(self.allocator.probes_mut());
        self.allocator.release(&mut self.gpu);
        self.tracker.reset_origin();
        self.queue.clear();
        self.local.clear();
        self.rotation = Rotation::default();
    }

    /// Select this frame's probes and bricks into `out`.
    ///
    /// Without a viewer the window stays where it was last placed.
    pub fn tick(&mut self, viewer: Option<Vec3>, out: &mut FrameOutput) {
        out.clear();

        if !self.settings.enabled || !self.allocator.is_valid() {
            return;
        }
        let (Some(full), Some(window)) = (self.allocator.probe_grid(), self.allocator.window_grid())
        else {
            return;
        };

        if let Some(viewer) = viewer {
            self.tracker
                .update(viewer, self.settings.origin, &full, &window);
        }

        if self.tracker.needs_membership() {
            self.tracker.refresh_membership(
                self.allocator.probes_mut(),
                &full,
                &window,
                &mut self.queue,
            );
            self.rotation
                .on_membership_changed(self.tracker.members().len(), &self.settings);
        }

        scheduler::select_probes(
            &mut self.rotation,
            &self.settings,
            SelectionInput {
                probes: self.allocator.probes(),
                members: self.tracker.members(),
                resident: self.tracker.resident_mask(),
                local: self.local.indices(),
            },
            &mut self.queue,
            &mut self.scratch,
            &mut out.probes,
        );

        if let Some(tables) = self.allocator.tables() {
            scheduler::select_bricks(&out.probes, tables, &mut self.scratch, &mut out.bricks);
        }
    }

    /// Advance the rotation once the relight pass consumed this frame's output.
    pub fn end_frame(&mut self, viewer: Option<Vec3>) {
        if !self.settings.enabled || !self.allocator.is_valid() {
            return;
        }

        advance::advance(
            &mut self.rotation,
            &self.settings,
            self.tracker.members().len(),
            &mut self.local,
            viewer,
            self.allocator.probes(),
            self.tracker.members(),
        );
    }

    /// Intensity scale and invalidation for `probe` from the given volumes.
    pub fn probe_adjustment(
        &self,
        probe: &Probe,
        volumes: &[&dyn AdjustmentVolume],
    ) -> ProbeAdjustment {
        adjust(probe.world_position(self.settings.origin), volumes)
    }

    /// Coefficient volume texel of SH channel `channel` for the probe at
    /// full-grid `coord`, if it is resident.
    pub fn volume_address(&self, coord: IVec3, channel: u32) -> Option<UVec3> {
        let window = self.allocator.window_grid()?;
        self.tracker.volume_address(coord, &window, channel)
    }

    /// Enabled, allocated and holding precomputed data.
    pub fn is_active(&self) -> bool {
        self.settings.enabled && self.allocator.is_valid() && self.allocator.is_data_initialized()
    }

    pub fn is_data_initialized(&self) -> bool {
        self.allocator.is_data_initialized()
    }

    pub fn settings(&self) -> &VolumeSettings {
        &self.settings
    }

    pub fn gpu(&self) -> &R {
        &self.gpu
    }

    pub fn probes(&self) -> &[Probe] {
        self.allocator.probes()
    }

    pub fn probe_grid(&self) -> Option<Grid> {
        self.allocator.probe_grid()
    }

    pub fn window_grid(&self) -> Option<Grid> {
        self.allocator.window_grid()
    }

    pub fn window_min(&self) -> IVec3 {
        self.tracker.min_corner()
    }

    pub fn origin_corner(&self) -> Option<IVec3> {
        self.tracker.origin_corner()
    }

    pub fn world_bounds(&self) -> Aabb {
        self.tracker.world_bounds()
    }

    /// Flattened indices of the resident probes.
    pub fn resident_probes(&self) -> &[usize] {
        self.tracker.members()
    }

    pub fn local_probes(&self) -> &[usize] {
        self.local.indices()
    }

    pub fn pending_new_probes(&self) -> usize {
        self.queue.len()
    }

    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    pub fn tables(&self) -> Option<&PrtAsset> {
        self.allocator.tables()
    }

    pub fn coefficient_volume(&self) -> Option<TextureHandle> {
        self.allocator.coefficient_volume()
    }

    pub fn surfel_buffer(&self) -> Option<BufferHandle> {
        self.allocator.surfel_buffer()
    }
}

impl<R: GpuResources> Drop for ProbeVolume<R> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
