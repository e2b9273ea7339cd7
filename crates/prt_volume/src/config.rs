//! Volume configuration.
//!
//! Ranges are enforced where settings enter the process (command line or a
//! settings file, see [`VolumeSettings::validate`]); the scheduling core trusts
//! whatever it is handed.

use crate::error::VolumeError;
use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const GRID_X_RANGE: RangeInclusive<u32> = 1..=128;
pub const GRID_Y_RANGE: RangeInclusive<u32> = 1..=64;
pub const GRID_Z_RANGE: RangeInclusive<u32> = 1..=128;
pub const CELL_SIZE_RANGE: RangeInclusive<f32> = 0.1..=100.0;
pub const PROBES_PER_FRAME_RANGE: RangeInclusive<u32> = 1..=100;
pub const LOCAL_PROBE_RANGE: RangeInclusive<u32> = 3..=9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeSettings {
    /// Master switch; a disabled volume produces no relight work.
    pub enabled: bool,

    /// World-space position of probe (0, 0, 0).
    pub origin: Vec3,

    /// Probes per axis in the full grid.
    pub grid_size: UVec3,

    /// Distance between neighbouring probes in world units.
    pub cell_size: f32,

    /// Spread relighting over several frames instead of refreshing every
    /// resident probe each frame.
    pub multi_frame_relight: bool,

    /// Upper bound on round-robin probes per frame.
    pub probes_per_frame_update: u32,

    /// Probes nearest the viewer relit on top of the round-robin share.
    pub local_probe_count: u32,

    /// Requested resident window size; clamped to `grid_size` per axis.
    pub window_size: UVec3,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            origin: Vec3::ZERO,
            grid_size: UVec3::new(8, 4, 8),
            cell_size: 2.0,
            multi_frame_relight: false,
            probes_per_frame_update: 2,
            local_probe_count: 6,
            window_size: UVec3::new(10, 5, 10),
        }
    }
}

impl VolumeSettings {
    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<(), VolumeError> {
        fn check<T: PartialOrd + std::fmt::Debug>(
            name: &str,
            value: T,
            range: RangeInclusive<T>,
        ) -> Result<(), VolumeError> {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(VolumeError::InvalidSettings(format!(
                    "{} = {:?} outside {:?}",
                    name, value, range
                )))
            }
        }

        check("grid_size.x", self.grid_size.x, GRID_X_RANGE)?;
        check("grid_size.y", self.grid_size.y, GRID_Y_RANGE)?;
        check("grid_size.z", self.grid_size.z, GRID_Z_RANGE)?;
        check("cell_size", self.cell_size, CELL_SIZE_RANGE)?;
        check(
            "probes_per_frame_update",
            self.probes_per_frame_update,
            PROBES_PER_FRAME_RANGE,
        )?;
        check("local_probe_count", self.local_probe_count, LOCAL_PROBE_RANGE)?;

        if self.window_size.min_element() == 0 {
            return Err(VolumeError::InvalidSettings(
                "window_size must be at least 1 on every axis".into(),
            ));
        }
        if !self.origin.is_finite() {
            return Err(VolumeError::InvalidSettings("origin must be finite".into()));
        }

        Ok(())
    }
}
