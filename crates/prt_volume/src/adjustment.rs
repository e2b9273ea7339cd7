//! Adjustment volumes: externally owned regions that scale the intensity of,
//! or invalidate, the probes they contain.

use crate::bounds::Aabb;
use glam::Vec3;

pub trait AdjustmentVolume {
    fn contains(&self, point: Vec3) -> bool;

    fn intensity_scale(&self) -> f32;

    fn should_invalidate(&self) -> bool;
}

/// Box-shaped adjustment volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxAdjustment {
    pub bounds: Aabb,
    pub intensity_scale: f32,
    pub invalidate: bool,
}

impl BoxAdjustment {
    pub fn new(min: Vec3, max: Vec3, intensity_scale: f32, invalidate: bool) -> Self {
        Self {
            bounds: Aabb::new(min.min(max), min.max(max)),
            intensity_scale,
            invalidate,
        }
    }
}

impl AdjustmentVolume for BoxAdjustment {
    fn contains(&self, point: Vec3) -> bool {
        self.bounds.contains(point)
    }

    fn intensity_scale(&self) -> f32 {
        self.intensity_scale
    }

    fn should_invalidate(&self) -> bool {
        self.invalidate
    }
}

/// Combined effect of every adjustment volume on one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeAdjustment {
    pub intensity_scale: f32,
    pub invalidate: bool,
}

impl Default for ProbeAdjustment {
    fn default() -> Self {
        Self {
            intensity_scale: 1.0,
            invalidate: false,
        }
    }
}

/// Product of the scales of all volumes containing `point`.
pub fn intensity_scale(point: Vec3, volumes: &[&dyn AdjustmentVolume]) -> f32 {
    volumes
        .iter()
        .filter(|v| v.contains(point))
        .map(|v| v.intensity_scale())
        .product()
}

/// Whether any volume containing `point` invalidates it.
pub fn should_invalidate(point: Vec3, volumes: &[&dyn AdjustmentVolume]) -> bool {
    volumes
        .iter()
        .any(|v| v.contains(point) && v.should_invalidate())
}

pub fn adjust(point: Vec3, volumes: &[&dyn AdjustmentVolume]) -> ProbeAdjustment {
    ProbeAdjustment {
        intensity_scale: intensity_scale(point, volumes),
        invalidate: should_invalidate(point, volumes),
    }
}
