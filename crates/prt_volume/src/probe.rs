use glam::Vec3;

/// Whether a probe currently sits inside the resident window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Outside,
    Resident,
}

/// A sample point of the light-transport grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    /// Flattened full-grid coordinate, stable for the probe's lifetime.
    pub index: usize,
    /// Offset from the volume origin, `(x, y, z) * cell_size`.
    pub local_position: Vec3,
    pub visibility: Visibility,
}

impl Probe {
    pub fn new(index: usize, local_position: Vec3) -> Self {
        Self {
            index,
            local_position,
            visibility: Visibility::Outside,
        }
    }

    #[inline]
    pub fn world_position(&self, volume_origin: Vec3) -> Vec3 {
        volume_origin + self.local_position
    }

    #[inline]
    pub fn is_resident(&self) -> bool {
        self.visibility == Visibility::Resident
    }
}
