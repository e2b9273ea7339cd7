//! Grid shapes derived from the volume settings.

use crate::config::VolumeSettings;
use glam::{IVec3, UVec3};

/// Shape of either the full probe lattice or the resident window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub cell_size: f32,
}

impl Grid {
    #[inline]
    pub fn new(x: u32, y: u32, z: u32, cell_size: f32) -> Self {
        Self { x, y, z, cell_size }
    }

    #[inline]
    pub fn size(&self) -> UVec3 {
        UVec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn extent(&self) -> IVec3 {
        self.size().as_ivec3()
    }

    #[inline]
    pub fn probe_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    #[inline]
    pub fn contains(&self, coord: IVec3) -> bool {
        coord.cmpge(IVec3::ZERO).all() && coord.cmplt(self.extent()).all()
    }

    /// `x * Y * Z + y * Z + z`, or `None` outside the grid.
    #[inline]
    pub fn flatten(&self, coord: IVec3) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let (y, z) = (self.y as usize, self.z as usize);
        Some(coord.x as usize * y * z + coord.y as usize * z + coord.z as usize)
    }

    /// Inverse of [`Grid::flatten`] for indices below [`Grid::probe_count`].
    #[inline]
    pub fn unflatten(&self, index: usize) -> IVec3 {
        let (y, z) = (self.y as usize, self.z as usize);
        IVec3::new(
            (index / (y * z)) as i32,
            ((index / z) % y) as i32,
            (index % z) as i32,
        )
    }
}

/// Full probe grid: axis sizes and cell size straight from the settings.
pub fn full_grid(settings: &VolumeSettings) -> Grid {
    let size = settings.grid_size;
    Grid::new(size.x, size.y, size.z, settings.cell_size)
}

/// Resident window: the requested window clamped to the full grid per axis.
pub fn window_grid(settings: &VolumeSettings) -> Grid {
    let size = settings.window_size.min(settings.grid_size);
    Grid::new(size.x, size.y, size.z, settings.cell_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped_to_full_grid() {
        let settings = VolumeSettings::default();
        let full = full_grid(&settings);
        let window = window_grid(&settings);

        assert_eq!(full, Grid::new(8, 4, 8, 2.0));
        assert_eq!(window, Grid::new(8, 4, 8, 2.0));

        let settings = VolumeSettings {
            grid_size: UVec3::new(32, 8, 32),
            window_size: UVec3::new(10, 5, 10),
            ..Default::default()
        };
        assert_eq!(window_grid(&settings), Grid::new(10, 5, 10, 2.0));
    }

    #[test]
    fn cell_size_change_breaks_equality() {
        let a = Grid::new(4, 4, 4, 1.0);
        let b = Grid::new(4, 4, 4, 1.5);
        assert_ne!(a, b);
    }

    #[test]
    fn flatten_is_a_bijection() {
        let grid = Grid::new(3, 4, 5, 1.0);
        let mut seen = vec![false; grid.probe_count()];

        for x in 0..3 {
            for y in 0..4 {
                for z in 0..5 {
                    let coord = IVec3::new(x, y, z);
                    let index = grid.flatten(coord).unwrap();
                    assert_eq!(index, (x * 4 * 5 + y * 5 + z) as usize);
                    assert!(!seen[index]);
                    seen[index] = true;
                    assert_eq!(grid.unflatten(index), coord);
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn flatten_rejects_outside_coordinates() {
        let grid = Grid::new(2, 2, 2, 1.0);
        assert_eq!(grid.flatten(IVec3::new(-1, 0, 0)), None);
        assert_eq!(grid.flatten(IVec3::new(0, 2, 0)), None);
    }
}
