//! Resident window ("bounding box") placement and membership.
//!
//! The window is a `window`-sized block of the full probe grid that follows
//! the viewer. Its placement is always clamped into the grid, and when the
//! viewer cannot be centred (near a border or outside the volume) the
//! placement whose centre is closest to the viewer is searched for.
//!
//! The coefficient volume is addressed toroidally: the corner at which the
//! window first became valid is the origin, and a grid coordinate lands at
//! `(coord - origin) mod window`. Moving the window therefore only rewrites
//! the slices that entered it.

use crate::gpu::SH_COEFFICIENTS;
use crate::grid::Grid;
use crate::probe::{Probe, Visibility};
use crate::scheduler::PriorityQueue;
use glam::{IVec3, UVec3, Vec3};

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Inclusive on both faces.
    #[inline]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowChange {
    Moved,
    Unchanged,
}

/// Largest valid `min_corner` on each axis.
#[inline]
fn max_corner(full: &Grid, window: &Grid) -> IVec3 {
    (full.extent() - window.extent()).max(IVec3::ZERO)
}

#[inline]
fn window_center(origin: Vec3, corner: IVec3, window: &Grid) -> Vec3 {
    origin + (corner.as_vec3() + window.size().as_vec3() * 0.5) * window.cell_size
}

/// Placement of the window for a viewer at `viewer` (world space).
///
/// Centres the window on the viewer's nearest probe when that keeps it inside
/// the grid. Otherwise searches outward from the clamped placement, one cubic
/// shell per radius, for the placement whose centre is nearest the viewer,
/// and stops at the first radius past zero that improves on the best so far.
///
/// The search is `O(slack^3)` distance checks. A window spanning the full
/// grid on one axis leaves the viewer off-centre on that axis almost always,
/// and when the clamped start is already best nothing improves, so every
/// shell out to the largest slack is scanned: roughly 13M checks per call on
/// a 128x4x128 grid with a full-height window.
pub fn place_window(viewer: Vec3, volume_origin: Vec3, full: &Grid, window: &Grid) -> IVec3 {
    let grid_pos = (viewer - volume_origin) / full.cell_size;
    let max = max_corner(full, window);
    let half = window.size().as_vec3() * 0.5;

    let centered = grid_pos.round().as_ivec3() - window.extent() / 2;
    let candidate = centered.clamp(IVec3::ZERO, max);

    let exact = grid_pos - half;
    let fits = exact.cmpge(Vec3::ZERO).all() && exact.cmple(max.as_vec3()).all();
    if fits {
        return candidate;
    }

    let start = exact.round().as_ivec3().clamp(IVec3::ZERO, max);
    let mut best = start;
    let mut best_distance = f32::MAX;

    let search_radius = max.max_element();
    for radius in 0..=search_radius {
        let mut found_better = false;

        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    // Inner cells were covered by smaller radii.
                    if radius > 0 && dx.abs() < radius && dy.abs() < radius && dz.abs() < radius {
                        continue;
                    }

                    let corner = start + IVec3::new(dx, dy, dz);
                    if corner.cmplt(IVec3::ZERO).any() || corner.cmpgt(max).any() {
                        continue;
                    }

                    let distance = viewer.distance(window_center(volume_origin, corner, window));
                    if distance < best_distance {
                        best = corner;
                        best_distance = distance;
                        found_better = true;
                    }
                }
            }
        }

        if found_better && radius > 0 {
            break;
        }
    }

    best
}

#[derive(Debug, Default)]
pub struct BoundingBoxTracker {
    min_corner: IVec3,
    origin_corner: Option<IVec3>,
    world_bounds: Aabb,
    last_corner: Option<IVec3>,
    changed: bool,

    /// Flattened indices of resident probes, in `x, y, z` order.
    members: Vec<usize>,
    /// Full-grid sized; `true` for resident probes.
    resident: Vec<bool>,
}

impl BoundingBoxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the window for the current viewer position.
    pub fn update(
        &mut self,
        viewer: Vec3,
        volume_origin: Vec3,
        full: &Grid,
        window: &Grid,
    ) -> WindowChange {
        let corner = place_window(viewer, volume_origin, full, window);

        // `changed` is only cleared by a membership rebuild.
        if self.last_corner == Some(corner) {
            return WindowChange::Unchanged;
        }

        let world_min = volume_origin + corner.as_vec3() * full.cell_size;
        let world_size = (window.size().as_vec3() - Vec3::ONE) * full.cell_size;

        tracing::debug!(from = ?self.last_corner, to = ?corner, "Resident window moved");

        self.min_corner = corner;
        self.last_corner = Some(corner);
        self.world_bounds = Aabb::new(world_min, world_min + world_size);
        self.changed = true;

        WindowChange::Moved
    }

    /// Membership must be rebuilt after a move, or while it has never been
    /// populated.
    #[inline]
    pub fn needs_membership(&self) -> bool {
        self.changed || self.members.is_empty()
    }

    /// Rebuild the resident list and queue every probe that just entered it.
    /// Returns how many probes entered.
    pub fn refresh_membership(
        &mut self,
        probes: &mut [Probe],
        full: &Grid,
        window: &Grid,
        queue: &mut PriorityQueue,
    ) -> usize {
        let previous = std::mem::take(&mut self.members);
        let was_resident = std::mem::take(&mut self.resident);

        for &index in &previous {
            if let Some(probe) = probes.get_mut(index) {
                probe.visibility = Visibility::Outside;
            }
        }

        let mut resident = vec![false; probes.len()];
        let mut members = Vec::with_capacity(window.probe_count());
        let lo = self.min_corner;
        let hi = lo + window.extent();

        for x in lo.x..hi.x {
            for y in lo.y..hi.y {
                for z in lo.z..hi.z {
                    let Some(index) = full.flatten(IVec3::new(x, y, z)) else {
                        continue;
                    };
                    let Some(probe) = probes.get_mut(index) else {
                        continue;
                    };
                    probe.visibility = Visibility::Resident;
                    resident[index] = true;
                    members.push(index);
                }
            }
        }

        let mut entered = 0;
        for &index in &members {
            if !was_resident.get(index).copied().unwrap_or(false) {
                queue.push(index);
                entered += 1;
            }
        }

        if self.origin_corner.is_none() {
            self.origin_corner = Some(self.min_corner);
        }

        tracing::debug!(
            resident = members.len(),
            entered,
            min_corner = ?self.min_corner,
            "Rebuilt resident window membership"
        );

        self.members = members;
        self.resident = resident;
        self.changed = false;

        entered
    }

    /// Texel of SH channel `channel` for the probe at full-grid `coord`, in
    /// the `[window.x, window.z, window.y * 9]` coefficient volume.
    pub fn volume_address(&self, coord: IVec3, window: &Grid, channel: u32) -> Option<UVec3> {
        if channel >= SH_COEFFICIENTS {
            return None;
        }
        let origin = self.origin_corner?;

        let local = coord - self.min_corner;
        if local.cmplt(IVec3::ZERO).any() || local.cmpge(window.extent()).any() {
            return None;
        }

        let wrapped = (coord - origin).rem_euclid(window.extent()).as_uvec3();
        Some(UVec3::new(
            wrapped.x,
            wrapped.z,
            wrapped.y * SH_COEFFICIENTS + channel,
        ))
    }

    /// Forget placement and membership; the next update always reports a move.
    /// Current residents in `probes` are marked outside.
    pub fn clear(&mut self, probes: &mut [Probe]) {
        for &index in &self.members {
            if let Some(probe) = probes.get_mut(index) {
                probe.visibility = Visibility::Outside;
            }
        }
        *self = Self {
            origin_corner: self.origin_corner,
            ..Self::default()
        };
    }

    /// Unset the toroidal origin and force a membership rebuild, which fixes
    /// a new one at the current corner.
    pub fn reset_origin(&mut self) {
        self.origin_corner = None;
        self.changed = true;
    }

    #[inline]
    pub fn min_corner(&self) -> IVec3 {
        self.min_corner
    }

    #[inline]
    pub fn origin_corner(&self) -> Option<IVec3> {
        self.origin_corner
    }

    #[inline]
    pub fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }

    #[inline]
    pub fn changed(&self) -> bool {
        self.changed
    }

    #[inline]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[inline]
    pub fn resident_mask(&self) -> &[bool] {
        &self.resident
    }

    #[inline]
    pub fn is_resident(&self, index: usize) -> bool {
        self.resident.get(index).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probes(full: &Grid) -> Vec<Probe> {
        (0..full.probe_count())
            .map(|i| Probe::new(i, full.unflatten(i).as_vec3() * full.cell_size))
            .collect()
    }

    #[test]
    fn window_is_centred_on_the_viewer_inside_the_volume() {
        let full = Grid::new(16, 8, 16, 1.0);
        let window = Grid::new(4, 4, 4, 1.0);

        let corner = place_window(Vec3::new(8.0, 4.0, 8.0), Vec3::ZERO, &full, &window);
        assert_eq!(corner, IVec3::new(6, 2, 6));
    }

    #[test]
    fn window_stays_inside_the_grid_for_any_viewer() {
        let full = Grid::new(12, 5, 9, 2.0);
        let window = Grid::new(4, 3, 5, 2.0);
        let origin = Vec3::new(-3.0, 1.0, 10.0);
        let max = full.extent() - window.extent();

        let mut viewer_positions = Vec::new();
        for x in (-40..=60).step_by(7) {
            for y in (-20..=30).step_by(5) {
                for z in (-10..=50).step_by(6) {
                    viewer_positions.push(Vec3::new(x as f32, y as f32 * 0.5, z as f32 + 0.25));
                }
            }
        }

        for viewer in viewer_positions {
            let corner = place_window(viewer, origin, &full, &window);
            assert!(corner.cmpge(IVec3::ZERO).all(), "{viewer} -> {corner}");
            assert!(corner.cmple(max).all(), "{viewer} -> {corner}");
        }
    }

    #[test]
    fn viewer_outside_the_volume_gets_the_nearest_border_window() {
        let full = Grid::new(10, 1, 10, 1.0);
        let window = Grid::new(2, 1, 2, 1.0);

        let corner = place_window(Vec3::new(-50.0, 0.5, 4.0), Vec3::ZERO, &full, &window);
        assert_eq!(corner.x, 0);
        assert_eq!(corner.y, 0);
        assert!((3..=4).contains(&corner.z), "{corner}");

        let corner = place_window(Vec3::new(50.0, 0.5, 50.0), Vec3::ZERO, &full, &window);
        assert_eq!(corner, IVec3::new(8, 0, 8));
    }

    #[test]
    fn window_covering_the_full_grid_never_moves() {
        let full = Grid::new(4, 4, 4, 1.0);
        let window = Grid::new(4, 4, 4, 1.0);

        for viewer in [Vec3::splat(-10.0), Vec3::splat(2.0), Vec3::splat(100.0)] {
            assert_eq!(place_window(viewer, Vec3::ZERO, &full, &window), IVec3::ZERO);
        }
    }

    #[test]
    fn update_reports_moves_and_bounds() {
        let full = Grid::new(16, 4, 16, 2.0);
        let window = Grid::new(4, 4, 4, 2.0);
        let mut tracker = BoundingBoxTracker::new();

        let mut probes = probes(&full);
        let mut queue = PriorityQueue::default();

        let first = tracker.update(Vec3::new(10.0, 4.0, 10.0), Vec3::ZERO, &full, &window);
        assert_eq!(first, WindowChange::Moved);
        assert!(tracker.changed());

        // Still pending until membership is rebuilt.
        let again = tracker.update(Vec3::new(10.2, 4.0, 10.1), Vec3::ZERO, &full, &window);
        assert_eq!(again, WindowChange::Unchanged);
        assert!(tracker.changed());

        tracker.refresh_membership(&mut probes, &full, &window, &mut queue);
        assert!(!tracker.changed());
        let still = tracker.update(Vec3::new(10.1, 4.0, 10.0), Vec3::ZERO, &full, &window);
        assert_eq!(still, WindowChange::Unchanged);
        assert!(!tracker.needs_membership());

        let corner = tracker.min_corner();
        let bounds = tracker.world_bounds();
        assert_eq!(bounds.min, corner.as_vec3() * 2.0);
        assert_eq!(bounds.size(), Vec3::splat(6.0));
    }

    #[test]
    fn membership_queues_only_entering_probes() {
        let full = Grid::new(8, 1, 1, 1.0);
        let window = Grid::new(3, 1, 1, 1.0);
        let mut probes = probes(&full);
        let mut queue = PriorityQueue::default();
        let mut tracker = BoundingBoxTracker::new();

        tracker.update(Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO, &full, &window);
        let entered = tracker.refresh_membership(&mut probes, &full, &window, &mut queue);
        assert_eq!(entered, 3);
        assert_eq!(tracker.members(), &[0, 1, 2]);
        assert_eq!(tracker.origin_corner(), Some(IVec3::ZERO));

        while queue.pop().is_some() {}

        tracker.update(Vec3::new(2.6, 0.0, 0.0), Vec3::ZERO, &full, &window);
        assert!(tracker.needs_membership());
        let entered = tracker.refresh_membership(&mut probes, &full, &window, &mut queue);
        assert_eq!(entered, 1);
        assert_eq!(tracker.members(), &[1, 2, 3]);
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
        assert!(!tracker.needs_membership());

        assert!(!probes[0].is_resident());
        assert!(probes[3].is_resident());
        assert!(tracker.is_resident(1));
        assert!(!tracker.is_resident(0));
        // Origin stays where the window first became valid.
        assert_eq!(tracker.origin_corner(), Some(IVec3::ZERO));
    }

    #[test]
    fn membership_follows_the_flattened_index_formula() {
        let full = Grid::new(4, 4, 4, 1.0);
        let window = Grid::new(2, 2, 2, 1.0);
        let mut probes = probes(&full);
        let mut queue = PriorityQueue::default();
        let mut tracker = BoundingBoxTracker::new();

        tracker.update(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, &full, &window);
        tracker.refresh_membership(&mut probes, &full, &window, &mut queue);

        let corner = tracker.min_corner();
        for &index in tracker.members() {
            let coord = full.unflatten(index);
            assert!(coord.cmpge(corner).all());
            assert!(coord.cmplt(corner + window.extent()).all());
        }
        assert_eq!(tracker.members().len(), 8);
        assert_eq!(queue.len(), 8);
    }

    #[test]
    fn volume_address_wraps_around_the_origin() {
        let full = Grid::new(8, 2, 1, 1.0);
        let window = Grid::new(4, 2, 1, 1.0);
        let mut probes = probes(&full);
        let mut queue = PriorityQueue::default();
        let mut tracker = BoundingBoxTracker::new();

        tracker.update(Vec3::new(2.0, 1.0, 0.0), Vec3::ZERO, &full, &window);
        tracker.refresh_membership(&mut probes, &full, &window, &mut queue);
        assert_eq!(tracker.origin_corner(), Some(IVec3::ZERO));

        tracker.update(Vec3::new(5.0, 1.0, 0.0), Vec3::ZERO, &full, &window);
        tracker.refresh_membership(&mut probes, &full, &window, &mut queue);
        assert_eq!(tracker.min_corner(), IVec3::new(3, 0, 0));

        // x = 5 wraps to slot 1, y = 1 selects the second row of 9 slices.
        assert_eq!(
            tracker.volume_address(IVec3::new(5, 1, 0), &window, 4),
            Some(UVec3::new(1, 0, 13))
        );
        assert_eq!(
            tracker.volume_address(IVec3::new(3, 0, 0), &window, 0),
            Some(UVec3::new(3, 0, 0))
        );
        // Not resident any more.
        assert_eq!(tracker.volume_address(IVec3::new(2, 0, 0), &window, 0), None);
        assert_eq!(tracker.volume_address(IVec3::new(4, 0, 0), &window, 9), None);
    }

    #[test]
    fn aabb_contains_is_inclusive() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains(Vec3::ONE));
        assert!(aabb.contains(Vec3::splat(0.5)));
        assert!(!aabb.contains(Vec3::new(1.01, 0.5, 0.5)));
        assert_eq!(aabb.center(), Vec3::splat(0.5));
    }
}
