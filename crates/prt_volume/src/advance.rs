//! End-of-frame bookkeeping: move the round-robin cursor past what was just
//! relit and keep the viewer-local probe set current.

use crate::config::VolumeSettings;
use crate::probe::Probe;
use crate::scheduler::{probes_per_frame, Rotation};
use glam::Vec3;

/// World-space distance the viewer must travel before local probes are
/// recomputed.
pub const VIEWER_MOVEMENT_THRESHOLD: f32 = 1.0;

/// Probes nearest the viewer, nearest first.
#[derive(Debug, Default)]
pub struct LocalProbes {
    indices: Vec<usize>,
    last_viewer: Option<Vec3>,
    distances: Vec<(usize, f32)>,
}

impl LocalProbes {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.last_viewer = None;
    }

    /// Recompute when the viewer moved far enough since the last time.
    /// Returns whether the set was recomputed.
    pub fn update(
        &mut self,
        viewer: Vec3,
        settings: &VolumeSettings,
        probes: &[Probe],
        members: &[usize],
    ) -> bool {
        if let Some(last) = self.last_viewer {
            if viewer.distance(last) < VIEWER_MOVEMENT_THRESHOLD {
                return false;
            }
        }
        self.last_viewer = Some(viewer);

        // Compare in grid space; the volume origin cancels out.
        let inv_cell = settings.cell_size.recip();
        let viewer_grid = (viewer - settings.origin) * inv_cell;

        self.distances.clear();
        self.distances.extend(members.iter().filter_map(|&index| {
            let probe = probes.get(index)?;
            let probe_grid = probe.local_position * inv_cell;
            Some((index, viewer_grid.distance_squared(probe_grid)))
        }));

        // Stable: equal distances keep membership order.
        self.distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        self.indices.clear();
        self.indices.extend(
            self.distances
                .iter()
                .take(settings.local_probe_count as usize)
                .map(|&(index, _)| index),
        );

        true
    }
}

/// Advance the sweep after the relight pass consumed this frame's probes.
pub fn advance(
    rotation: &mut Rotation,
    settings: &VolumeSettings,
    resident_count: usize,
    local: &mut LocalProbes,
    viewer: Option<Vec3>,
    probes: &[Probe],
    members: &[usize],
) {
    if rotation.multi_frame_active(settings) {
        // Budget fully absorbed by new and local probes still moves the sweep on.
        let step = match rotation.last_round_robin_count {
            0 => rotation.probes_to_update_count,
            n => n,
        };

        rotation.cursor = if resident_count > 0 {
            (rotation.cursor + step) % resident_count
        } else {
            0
        };
    } else {
        rotation.cursor = 0;
    }

    if let Some(viewer) = viewer {
        local.update(viewer, settings, probes, members);
    }

    rotation.frame_count = rotation.frame_count.saturating_add(1);
}

/// Restart the rotation from scratch for the current membership.
pub fn reset_rotation(rotation: &mut Rotation, settings: &VolumeSettings, resident_count: usize) {
    *rotation = Rotation {
        cursor: 0,
        probes_to_update_count: probes_per_frame(resident_count, settings.probes_per_frame_update),
        last_round_robin_count: 0,
        frame_count: 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WARM_UP_FRAMES;

    fn line_of_probes(count: usize) -> Vec<Probe> {
        (0..count)
            .map(|i| Probe::new(i, Vec3::new(i as f32 * 2.0, 0.0, 0.0)))
            .collect()
    }

    fn settings(local: u32) -> VolumeSettings {
        VolumeSettings {
            multi_frame_relight: true,
            probes_per_frame_update: 2,
            local_probe_count: local,
            cell_size: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn local_probes_are_the_nearest_residents() {
        let probes = line_of_probes(10);
        let members: Vec<usize> = (2..9).collect();
        let mut local = LocalProbes::default();

        assert!(local.update(Vec3::new(9.0, 0.0, 0.0), &settings(3), &probes, &members));
        // Grid x = 4.5: probes 4 and 5 tie, membership order keeps 4 first.
        assert_eq!(local.indices(), &[4, 5, 3]);
    }

    #[test]
    fn small_moves_keep_the_local_set() {
        let probes = line_of_probes(10);
        let members: Vec<usize> = (0..10).collect();
        let mut local = LocalProbes::default();

        local.update(Vec3::new(6.0, 0.0, 0.0), &settings(3), &probes, &members);
        let before = local.indices().to_vec();

        assert!(!local.update(Vec3::new(6.9, 0.0, 0.0), &settings(3), &probes, &members));
        assert_eq!(local.indices(), before.as_slice());

        assert!(local.update(Vec3::new(12.0, 0.0, 0.0), &settings(3), &probes, &members));
        assert_ne!(local.indices(), before.as_slice());
    }

    #[test]
    fn cursor_moves_by_round_robin_share_and_wraps() {
        let settings = settings(3);
        let mut rotation = Rotation::default();
        reset_rotation(&mut rotation, &settings, 8);
        rotation.frame_count = WARM_UP_FRAMES;
        rotation.cursor = 6;
        rotation.last_round_robin_count = 3;

        advance(&mut rotation, &settings, 8, &mut LocalProbes::default(), None, &[], &[]);
        assert_eq!(rotation.cursor, 1);
        assert_eq!(rotation.frame_count, WARM_UP_FRAMES + 1);
    }

    #[test]
    fn cursor_still_advances_when_sweep_was_starved() {
        let settings = settings(3);
        let mut rotation = Rotation::default();
        reset_rotation(&mut rotation, &settings, 8);
        rotation.frame_count = WARM_UP_FRAMES;
        rotation.last_round_robin_count = 0;

        advance(&mut rotation, &settings, 8, &mut LocalProbes::default(), None, &[], &[]);
        assert_eq!(rotation.cursor, rotation.probes_to_update_count);
    }

    #[test]
    fn empty_window_resets_the_cursor() {
        let settings = settings(3);
        let mut rotation = Rotation {
            cursor: 5,
            probes_to_update_count: 1,
            last_round_robin_count: 0,
            frame_count: WARM_UP_FRAMES,
        };

        advance(&mut rotation, &settings, 0, &mut LocalProbes::default(), None, &[], &[]);
        assert_eq!(rotation.cursor, 0);
    }

    #[test]
    fn cursor_stays_at_zero_without_multi_frame_relight() {
        let settings = VolumeSettings {
            multi_frame_relight: false,
            ..settings(3)
        };
        let mut rotation = Rotation {
            cursor: 3,
            probes_to_update_count: 2,
            last_round_robin_count: 2,
            frame_count: 10,
        };

        advance(&mut rotation, &settings, 8, &mut LocalProbes::default(), None, &[], &[]);
        assert_eq!(rotation.cursor, 0);
        assert_eq!(rotation.frame_count, 11);
    }

    #[test]
    fn reset_clears_progress_and_recomputes_share() {
        let settings = settings(3);
        let mut rotation = Rotation {
            cursor: 7,
            probes_to_update_count: 1,
            last_round_robin_count: 4,
            frame_count: 99,
        };

        reset_rotation(&mut rotation, &settings, 8);
        assert_eq!(
            rotation,
            Rotation {
                cursor: 0,
                probes_to_update_count: 2,
                last_round_robin_count: 0,
                frame_count: 0,
            }
        );

        reset_rotation(&mut rotation, &settings, 0);
        assert_eq!(rotation.probes_to_update_count, 1);
    }
}
