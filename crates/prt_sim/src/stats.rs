use prt_volume::FrameOutput;

/// Relight totals over a simulated run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub frames: u32,
    pub relights: usize,
    pub max_probes_per_frame: usize,
    pub bricks: usize,
    pub window_moves: u32,
    pub invalidated: usize,
    /// Frame each probe was last relit on.
    last_relit: Vec<Option<u32>>,
    /// Longest gap between two consecutive relights of one probe.
    max_relight_gap: u32,
}

impl RunStats {
    pub fn new(probe_count: usize) -> Self {
        Self {
            last_relit: vec![None; probe_count],
            ..Default::default()
        }
    }

    pub fn record(&mut self, out: &FrameOutput, window_moved: bool, invalidated: usize) {
        let frame = self.frames;
        self.frames += 1;
        self.relights += out.probes.len();
        self.max_probes_per_frame = self.max_probes_per_frame.max(out.probes.len());
        self.bricks += out.bricks.len();
        self.invalidated += invalidated;
        if window_moved {
            self.window_moves += 1;
        }

        for probe in &out.probes {
            let Some(slot) = self.last_relit.get_mut(probe.index) else {
                continue;
            };
            if let Some(previous) = *slot {
                self.max_relight_gap = self.max_relight_gap.max(frame - previous);
            }
            *slot = Some(frame);
        }
    }

    /// Probes relit at least once.
    pub fn probes_touched(&self) -> usize {
        self.last_relit.iter().filter(|s| s.is_some()).count()
    }

    pub fn max_relight_gap(&self) -> u32 {
        self.max_relight_gap
    }

    pub fn mean_probes_per_frame(&self) -> f32 {
        if self.frames == 0 {
            0.0
        } else {
            self.relights as f32 / self.frames as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use prt_volume::Probe;

    fn frame(indices: &[usize], bricks: &[u32]) -> FrameOutput {
        FrameOutput {
            probes: indices.iter().map(|&i| Probe::new(i, Vec3::ZERO)).collect(),
            bricks: bricks.to_vec(),
        }
    }

    #[test]
    fn totals_and_relight_gaps() {
        let mut stats = RunStats::new(4);
        stats.record(&frame(&[0, 1], &[0]), true, 0);
        stats.record(&frame(&[2], &[]), false, 1);
        stats.record(&frame(&[0], &[0, 1]), false, 0);
        stats.record(&frame(&[1, 0], &[1]), true, 0);

        assert_eq!(stats.frames, 4);
        assert_eq!(stats.relights, 6);
        assert_eq!(stats.max_probes_per_frame, 2);
        assert_eq!(stats.bricks, 4);
        assert_eq!(stats.window_moves, 2);
        assert_eq!(stats.invalidated, 1);
        assert_eq!(stats.probes_touched(), 3);
        // Probe 1: frames 0 and 3.
        assert_eq!(stats.max_relight_gap(), 3);
        assert_eq!(stats.mean_probes_per_frame(), 1.5);
    }

    #[test]
    fn unknown_probe_indices_are_ignored() {
        let mut stats = RunStats::new(2);
        stats.record(&frame(&[5], &[]), false, 0);
        assert_eq!(stats.probes_touched(), 0);
        assert_eq!(stats.relights, 1);
    }
}
