//! Per-frame relight selection.
//!
//! With multi-frame relight active a frame spends `probes_to_update_count +
//! local_probe_count` probes, in this order:
//!
//! 1. probes that just entered the resident window (FIFO),
//! 2. the probes nearest the viewer,
//! 3. a round-robin sweep over the resident window starting at the cursor.
//!
//! `probes_to_update_count` divides the resident count, so an undisturbed
//! sweep returns to its starting probe exactly on a frame boundary.

use crate::config::VolumeSettings;
use crate::probe::Probe;
use prt_asset::PrtAsset;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Frames after a rotation reset during which every resident probe is relit.
pub const WARM_UP_FRAMES: u32 = 2;

/// FIFO of probe indices with set semantics: a queued probe is never queued twice.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    order: VecDeque<usize>,
    queued: HashSet<usize>,
}

impl PriorityQueue {
    pub fn push(&mut self, index: usize) -> bool {
        if !self.queued.insert(index) {
            return false;
        }
        self.order.push_back(index);
        true
    }

    pub fn pop(&mut self) -> Option<usize> {
        let index = self.order.pop_front()?;
        self.queued.remove(&index);
        Some(index)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.queued.clear();
    }
}

/// Largest divisor of `resident_count` not above `cap`; 1 for an empty window.
pub fn probes_per_frame(resident_count: usize, cap: u32) -> usize {
    if resident_count == 0 {
        return 1;
    }

    let max = (cap as usize).min(resident_count);
    (1..=max)
        .rev()
        .find(|d| resident_count % d == 0)
        .unwrap_or(1)
}

/// Round-robin state carried from frame to frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rotation {
    /// Next membership slot the sweep starts from.
    pub cursor: usize,
    pub probes_to_update_count: usize,
    /// Probes the sweep contributed last frame.
    pub last_round_robin_count: usize,
    pub frame_count: u32,
}

impl Rotation {
    #[inline]
    pub fn multi_frame_active(&self, settings: &VolumeSettings) -> bool {
        settings.multi_frame_relight && self.frame_count >= WARM_UP_FRAMES
    }

    /// Restart the sweep for a freshly rebuilt membership.
    pub fn on_membership_changed(&mut self, resident_count: usize, settings: &VolumeSettings) {
        self.probes_to_update_count =
            probes_per_frame(resident_count, settings.probes_per_frame_update);
        self.cursor = 0;
        self.last_round_robin_count = 0;
    }

    #[inline]
    pub fn total_budget(&self, settings: &VolumeSettings) -> usize {
        self.probes_to_update_count + settings.local_probe_count as usize
    }
}

/// Scratch sets reused across frames.
#[derive(Debug, Default)]
pub struct FrameScratch {
    added: HashSet<usize>,
    bricks: BTreeSet<u32>,
}

/// Everything the selection reads about the current window.
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub probes: &'a [Probe],
    /// Resident probe indices in membership order.
    pub members: &'a [usize],
    /// Full-grid sized residency flags.
    pub resident: &'a [bool],
    /// Viewer-local probe indices, nearest first.
    pub local: &'a [usize],
}

/// Pick this frame's probes into `out`, in the order they were chosen.
pub fn select_probes(
    rotation: &mut Rotation,
    settings: &VolumeSettings,
    input: SelectionInput<'_>,
    queue: &mut PriorityQueue,
    scratch: &mut FrameScratch,
    out: &mut Vec<Probe>,
) {
    let SelectionInput {
        probes,
        members,
        resident,
        local,
    } = input;

    if !rotation.multi_frame_active(settings) {
        // Full refresh covers everything that was waiting in the queue.
        queue.clear();
        out.extend(members.iter().filter_map(|&i| probes.get(i).copied()));
        return;
    }

    let mut remaining = rotation.total_budget(settings);
    rotation.last_round_robin_count = 0;

    let added = &mut scratch.added;
    added.clear();

    while remaining > 0 {
        let Some(index) = queue.pop() else { break };
        if !resident.get(index).copied().unwrap_or(false) {
            continue;
        }
        if let Some(probe) = probes.get(index) {
            if added.insert(index) {
                out.push(*probe);
                remaining -= 1;
            }
        }
    }

    for &index in local {
        if remaining == 0 {
            break;
        }
        if !resident.get(index).copied().unwrap_or(false) {
            continue;
        }
        if let Some(probe) = probes.get(index) {
            if added.insert(index) {
                out.push(*probe);
                remaining -= 1;
            }
        }
    }

    if !members.is_empty() {
        let start = rotation.cursor;
        let mut from_sweep = 0;

        for step in 0..members.len() {
            if remaining == 0 {
                break;
            }
            let index = members[(start + step) % members.len()];
            if let Some(probe) = probes.get(index) {
                if added.insert(index) {
                    out.push(*probe);
                    remaining -= 1;
                    from_sweep += 1;
                }
            }
        }

        rotation.last_round_robin_count = from_sweep;
    }
}

/// Bricks referenced by the factors of `probes`, ascending and deduplicated.
///
/// Factor and brick indices outside the loaded tables contribute nothing.
pub fn select_bricks(
    probes: &[Probe],
    tables: &PrtAsset,
    scratch: &mut FrameScratch,
    out: &mut Vec<u32>,
) {
    let bricks = &mut scratch.bricks;
    bricks.clear();

    for probe in probes {
        let Some(range) = tables.probes.get(probe.index) else {
            continue;
        };
        if range.end < range.start || range.end < 0 {
            continue;
        }

        for factor_index in range.start.max(0)..=range.end {
            let Some(factor) = tables.factors.get(factor_index as usize) else {
                break;
            };
            let Ok(brick) = u32::try_from(factor.brick_index) else {
                continue;
            };
            if (brick as usize) < tables.bricks.len() {
                bricks.insert(brick);
            }
        }
    }

    out.extend(bricks.iter().copied());
}
