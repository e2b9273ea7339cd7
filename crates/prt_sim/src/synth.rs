//! Seeded synthetic PRTV assets for grids that have no baked data.

use prt_asset::{BrickFactor, FactorIndices, PrtAsset, Surfel, SurfelIndices};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probes sharing one brick on average.
const PROBES_PER_BRICK: usize = 8;
const MAX_FACTORS_PER_PROBE: usize = 4;
const MAX_SURFELS_PER_BRICK: usize = 16;

/// Build an asset for `probe_count` probes. The same seed always yields the
/// same asset.
pub fn synthesize(probe_count: usize, seed: u64) -> PrtAsset {
    let mut rng = StdRng::seed_from_u64(seed);
    let brick_count = probe_count.div_ceil(PROBES_PER_BRICK).max(1);

    let mut surfels = Vec::new();
    let mut bricks = Vec::with_capacity(brick_count);
    for _ in 0..brick_count {
        let count = rng.gen_range(1..=MAX_SURFELS_PER_BRICK);
        let start = surfels.len() as i32;
        for _ in 0..count {
            surfels.push(random_surfel(&mut rng));
        }
        bricks.push(SurfelIndices {
            start,
            end: surfels.len() as i32 - 1,
        });
    }

    let mut factors = Vec::new();
    let mut probes = Vec::with_capacity(probe_count);
    for probe in 0..probe_count {
        let count = rng.gen_range(1..=MAX_FACTORS_PER_PROBE);
        let home = probe / PROBES_PER_BRICK;
        let start = factors.len() as i32;

        let weights: Vec<f32> = (0..count).map(|_| rng.gen_range(0.05..1.0)).collect();
        let total: f32 = weights.iter().sum();
        for (i, weight) in weights.into_iter().enumerate() {
            // First factor is the probe's own brick, the rest land nearby.
            let brick = if i == 0 {
                home
            } else {
                let spread = rng.gen_range(-2i64..=2);
                (home as i64 + spread).clamp(0, brick_count as i64 - 1) as usize
            };
            factors.push(BrickFactor {
                brick_index: brick as i32,
                weight: weight / total,
            });
        }

        probes.push(FactorIndices {
            start,
            end: factors.len() as i32 - 1,
        });
    }

    tracing::debug!(
        probes = probes.len(),
        factors = factors.len(),
        bricks = bricks.len(),
        surfels = surfels.len(),
        seed,
        "Synthesized PRT asset"
    );

    PrtAsset {
        probes,
        factors,
        bricks,
        surfels,
    }
}

fn random_surfel(rng: &mut StdRng) -> Surfel {
    let normal = loop {
        let v: [f32; 3] = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len > 1e-3 {
            break [v[0] / len, v[1] / len, v[2] / len];
        }
    };

    Surfel {
        position: [
            rng.gen_range(-50.0..50.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-50.0..50.0),
        ],
        normal,
        albedo: [rng.gen(), rng.gen(), rng.gen()],
        sky_mask: if rng.gen_bool(0.2) { 1.0 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_stay_inside_their_tables() {
        let asset = synthesize(64, 3);
        assert_eq!(asset.probes.len(), 64);
        assert_eq!(asset.bricks.len(), 8);

        for range in &asset.probes {
            assert!(range.start <= range.end);
            assert!((range.end as usize) < asset.factors.len());

            let weights: f32 = asset.factors[range.start as usize..=range.end as usize]
                .iter()
                .map(|f| f.weight)
                .sum();
            assert!((weights - 1.0).abs() < 1e-4);
        }
        for factor in &asset.factors {
            assert!((factor.brick_index as usize) < asset.bricks.len());
        }
        for range in &asset.bricks {
            assert!(range.start <= range.end);
            assert!((range.end as usize) < asset.surfels.len());
        }
    }

    #[test]
    fn same_seed_same_asset() {
        assert_eq!(synthesize(27, 11), synthesize(27, 11));
        assert_ne!(synthesize(27, 11), synthesize(27, 12));
    }

    #[test]
    fn tiny_grids_still_get_a_brick() {
        let asset = synthesize(1, 0);
        assert_eq!(asset.bricks.len(), 1);
        assert!(asset.has_valid_data());
    }
}
