mod config;
mod stats;
mod synth;

use crate::config::Config;
use crate::stats::RunStats;
use anyhow::Context;
use clap::Parser;
use prt_asset::PrtAsset;
use prt_volume::grid::full_grid;
use prt_volume::{
    AdjustmentVolume, FrameOutput, GpuResources, HeadlessResources, ProbeVolume, VolumeSettings,
};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // --- 1. Initialization ---
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();
    let config = Config::parse();
    tracing::info!(config = ?config, "prt_sim starting with configuration");

    let settings = config.volume_settings()?;
    let asset = load_asset(&config, &settings)?;

    // --- 2. Run on the selected resource backend ---
    let stats = run(&config, settings, asset)?;

    tracing::info!(
        frames = stats.frames,
        relights = stats.relights,
        mean_probes_per_frame = stats.mean_probes_per_frame(),
        max_probes_per_frame = stats.max_probes_per_frame,
        probes_touched = stats.probes_touched(),
        max_relight_gap = stats.max_relight_gap(),
        bricks = stats.bricks,
        window_moves = stats.window_moves,
        invalidated = stats.invalidated,
        "Simulation finished"
    );

    Ok(())
}

#[cfg(feature = "gpu")]
fn run(
    config: &Config,
    settings: VolumeSettings,
    asset: Option<Arc<PrtAsset>>,
) -> anyhow::Result<RunStats> {
    if config.gpu {
        let gpu = pollster::block_on(prt_volume::gpu::WgpuResources::headless())?;
        tracing::info!("Using headless wgpu device");
        return simulate(config, settings, asset, gpu);
    }
    simulate(config, settings, asset, HeadlessResources::new())
}

#[cfg(not(feature = "gpu"))]
fn run(
    config: &Config,
    settings: VolumeSettings,
    asset: Option<Arc<PrtAsset>>,
) -> anyhow::Result<RunStats> {
    if config.gpu {
        anyhow::bail!("--gpu needs prt_sim built with the `gpu` feature");
    }
    simulate(config, settings, asset, HeadlessResources::new())
}

/// Load, or synthesize, the precomputed asset and optionally write it back out.
fn load_asset(config: &Config, settings: &VolumeSettings) -> anyhow::Result<Option<Arc<PrtAsset>>> {
    let asset = if let Some(path) = &config.asset {
        let asset = prt_asset::read_file(path)
            .with_context(|| format!("reading asset {}", path.display()))?;
        tracing::info!(path = %path.display(), probes = asset.probes.len(), "Loaded PRT asset");
        Some(asset)
    } else if config.synthesize {
        let probes = full_grid(settings).probe_count();
        Some(synth::synthesize(probes, config.seed))
    } else {
        None
    };

    if let Some(path) = &config.write_asset {
        match &asset {
            Some(asset) => {
                prt_asset::write_file(path, asset)
                    .with_context(|| format!("writing asset {}", path.display()))?;
                tracing::info!(path = %path.display(), "Wrote PRT asset");
            }
            None => tracing::warn!("--write-asset given without --asset or --synthesize; nothing written"),
        }
    }

    Ok(asset.map(Arc::new))
}

/// Run the volume along the configured viewer path.
fn simulate<R: GpuResources>(
    config: &Config,
    settings: VolumeSettings,
    asset: Option<Arc<PrtAsset>>,
    gpu: R,
) -> anyhow::Result<RunStats> {
    let mut volume = ProbeVolume::new(settings, gpu);
    volume.init(asset)?;

    if !volume.is_active() {
        tracing::warn!("Probe volume has no precomputed data; brick lists will be empty");
    }

    let adjustments: Vec<&dyn AdjustmentVolume> = config
        .adjustments
        .iter()
        .map(|a| a as &dyn AdjustmentVolume)
        .collect();

    let mut stats = RunStats::new(volume.probes().len());
    let mut out = FrameOutput::default();

    // --- 3. Frame loop ---
    for frame in 0..config.frames {
        let viewer = config.viewer_at(frame);
        let corner = volume.window_min();

        volume.tick(Some(viewer), &mut out);

        let mut invalidated = 0;
        let mut scale_sum = 0.0;
        for probe in &out.probes {
            let adjustment = volume.probe_adjustment(probe, &adjustments);
            scale_sum += adjustment.intensity_scale;
            if adjustment.invalidate {
                invalidated += 1;
            }
        }

        let mean_scale = if out.probes.is_empty() {
            1.0
        } else {
            scale_sum / out.probes.len() as f32
        };

        tracing::debug!(
            frame,
            viewer = ?viewer,
            window_min = ?volume.window_min(),
            probes = out.probes.len(),
            bricks = out.bricks.len(),
            pending = volume.pending_new_probes(),
            cursor = volume.rotation().cursor,
            invalidated,
            mean_scale,
            "Frame scheduled"
        );

        stats.record(&out, volume.window_min() != corner, invalidated);
        volume.end_frame(Some(viewer));
    }

    volume.shutdown();
    Ok(stats)
}
