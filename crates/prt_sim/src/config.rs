use anyhow::{bail, Context};
use clap::Parser;
use glam::{UVec3, Vec3};
use prt_volume::config::{LOCAL_PROBE_RANGE, PROBES_PER_FRAME_RANGE};
use prt_volume::{BoxAdjustment, VolumeSettings};
use std::path::PathBuf;

/// `prt_sim` - Drives a PRT probe volume along a scripted viewer path.
///
/// Each simulated frame selects the probes and bricks a relight pass would
/// process, applies any adjustment volumes, then advances the relight
/// rotation. Per-frame selections and a run summary are logged as JSON.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// JSON file with the volume settings.
    ///
    /// Fields left out keep their defaults; the flags below override the file.
    #[arg(long, env = "PRT_SETTINGS_PATH")]
    pub settings: Option<PathBuf>,

    /// Probes per axis of the full grid, as `x,y,z`.
    #[arg(long, value_parser = parse_uvec3)]
    pub grid: Option<UVec3>,

    /// Requested resident window size, as `x,y,z`.
    #[arg(long, value_parser = parse_uvec3)]
    pub window: Option<UVec3>,

    /// World-space position of the first probe, as `x,y,z`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    pub origin: Option<Vec3>,

    /// Distance between neighbouring probes.
    #[arg(long)]
    pub cell_size: Option<f32>,

    /// Spread relighting over several frames.
    #[arg(long)]
    pub multi_frame: bool,

    /// Upper bound on round-robin probes per frame.
    #[arg(long, value_parser = clap::value_parser!(u32).range(
        *PROBES_PER_FRAME_RANGE.start() as i64..=*PROBES_PER_FRAME_RANGE.end() as i64
    ))]
    pub probes_per_frame: Option<u32>,

    /// Probes nearest the viewer relit every frame.
    #[arg(long, value_parser = clap::value_parser!(u32).range(
        *LOCAL_PROBE_RANGE.start() as i64..=*LOCAL_PROBE_RANGE.end() as i64
    ))]
    pub local_probes: Option<u32>,

    /// Precomputed `.prtv` asset to load.
    #[arg(long, env = "PRT_ASSET_PATH", conflicts_with = "synthesize")]
    pub asset: Option<PathBuf>,

    /// Generate a random asset that fits the grid instead of loading one.
    #[arg(long)]
    pub synthesize: bool,

    /// Seed for `--synthesize`.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Write the asset in use to this path.
    #[arg(long)]
    pub write_asset: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 120)]
    pub frames: u32,

    /// Viewer position on the first frame, as `x,y,z`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true, default_value = "0,0,0")]
    pub from: Vec3,

    /// Viewer position on the last frame, as `x,y,z`. Defaults to `--from`.
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    pub to: Option<Vec3>,

    /// Box adjustment volume, as `min:max:scale[:invalidate]` with `x,y,z`
    /// corners. May be repeated.
    #[arg(long = "adjust", value_parser = parse_adjustment, allow_hyphen_values = true)]
    pub adjustments: Vec<BoxAdjustment>,

    /// Allocate real GPU resources through a headless wgpu device. Needs the
    /// `gpu` build feature.
    #[arg(long)]
    pub gpu: bool,
}

impl Config {
    /// Settings from the optional file with command-line overrides applied,
    /// validated.
    pub fn volume_settings(&self) -> anyhow::Result<VolumeSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading settings {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing settings {}", path.display()))?
            }
            None => VolumeSettings::default(),
        };

        if let Some(grid) = self.grid {
            settings.grid_size = grid;
        }
        if let Some(window) = self.window {
            settings.window_size = window;
        }
        if let Some(origin) = self.origin {
            settings.origin = origin;
        }
        if let Some(cell_size) = self.cell_size {
            settings.cell_size = cell_size;
        }
        if self.multi_frame {
            settings.multi_frame_relight = true;
        }
        if let Some(cap) = self.probes_per_frame {
            settings.probes_per_frame_update = cap;
        }
        if let Some(local) = self.local_probes {
            settings.local_probe_count = local;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Viewer position for `frame`, linear from `--from` to `--to`.
    pub fn viewer_at(&self, frame: u32) -> Vec3 {
        let to = self.to.unwrap_or(self.from);
        if self.frames <= 1 {
            return self.from;
        }
        let t = frame as f32 / (self.frames - 1) as f32;
        self.from.lerp(to, t.clamp(0.0, 1.0))
    }
}

fn parse_components<const N: usize>(s: &str) -> Result<[f32; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} comma-separated values, got '{}'", N, s));
    }

    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|e| format!("bad component '{}': {}", part, e))?;
    }
    Ok(out)
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    parse_components::<3>(s).map(Vec3::from_array)
}

fn parse_uvec3(s: &str) -> Result<UVec3, String> {
    let v = parse_components::<3>(s)?;
    if v.iter().any(|c| *c < 0.0 || c.fract() != 0.0) {
        return Err(format!("expected non-negative integers, got '{}'", s));
    }
    Ok(UVec3::new(v[0] as u32, v[1] as u32, v[2] as u32))
}

fn parse_adjustment(s: &str) -> anyhow::Result<BoxAdjustment> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(3..=4).contains(&parts.len()) {
        bail!("expected min:max:scale[:invalidate], got '{}'", s);
    }

    let min = parse_vec3(parts[0]).map_err(anyhow::Error::msg)?;
    let max = parse_vec3(parts[1]).map_err(anyhow::Error::msg)?;
    let scale: f32 = parts[2]
        .parse()
        .with_context(|| format!("bad scale '{}'", parts[2]))?;
    let invalidate = match parts.get(3) {
        Some(flag) => flag
            .parse()
            .with_context(|| format!("bad invalidate flag '{}'", flag))?,
        None => false,
    };

    Ok(BoxAdjustment::new(min, max, scale, invalidate))
}
