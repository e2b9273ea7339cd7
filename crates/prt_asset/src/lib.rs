//! PRTV: precomputed radiance transfer data for a probe volume.
//!
//! - One `FactorIndices` range per probe (full grid, flattened `x*Y*Z + y*Z + z`).
//! - A flat table of `BrickFactor`s; each links a probe to one brick with a weight.
//! - One `SurfelIndices` range per brick.
//! - The raw `Surfel` samples, uploaded verbatim to the GPU.
//!
//! File layout (little-endian):
//!   00  : [u8;4]  magic = b"PRTV"
//!   04  : u32     version = 1
//!   08  : u32     flags (reserved, must be 0)
//!   0C  : u32     probe_count
//!   10  : u32     factor_count
//!   14  : u32     brick_count
//!   18  : u32     surfel_count
//!   1C  : FactorIndices[probe_count]   (i32 start, i32 end)
//!   ..  : BrickFactor[factor_count]    (i32 brick_index, f32 weight)
//!   ..  : SurfelIndices[brick_count]   (i32 start, i32 end)
//!   ..  : Surfel[surfel_count]         (f32x3 position, f32x3 normal, f32x3 albedo, f32 sky_mask)
//!
//! All ranges are inclusive on both ends.

use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::io::{self, ErrorKind, Write};
use std::mem::size_of;
use std::path::Path;

pub const PRTV_MAGIC: [u8; 4] = *b"PRTV";
pub const PRTV_VERSION: u32 = 1;

const HEADER_LEN: usize = 28;

/// Inclusive range into the factor table naming the factors of one probe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FactorIndices {
    pub start: i32,
    pub end: i32,
}

/// One weighted contribution from a brick to a probe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BrickFactor {
    pub brick_index: i32,
    pub weight: f32,
}

/// Inclusive range into the surfel table naming the surfels of one brick.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct SurfelIndices {
    pub start: i32,
    pub end: i32,
}

/// A single precomputed geometry sample.
/// Must match the layout of the surfel struct read by the relight compute shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Surfel {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub albedo: [f32; 3],
    /// 1.0 when the sample sees the sky, 0.0 when it hits geometry.
    pub sky_mask: f32,
}

impl Surfel {
    /// Size of one record in the GPU surfel buffer.
    pub const STRIDE: usize = size_of::<Surfel>();
}

/// The four parallel tables of a baked probe volume.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrtAsset {
    pub probes: Vec<FactorIndices>,
    pub factors: Vec<BrickFactor>,
    pub bricks: Vec<SurfelIndices>,
    pub surfels: Vec<Surfel>,
}

impl PrtAsset {
    /// An asset without per-probe data carries nothing to relight.
    #[inline]
    pub fn has_valid_data(&self) -> bool {
        !self.probes.is_empty()
    }
}

#[inline(always)]
fn need(buf: &[u8], want: usize) -> io::Result<()> {
    if buf.len() < want {
        Err(io::Error::new(ErrorKind::UnexpectedEof, "truncated PRTV"))
    } else {
        Ok(())
    }
}

#[inline(always)]
fn take<'a>(buf: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    need(buf, n)?;
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

#[inline(always)]
fn le_u32(buf: &mut &[u8]) -> io::Result<u32> {
    let b = take(buf, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

#[cold]
fn bad(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, msg)
}

/// Decode `count` tightly packed records. The source slice has no alignment
/// guarantee, so every record is read unaligned.
fn records<T: Pod>(p: &mut &[u8], count: usize) -> io::Result<Vec<T>> {
    let stride = size_of::<T>();
    let len = count
        .checked_mul(stride)
        .ok_or_else(|| bad("record block size overflow"))?;
    let raw = take(p, len)?;

    Ok(raw
        .chunks_exact(stride)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect())
}

/// Parse PRTV from a contiguous byte slice. This is the single source of truth for parsing.
pub fn parse_prtv_bytes(mut p: &[u8]) -> io::Result<PrtAsset> {
    if take(&mut p, 4)? != PRTV_MAGIC {
        return Err(bad("bad PRTV magic"));
    }

    let version = le_u32(&mut p)?;
    if version != PRTV_VERSION {
        return Err(bad("unsupported PRTV version"));
    }

    let flags = le_u32(&mut p)?;
    if flags != 0 {
        return Err(bad("unknown PRTV flags"));
    }

    let probe_count = le_u32(&mut p)? as usize;
    let factor_count = le_u32(&mut p)? as usize;
    let brick_count = le_u32(&mut p)? as usize;
    let surfel_count = le_u32(&mut p)? as usize;

    let probes = records::<FactorIndices>(&mut p, probe_count)?;
    let factors = records::<BrickFactor>(&mut p, factor_count)?;
    let bricks = records::<SurfelIndices>(&mut p, brick_count)?;
    let surfels = records::<Surfel>(&mut p, surfel_count)?;

    if !p.is_empty() {
        return Err(bad("trailing bytes after PRTV surfel block"));
    }

    Ok(PrtAsset {
        probes,
        factors,
        bricks,
        surfels,
    })
}

/// Fast path: prefer mmap; fall back to a single read.
#[cfg(feature = "mmap")]
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<PrtAsset> {
    let file = File::open(path)?;
    let map = unsafe { memmap2::MmapOptions::new().map(&file)? };
    parse_prtv_bytes(&map)
}

#[cfg(not(feature = "mmap"))]
pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<PrtAsset> {
    let bytes = std::fs::read(path)?;
    parse_prtv_bytes(&bytes)
}

fn count_u32(len: usize, what: &str) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| bad(&format!("too many {} for PRTV", what)))
}

/// Serialize `asset` into any writer.
pub fn write_to<W: Write>(w: &mut W, asset: &PrtAsset) -> io::Result<()> {
    let probe_count = count_u32(asset.probes.len(), "probes")?;
    let factor_count = count_u32(asset.factors.len(), "factors")?;
    let brick_count = count_u32(asset.bricks.len(), "bricks")?;
    let surfel_count = count_u32(asset.surfels.len(), "surfels")?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&PRTV_MAGIC);
    header.extend_from_slice(&PRTV_VERSION.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes());
    header.extend_from_slice(&probe_count.to_le_bytes());
    header.extend_from_slice(&factor_count.to_le_bytes());
    header.extend_from_slice(&brick_count.to_le_bytes());
    header.extend_from_slice(&surfel_count.to_le_bytes());
    w.write_all(&header)?;

    // Records are written in native layout; the format is little-endian only.
    #[cfg(not(target_endian = "little"))]
    return Err(io::Error::new(
        ErrorKind::Unsupported,
        "PRTV writing requires a little-endian target",
    ));

    #[cfg(target_endian = "little")]
    {
        w.write_all(bytemuck::cast_slice(&asset.probes))?;
        w.write_all(bytemuck::cast_slice(&asset.factors))?;
        w.write_all(bytemuck::cast_slice(&asset.bricks))?;
        w.write_all(bytemuck::cast_slice(&asset.surfels))?;
        Ok(())
    }
}

pub fn write_file<P: AsRef<Path>>(path: P, asset: &PrtAsset) -> io::Result<()> {
    let mut file = io::BufWriter::new(File::create(path)?);
    write_to(&mut file, asset)?;
    file.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> PrtAsset {
        PrtAsset {
            probes: vec![
                FactorIndices { start: 0, end: 1 },
                FactorIndices { start: 2, end: 2 },
            ],
            factors: vec![
                BrickFactor { brick_index: 0, weight: 0.75 },
                BrickFactor { brick_index: 1, weight: 0.25 },
                BrickFactor { brick_index: 1, weight: 1.0 },
            ],
            bricks: vec![
                SurfelIndices { start: 0, end: 0 },
                SurfelIndices { start: 1, end: 1 },
            ],
            surfels: vec![
                Surfel {
                    position: [1.0, 2.0, 3.0],
                    normal: [0.0, 1.0, 0.0],
                    albedo: [0.5, 0.5, 0.5],
                    sky_mask: 0.0,
                },
                Surfel {
                    position: [-1.0, 0.0, 4.0],
                    normal: [1.0, 0.0, 0.0],
                    albedo: [0.2, 0.3, 0.4],
                    sky_mask: 1.0,
                },
            ],
        }
    }

    #[test]
    fn surfel_stride_is_ten_floats() {
        assert_eq!(Surfel::STRIDE, 40);
    }

    #[test]
    fn written_asset_parses_back() {
        let asset = sample_asset();
        let mut bytes = Vec::new();
        write_to(&mut bytes, &asset).unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 2 * 8 + 3 * 8 + 2 * 8 + 2 * 40);
        assert_eq!(parse_prtv_bytes(&bytes).unwrap(), asset);
    }

    #[test]
    fn unaligned_input_still_parses() {
        let asset = sample_asset();
        let mut bytes = vec![0u8];
        write_to(&mut bytes, &asset).unwrap();

        assert_eq!(parse_prtv_bytes(&bytes[1..]).unwrap(), asset);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Vec::new();
        write_to(&mut bytes, &sample_asset()).unwrap();
        bytes[0] = b'X';

        let err = parse_prtv_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_truncated_surfels() {
        let mut bytes = Vec::new();
        write_to(&mut bytes, &sample_asset()).unwrap();
        bytes.truncate(bytes.len() - 4);

        let err = parse_prtv_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = Vec::new();
        write_to(&mut bytes, &sample_asset()).unwrap();
        bytes.push(0);

        let err = parse_prtv_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn empty_asset_has_no_valid_data() {
        assert!(!PrtAsset::default().has_valid_data());
        assert!(sample_asset().has_valid_data());
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("prtv-test-{}.prtv", std::process::id()));
        let asset = sample_asset();

        write_file(&path, &asset).unwrap();
        let loaded = read_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, asset);
    }
}
