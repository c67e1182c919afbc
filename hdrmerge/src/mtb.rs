//! Translation-only alignment with median threshold bitmaps.
//!
//! Each image is reduced to its per-pixel channel maximum and thresholded
//! at its own median. The resulting bitmap barely changes with exposure, so
//! differently exposed captures can be compared bit for bit. Pixels close to
//! the median are noise-prone and excluded from the comparison.
//!
//! The offset is found coarse to fine: at every pyramid level the nine
//! offsets around the doubled estimate from the level above are scored by
//! the fraction of mismatched bits in the overlap, and the best one wins.

use hdrmerge_core::Exposure;

use crate::align::{check_buffer, check_same_grid, try_vec, Aligner, AlignmentError};

/// Smallest side length a pyramid level may have.
const MIN_LEVEL_DIMENSION: u32 = 8;

/// Tuning for [`MtbAligner`].
#[derive(Debug, Clone)]
pub struct MtbConfig {
    /// Maximum number of pyramid levels, including full resolution.
    pub levels: u32,
    /// Half-width of the excluded band around the median, relative to it.
    pub exclusion: f32,
    /// Largest accepted shift in pixels along either axis.
    pub max_shift: u32,
}

impl Default for MtbConfig {
    fn default() -> Self {
        Self {
            levels: 6,
            exclusion: 0.02,
            max_shift: 32,
        }
    }
}

/// Median threshold bitmap aligner.
#[derive(Debug, Clone, Default)]
pub struct MtbAligner {
    config: MtbConfig,
}

impl MtbAligner {
    /// Create an aligner with the given configuration.
    pub fn new(config: MtbConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &MtbConfig {
        &self.config
    }

    /// Estimate `(dx, dy)` such that `source(x + dx, y + dy)` lines up with
    /// `reference(x, y)`.
    pub fn estimate_offset(
        &self,
        source: &Exposure,
        reference: &Exposure,
    ) -> Result<(i32, i32), AlignmentError> {
        check_same_grid(source, reference)?;

        let levels = self.level_count(source.width, source.height);
        let src_bits = build_pyramid(source, levels, self.config.exclusion)?;
        let ref_bits = build_pyramid(reference, levels, self.config.exclusion)?;

        if !src_bits[0].is_informative() || !ref_bits[0].is_informative() {
            return Err(AlignmentError::InsufficientDetail);
        }

        let mut offset = (0i32, 0i32);
        for level in (0..levels).rev() {
            if level + 1 < levels {
                offset = (offset.0 * 2, offset.1 * 2);
            }
            offset = best_neighbour(&src_bits[level], &ref_bits[level], offset);
        }

        let max = self.config.max_shift;
        if offset.0.unsigned_abs() > max || offset.1.unsigned_abs() > max {
            return Err(AlignmentError::ShiftOutOfRange {
                dx: offset.0,
                dy: offset.1,
                max,
            });
        }

        log::debug!("mtb offset ({}, {}) over {} levels", offset.0, offset.1, levels);
        Ok(offset)
    }

    fn level_count(&self, width: u32, height: u32) -> usize {
        let wanted = self.config.levels.max(1) as usize;
        let mut levels = 1;
        let mut dim = width.min(height);
        while levels < wanted && dim / 2 >= MIN_LEVEL_DIMENSION {
            dim /= 2;
            levels += 1;
        }
        levels
    }
}

impl Aligner for MtbAligner {
    fn align(
        &self,
        source: &Exposure,
        reference: &Exposure,
    ) -> Result<Exposure, AlignmentError> {
        let (dx, dy) = self.estimate_offset(source, reference)?;
        shift_exposure(source, dx, dy)
    }
}

/// Translate an exposure so that `out(x, y) = source(x + dx, y + dy)`.
///
/// Samples falling outside the source repeat its edge pixels.
pub fn shift_exposure(source: &Exposure, dx: i32, dy: i32) -> Result<Exposure, AlignmentError> {
    check_buffer(source)?;
    let (w, h) = (source.width as i64, source.height as i64);
    let mut data = try_vec(source.data.len())?;
    for y in 0..h {
        let sy = (y + dy as i64).clamp(0, h - 1);
        for x in 0..w {
            let sx = (x + dx as i64).clamp(0, w - 1);
            let idx = ((sy * w + sx) * 4) as usize;
            data.extend_from_slice(&source.data[idx..idx + 4]);
        }
    }
    Ok(Exposure { data, ..*source })
}

/// Single-channel working image.
struct Plane {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Plane {
    fn from_exposure(exposure: &Exposure) -> Result<Self, AlignmentError> {
        let mut data = try_vec(exposure.data.len() / 4)?;
        data.extend(
            exposure
                .data
                .chunks_exact(4)
                .map(|px| px[0].max(px[1]).max(px[2])),
        );
        Ok(Self {
            width: exposure.width,
            height: exposure.height,
            data,
        })
    }

    /// 2x2 box downsample; an odd last row or column is dropped.
    fn downsample(&self) -> Result<Self, AlignmentError> {
        let width = self.width / 2;
        let height = self.height / 2;
        let src_w = self.width as usize;
        let mut data = try_vec(width as usize * height as usize)?;
        for y in 0..height as usize {
            let top = 2 * y * src_w;
            let bottom = top + src_w;
            for x in 0..width as usize {
                let sum = self.data[top + 2 * x]
                    + self.data[top + 2 * x + 1]
                    + self.data[bottom + 2 * x]
                    + self.data[bottom + 2 * x + 1];
                data.push(sum * 0.25);
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// Threshold bits plus the mask of pixels far enough from the median.
struct Bitmap {
    width: u32,
    height: u32,
    bits: Vec<bool>,
    mask: Vec<bool>,
}

impl Bitmap {
    fn from_plane(plane: &Plane, exclusion: f32) -> Result<Self, AlignmentError> {
        let median = median(&plane.data)?;
        let band = median.abs() * exclusion;
        let mut bits = try_vec(plane.data.len())?;
        bits.extend(plane.data.iter().map(|&v| v > median));
        let mut mask = try_vec(plane.data.len())?;
        mask.extend(plane.data.iter().map(|&v| (v - median).abs() > band));
        Ok(Self {
            width: plane.width,
            height: plane.height,
            bits,
            mask,
        })
    }

    /// True when unmasked pixels exist on both sides of the median.
    fn is_informative(&self) -> bool {
        let mut above = false;
        let mut below = false;
        for (&bit, &keep) in self.bits.iter().zip(&self.mask) {
            if keep {
                above |= bit;
                below |= !bit;
            }
            if above && below {
                return true;
            }
        }
        false
    }
}

fn median(values: &[f32]) -> Result<f32, AlignmentError> {
    if values.is_empty() {
        return Err(AlignmentError::InsufficientDetail);
    }
    let mut sorted = try_vec(values.len())?;
    sorted.extend_from_slice(values);
    let mid = sorted.len() / 2;
    let (_, m, _) = sorted.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    Ok(*m)
}

fn build_pyramid(
    exposure: &Exposure,
    levels: usize,
    exclusion: f32,
) -> Result<Vec<Bitmap>, AlignmentError> {
    let mut plane = Plane::from_exposure(exposure)?;
    let mut bitmaps = Vec::with_capacity(levels);
    for level in 0..levels {
        bitmaps.push(Bitmap::from_plane(&plane, exclusion)?);
        if level + 1 < levels {
            plane = plane.downsample()?;
        }
    }
    Ok(bitmaps)
}

/// Pick the best of the nine offsets around `center`; ties keep the earlier
/// candidate, and `center` is tried first.
fn best_neighbour(src: &Bitmap, reference: &Bitmap, center: (i32, i32)) -> (i32, i32) {
    const CANDIDATES: [(i32, i32); 9] = [
        (0, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    let mut best = center;
    let mut best_rate = f64::INFINITY;
    for (cx, cy) in CANDIDATES {
        let candidate = (center.0 + cx, center.1 + cy);
        if let Some(rate) = mismatch_rate(src, reference, candidate) {
            if rate < best_rate {
                best_rate = rate;
                best = candidate;
            }
        }
    }
    best
}

/// Fraction of compared pixels whose bits differ, or `None` without overlap.
fn mismatch_rate(src: &Bitmap, reference: &Bitmap, (dx, dy): (i32, i32)) -> Option<f64> {
    let w = reference.width as i64;
    let h = reference.height as i64;
    let (dx, dy) = (dx as i64, dy as i64);

    let x0 = (-dx).max(0);
    let x1 = (w - dx).min(w);
    let y0 = (-dy).max(0);
    let y1 = (h - dy).min(h);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let src_w = src.width as i64;
    let mut compared = 0u64;
    let mut errors = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let ri = (y * w + x) as usize;
            let si = ((y + dy) * src_w + x + dx) as usize;
            if reference.mask[ri] && src.mask[si] {
                compared += 1;
                if reference.bits[ri] != src.bits[si] {
                    errors += 1;
                }
            }
        }
    }

    if compared == 0 {
        None
    } else {
        Some(errors as f64 / compared as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Checkerboard of `cell`-pixel squares, `lo` and `hi` in every channel.
    fn checker(size: u32, cell: u32, lo: f32, hi: f32) -> Exposure {
        let mut data = Vec::new();
        for y in 0..size {
            for x in 0..size {
                let v = if (x / cell + y / cell) % 2 == 0 { hi } else { lo };
                data.extend_from_slice(&[v, v, v, 1.0]);
            }
        }
        Exposure::from_rgba_f32(size, size, data).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = MtbConfig::default();
        assert_eq!(config.levels, 6);
        assert_eq!(config.exclusion, 0.02);
        assert_eq!(config.max_shift, 32);
    }

    #[test]
    fn test_level_count() {
        let aligner = MtbAligner::default();
        assert_eq!(aligner.level_count(128, 128), 5);
        assert_eq!(aligner.level_count(1024, 768), 6);
        assert_eq!(aligner.level_count(10, 300), 1);
    }

    #[test]
    fn test_median_threshold_bitmap() {
        let plane = Plane {
            width: 2,
            height: 2,
            data: vec![0.1, 0.5, 0.505, 0.9],
        };
        // Median is 0.505; the 0.5 sample sits inside the 2 % band
        let bitmap = Bitmap::from_plane(&plane, 0.02).unwrap();
        assert_eq!(bitmap.bits, vec![false, false, false, true]);
        assert_eq!(bitmap.mask, vec![true, false, false, true]);
        assert!(bitmap.is_informative());
    }

    #[test]
    fn test_downsample_drops_odd_edge() {
        let plane = Plane {
            width: 3,
            height: 3,
            data: vec![1.0, 3.0, 9.0, 5.0, 7.0, 9.0, 9.0, 9.0, 9.0],
        };
        let half = plane.downsample().unwrap();
        assert_eq!((half.width, half.height), (1, 1));
        assert_eq!(half.data, vec![4.0]);
    }

    #[test]
    fn test_flat_image_has_no_detail() {
        let flat = Exposure::solid(32, 32, [0.4, 0.4, 0.4, 1.0]).unwrap();
        let textured = checker(32, 4, 0.1, 0.8);
        assert_eq!(
            MtbAligner::default().align(&flat, &textured).unwrap_err(),
            AlignmentError::InsufficientDetail
        );
    }

    #[test]
    fn test_short_buffer_reported() {
        let reference = checker(16, 4, 0.1, 0.8);
        let mut source = reference.clone();
        source.data.truncate(16 * 4 * 10);
        assert_eq!(
            MtbAligner::default().estimate_offset(&source, &reference),
            Err(AlignmentError::BufferLength {
                expected: 16 * 16 * 4,
                actual: 16 * 4 * 10
            })
        );
        assert!(shift_exposure(&source, 1, 0).is_err());
    }

    #[test]
    fn test_shift_exposure_replicates_edges() {
        let data: Vec<f32> = (0..9).flat_map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();
        let src = Exposure::from_rgba_f32(3, 3, data).unwrap().with_ev(2.0);
        let out = shift_exposure(&src, 1, 0).unwrap();
        let row0: Vec<f32> = (0..3).map(|x| out.pixel(x, 0)[0]).collect();
        assert_eq!(row0, vec![1.0, 2.0, 2.0]);
        assert_eq!(out.ev, Some(2.0));

        let out = shift_exposure(&src, 0, -1).unwrap();
        let col0: Vec<f32> = (0..3).map(|y| out.pixel(0, y)[0]).collect();
        assert_eq!(col0, vec![0.0, 0.0, 3.0]);

        let same = shift_exposure(&src, 0, 0).unwrap();
        assert_eq!(same.data, src.data);
    }
}
