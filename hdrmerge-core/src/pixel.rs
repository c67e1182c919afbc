//! Per-pixel measurements used by the weighting heuristic.
//!
//! All functions are pure. Contrast is a 4-neighbour Laplacian of
//! luminance and is defined as zero on the one-pixel image border.

use crate::types::{alloc_samples, sample_count, HdrImage, Result};

/// Linear mid-gray the exposure-quality curve is centred on.
pub const MID_GRAY: f32 = 0.18;

/// Rec.709 luminance of linear RGB.
#[inline]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
}

/// Spread between the largest and smallest channel.
#[inline]
pub fn saturation(rgb: [f32; 3]) -> f32 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    max - min
}

/// Gaussian closeness of `lum` to [`MID_GRAY`].
///
/// `exp(-(L - 0.18)² / (2σ²))`: 1.0 at mid-gray, falling towards 0 for
/// crushed shadows and blown highlights.
#[inline]
pub fn exposure_quality(lum: f32, sigma: f32) -> f32 {
    exposure_quality_around(lum, MID_GRAY, sigma)
}

/// Like [`exposure_quality`] with an explicit centre.
#[inline]
pub fn exposure_quality_around(lum: f32, center: f32, sigma: f32) -> f32 {
    let d = lum - center;
    (-(d * d) / (2.0 * sigma * sigma)).exp()
}

/// Absolute 4-neighbour Laplacian of luminance at `(x, y)`.
///
/// Returns exactly 0 when any neighbour falls outside the image.
pub fn contrast(image: &HdrImage, x: u32, y: u32) -> f32 {
    if !is_interior(image.width, image.height, x, y) {
        return 0.0;
    }
    let lum = |x: u32, y: u32| {
        let px = image.pixel(x, y);
        luminance([px[0], px[1], px[2]])
    };
    (-4.0 * lum(x, y) + lum(x, y - 1) + lum(x, y + 1) + lum(x - 1, y) + lum(x + 1, y)).abs()
}

/// Luminance of every pixel, row-major.
pub fn luminance_plane(image: &HdrImage) -> Result<Vec<f32>> {
    let mut plane = alloc_samples(sample_count(image.width, image.height, 1)?)?;
    for (dst, px) in plane.iter_mut().zip(image.data.chunks_exact(4)) {
        *dst = luminance([px[0], px[1], px[2]]);
    }
    Ok(plane)
}

/// [`contrast`] evaluated on a precomputed luminance plane.
#[inline]
pub fn contrast_from_plane(plane: &[f32], width: u32, height: u32, x: u32, y: u32) -> f32 {
    if !is_interior(width, height, x, y) {
        return 0.0;
    }
    let w = width as usize;
    let i = y as usize * w + x as usize;
    (-4.0 * plane[i] + plane[i - w] + plane[i + w] + plane[i - 1] + plane[i + 1]).abs()
}

#[inline]
fn is_interior(width: u32, height: u32, x: u32, y: u32) -> bool {
    x > 0 && y > 0 && x + 1 < width && y + 1 < height
}
