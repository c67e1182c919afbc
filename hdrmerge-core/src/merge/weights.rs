//! Per-pixel quality weights for normalized exposures.
//!
//! Three signals are combined multiplicatively:
//!
//! - exposure quality: Gaussian closeness of luminance to mid-gray
//! - contrast: 4-neighbour Laplacian of luminance, clamped to `[0, 1]`
//! - saturation: channel spread, clamped to `[0, 1]`
//!
//! Each signal carries an additive floor, so every pixel of every exposure
//! keeps a strictly positive weight. Weights are not normalized across
//! exposures here; the merge divides by their sum.

use rayon::prelude::*;

use crate::parallel::{for_each_row_mut, PARALLEL_THRESHOLD};
use crate::pixel::{contrast_from_plane, exposure_quality_around, luminance_plane, saturation, MID_GRAY};
use crate::types::{Error, HdrImage, Result, WeightMap};

/// Tuning for the weighting heuristic.
#[derive(Debug, Clone)]
pub struct WeightConfig {
    /// Width of the exposure-quality Gaussian.
    pub sigma: f32,
    /// Luminance the exposure-quality Gaussian is centred on.
    pub mid_gray: f32,
    /// Added to exposure quality before combining.
    pub exposure_floor: f32,
    /// Added to contrast before combining.
    pub contrast_floor: f32,
    /// Added to saturation before combining.
    pub saturation_floor: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            sigma: 0.2,
            mid_gray: MID_GRAY,
            exposure_floor: 0.2,
            contrast_floor: 0.01,
            saturation_floor: 0.01,
        }
    }
}

impl WeightConfig {
    /// Check that the configuration yields non-negative, finite weights.
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "sigma must be positive and finite, got {}",
                self.sigma
            )));
        }
        if !self.mid_gray.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "mid_gray must be finite, got {}",
                self.mid_gray
            )));
        }
        for (name, floor) in [
            ("exposure_floor", self.exposure_floor),
            ("contrast_floor", self.contrast_floor),
            ("saturation_floor", self.saturation_floor),
        ] {
            if !(floor.is_finite() && floor >= 0.0) {
                return Err(Error::InvalidParameter(format!(
                    "{} must be non-negative and finite, got {}",
                    name, floor
                )));
            }
        }
        Ok(())
    }
}

/// Combine the three signals for one pixel.
///
/// `contrast` and `saturation` are clamped to `[0, 1]` before the floors are
/// added.
#[inline]
pub fn pixel_weight(lum: f32, contrast: f32, saturation: f32, config: &WeightConfig) -> f32 {
    let quality = exposure_quality_around(lum, config.mid_gray, config.sigma);
    (quality + config.exposure_floor)
        * (contrast.clamp(0.0, 1.0) + config.contrast_floor)
        * (saturation.clamp(0.0, 1.0) + config.saturation_floor)
}

/// Compute the weight map of one normalized exposure.
pub fn compute_weight_map(image: &HdrImage, config: &WeightConfig) -> Result<WeightMap> {
    config.validate()?;
    compute_unchecked(image, config)
}

/// Compute weight maps for a whole bracket, one exposure per rayon task.
pub fn compute_weight_maps(images: &[HdrImage], config: &WeightConfig) -> Result<Vec<WeightMap>> {
    config.validate()?;
    images
        .par_iter()
        .map(|image| compute_unchecked(image, config))
        .collect()
}

fn compute_unchecked(image: &HdrImage, config: &WeightConfig) -> Result<WeightMap> {
    let (width, height) = image.dimensions();
    let plane = luminance_plane(image)?;
    let mut map = WeightMap::new(width, height)?;

    let pixels = width as usize * height as usize;
    for_each_row_mut(
        &mut map.data,
        width as usize,
        pixels,
        PARALLEL_THRESHOLD,
        |y, row| {
            let src = &image.data[y * width as usize * 4..(y + 1) * width as usize * 4];
            for (x, (w, px)) in row.iter_mut().zip(src.chunks_exact(4)).enumerate() {
                let lum = plane[y * width as usize + x];
                let contrast = contrast_from_plane(&plane, width, height, x as u32, y as u32);
                *w = pixel_weight(lum, contrast, saturation([px[0], px[1], px[2]]), config);
            }
        },
    );

    Ok(map)
}
