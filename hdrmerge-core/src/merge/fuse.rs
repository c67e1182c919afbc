//! Weighted-average merge of normalized exposures.
//!
//! The merge is a fold over `(Σ w·p, Σ w)` accumulators. Exposures are added
//! in fixed-size batches, each batch into its own accumulator, and the
//! partial accumulators are then combined. Addition is associative, so the
//! result matches a single pass up to float rounding and any number of
//! exposures is supported.

use crate::parallel::{for_each_row_pair_mut, PARALLEL_THRESHOLD};
use crate::types::{alloc_samples, clone_samples, sample_count, Error, HdrImage, Result, WeightMap};

/// Tuning for the merge.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Pixels whose total weight falls below this are output as black.
    pub min_weight_sum: f32,
    /// Number of exposures folded into one partial accumulator.
    pub batch_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_weight_sum: 1e-4,
            batch_size: 8,
        }
    }
}

impl MergeConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidParameter("batch_size must be at least 1".into()));
        }
        if !(self.min_weight_sum.is_finite() && self.min_weight_sum >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "min_weight_sum must be non-negative and finite, got {}",
                self.min_weight_sum
            )));
        }
        Ok(())
    }
}

/// Running weighted sums for one pixel grid.
#[derive(Debug, Clone)]
pub struct MergeAccumulator {
    width: u32,
    height: u32,
    /// Σ w·p per RGBA channel.
    weighted: Vec<f32>,
    /// Σ w per pixel.
    total: Vec<f32>,
    count: usize,
}

impl MergeAccumulator {
    /// Create an empty accumulator for a `width` x `height` grid.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        crate::types::validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            weighted: alloc_samples(sample_count(width, height, 4)?)?,
            total: alloc_samples(sample_count(width, height, 1)?)?,
            count: 0,
        })
    }

    /// Number of exposures folded in so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Fold one exposure and its weights into the sums.
    pub fn add(&mut self, image: &HdrImage, weights: &WeightMap) -> Result<()> {
        self.check_grid(self.count, image.width, image.height)?;
        self.check_grid(self.count, weights.width, weights.height)?;
        image.validate()?;
        weights.validate()?;

        let width = self.width as usize;
        let pixels = width * self.height as usize;
        for_each_row_pair_mut(
            &mut self.weighted,
            width * 4,
            &mut self.total,
            width,
            pixels,
            PARALLEL_THRESHOLD,
            |y, sums, totals| {
                let src = &image.data[y * width * 4..(y + 1) * width * 4];
                let w_row = &weights.data[y * width..(y + 1) * width];
                for (((sum, total), px), &w) in sums
                    .chunks_exact_mut(4)
                    .zip(totals.iter_mut())
                    .zip(src.chunks_exact(4))
                    .zip(w_row)
                {
                    sum[0] += w * px[0];
                    sum[1] += w * px[1];
                    sum[2] += w * px[2];
                    sum[3] += w * px[3];
                    *total += w;
                }
            },
        );

        self.count += 1;
        Ok(())
    }

    /// Merge another accumulator's sums into this one.
    pub fn combine(&mut self, other: &MergeAccumulator) -> Result<()> {
        self.check_grid(self.count, other.width, other.height)?;
        for (a, b) in self.weighted.iter_mut().zip(&other.weighted) {
            *a += b;
        }
        for (a, b) in self.total.iter_mut().zip(&other.total) {
            *a += b;
        }
        self.count += other.count;
        Ok(())
    }

    /// Divide the sums out into the merged image.
    ///
    /// Pixels whose weight sum is below `min_weight_sum` come out black.
    pub fn finish(self, min_weight_sum: f32) -> Result<HdrImage> {
        let Self {
            width,
            height,
            mut weighted,
            mut total,
            ..
        } = self;

        let w = width as usize;
        let pixels = w * height as usize;
        for_each_row_pair_mut(
            &mut weighted,
            w * 4,
            &mut total,
            w,
            pixels,
            PARALLEL_THRESHOLD,
            |_, sums, totals| {
                for (sum, &t) in sums.chunks_exact_mut(4).zip(totals.iter()) {
                    if t < min_weight_sum {
                        sum.fill(0.0);
                    } else {
                        let inv = 1.0 / t;
                        sum[0] *= inv;
                        sum[1] *= inv;
                        sum[2] *= inv;
                        sum[3] *= inv;
                    }
                }
            },
        );

        HdrImage::from_data(width, height, weighted)
    }

    fn check_grid(&self, index: usize, width: u32, height: u32) -> Result<()> {
        if width != self.width || height != self.height {
            return Err(Error::DimensionMismatch {
                index,
                expected_w: self.width,
                expected_h: self.height,
                actual_w: width,
                actual_h: height,
            });
        }
        Ok(())
    }
}

/// Weighted average of normalized exposures.
///
/// `weights[i]` belongs to `images[i]`. A single exposure is returned
/// unchanged.
pub fn merge_exposures(
    images: &[HdrImage],
    weights: &[WeightMap],
    config: &MergeConfig,
) -> Result<HdrImage> {
    config.validate()?;
    let first = images.first().ok_or(Error::EmptyInput)?;
    if images.len() != weights.len() {
        return Err(Error::InvalidParameter(format!(
            "{} images but {} weight maps",
            images.len(),
            weights.len()
        )));
    }
    for (index, (image, map)) in images.iter().zip(weights).enumerate() {
        image.validate()?;
        map.validate()?;
        for (w, h) in [(image.width, image.height), (map.width, map.height)] {
            if (w, h) != first.dimensions() {
                return Err(Error::DimensionMismatch {
                    index,
                    expected_w: first.width,
                    expected_h: first.height,
                    actual_w: w,
                    actual_h: h,
                });
            }
        }
    }

    if images.len() == 1 {
        let mut out = HdrImage::from_data(first.width, first.height, clone_samples(&first.data)?)?;
        out.orientation = first.orientation;
        return Ok(out);
    }

    let mut acc = MergeAccumulator::new(first.width, first.height)?;
    for (batch, (img_batch, w_batch)) in images
        .chunks(config.batch_size)
        .zip(weights.chunks(config.batch_size))
        .enumerate()
    {
        log::debug!("merging batch {} ({} exposures)", batch, img_batch.len());
        if batch == 0 {
            for (image, map) in img_batch.iter().zip(w_batch) {
                acc.add(image, map)?;
            }
        } else {
            let mut partial = MergeAccumulator::new(first.width, first.height)?;
            for (image, map) in img_batch.iter().zip(w_batch) {
                partial.add(image, map)?;
            }
            acc.combine(&partial)?;
        }
    }

    let mut out = acc.finish(config.min_weight_sum)?;
    out.orientation = first.orientation;
    Ok(out)
}
