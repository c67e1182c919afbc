//! Exposure normalization onto a common radiance scale.
//!
//! Each exposure's RGB is multiplied by `2^(-EV)` so that a capture taken
//! `EV` stops brighter than nominal lines up with the 0 EV capture. Alpha is
//! left alone and nothing is clamped; values above 1.0 are expected.

use crate::parallel::{for_each_row_mut, PARALLEL_THRESHOLD};
use crate::types::{clone_samples, Error, Exposure, HdrImage, Result};

/// Known bracket layouts, applied in input order when EVs are not tagged.
pub const DEFAULT_BRACKETS: &[&[f32]] = &[&[-2.0, 0.0, 1.0], &[-2.0, -1.0, 0.0, 1.0, 2.0]];

/// The default bracket for `count` exposures, if one is known.
pub fn default_bracket(count: usize) -> Option<&'static [f32]> {
    DEFAULT_BRACKETS.iter().copied().find(|b| b.len() == count)
}

/// Linear multiplier that normalizes an exposure taken at `ev`.
#[inline]
pub fn ev_scale(ev: f32) -> f32 {
    (-ev).exp2()
}

/// Decide the EV of every exposure.
///
/// An explicit EV on the exposure always wins. Untagged exposures take the
/// value at the same index of the default bracket matching the exposure
/// count, or 0 when no bracket matches.
pub fn resolve_evs(exposures: &[Exposure]) -> Result<Vec<f32>> {
    let bracket = default_bracket(exposures.len());
    let untagged = exposures.iter().filter(|e| e.ev.is_none()).count();
    if untagged > 0 && bracket.is_none() {
        log::warn!(
            "{} of {} exposures have no EV and no default bracket matches; assuming 0 EV",
            untagged,
            exposures.len()
        );
    }

    exposures
        .iter()
        .enumerate()
        .map(|(i, exposure)| {
            let ev = exposure
                .ev
                .or_else(|| bracket.map(|b| b[i]))
                .unwrap_or(0.0);
            if !ev.is_finite() {
                return Err(Error::InvalidParameter(format!(
                    "exposure {} has non-finite EV {}",
                    i, ev
                )));
            }
            Ok(ev)
        })
        .collect()
}

/// Rescale one exposure's RGB by `2^(-ev)`.
pub fn normalize(exposure: &Exposure, ev: f32) -> Result<HdrImage> {
    let mut image = HdrImage::from_data(
        exposure.width,
        exposure.height,
        clone_samples(&exposure.data)?,
    )?;
    image.orientation = exposure.orientation;
    scale_rgb(&mut image, ev_scale(ev))?;
    Ok(image)
}

/// Normalize a whole bracket, resolving EVs with [`resolve_evs`].
pub fn normalize_all(exposures: &[Exposure]) -> Result<Vec<HdrImage>> {
    let evs = resolve_evs(exposures)?;
    exposures
        .iter()
        .zip(&evs)
        .map(|(exposure, &ev)| normalize(exposure, ev))
        .collect()
}

/// Undo [`normalize`]: rescale RGB by `2^(+ev)`.
pub fn denormalize(image: &HdrImage, ev: f32) -> Result<HdrImage> {
    let mut out = HdrImage::from_data(image.width, image.height, clone_samples(&image.data)?)?;
    out.orientation = image.orientation;
    scale_rgb(&mut out, ev.exp2())?;
    Ok(out)
}

fn scale_rgb(image: &mut HdrImage, factor: f32) -> Result<()> {
    if !factor.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "normalization factor {} is not finite",
            factor
        )));
    }
    let pixels = image.width as usize * image.height as usize;
    let row_len = image.width as usize * 4;
    for_each_row_mut(&mut image.data, row_len, pixels, PARALLEL_THRESHOLD, |_, row| {
        for px in row.chunks_exact_mut(4) {
            px[0] *= factor;
            px[1] *= factor;
            px[2] *= factor;
        }
    });
    Ok(())
}
