//! HDR to display tone mapping.
//!
//! Two per-pixel operators are provided:
//! - Reinhard with a caller-supplied exposure multiplier
//! - ACES filmic (Narkowicz-style rational fit)
//!
//! Both gamma-encode their result with `^(1/2.2)` and pass alpha through
//! untouched. Output RGB is clamped to `[0, 1]`.

use crate::color::transfer::gamma_encode;
use crate::parallel::{for_each_row_mut, PARALLEL_THRESHOLD};
use crate::types::{clone_samples, Error, HdrImage, Result, ToneMappedImage};

/// Tone reproduction curve selected for one build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToneMapping {
    /// `c·e / (1 + c·e)` with exposure multiplier `e`.
    Reinhard {
        /// Linear multiplier applied before compression. Must be positive.
        exposure: f32,
    },
    /// ACES filmic approximation.
    AcesFilmic,
}

impl ToneMapping {
    /// Reinhard with the given exposure multiplier.
    pub fn reinhard(exposure: f32) -> Self {
        Self::Reinhard { exposure }
    }

    /// Check operator parameters.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Reinhard { exposure } if !(exposure.is_finite() && exposure > 0.0) => {
                Err(Error::InvalidParameter(format!(
                    "Reinhard exposure must be positive and finite, got {}",
                    exposure
                )))
            }
            _ => Ok(()),
        }
    }

    /// Tone map and gamma-encode one linear RGB triple.
    #[inline]
    pub fn map_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let curve = |c: f32| match *self {
            Self::Reinhard { exposure } => reinhard(c, exposure),
            Self::AcesFilmic => aces_filmic(c),
        };
        [
            gamma_encode(curve(rgb[0])).clamp(0.0, 1.0),
            gamma_encode(curve(rgb[1])).clamp(0.0, 1.0),
            gamma_encode(curve(rgb[2])).clamp(0.0, 1.0),
        ]
    }
}

/// Reinhard operator on one linear channel, before gamma.
///
/// Negative input is clamped to 0, so `reinhard(0, e) == 0`.
#[inline]
pub fn reinhard(c: f32, exposure: f32) -> f32 {
    let x = c.max(0.0) * exposure;
    if x.is_infinite() {
        return 1.0;
    }
    x / (1.0 + x)
}

/// ACES filmic curve on one linear channel, before gamma.
///
/// Negative input is treated as black; output is clamped to `[0, 1]`.
#[inline]
pub fn aces_filmic(x: f32) -> f32 {
    let x = x.max(0.0);
    let a = x * (x + 0.024_578_6) - 0.000_090_537;
    let b = x * (0.983_729 * x + 0.432_951) + 0.238_081;
    let mapped = a / b;
    if mapped.is_nan() {
        // inf/inf for unbounded highlights
        return if x > 0.0 { 1.0 } else { 0.0 };
    }
    mapped.clamp(0.0, 1.0)
}

/// Tone map a merged HDR image.
pub fn tonemap_image(hdr: &HdrImage, mode: ToneMapping) -> Result<ToneMappedImage> {
    mode.validate()?;

    let mut data = clone_samples(&hdr.data)?;
    let pixels = hdr.width as usize * hdr.height as usize;
    for_each_row_mut(
        &mut data,
        hdr.width as usize * 4,
        pixels,
        PARALLEL_THRESHOLD,
        |_, row| {
            for px in row.chunks_exact_mut(4) {
                let [r, g, b] = mode.map_rgb([px[0], px[1], px[2]]);
                px[0] = r;
                px[1] = g;
                px[2] = b;
            }
        },
    );

    Ok(ToneMappedImage {
        width: hdr.width,
        height: hdr.height,
        data,
        orientation: hdr.orientation,
    })
}
