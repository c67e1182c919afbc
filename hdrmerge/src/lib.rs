//! HDR bracket merging: turn differently exposed captures into one image.
//!
//! A bracket of aligned-or-alignable linear-light exposures goes through
//! five stages:
//!
//! 1. Optional translation-only alignment against the middle exposure
//! 2. EV normalization onto a common radiance scale (`2^-EV`)
//! 3. Per-pixel quality weights (mid-tone closeness, contrast, saturation)
//! 4. Weighted-average merge into linear HDR
//! 5. Tone mapping (Reinhard or ACES filmic) with gamma 2.2 encoding
//!
//! # Crate Structure
//!
//! - [`hdrmerge_core`] - Per-pixel math, normalization, weights, merge, tone mapping
//! - `hdrmerge` (this crate) - Alignment and the build pipeline
//!
//! # Example
//!
//! ```ignore
//! use hdrmerge::{build_hdr, Exposure, ToneMapping};
//!
//! let exposures = vec![
//!     Exposure::from_rgba_f32(w, h, dark)?.with_ev(-2.0),
//!     Exposure::from_rgba_f32(w, h, normal)?.with_ev(0.0),
//!     Exposure::from_rgba_f32(w, h, bright)?.with_ev(1.0),
//! ];
//! let ldr = build_hdr(&exposures, true, ToneMapping::AcesFilmic)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export everything from hdrmerge-core
pub use hdrmerge_core::color;
pub use hdrmerge_core::merge;
pub use hdrmerge_core::normalize;
pub use hdrmerge_core::pixel;

// Re-export core types at crate root
pub use hdrmerge_core::{
    limits, Error, Exposure, HdrImage, MergeConfig, Orientation, Result, ToneMappedImage,
    ToneMapping, WeightConfig, WeightMap,
};

// This crate's additional modules
pub mod align;
pub mod mtb;

mod build;

pub use align::{Aligner, AlignmentError, NoopAligner};
pub use build::{build_hdr, HdrBuilder};
pub use mtb::{MtbAligner, MtbConfig};
