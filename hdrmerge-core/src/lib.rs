//! Core math for merging exposure brackets into HDR.
//!
//! This crate provides the pure computational stages of an HDR bracket
//! merge:
//! - Pixel measurements (luminance, saturation, Laplacian contrast)
//! - EV normalization onto a common radiance scale
//! - Per-pixel quality weights and the weighted-average merge
//! - Tone mapping (Reinhard, ACES filmic) with gamma encoding
//!
//! This crate has **no alignment or orchestration**. For the full
//! build pipeline, use the `hdrmerge` crate.
//!
//! Per-pixel stages run row-parallel on rayon above
//! [`parallel::PARALLEL_THRESHOLD`] pixels and produce the same output
//! either way.
//!
//! # Example
//!
//! ```ignore
//! use hdrmerge_core::{
//!     color::{tonemap_image, ToneMapping},
//!     merge::{compute_weight_maps, merge_exposures, MergeConfig, WeightConfig},
//!     normalize::normalize_all,
//! };
//!
//! let normalized = normalize_all(&exposures)?;
//! let weights = compute_weight_maps(&normalized, &WeightConfig::default())?;
//! let hdr = merge_exposures(&normalized, &weights, &MergeConfig::default())?;
//! let ldr = tonemap_image(&hdr, ToneMapping::AcesFilmic)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod color;
pub mod merge;
pub mod normalize;
pub mod parallel;
pub mod pixel;
mod types;

// Re-export core types
pub use types::{
    Error, Exposure, HdrImage, Orientation, Result, ToneMappedImage, WeightMap,
};

pub use color::tonemap::ToneMapping;
pub use merge::{fuse::MergeConfig, weights::WeightConfig};

/// Safety limits for allocation.
pub mod limits {
    /// Maximum image dimension (width or height).
    pub const MAX_IMAGE_DIMENSION: u32 = 65535;

    /// Maximum total pixels (width * height).
    pub const MAX_TOTAL_PIXELS: u64 = 500_000_000; // 500 megapixels

    /// Maximum number of exposures in one build.
    pub const MAX_EXPOSURES: usize = 256;
}
