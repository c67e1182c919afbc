//! Core types for bracket merging and tone mapping.

use half::f16;
use thiserror::Error;

use crate::color::transfer::gamma_decode;
use crate::limits;

/// Errors that can occur while building an HDR image.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No exposures were supplied.
    #[error("no exposures supplied")]
    EmptyInput,

    /// Image dimensions are invalid (zero or too large).
    #[error("invalid image dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    /// An input does not share the grid of the first exposure.
    #[error(
        "dimension mismatch at input {index}: expected {expected_w}x{expected_h}, got {actual_w}x{actual_h}"
    )]
    DimensionMismatch {
        /// Index of the offending input.
        index: usize,
        /// Expected width.
        expected_w: u32,
        /// Expected height.
        expected_h: u32,
        /// Actual width.
        actual_w: u32,
        /// Actual height.
        actual_h: u32,
    },

    /// Pixel data is invalid or has the wrong length.
    #[error("invalid pixel data: {0}")]
    InvalidPixelData(String),

    /// A configuration value or parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input exceeds safety limits.
    #[error("input exceeds safety limit: {0}")]
    LimitExceeded(String),

    /// Allocation failed.
    #[error("allocation failed: requested {0} bytes")]
    AllocationFailed(usize),
}

/// Result type for HDR merge operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Clockwise rotation needed to present a capture upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    /// Stored upright.
    #[default]
    Normal,
    /// Rotate 90 degrees clockwise for display.
    Rotate90,
    /// Rotate 180 degrees for display.
    Rotate180,
    /// Rotate 270 degrees clockwise for display.
    Rotate270,
}

impl Orientation {
    /// Create from a rotation in degrees, snapped to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let quarter = ((degrees as f32 / 90.0).round() as i32).rem_euclid(4);
        match quarter {
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            3 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Rotate90 => 90,
            Self::Rotate180 => 180,
            Self::Rotate270 => 270,
        }
    }

    /// Whether displaying the image swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

/// Validate dimensions against safety limits.
pub(crate) fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions(width, height));
    }

    if width > limits::MAX_IMAGE_DIMENSION || height > limits::MAX_IMAGE_DIMENSION {
        return Err(Error::LimitExceeded(format!(
            "dimension {} exceeds maximum {}",
            width.max(height),
            limits::MAX_IMAGE_DIMENSION
        )));
    }

    let total_pixels = width as u64 * height as u64;
    if total_pixels > limits::MAX_TOTAL_PIXELS {
        return Err(Error::LimitExceeded(format!(
            "total pixels {} exceeds maximum {}",
            total_pixels,
            limits::MAX_TOTAL_PIXELS
        )));
    }

    Ok(())
}

/// Number of samples for a grid with `channels` values per pixel.
pub(crate) fn sample_count(width: u32, height: u32, channels: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| Error::LimitExceeded("sample count overflow".into()))
}

/// Reserve an empty buffer with room for `len` values.
pub(crate) fn try_alloc<T>(len: usize) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed(len.saturating_mul(core::mem::size_of::<T>())))?;
    Ok(data)
}

/// Allocate a zeroed sample buffer, reporting allocation failure as an error.
pub(crate) fn alloc_samples(len: usize) -> Result<Vec<f32>> {
    let mut data = try_alloc(len)?;
    data.resize(len, 0.0);
    Ok(data)
}

/// Copy a sample buffer through the fallible allocator.
pub(crate) fn clone_samples(src: &[f32]) -> Result<Vec<f32>> {
    let mut data = try_alloc(src.len())?;
    data.extend_from_slice(src);
    Ok(data)
}

fn check_len(width: u32, height: u32, len: usize) -> Result<usize> {
    validate_dimensions(width, height)?;
    let expected = sample_count(width, height, 4)?;
    if len != expected {
        return Err(Error::InvalidPixelData(format!(
            "expected {} RGBA samples for {}x{}, got {}",
            expected, width, height, len
        )));
    }
    Ok(expected)
}

/// One capture of a bracket: linear-light RGBA samples plus its EV bias.
#[derive(Debug, Clone)]
pub struct Exposure {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Interleaved linear RGBA samples, row-major.
    pub data: Vec<f32>,
    /// Stops relative to the nominal 0 EV capture, if known.
    pub ev: Option<f32>,
    /// Rotation needed to present this capture upright.
    pub orientation: Orientation,
}

impl Exposure {
    /// Create an exposure from linear RGBA floats.
    pub fn from_rgba_f32(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
            ev: None,
            orientation: Orientation::Normal,
        })
    }

    /// Create an exposure from linear RGBA half floats.
    pub fn from_rgba_f16(width: u32, height: u32, data: &[f16]) -> Result<Self> {
        let len = check_len(width, height, data.len())?;
        let mut samples = alloc_samples(len)?;
        for (dst, src) in samples.iter_mut().zip(data) {
            *dst = src.to_f32();
        }
        Self::from_rgba_f32(width, height, samples)
    }

    /// Create an exposure from 8-bit gamma-encoded RGBA.
    ///
    /// RGB is decoded to linear light; alpha is scaled linearly to `[0, 1]`.
    pub fn from_rgba8_gamma(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let len = check_len(width, height, data.len())?;
        let mut samples = alloc_samples(len)?;
        for (dst, src) in samples.chunks_exact_mut(4).zip(data.chunks_exact(4)) {
            dst[0] = gamma_decode(src[0] as f32 / 255.0);
            dst[1] = gamma_decode(src[1] as f32 / 255.0);
            dst[2] = gamma_decode(src[2] as f32 / 255.0);
            dst[3] = src[3] as f32 / 255.0;
        }
        Self::from_rgba_f32(width, height, samples)
    }

    /// Create an exposure filled with one RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [f32; 4]) -> Result<Self> {
        validate_dimensions(width, height)?;
        let mut data = alloc_samples(sample_count(width, height, 4)?)?;
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self::from_rgba_f32(width, height, data)
    }

    /// Check dimensions and sample buffer length.
    pub fn validate(&self) -> Result<()> {
        check_len(self.width, self.height, self.data.len()).map(|_| ())
    }

    /// Tag the exposure with an explicit EV bias.
    pub fn with_ev(mut self, ev: f32) -> Self {
        self.ev = Some(ev);
        self
    }

    /// Tag the exposure with its display orientation.
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// `(width, height)` of the pixel grid.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        read_pixel(&self.data, self.width, x, y)
    }
}

/// Linear-light RGBA grid with unbounded components.
///
/// Used both for normalized exposures and for the merged result.
#[derive(Debug, Clone)]
pub struct HdrImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Interleaved linear RGBA samples, row-major.
    pub data: Vec<f32>,
    /// Rotation needed to present the image upright.
    pub orientation: Orientation,
}

impl HdrImage {
    /// Allocate a black, fully transparent image.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            data: alloc_samples(sample_count(width, height, 4)?)?,
            orientation: Orientation::Normal,
        })
    }

    /// Wrap existing linear RGBA samples.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
            orientation: Orientation::Normal,
        })
    }

    /// `(width, height)` of the pixel grid.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        read_pixel(&self.data, self.width, x, y)
    }

    /// Check dimensions and sample buffer length.
    pub fn validate(&self) -> Result<()> {
        check_len(self.width, self.height, self.data.len()).map(|_| ())
    }

    /// Convert to half floats, e.g. for upload to a float16 texture.
    pub fn to_rgba_f16(&self) -> Result<Vec<f16>> {
        let mut out = try_alloc(self.data.len())?;
        out.extend(self.data.iter().map(|&v| f16::from_f32(v)));
        Ok(out)
    }
}

/// Per-pixel merge weight for one exposure.
#[derive(Debug, Clone)]
pub struct WeightMap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// One non-negative weight per pixel, row-major.
    pub data: Vec<f32>,
}

impl WeightMap {
    /// Allocate a zero weight map.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        validate_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            data: alloc_samples(sample_count(width, height, 1)?)?,
        })
    }

    /// Wrap existing weights.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let map = Self {
            width,
            height,
            data,
        };
        map.validate()?;
        Ok(map)
    }

    /// Check dimensions and weight buffer length.
    pub fn validate(&self) -> Result<()> {
        validate_dimensions(self.width, self.height)?;
        let expected = sample_count(self.width, self.height, 1)?;
        if self.data.len() != expected {
            return Err(Error::InvalidPixelData(format!(
                "expected {} weights for {}x{}, got {}",
                expected,
                self.width,
                self.height,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Weight at `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Multiply every weight by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for w in &mut self.data {
            *w *= factor;
        }
    }
}

/// Gamma-encoded RGBA in `[0, 1]`, ready for an external encoder.
#[derive(Debug, Clone)]
pub struct ToneMappedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Interleaved gamma-encoded RGBA samples, row-major.
    pub data: Vec<f32>,
    /// Rotation needed to present the image upright.
    pub orientation: Orientation,
}

impl ToneMappedImage {
    /// `(width, height)` of the pixel grid.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        read_pixel(&self.data, self.width, x, y)
    }

    /// Quantize to 8-bit RGBA.
    pub fn to_rgba8(&self) -> Result<Vec<u8>> {
        let mut out = try_alloc(self.data.len())?;
        out.extend(
            self.data
                .iter()
                .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8),
        );
        Ok(out)
    }
}

#[inline]
fn read_pixel(data: &[f32], width: u32, x: u32, y: u32) -> [f32; 4] {
    let idx = (y as usize * width as usize + x as usize) * 4;
    [data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposure_rejects_wrong_length() {
        let result = Exposure::from_rgba_f32(2, 2, vec![0.0; 15]);
        assert!(matches!(result, Err(Error::InvalidPixelData(_))));
    }

    #[test]
    fn test_exposure_rejects_zero_dimensions() {
        let result = Exposure::from_rgba_f32(0, 4, Vec::new());
        assert!(matches!(result, Err(Error::InvalidDimensions(0, 4))));
    }

    #[test]
    fn test_exposure_rejects_oversized() {
        let result = Exposure::solid(limits::MAX_IMAGE_DIMENSION + 1, 1, [0.0; 4]);
        assert!(matches!(result, Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_exposure_from_f16() {
        let data: Vec<f16> = [0.5f32, 0.25, 2.0, 1.0]
            .iter()
            .map(|&v| f16::from_f32(v))
            .collect();
        let exp = Exposure::from_rgba_f16(1, 1, &data).unwrap();
        assert_eq!(exp.pixel(0, 0), [0.5, 0.25, 2.0, 1.0]);
        assert_eq!(exp.ev, None);
    }

    #[test]
    fn test_exposure_from_rgba8_gamma() {
        let exp = Exposure::from_rgba8_gamma(1, 1, &[255, 0, 128, 255]).unwrap();
        let px = exp.pixel(0, 0);
        assert!((px[0] - 1.0).abs() < 1e-6);
        assert_eq!(px[1], 0.0);
        let expected = (128.0f32 / 255.0).powf(2.2);
        assert!((px[2] - expected).abs() < 1e-5);
        assert!((px[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_indexing() {
        let mut data = vec![0.0; 3 * 2 * 4];
        let idx = (2 + 3) * 4;
        data[idx..idx + 4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let img = HdrImage::from_data(3, 2, data).unwrap();
        assert_eq!(img.pixel(2, 1), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_orientation_from_degrees() {
        assert_eq!(Orientation::from_degrees(0), Orientation::Normal);
        assert_eq!(Orientation::from_degrees(90), Orientation::Rotate90);
        assert_eq!(Orientation::from_degrees(-90), Orientation::Rotate270);
        assert_eq!(Orientation::from_degrees(540), Orientation::Rotate180);
        assert_eq!(Orientation::from_degrees(88), Orientation::Rotate90);
        assert!(Orientation::Rotate270.swaps_dimensions());
        assert!(!Orientation::Rotate180.swaps_dimensions());
        assert_eq!(Orientation::Rotate270.degrees(), 270);
    }

    #[test]
    fn test_validate_catches_edited_buffers() {
        let mut exp = Exposure::solid(2, 2, [0.1; 4]).unwrap();
        assert!(exp.validate().is_ok());
        exp.data.pop();
        assert!(matches!(exp.validate(), Err(Error::InvalidPixelData(_))));

        let mut img = HdrImage::new(2, 2).unwrap();
        img.width = 3;
        assert!(matches!(img.validate(), Err(Error::InvalidPixelData(_))));

        let mut map = WeightMap::new(2, 2).unwrap();
        map.data.truncate(1);
        assert!(matches!(map.validate(), Err(Error::InvalidPixelData(_))));
    }

    #[test]
    fn test_weight_map_scale() {
        let mut map = WeightMap::from_data(2, 1, vec![0.5, 2.0]).unwrap();
        map.scale(4.0);
        assert_eq!(map.get(0, 0), 2.0);
        assert_eq!(map.get(1, 0), 8.0);
    }

    #[test]
    fn test_to_rgba8_rounds_and_clamps() {
        let img = ToneMappedImage {
            width: 1,
            height: 1,
            data: vec![0.0, 0.5, 1.0, 1.2],
            orientation: Orientation::Normal,
        };
        assert_eq!(img.to_rgba8().unwrap(), vec![0, 128, 255, 255]);
    }
}
