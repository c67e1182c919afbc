//! Registration of exposures against a reference capture.
//!
//! The build pipeline only depends on the [`Aligner`] trait. A failed
//! alignment is never fatal: the pipeline keeps the unregistered exposure.

use hdrmerge_core::Exposure;
use thiserror::Error;

/// Reasons an exposure could not be registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AlignmentError {
    /// Source and reference do not share a pixel grid.
    #[error("cannot align {src_w}x{src_h} onto {ref_w}x{ref_h}")]
    DimensionMismatch {
        /// Source width.
        src_w: u32,
        /// Source height.
        src_h: u32,
        /// Reference width.
        ref_w: u32,
        /// Reference height.
        ref_h: u32,
    },

    /// An image's sample buffer does not match its dimensions.
    #[error("expected {expected} samples, got {actual}")]
    BufferLength {
        /// `width * height * 4`.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// A working buffer could not be allocated.
    #[error("allocation failed: requested {0} bytes")]
    AllocationFailed(usize),

    /// One of the images has too little structure to register.
    #[error("not enough image detail to align")]
    InsufficientDetail,

    /// The best translation is larger than the configured limit.
    #[error("estimated shift ({dx}, {dy}) exceeds limit of {max} pixels")]
    ShiftOutOfRange {
        /// Horizontal shift.
        dx: i32,
        /// Vertical shift.
        dy: i32,
        /// Configured limit.
        max: u32,
    },
}

/// Registers a source exposure onto a reference exposure's pixel grid.
///
/// Implementations must work in linear light and return an exposure with the
/// reference's dimensions. `Sync` is required because the pipeline aligns
/// exposures in parallel.
pub trait Aligner: Sync {
    /// Return `source` registered onto `reference`.
    fn align(&self, source: &Exposure, reference: &Exposure)
        -> Result<Exposure, AlignmentError>;
}

/// Aligner that returns the source unchanged, for pre-registered input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAligner;

impl Aligner for NoopAligner {
    fn align(
        &self,
        source: &Exposure,
        reference: &Exposure,
    ) -> Result<Exposure, AlignmentError> {
        check_same_grid(source, reference)?;
        let mut data = try_vec(source.data.len())?;
        data.extend_from_slice(&source.data);
        Ok(Exposure {
            data,
            ..*source
        })
    }
}

/// Require matching grids and well-formed RGBA buffers.
pub(crate) fn check_same_grid(
    source: &Exposure,
    reference: &Exposure,
) -> Result<(), AlignmentError> {
    if source.dimensions() != reference.dimensions() {
        return Err(AlignmentError::DimensionMismatch {
            src_w: source.width,
            src_h: source.height,
            ref_w: reference.width,
            ref_h: reference.height,
        });
    }
    check_buffer(source)?;
    check_buffer(reference)
}

/// Require `width * height * 4` samples.
pub(crate) fn check_buffer(exposure: &Exposure) -> Result<(), AlignmentError> {
    let expected = exposure.width as usize * exposure.height as usize * 4;
    if exposure.data.len() != expected {
        return Err(AlignmentError::BufferLength {
            expected,
            actual: exposure.data.len(),
        });
    }
    Ok(())
}

/// Empty buffer with room for `len` values, allocated fallibly.
pub(crate) fn try_vec<T>(len: usize) -> Result<Vec<T>, AlignmentError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| {
        AlignmentError::AllocationFailed(len.saturating_mul(core::mem::size_of::<T>()))
    })?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_returns_source() {
        let src = Exposure::solid(3, 2, [0.2, 0.3, 0.4, 1.0]).unwrap().with_ev(-1.0);
        let reference = Exposure::solid(3, 2, [0.5; 4]).unwrap();
        let out = NoopAligner.align(&src, &reference).unwrap();
        assert_eq!(out.data, src.data);
        assert_eq!(out.ev, Some(-1.0));
    }

    #[test]
    fn test_noop_rejects_mismatch() {
        let src = Exposure::solid(3, 2, [0.2; 4]).unwrap();
        let reference = Exposure::solid(2, 3, [0.5; 4]).unwrap();
        assert_eq!(
            NoopAligner.align(&src, &reference).unwrap_err(),
            AlignmentError::DimensionMismatch {
                src_w: 3,
                src_h: 2,
                ref_w: 2,
                ref_h: 3
            }
        );
    }

    #[test]
    fn test_short_buffer_reported() {
        let reference = Exposure::solid(3, 2, [0.5; 4]).unwrap();
        let mut src = reference.clone();
        src.data.truncate(20);
        assert_eq!(
            NoopAligner.align(&src, &reference).unwrap_err(),
            AlignmentError::BufferLength {
                expected: 24,
                actual: 20
            }
        );
    }
}
