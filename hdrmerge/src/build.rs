//! HDR build pipeline: align, normalize, weight, merge, tone map.

use std::borrow::Cow;

use hdrmerge_core::color::tonemap::tonemap_image;
use hdrmerge_core::merge::{compute_weight_maps, merge_exposures};
use hdrmerge_core::normalize::{normalize, resolve_evs};
use hdrmerge_core::{
    limits, Error, Exposure, HdrImage, MergeConfig, Result, ToneMappedImage, ToneMapping,
    WeightConfig,
};
use rayon::prelude::*;

use crate::align::Aligner;
use crate::mtb::MtbAligner;

/// Merge a bracket into one tone-mapped image.
///
/// With `perform_alignment`, every exposure is first registered against the
/// middle one (index `count / 2`) using [`MtbAligner`]. Exposures that fail
/// to align are merged unregistered.
///
/// # Example
///
/// ```ignore
/// use hdrmerge::{build_hdr, Exposure, ToneMapping};
///
/// let ldr = build_hdr(&exposures, true, ToneMapping::reinhard(1.0))?;
/// let rgba8 = ldr.to_rgba8()?;
/// ```
pub fn build_hdr(
    exposures: &[Exposure],
    perform_alignment: bool,
    tone_mapping: ToneMapping,
) -> Result<ToneMappedImage> {
    HdrBuilder::new()
        .set_alignment(perform_alignment)
        .set_tone_mapping(tone_mapping)
        .build(exposures)
}

/// Configurable HDR build pipeline.
///
/// Defaults: no alignment, [`MtbAligner`] when alignment is enabled,
/// ACES filmic tone mapping, default weight and merge tuning.
pub struct HdrBuilder {
    tone_mapping: ToneMapping,
    align: bool,
    aligner: Box<dyn Aligner>,
    weight_config: WeightConfig,
    merge_config: MergeConfig,
}

impl Default for HdrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HdrBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            tone_mapping: ToneMapping::AcesFilmic,
            align: false,
            aligner: Box::new(MtbAligner::default()),
            weight_config: WeightConfig::default(),
            merge_config: MergeConfig::default(),
        }
    }

    /// Select the tone mapping operator.
    pub fn set_tone_mapping(&mut self, tone_mapping: ToneMapping) -> &mut Self {
        self.tone_mapping = tone_mapping;
        self
    }

    /// Enable or disable alignment against the middle exposure.
    pub fn set_alignment(&mut self, enabled: bool) -> &mut Self {
        self.align = enabled;
        self
    }

    /// Replace the aligner used when alignment is enabled.
    pub fn set_aligner(&mut self, aligner: impl Aligner + 'static) -> &mut Self {
        self.aligner = Box::new(aligner);
        self
    }

    /// Set weighting parameters.
    pub fn set_weight_config(&mut self, config: WeightConfig) -> &mut Self {
        self.weight_config = config;
        self
    }

    /// Set merge parameters.
    pub fn set_merge_config(&mut self, config: MergeConfig) -> &mut Self {
        self.merge_config = config;
        self
    }

    /// Run the full pipeline and return the tone-mapped image.
    pub fn build(&self, exposures: &[Exposure]) -> Result<ToneMappedImage> {
        self.tone_mapping.validate()?;
        let hdr = self.build_merged(exposures)?;
        log::debug!("tone mapping with {:?}", self.tone_mapping);
        tonemap_image(&hdr, self.tone_mapping)
    }

    /// Run the pipeline up to and including the merge.
    ///
    /// The result is linear light with components that may exceed 1.0.
    pub fn build_merged(&self, exposures: &[Exposure]) -> Result<HdrImage> {
        validate_bracket(exposures)?;
        self.weight_config.validate()?;
        self.merge_config.validate()?;

        let reference = exposures.len() / 2;
        let evs = resolve_evs(exposures)?;
        log::debug!(
            "building HDR from {} exposures at EV {:?}, reference {}",
            exposures.len(),
            evs,
            reference
        );

        let registered = if self.align {
            self.align_all(exposures, reference)
        } else {
            exposures.iter().map(Cow::Borrowed).collect()
        };

        let normalized = registered
            .iter()
            .zip(&evs)
            .map(|(exposure, &ev)| normalize(exposure, ev))
            .collect::<Result<Vec<_>>>()?;
        drop(registered);

        let weights = compute_weight_maps(&normalized, &self.weight_config)?;
        log::debug!("computed {} weight maps", weights.len());

        let mut merged = merge_exposures(&normalized, &weights, &self.merge_config)?;
        merged.orientation = exposures[reference].orientation;
        Ok(merged)
    }

    fn align_all<'a>(&self, exposures: &'a [Exposure], reference: usize) -> Vec<Cow<'a, Exposure>> {
        let target = &exposures[reference];
        exposures
            .par_iter()
            .enumerate()
            .map(|(i, exposure)| {
                if i == reference {
                    return Cow::Borrowed(exposure);
                }
                match self.aligner.align(exposure, target) {
                    Ok(aligned) if aligned.dimensions() == target.dimensions() => {
                        Cow::Owned(aligned)
                    }
                    Ok(_) => {
                        log::warn!(
                            "aligner changed the grid of exposure {}; using it unaligned",
                            i
                        );
                        Cow::Borrowed(exposure)
                    }
                    Err(err) => {
                        log::warn!("alignment of exposure {} failed ({}); using it unaligned", i, err);
                        Cow::Borrowed(exposure)
                    }
                }
            })
            .collect()
    }
}

/// Reject empty, oversized, malformed, or mixed-size brackets.
fn validate_bracket(exposures: &[Exposure]) -> Result<()> {
    let first = exposures.first().ok_or(Error::EmptyInput)?;
    if exposures.len() > limits::MAX_EXPOSURES {
        return Err(Error::LimitExceeded(format!(
            "{} exposures exceeds maximum {}",
            exposures.len(),
            limits::MAX_EXPOSURES
        )));
    }
    for (index, exposure) in exposures.iter().enumerate() {
        exposure.validate()?;
        if exposure.dimensions() != first.dimensions() {
            return Err(Error::DimensionMismatch {
                index,
                expected_w: first.width,
                expected_h: first.height,
                actual_w: exposure.width,
                actual_h: exposure.height,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignmentError;

    struct FailingAligner;

    impl Aligner for FailingAligner {
        fn align(
            &self,
            _source: &Exposure,
            _reference: &Exposure,
        ) -> core::result::Result<Exposure, AlignmentError> {
            Err(AlignmentError::InsufficientDetail)
        }
    }

    #[test]
    fn test_validate_bracket() {
        assert!(matches!(validate_bracket(&[]), Err(Error::EmptyInput)));

        let a = Exposure::solid(4, 4, [0.1; 4]).unwrap();
        let b = Exposure::solid(4, 3, [0.1; 4]).unwrap();
        assert!(matches!(
            validate_bracket(&[a.clone(), a.clone(), b]),
            Err(Error::DimensionMismatch {
                index: 2,
                expected_h: 4,
                actual_h: 3,
                ..
            })
        ));

        let mut short = a.clone();
        short.data.truncate(10);
        assert!(matches!(
            validate_bracket(&[a.clone(), short]),
            Err(Error::InvalidPixelData(_))
        ));

        let many = vec![a; limits::MAX_EXPOSURES + 1];
        assert!(matches!(validate_bracket(&many), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_failed_alignment_is_not_fatal() {
        let exposures = vec![
            Exposure::solid(4, 4, [0.05, 0.05, 0.05, 1.0]).unwrap(),
            Exposure::solid(4, 4, [0.18, 0.18, 0.18, 1.0]).unwrap(),
            Exposure::solid(4, 4, [0.5, 0.5, 0.5, 1.0]).unwrap(),
        ];
        let mut builder = HdrBuilder::new();
        builder.set_alignment(true).set_aligner(FailingAligner);
        let aligned = builder.build_merged(&exposures).unwrap();

        builder.set_alignment(false);
        let unaligned = builder.build_merged(&exposures).unwrap();
        assert_eq!(aligned.data, unaligned.data);
    }

    #[test]
    fn test_invalid_tone_mapping_fails_fast() {
        let exposures = vec![Exposure::solid(2, 2, [0.2; 4]).unwrap()];
        let result = HdrBuilder::new()
            .set_tone_mapping(ToneMapping::reinhard(-1.0))
            .build(&exposures);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }
}
