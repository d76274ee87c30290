//! Allometric height scaling of organ-volume distributions
//!
//! Organ volumes of human subjects scale with body height: a tall subject's
//! liver distribution is shifted relative to the cohort mean at the same age.
//! The scaler holds the subject's height percentile fixed and rescales every
//! future volume distribution by `(height_p(age) / mean_height(age))^alpha`,
//! where `height_p` is the height trajectory at the subject's own percentile.

use crate::data::{
    names, AgeSample, ContainerKind, DistributedParameter, OriginData,
    ParameterDistributionSample,
};
use crate::math::{
    corrected_percentile, interpolate, Distribution, DistributionType, MathError,
};

const RELATIVE_EPSILON: f64 = 1e-10;

/// Whether a parameter is subject to allometric height scaling at all
///
/// Only volumes of anatomical organs scale, and only for populations with a
/// height dependency.
pub fn needs_scaling(origin: &OriginData, parameter: &DistributedParameter) -> bool {
    origin.population.is_height_dependent()
        && parameter.container() == ContainerKind::Organ
        && parameter.name() == names::VOLUME
}

/// Height-percentile-preserving scaler for one subject
pub struct HeightScaler {
    percentile: f64,
    alpha: f64,
    means: Vec<AgeSample>,
    deviations: Vec<AgeSample>,
}

impl HeightScaler {
    /// Build a scaler from the subject's height and the gender-filtered
    /// height calibration rows
    ///
    /// Returns `None` when no height calibration exists or when the subject's
    /// height equals the calibrated mean at their age; scaling is then the
    /// identity and is skipped entirely.
    pub fn for_subject(
        origin: &OriginData,
        height_rows: &[ParameterDistributionSample],
        alpha: f64,
    ) -> Result<Option<Self>, MathError> {
        if height_rows.is_empty() {
            return Ok(None);
        }
        let means: Vec<AgeSample> = height_rows
            .iter()
            .map(|s| AgeSample::new(s.age, s.mean))
            .collect();
        let deviations: Vec<AgeSample> = height_rows
            .iter()
            .map(|s| AgeSample::new(s.age, s.deviation))
            .collect();
        let mean = interpolate(&means, origin.age)?;
        if values_equal(mean, origin.height) {
            return Ok(None);
        }
        let deviation = interpolate(&deviations, origin.age)?;
        let distribution = Distribution::from_type(DistributionType::Normal, mean, deviation);
        let percentile = corrected_percentile(distribution.percentile_from_value(origin.height)?);
        Ok(Some(HeightScaler {
            percentile,
            alpha,
            means,
            deviations,
        }))
    }

    /// Scale factor at an age: subject height over mean height, raised to the
    /// allometric exponent
    pub fn factor_at(&self, age: f64) -> Result<f64, MathError> {
        let mean = interpolate(&self.means, age)?;
        let deviation = interpolate(&self.deviations, age)?;
        let distribution = Distribution::from_type(DistributionType::Normal, mean, deviation);
        let height = distribution.value_from_percentile(self.percentile)?;
        Ok((height / mean).powf(self.alpha))
    }

    /// Rescale one calibration row to the subject's height trajectory
    ///
    /// The mean always scales; the deviation only scales for normal
    /// distributions, where it is an absolute spread. A log-normal deviation
    /// is a geometric standard deviation and is scale-invariant.
    pub fn scale(
        &self,
        sample: &ParameterDistributionSample,
    ) -> Result<ParameterDistributionSample, MathError> {
        let factor = self.factor_at(sample.age)?;
        let mut scaled = sample.clone();
        scaled.mean *= factor;
        if scaled.distribution == DistributionType::Normal {
            scaled.deviation *= factor;
        }
        Ok(scaled)
    }
}

fn values_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= RELATIVE_EPSILON * a.abs().max(b.abs())
}
