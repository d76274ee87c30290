//! Construction of individual table formulas
//!
//! A table anchors "now" at time offset 0 with the subject's current value
//! and appends one point per future calibration age, each evaluated at the
//! subject's own percentile.

use crate::convert::scaler::HeightScaler;
use crate::convert::ConversionError;
use crate::data::{
    AgeSample, DistributionMetaData, ParameterDistributionSample, TableFormula, MINUTES_PER_YEAR,
};
use crate::math::is_valid_percentile;

/// Build the aging table of one distributed parameter
///
/// Returns `Ok(None)` when no future calibration rows exist; the parameter
/// then keeps its constant value and no table is produced.
///
/// # Errors
///
/// Returns [ConversionError::InvalidPercentile] when future rows exist but
/// the subject's percentile is not usable.
pub fn build_parameter_table(
    path: &str,
    current_value: f64,
    percentile: f64,
    current_metadata: DistributionMetaData,
    subject_age: f64,
    samples: &[ParameterDistributionSample],
    scaler: Option<&HeightScaler>,
) -> Result<Option<TableFormula>, ConversionError> {
    if samples.is_empty() {
        return Ok(None);
    }
    if !is_valid_percentile(percentile) {
        return Err(ConversionError::InvalidPercentile {
            path: path.to_string(),
            percentile,
        });
    }
    let mut table = TableFormula::new(path);
    table.add_point_with_metadata(0.0, current_value, current_metadata)?;
    for sample in samples {
        let scaled = match scaler {
            Some(scaler) => scaler.scale(sample)?,
            None => sample.clone(),
        };
        let time = (scaled.age - subject_age) * MINUTES_PER_YEAR;
        let value = scaled.to_distribution().value_from_percentile(percentile)?;
        table.add_point_with_metadata(time, value, scaled.metadata())?;
    }
    Ok(Some(table))
}

/// Build the aging table of an ontogeny factor parameter
///
/// `samples` carry time offsets from now in years; factor randomization has
/// already happened upstream, so the table is a plain re-timing of the
/// factors into minutes.
pub fn build_ontogeny_table(
    path: &str,
    current_factor: f64,
    samples: &[AgeSample],
) -> Result<Option<TableFormula>, ConversionError> {
    if samples.is_empty() {
        return Ok(None);
    }
    let mut table = TableFormula::new(path);
    table.add_point(0.0, current_factor)?;
    for sample in samples {
        table.add_point(sample.age * MINUTES_PER_YEAR, sample.value)?;
    }
    Ok(Some(table))
}
