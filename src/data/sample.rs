use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::data::Gender;
use crate::math::{is_valid_percentile, Distribution, DistributionType};

/// A single (age, value) pair on an age grid
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeSample {
    pub age: f64,
    pub value: f64,
}

impl AgeSample {
    pub fn new(age: f64, value: f64) -> Self {
        AgeSample { age, value }
    }
}

/// Distribution provenance attached to a table point
///
/// Preserving the mean, deviation and distribution type of the calibration
/// row a point was derived from allows later re-evaluation of the point at a
/// different percentile.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetaData {
    pub mean: f64,
    pub deviation: f64,
    pub distribution: DistributionType,
}

impl DistributionMetaData {
    pub fn to_distribution(&self) -> Distribution {
        Distribution::from_type(self.distribution, self.mean, self.deviation)
    }
}

/// One calibration row for a distributed (non-ontogeny) parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDistributionSample {
    /// Chronological age in years
    pub age: f64,
    pub mean: f64,
    pub deviation: f64,
    pub distribution: DistributionType,
    pub gender: Gender,
    /// Anatomical group the row belongs to
    pub group: String,
}

impl ParameterDistributionSample {
    pub fn metadata(&self) -> DistributionMetaData {
        DistributionMetaData {
            mean: self.mean,
            deviation: self.deviation,
            distribution: self.distribution,
        }
    }

    pub fn to_distribution(&self) -> Distribution {
        Distribution::from_type(self.distribution, self.mean, self.deviation)
    }
}

/// One calibration row for an ontogeny factor, keyed by postmenstrual age
///
/// Ontogeny factors are log-normally distributed; `deviation` is a geometric
/// standard deviation. A deviation of 1 (or less) carries no spread and makes
/// the row unusable for randomized draws.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OntogenySample {
    /// Postmenstrual age in years
    pub postmenstrual_age: f64,
    pub factor: f64,
    pub deviation: f64,
    pub group: String,
}

impl OntogenySample {
    pub fn distribution(&self) -> Distribution {
        Distribution::from_type(DistributionType::LogNormal, self.factor, self.deviation)
    }

    fn has_spread(&self) -> bool {
        self.deviation > 1.0 && self.factor > 0.0
    }

    /// Draw phase of the randomized-ontogeny behavior: sample one value from
    /// this row's distribution and return its percentile
    ///
    /// Returns `None` when the row's deviation carries no spread; the caller
    /// moves on to the next row.
    pub fn draw_percentile<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        if !self.has_spread() {
            return None;
        }
        let dist = self.distribution();
        let value = dist.sample(rng).ok()?;
        dist.percentile_from_value(value).ok()
    }

    /// Apply phase: evaluate this row at a previously drawn percentile
    ///
    /// Falls back to the calibrated factor when the percentile is invalid or
    /// the row carries no spread.
    pub fn factor_at_percentile(&self, percentile: f64) -> f64 {
        if !is_valid_percentile(percentile) || !self.has_spread() {
            return self.factor;
        }
        self.distribution()
            .value_from_percentile(percentile)
            .unwrap_or(self.factor)
    }
}

/// Keep only the rows matching the subject's gender
///
/// When the calibration set spans both genders, only rows of the subject's
/// gender may be used. A single-gender calibration set applies to every
/// subject as-is.
pub fn for_gender<T, F>(rows: &[T], gender: Gender, gender_of: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> Gender,
{
    let has_male = rows.iter().any(|r| gender_of(r) == Gender::Male);
    let has_female = rows.iter().any(|r| gender_of(r) == Gender::Female);
    if !(has_male && has_female) {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|r| gender_of(r) == gender)
        .cloned()
        .collect()
}
