use rand::Rng;
use rand_distr::Distribution as Sampler;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;

use super::MathError;

/// Smallest distance a corrected percentile keeps from the interval bounds.
///
/// The inverse CDF of a normal distribution diverges at 0 and 1; percentiles
/// read back from data are nudged into the open interval before use.
pub const PERCENTILE_EPSILON: f64 = 1e-6;

/// The kind of parametric distribution attached to a calibration row
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionType {
    Normal,
    LogNormal,
    /// Degenerate fallback used when no distribution type is resolvable;
    /// behaves as a point mass at the mean.
    Uniform,
}

/// A parametric distribution supporting value/percentile conversion both ways
///
/// This is the closed set of distribution kinds the aging tables work with.
/// Matching on it is exhaustive, so adding a kind forces every conversion
/// site to handle it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    Normal { mean: f64, deviation: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Uniform { min: f64, max: f64 },
}

impl Distribution {
    /// Create a distribution from a calibration row's type, mean and deviation
    ///
    /// The log-normal variant is parameterized directly by `ln(mean)` and
    /// `ln(deviation)`: the deviation of a log-normal calibration row is a
    /// geometric standard deviation, not a CV-derived sigma. Downstream
    /// consumers depend on this parameterization.
    pub fn from_type(kind: DistributionType, mean: f64, deviation: f64) -> Self {
        match kind {
            DistributionType::Normal => Distribution::Normal { mean, deviation },
            DistributionType::LogNormal => Distribution::LogNormal {
                mu: mean.ln(),
                sigma: deviation.ln(),
            },
            DistributionType::Uniform => Distribution::Uniform {
                min: mean,
                max: mean,
            },
        }
    }

    /// Value at the given percentile of the distribution
    ///
    /// # Errors
    ///
    /// Returns [MathError::InvalidPercentile] unless `percentile` is a finite
    /// value in the open interval (0, 1).
    pub fn value_from_percentile(&self, percentile: f64) -> Result<f64, MathError> {
        if !is_valid_percentile(percentile) {
            return Err(MathError::InvalidPercentile { percentile });
        }
        match *self {
            Distribution::Normal { mean, deviation } => {
                if deviation <= 0.0 {
                    return Ok(mean);
                }
                Ok(gaussian(mean, deviation)?.inverse_cdf(percentile))
            }
            Distribution::LogNormal { mu, sigma } => {
                // A geometric standard deviation of exactly 1 collapses to a
                // point mass at the median.
                if sigma <= 0.0 {
                    return Ok(mu.exp());
                }
                Ok(gaussian(mu, sigma)?.inverse_cdf(percentile).exp())
            }
            Distribution::Uniform { min, max } => Ok(min + percentile * (max - min)),
        }
    }

    /// Percentile of the given value within the distribution, in `[0, 1]`
    pub fn percentile_from_value(&self, value: f64) -> Result<f64, MathError> {
        match *self {
            Distribution::Normal { mean, deviation } => {
                if deviation <= 0.0 {
                    return Ok(0.5);
                }
                Ok(gaussian(mean, deviation)?.cdf(value).clamp(0.0, 1.0))
            }
            Distribution::LogNormal { mu, sigma } => {
                if value <= 0.0 {
                    return Ok(0.0);
                }
                if sigma <= 0.0 {
                    return Ok(0.5);
                }
                Ok(gaussian(mu, sigma)?.cdf(value.ln()).clamp(0.0, 1.0))
            }
            Distribution::Uniform { min, max } => {
                if max > min {
                    Ok(((value - min) / (max - min)).clamp(0.0, 1.0))
                } else if value < min {
                    Ok(0.0)
                } else if value > min {
                    Ok(1.0)
                } else {
                    Ok(0.5)
                }
            }
        }
    }

    /// Draw one value from the distribution
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, MathError> {
        match *self {
            Distribution::Normal { mean, deviation } => {
                if deviation <= 0.0 {
                    return Ok(mean);
                }
                let normal = rand_distr::Normal::new(mean, deviation)
                    .map_err(|_| MathError::InvalidDeviation { deviation })?;
                Ok(normal.sample(rng))
            }
            Distribution::LogNormal { mu, sigma } => {
                if sigma <= 0.0 {
                    return Ok(mu.exp());
                }
                let lognormal = rand_distr::LogNormal::new(mu, sigma)
                    .map_err(|_| MathError::InvalidDeviation { deviation: sigma })?;
                Ok(lognormal.sample(rng))
            }
            Distribution::Uniform { min, max } => {
                if max <= min {
                    return Ok(min);
                }
                Ok(rng.random_range(min..max))
            }
        }
    }
}

fn gaussian(mean: f64, deviation: f64) -> Result<statrs::distribution::Normal, MathError> {
    statrs::distribution::Normal::new(mean, deviation)
        .map_err(|_| MathError::InvalidDeviation { deviation })
}

/// A percentile is valid when it is finite and lies strictly between 0 and 1
pub fn is_valid_percentile(percentile: f64) -> bool {
    percentile.is_finite() && percentile > 0.0 && percentile < 1.0
}

/// Nudge a percentile into the open interval (0, 1)
///
/// Percentiles computed from data can land exactly on 0 or 1; correcting them
/// keeps the inverse CDF finite. NaN input is returned unchanged so that
/// validation downstream still fails.
pub fn corrected_percentile(percentile: f64) -> f64 {
    percentile.clamp(PERCENTILE_EPSILON, 1.0 - PERCENTILE_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn normal_round_trip() {
        let dist = Distribution::Normal {
            mean: 10.0,
            deviation: 2.0,
        };
        for p in [0.01, 0.25, 0.5, 0.75, 0.99] {
            let value = dist.value_from_percentile(p).unwrap();
            let back = dist.percentile_from_value(value).unwrap();
            assert_relative_eq!(back, p, epsilon = 1e-9);
        }
    }

    #[test]
    fn lognormal_round_trip() {
        let dist = Distribution::from_type(DistributionType::LogNormal, 1.5, 1.3);
        for p in [0.05, 0.5, 0.95] {
            let value = dist.value_from_percentile(p).unwrap();
            let back = dist.percentile_from_value(value).unwrap();
            assert_relative_eq!(back, p, epsilon = 1e-9);
        }
    }

    #[test]
    fn lognormal_uses_geometric_parameterization() {
        // Median of LogNormal(ln m, ln gsd) is m, independent of the deviation
        let dist = Distribution::from_type(DistributionType::LogNormal, 2.0, 1.4);
        let median = dist.value_from_percentile(0.5).unwrap();
        assert_relative_eq!(median, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn uniform_is_point_mass_at_mean() {
        let dist = Distribution::from_type(DistributionType::Uniform, 7.0, 123.0);
        assert_eq!(dist.value_from_percentile(0.1).unwrap(), 7.0);
        assert_eq!(dist.value_from_percentile(0.9).unwrap(), 7.0);
        assert_eq!(dist.percentile_from_value(7.0).unwrap(), 0.5);
        assert_eq!(dist.percentile_from_value(6.0).unwrap(), 0.0);
        assert_eq!(dist.percentile_from_value(8.0).unwrap(), 1.0);
    }

    #[test]
    fn degenerate_deviation_collapses_to_point_mass() {
        let normal = Distribution::Normal {
            mean: 4.0,
            deviation: 0.0,
        };
        assert_eq!(normal.value_from_percentile(0.3).unwrap(), 4.0);
        assert_eq!(normal.percentile_from_value(4.0).unwrap(), 0.5);

        // gsd of 1 means sigma = ln(1) = 0
        let lognormal = Distribution::from_type(DistributionType::LogNormal, 3.0, 1.0);
        assert_relative_eq!(lognormal.value_from_percentile(0.8).unwrap(), 3.0);
    }

    #[test]
    fn invalid_percentile_is_rejected() {
        let dist = Distribution::Normal {
            mean: 0.0,
            deviation: 1.0,
        };
        for p in [0.0, 1.0, -0.1, 1.1, f64::NAN] {
            assert!(matches!(
                dist.value_from_percentile(p),
                Err(MathError::InvalidPercentile { .. })
            ));
        }
    }

    #[test]
    fn corrected_percentile_stays_in_open_interval() {
        assert!(is_valid_percentile(corrected_percentile(0.0)));
        assert!(is_valid_percentile(corrected_percentile(1.0)));
        assert_eq!(corrected_percentile(0.5), 0.5);
        assert!(corrected_percentile(f64::NAN).is_nan());
    }

    #[test]
    fn sampling_is_deterministic_under_seed() {
        let dist = Distribution::from_type(DistributionType::LogNormal, 1.0, 1.5);
        let a = dist.sample(&mut StdRng::seed_from_u64(42)).unwrap();
        let b = dist.sample(&mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
