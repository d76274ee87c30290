pub mod distribution;
pub mod interpolation;

pub use distribution::{
    corrected_percentile, is_valid_percentile, Distribution, DistributionType, PERCENTILE_EPSILON,
};
pub use interpolation::interpolate;

use thiserror::Error;

/// Error type for distribution math and interpolation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Deviation must be finite and positive, got {deviation}")]
    InvalidDeviation { deviation: f64 },
    #[error("Percentile must lie in the open interval (0, 1), got {percentile}")]
    InvalidPercentile { percentile: f64 },
    #[error("No samples available for interpolation")]
    NoSamples,
}
