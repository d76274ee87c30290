use crate::data::AgeSample;

use super::MathError;

/// Piecewise-linear interpolation over an age grid
///
/// `samples` must be ordered by ascending age. Queries between two samples
/// interpolate linearly; queries outside the sampled range extend the nearest
/// edge segment linearly. A single sample acts as a constant.
///
/// # Errors
///
/// Returns [MathError::NoSamples] when `samples` is empty.
pub fn interpolate(samples: &[AgeSample], age: f64) -> Result<f64, MathError> {
    match samples {
        [] => Err(MathError::NoSamples),
        [only] => Ok(only.value),
        _ => {
            let segment = samples
                .windows(2)
                .find(|w| age <= w[1].age)
                .unwrap_or(&samples[samples.len() - 2..]);
            Ok(linear(&segment[0], &segment[1], age))
        }
    }
}

fn linear(a: &AgeSample, b: &AgeSample, age: f64) -> f64 {
    if b.age == a.age {
        return a.value;
    }
    let slope = (b.value - a.value) / (b.age - a.age);
    a.value + slope * (age - a.age)
}
