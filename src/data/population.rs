use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::data::{Gender, OriginData};
use crate::math::corrected_percentile;

/// Error type for population covariate storage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PopulationDataError {
    #[error("Covariate '{covariate}' has {actual} values, expected {expected}")]
    LengthMismatch {
        covariate: String,
        expected: usize,
        actual: usize,
    },
}

/// Per-individual covariate and parameter-value storage of a virtual
/// population
///
/// Holds, for each member, the covariates that drive table generation (age,
/// gestational age, height, gender) and, per distributed-parameter path, the
/// member's own value and percentile.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PopulationData {
    ages: Vec<f64>,
    gestational_ages: Vec<Option<f64>>,
    heights: Vec<f64>,
    genders: Vec<Gender>,
    values: HashMap<String, Vec<f64>>,
    percentiles: HashMap<String, Vec<f64>>,
}

impl PopulationData {
    pub fn new(
        ages: Vec<f64>,
        gestational_ages: Vec<Option<f64>>,
        heights: Vec<f64>,
        genders: Vec<Gender>,
    ) -> Result<Self, PopulationDataError> {
        let expected = ages.len();
        check_len("gestational age", expected, gestational_ages.len())?;
        check_len("height", expected, heights.len())?;
        check_len("gender", expected, genders.len())?;
        Ok(PopulationData {
            ages,
            gestational_ages,
            heights,
            genders,
            values: HashMap::new(),
            percentiles: HashMap::new(),
        })
    }

    /// Register the per-individual values and percentiles of one distributed
    /// parameter
    pub fn set_parameter(
        &mut self,
        path: impl Into<String>,
        values: Vec<f64>,
        percentiles: Vec<f64>,
    ) -> Result<(), PopulationDataError> {
        let path = path.into();
        check_len(&path, self.len(), values.len())?;
        check_len(&path, self.len(), percentiles.len())?;
        self.values.insert(path.clone(), values);
        self.percentiles.insert(path, percentiles);
        Ok(())
    }

    /// Number of individuals
    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Origin data of individual `index`, derived from the base subject's
    /// origin with the member's own covariates substituted
    pub fn origin_for(&self, base: &OriginData, index: usize) -> OriginData {
        let mut origin = base.clone();
        origin.age = self.ages[index];
        origin.gestational_age = self.gestational_ages[index];
        origin.height = self.heights[index];
        origin.gender = self.genders[index];
        origin
    }

    /// Value and corrected percentile of one parameter for one individual
    ///
    /// Returns `None` when the parameter path has no per-individual storage;
    /// the caller skips the parameter for this population.
    pub fn value_and_percentile(&self, path: &str, index: usize) -> Option<(f64, f64)> {
        let value = *self.values.get(path)?.get(index)?;
        let percentile = *self.percentiles.get(path)?.get(index)?;
        Some((value, corrected_percentile(percentile)))
    }
}

fn check_len(covariate: &str, expected: usize, actual: usize) -> Result<(), PopulationDataError> {
    if expected != actual {
        return Err(PopulationDataError::LengthMismatch {
            covariate: covariate.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}
