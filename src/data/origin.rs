use serde::{Deserialize, Serialize};

/// Gestational age, in weeks, of a subject born at term
pub const NOT_PRETERM_GESTATIONAL_AGE_WEEKS: f64 = 40.0;

/// Weeks per year, with a year of 365.25 days
pub const WEEKS_PER_YEAR: f64 = 365.25 / 7.0;

/// Minutes per year; table time offsets are expressed in the simulation base
/// time unit (minutes)
pub const MINUTES_PER_YEAR: f64 = 365.25 * 24.0 * 60.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

/// The demographic population a subject belongs to
///
/// Height-dependent populations (human adults and children) drive allometric
/// scaling of organ volumes; populations without a height dependency (most
/// animal species) skip it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Population {
    name: String,
    height_dependent: bool,
}

impl Population {
    pub fn new(name: impl Into<String>, height_dependent: bool) -> Self {
        Population {
            name: name.into(),
            height_dependent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_height_dependent(&self) -> bool {
        self.height_dependent
    }
}

/// Biological descriptors identifying a simulated subject at a point in time
///
/// Origin data is owned by the subject; during population table generation it
/// is cloned and overwritten with each member's own covariate values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OriginData {
    /// Chronological age in years
    pub age: f64,
    /// Gestational age in weeks; `None` means born at term
    pub gestational_age: Option<f64>,
    /// Body height in cm
    pub height: f64,
    /// Body weight in kg
    pub weight: f64,
    pub gender: Gender,
    pub population: Population,
    pub sub_population: Option<String>,
}

impl OriginData {
    /// Gestational age in years, defaulting to the at-term constant
    pub fn gestational_age_in_years(&self) -> f64 {
        self.gestational_age
            .unwrap_or(NOT_PRETERM_GESTATIONAL_AGE_WEEKS)
            / WEEKS_PER_YEAR
    }

    /// Postmenstrual age in years: chronological age plus gestational offset
    ///
    /// This is the common axis for ontogeny calibration data.
    pub fn postmenstrual_age(&self) -> f64 {
        self.age + self.gestational_age_in_years()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(age: f64, gestational_age: Option<f64>) -> OriginData {
        OriginData {
            age,
            gestational_age,
            height: 90.0,
            weight: 12.0,
            gender: Gender::Male,
            population: Population::new("European", true),
            sub_population: None,
        }
    }

    #[test]
    fn postmenstrual_age_defaults_to_term_offset() {
        let o = origin(2.0, None);
        let expected = 2.0 + NOT_PRETERM_GESTATIONAL_AGE_WEEKS / WEEKS_PER_YEAR;
        assert!((o.postmenstrual_age() - expected).abs() < 1e-12);
    }

    #[test]
    fn preterm_offset_is_smaller() {
        let term = origin(1.0, None);
        let preterm = origin(1.0, Some(30.0));
        assert!(preterm.postmenstrual_age() < term.postmenstrual_age());
    }
}
