//! Calibration catalog: distributed-parameter and ontogeny reference data
//!
//! The catalog sits between a [ReferenceSource] (usually CSV calibration
//! files, see [parser]) and the converter. Rows are indexed lazily on first
//! access and ontogeny groups are memoized per (molecule, group) pair, so a
//! population run pays the indexing cost once.

pub mod parser;

pub use parser::{read_calibration, CalibrationError};

use dashmap::DashMap;
use lazy_static::lazy_static;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::data::{
    for_gender, groups, AgeSample, Gender, OntogenySample, OriginData,
    ParameterDistributionSample,
};
use crate::math::{interpolate, DistributionType};

/// Ontogeny factor applied when no calibration covers a molecule
pub const DEFAULT_ONTOGENY_FACTOR: f64 = 1.0;

/// Error type for catalog lookups
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("'{parameter}' is not the ontogeny factor of a supported plasma protein")]
    UnknownPlasmaProtein { parameter: String },
}

/// One calibration row for an ontogeny factor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OntogenyRow {
    pub molecule: String,
    pub species: String,
    pub group: String,
    /// Postmenstrual age in years
    pub postmenstrual_age: f64,
    pub factor: f64,
    /// Geometric standard deviation
    pub deviation: f64,
}

/// One calibration row for an age-dependent distributed parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub container: String,
    pub parameter: String,
    pub population: String,
    pub sub_population: Option<String>,
    pub gender: Gender,
    /// Chronological age in years
    pub age: f64,
    pub mean: f64,
    pub deviation: f64,
    pub distribution: DistributionType,
    pub group: String,
}

/// Provider of raw calibration rows
///
/// Implementations only hand over rows; all filtering, grouping and
/// memoization happens in [DistributionCatalog].
pub trait ReferenceSource: Send + Sync {
    fn ontogeny_rows(&self) -> Vec<OntogenyRow>;
    fn parameter_rows(&self) -> Vec<ParameterRow>;
}

/// In-memory [ReferenceSource], filled either programmatically or by the CSV
/// reader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalibrationSet {
    ontogeny_rows: Vec<OntogenyRow>,
    parameter_rows: Vec<ParameterRow>,
}

impl CalibrationSet {
    pub fn new() -> Self {
        CalibrationSet::default()
    }

    pub fn add_ontogeny_row(&mut self, row: OntogenyRow) {
        self.ontogeny_rows.push(row);
    }

    pub fn add_parameter_row(&mut self, row: ParameterRow) {
        self.parameter_rows.push(row);
    }
}

impl ReferenceSource for CalibrationSet {
    fn ontogeny_rows(&self) -> Vec<OntogenyRow> {
        self.ontogeny_rows.clone()
    }

    fn parameter_rows(&self) -> Vec<ParameterRow> {
        self.parameter_rows.clone()
    }
}

/// A plasma protein whose ontogeny is calibrated under a molecule name and
/// surfaced through an organism-level factor parameter
pub struct SupportedProtein {
    pub molecule: &'static str,
    pub parameter: &'static str,
}

lazy_static! {
    /// Plasma proteins with built-in ontogeny support
    pub static ref SUPPORTED_PLASMA_PROTEINS: Vec<SupportedProtein> = vec![
        SupportedProtein {
            molecule: "Albumin",
            parameter: crate::data::names::ONTOGENY_FACTOR_ALBUMIN,
        },
        SupportedProtein {
            molecule: "AGP",
            parameter: crate::data::names::ONTOGENY_FACTOR_AGP,
        },
    ];
}

struct CatalogIndex {
    /// Ontogeny rows keyed by molecule name, species already filtered
    ontogenies: HashMap<String, Vec<OntogenySample>>,
    /// Parameter rows keyed by (container, parameter)
    parameters: HashMap<(String, String), Vec<ParameterRow>>,
}

/// Indexed, memoizing view over a [ReferenceSource] for one species
///
/// Thread-safe: population conversion shares one catalog across rayon
/// workers.
pub struct DistributionCatalog {
    source: Box<dyn ReferenceSource>,
    species: String,
    index: OnceLock<CatalogIndex>,
    ontogeny_groups: DashMap<(String, String), Arc<Vec<OntogenySample>>>,
}

impl DistributionCatalog {
    pub fn new(source: impl ReferenceSource + 'static, species: impl Into<String>) -> Self {
        DistributionCatalog {
            source: Box::new(source),
            species: species.into(),
            index: OnceLock::new(),
            ontogeny_groups: DashMap::new(),
        }
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    /// Build the row index eagerly
    ///
    /// Called once before a population run so that parallel workers never
    /// contend on the first lookup.
    pub fn warm_up(&self) {
        let _ = self.index();
    }

    fn index(&self) -> &CatalogIndex {
        self.index.get_or_init(|| {
            let mut ontogenies: HashMap<String, Vec<OntogenySample>> = HashMap::new();
            for row in self.source.ontogeny_rows() {
                if row.species != self.species {
                    continue;
                }
                ontogenies
                    .entry(row.molecule)
                    .or_default()
                    .push(OntogenySample {
                        postmenstrual_age: row.postmenstrual_age,
                        factor: row.factor,
                        deviation: row.deviation,
                        group: row.group,
                    });
            }
            let mut parameters: HashMap<(String, String), Vec<ParameterRow>> = HashMap::new();
            for row in self.source.parameter_rows() {
                parameters
                    .entry((row.container.clone(), row.parameter.clone()))
                    .or_default()
                    .push(row);
            }
            CatalogIndex {
                ontogenies,
                parameters,
            }
        })
    }

    /// All ontogeny samples of a molecule, every group, sorted by
    /// postmenstrual age
    pub fn all_ontogeny_values(&self, molecule: &str) -> Vec<OntogenySample> {
        let mut samples = self
            .index()
            .ontogenies
            .get(molecule)
            .cloned()
            .unwrap_or_default();
        sort_by_pma(&mut samples);
        samples
    }

    /// Ontogeny samples of a molecule for one anatomical group, sorted by
    /// postmenstrual age
    ///
    /// When the molecule is calibrated for a single group that group wins
    /// regardless of the request; when the requested group has no rows the
    /// default group (Liver) is used instead.
    pub fn all_ontogeny_values_in_group(
        &self,
        molecule: &str,
        group: &str,
    ) -> Arc<Vec<OntogenySample>> {
        let key = (molecule.to_string(), group.to_string());
        if let Some(cached) = self.ontogeny_groups.get(&key) {
            return Arc::clone(&cached);
        }
        let all = self.all_ontogeny_values(molecule);
        let resolved = resolve_group(&all, group);
        let samples: Arc<Vec<OntogenySample>> = Arc::new(
            all.into_iter()
                .filter(|s| s.group == resolved)
                .collect(),
        );
        self.ontogeny_groups.insert(key, Arc::clone(&samples));
        samples
    }

    /// Ontogeny factor of a molecule at the subject's current postmenstrual
    /// age
    ///
    /// Returns [DEFAULT_ONTOGENY_FACTOR] when the molecule carries no
    /// calibration. With an rng, the factor is evaluated at one randomly
    /// drawn percentile (drawn from the first sample with spread and applied
    /// to the whole grid); without one, the calibrated mean factors are used.
    pub fn factor_for(
        &self,
        molecule: &str,
        group: &str,
        origin: &OriginData,
        rng: Option<&mut dyn RngCore>,
    ) -> f64 {
        let samples = self.all_ontogeny_values_in_group(molecule, group);
        if samples.is_empty() {
            return DEFAULT_ONTOGENY_FACTOR;
        }
        let percentile = draw_once(&samples, rng);
        let grid = factor_grid(&samples, percentile);
        interpolate(&grid, origin.postmenstrual_age()).unwrap_or(DEFAULT_ONTOGENY_FACTOR)
    }

    /// Ontogeny factors of the molecule at every calibrated postmenstrual age
    /// strictly greater than the subject's, as offsets from now in years
    ///
    /// The same drawn percentile (when an rng is given) applies to every
    /// returned sample, keeping the individual's trajectory internally
    /// consistent.
    pub fn ontogeny_samples_older_than(
        &self,
        molecule: &str,
        group: &str,
        origin: &OriginData,
        rng: Option<&mut dyn RngCore>,
    ) -> Vec<AgeSample> {
        let samples = self.all_ontogeny_values_in_group(molecule, group);
        let percentile = draw_once(&samples, rng);
        let pma = origin.postmenstrual_age();
        samples
            .iter()
            .filter(|s| s.postmenstrual_age > pma)
            .map(|s| {
                let factor = match percentile {
                    Some(p) => s.factor_at_percentile(p),
                    None => s.factor,
                };
                AgeSample::new(s.postmenstrual_age - pma, factor)
            })
            .collect()
    }

    /// Future ontogeny factors of a supported plasma protein, as offsets from
    /// now in years
    ///
    /// # Errors
    ///
    /// Returns [CatalogError::UnknownPlasmaProtein] when `parameter` is not
    /// the ontogeny factor parameter of a supported protein.
    pub fn plasma_protein_samples_older_than(
        &self,
        parameter: &str,
        origin: &OriginData,
        rng: Option<&mut dyn RngCore>,
    ) -> Result<Vec<AgeSample>, CatalogError> {
        let protein = SUPPORTED_PLASMA_PROTEINS
            .iter()
            .find(|p| p.parameter == parameter)
            .ok_or_else(|| CatalogError::UnknownPlasmaProtein {
                parameter: parameter.to_string(),
            })?;
        Ok(self.ontogeny_samples_older_than(protein.molecule, groups::PLASMA, origin, rng))
    }

    /// Current ontogeny factor of a supported plasma protein
    pub fn plasma_protein_factor(
        &self,
        parameter: &str,
        origin: &OriginData,
    ) -> Result<f64, CatalogError> {
        let protein = SUPPORTED_PLASMA_PROTEINS
            .iter()
            .find(|p| p.parameter == parameter)
            .ok_or_else(|| CatalogError::UnknownPlasmaProtein {
                parameter: parameter.to_string(),
            })?;
        Ok(self.factor_for(protein.molecule, groups::PLASMA, origin, None))
    }

    /// Calibration rows of a distributed parameter matching the subject's
    /// population, both genders, sorted by age
    pub fn parameter_distributions_for(
        &self,
        container: &str,
        parameter: &str,
        origin: &OriginData,
    ) -> Vec<ParameterDistributionSample> {
        let key = (container.to_string(), parameter.to_string());
        let mut samples: Vec<ParameterDistributionSample> = self
            .index()
            .parameters
            .get(&key)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.population == origin.population.name())
                    .filter(|row| match (&row.sub_population, &origin.sub_population) {
                        (None, _) => true,
                        (Some(rs), Some(os)) => rs == os,
                        (Some(_), None) => false,
                    })
                    .map(|row| ParameterDistributionSample {
                        age: row.age,
                        mean: row.mean,
                        deviation: row.deviation,
                        distribution: row.distribution,
                        gender: row.gender,
                        group: row.group.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        samples.sort_by(|a, b| a.age.total_cmp(&b.age));
        samples
    }

    /// Calibration rows of a distributed parameter for the subject's gender,
    /// at ages strictly greater than the subject's, sorted by age
    pub fn parameter_samples_older_than(
        &self,
        container: &str,
        parameter: &str,
        origin: &OriginData,
    ) -> Vec<ParameterDistributionSample> {
        let all = self.parameter_distributions_for(container, parameter, origin);
        for_gender(&all, origin.gender, |s| s.gender)
            .into_iter()
            .filter(|s| s.age > origin.age)
            .collect()
    }
}

/// Draw phase of the randomized-ontogeny behavior: one percentile from the
/// first sample with spread, used for the whole grid
fn draw_once(samples: &[OntogenySample], rng: Option<&mut dyn RngCore>) -> Option<f64> {
    let rng = rng?;
    samples.iter().find_map(|s| s.draw_percentile(&mut *rng))
}

fn factor_grid(samples: &[OntogenySample], percentile: Option<f64>) -> Vec<AgeSample> {
    samples
        .iter()
        .map(|s| {
            let factor = match percentile {
                Some(p) => s.factor_at_percentile(p),
                None => s.factor,
            };
            AgeSample::new(s.postmenstrual_age, factor)
        })
        .collect()
}

fn resolve_group(samples: &[OntogenySample], requested: &str) -> String {
    let mut distinct: Vec<&str> = samples.iter().map(|s| s.group.as_str()).collect();
    distinct.sort_unstable();
    distinct.dedup();
    match distinct.as_slice() {
        [only] => only.to_string(),
        _ if distinct.contains(&requested) => requested.to_string(),
        _ => groups::LIVER.to_string(),
    }
}

fn sort_by_pma(samples: &mut [OntogenySample]) {
    samples.sort_by(|a, b| a.postmenstrual_age.total_cmp(&b.postmenstrual_age));
}
