//! Conversion of distributed parameters into aging tables
//!
//! [AgingConverter] drives a full pass over one subject (or every member of
//! a virtual population): distributed organism parameters, body height,
//! molecule ontogeny factors and plasma protein ontogeny factors each become
//! a time-indexed [TableFormula], and the age parameter itself is rebuilt as
//! a pure function of simulated time.

pub mod builder;
pub mod scaler;
pub mod target;

pub use scaler::{needs_scaling, HeightScaler};
pub use target::{AgingTarget, MemoryPopulationTarget, MemoryTarget, PopulationTarget};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::catalog::{CatalogError, DistributionCatalog, SUPPORTED_PLASMA_PROTEINS};
use crate::data::{
    for_gender, groups, names, organism_parameter_path, AgeFormula, AgeSample,
    DistributedParameter, DistributionMetaData, OriginData, ParameterDistributionSample,
    PopulationData, Subject, TableError, TableFormula, MINUTES_PER_YEAR,
};
use crate::math::{corrected_percentile, interpolate, DistributionType, MathError};

/// Error type for conversion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Cannot create an aging table for '{path}': percentile {percentile} is not in (0, 1)")]
    InvalidPercentile { path: String, percentile: f64 },
    #[error(transparent)]
    Math(#[from] MathError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Outcome of a single-subject conversion
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversionSummary {
    /// Number of tables applied to the target
    pub tables_created: usize,
    /// Parameter paths skipped because the target does not define them or no
    /// calibration covers them
    pub skipped: Vec<String>,
}

/// Options of a population conversion pass
#[derive(Default)]
pub struct PopulationOptions<'a> {
    /// Base seed for randomized ontogeny; `None` disables randomization
    pub seed: Option<u64>,
    /// Cooperative cancellation flag, checked once per individual
    pub cancel: Option<&'a AtomicBool>,
}

/// Outcome of a population conversion
#[derive(Debug, Default)]
pub struct PopulationReport {
    pub individuals: usize,
    pub tables_written: usize,
    pub cancelled: bool,
    /// Individuals whose conversion failed, with the error; the rest of the
    /// population is unaffected
    pub failures: Vec<(usize, ConversionError)>,
}

/// Where an individual's parameter values and percentiles come from
enum ValueLookup<'a> {
    /// The subject's own values
    Base,
    /// Per-individual values of a virtual population member
    Population {
        data: &'a PopulationData,
        individual: usize,
    },
}

impl ValueLookup<'_> {
    fn value_for(&self, parameter: &DistributedParameter) -> Option<(f64, f64)> {
        match self {
            ValueLookup::Base => Some((parameter.value(), parameter.percentile())),
            ValueLookup::Population { data, individual } => {
                data.value_and_percentile(parameter.path(), *individual)
            }
        }
    }
}

/// Converter of distributed parameters into deterministic aging tables
pub struct AgingConverter<'a> {
    catalog: &'a DistributionCatalog,
}

impl<'a> AgingConverter<'a> {
    pub fn new(catalog: &'a DistributionCatalog) -> Self {
        AgingConverter { catalog }
    }

    /// Convert one subject and apply the results to the target
    ///
    /// A no-op for subjects whose simulation does not age. Besides the
    /// tables, the target receives the two hidden parameters anchoring the
    /// age formula and the age formula itself.
    ///
    /// # Errors
    ///
    /// Fails when a parameter has future calibration rows but an unusable
    /// percentile, or when table construction itself fails.
    pub fn convert(
        &self,
        subject: &Subject,
        target: &mut impl AgingTarget,
    ) -> Result<ConversionSummary, ConversionError> {
        let mut summary = ConversionSummary::default();
        if !subject.allow_aging() {
            return Ok(summary);
        }
        let origin = subject.origin();
        let tables = self.build_subject_tables(
            subject,
            origin,
            &ValueLookup::Base,
            None,
            &|path| target.has_parameter(path),
            &mut summary.skipped,
        )?;
        summary.tables_created = tables.len();
        for (path, table) in tables {
            target.apply_table(&path, table);
        }
        target.add_hidden_parameter(names::AGE_0, origin.age);
        target.add_hidden_parameter(names::MIN_TO_YEAR_FACTOR, 1.0 / MINUTES_PER_YEAR);
        target.set_age_formula(AgeFormula::new(origin.age));
        Ok(summary)
    }

    /// Convert every member of a virtual population
    ///
    /// Table construction runs in parallel over individuals; results are
    /// written to the target sequentially in individual order. A failing
    /// individual is reported and does not affect the others. With a seed,
    /// ontogeny randomization is deterministic per individual regardless of
    /// worker scheduling.
    pub fn convert_population(
        &self,
        subject: &Subject,
        population: &PopulationData,
        target: &mut impl PopulationTarget,
        options: PopulationOptions<'_>,
    ) -> Result<PopulationReport, ConversionError> {
        let mut report = PopulationReport {
            individuals: population.len(),
            ..PopulationReport::default()
        };
        if !subject.allow_aging() || population.is_empty() {
            return Ok(report);
        }
        self.catalog.warm_up();

        type Outcome = Option<Result<Vec<(String, TableFormula)>, ConversionError>>;
        let outcomes: Vec<Outcome> = (0..population.len())
            .into_par_iter()
            .map(|individual| {
                if let Some(cancel) = options.cancel {
                    if cancel.load(Ordering::Relaxed) {
                        return None;
                    }
                }
                let origin = population.origin_for(subject.origin(), individual);
                let mut rng = options
                    .seed
                    .map(|seed| StdRng::seed_from_u64(seed.wrapping_add(individual as u64)));
                let mut skipped = Vec::new();
                Some(self.build_subject_tables(
                    subject,
                    &origin,
                    &ValueLookup::Population {
                        data: population,
                        individual,
                    },
                    rng.as_mut().map(|r| r as &mut dyn RngCore),
                    &|_| true,
                    &mut skipped,
                ))
            })
            .collect();

        for (individual, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                None => report.cancelled = true,
                Some(Err(error)) => report.failures.push((individual, error)),
                Some(Ok(tables)) => {
                    report.tables_written += tables.len();
                    for (path, table) in tables {
                        target.write_individual_table(&path, individual, table);
                    }
                }
            }
        }
        Ok(report)
    }

    /// Build every table of one individual without applying anything
    fn build_subject_tables(
        &self,
        subject: &Subject,
        origin: &OriginData,
        lookup: &ValueLookup<'_>,
        mut rng: Option<&mut dyn RngCore>,
        present: &dyn Fn(&str) -> bool,
        skipped: &mut Vec<String>,
    ) -> Result<Vec<(String, TableFormula)>, ConversionError> {
        let mut tables = Vec::new();
        let height_rows =
            self.catalog
                .parameter_distributions_for(names::ORGANISM, names::HEIGHT, origin);
        let subject_height_rows = for_gender(&height_rows, origin.gender, |s| s.gender);

        for parameter in subject.parameters() {
            let name = parameter.name();
            if name == names::MEAN_HEIGHT || name == names::MEAN_WEIGHT {
                continue;
            }
            if !present(parameter.path()) {
                skipped.push(parameter.path().to_string());
                continue;
            }
            let Some((value, percentile)) = lookup.value_for(parameter) else {
                skipped.push(parameter.path().to_string());
                continue;
            };
            let samples = self.catalog.parameter_samples_older_than(
                parameter.container_name(),
                name,
                origin,
            );
            let scaler = match parameter.allometric_scale_factor() {
                Some(alpha) if needs_scaling(origin, parameter) => {
                    HeightScaler::for_subject(origin, &subject_height_rows, alpha)?
                }
                _ => None,
            };
            if let Some(table) = builder::build_parameter_table(
                parameter.path(),
                value,
                percentile,
                parameter.metadata(),
                origin.age,
                &samples,
                scaler.as_ref(),
            )? {
                tables.push((parameter.path().to_string(), table));
            }
        }

        if let Some(table) = self.build_height_table(origin, &subject_height_rows, present)? {
            tables.push((organism_parameter_path(names::HEIGHT), table));
        }

        for molecule in subject.molecules() {
            let Some(ontogeny) = molecule.ontogeny() else {
                continue;
            };
            let main_path = molecule.ontogeny_factor_path();
            if present(&main_path) {
                let samples = self.catalog.ontogeny_samples_older_than(
                    ontogeny,
                    groups::LIVER,
                    origin,
                    reborrow(&mut rng),
                );
                if let Some(table) = builder::build_ontogeny_table(
                    &main_path,
                    molecule.ontogeny_factor(),
                    &samples,
                )? {
                    tables.push((main_path, table));
                }
            }
            let gi_path = molecule.ontogeny_factor_gi_path();
            if present(&gi_path) {
                let samples = self.catalog.ontogeny_samples_older_than(
                    ontogeny,
                    groups::DUODENUM,
                    origin,
                    reborrow(&mut rng),
                );
                if let Some(table) = builder::build_ontogeny_table(
                    &gi_path,
                    molecule.ontogeny_factor_gi(),
                    &samples,
                )? {
                    tables.push((gi_path, table));
                }
            }
        }

        for protein in SUPPORTED_PLASMA_PROTEINS.iter() {
            let path = organism_parameter_path(protein.parameter);
            if !present(&path) {
                continue;
            }
            let factor = self.catalog.plasma_protein_factor(protein.parameter, origin)?;
            let samples = self.catalog.plasma_protein_samples_older_than(
                protein.parameter,
                origin,
                reborrow(&mut rng),
            )?;
            if let Some(table) = builder::build_ontogeny_table(&path, factor, &samples)? {
                tables.push((path, table));
            }
        }

        Ok(tables)
    }

    /// Table for the body height parameter
    ///
    /// Height is not carried as a distributed parameter on the subject; its
    /// current value comes from the origin data and its percentile from the
    /// calibrated normal distribution at the subject's age.
    fn build_height_table(
        &self,
        origin: &OriginData,
        height_rows: &[ParameterDistributionSample],
        present: &dyn Fn(&str) -> bool,
    ) -> Result<Option<TableFormula>, ConversionError> {
        let path = organism_parameter_path(names::HEIGHT);
        if height_rows.is_empty() || !present(&path) {
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
        let metadata = DistributionMetaData {
            mean: interpolate(&means, origin.age)?,
            deviation: interpolate(&deviations, origin.age)?,
            distribution: DistributionType::Normal,
        };
        let percentile = corrected_percentile(
            metadata.to_distribution().percentile_from_value(origin.height)?,
        );
        let future: Vec<ParameterDistributionSample> = height_rows
            .iter()
            .filter(|s| s.age > origin.age)
            .cloned()
            .collect();
        builder::build_parameter_table(
            &path,
            origin.height,
            percentile,
            metadata,
            origin.age,
            &future,
            None,
        )
    }
}

fn reborrow<'a, 'b: 'a>(
    rng: &'a mut Option<&'b mut dyn RngCore>,
) -> Option<&'a mut (dyn RngCore + 'a)> {
    match rng {
        Some(r) => Some(&mut **r),
        None => None,
    }
}
