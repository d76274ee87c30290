//! CSV reader for calibration files
//!
//! Two file kinds feed the catalog: ontogeny files (one row per molecule,
//! group and postmenstrual age) and parameter files (one row per container,
//! parameter, population, gender and age). Headers are case-insensitive and
//! lines starting with `#` are comments.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{CalibrationSet, OntogenyRow, ParameterRow};
use crate::data::Gender;
use crate::math::DistributionType;

/// Custom error type for the module
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("CSV error: {0}")]
    ReadError(#[from] csv::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unknown gender: {value}")]
    InvalidGender { value: String },
    #[error("Unknown distribution type: {value}")]
    InvalidDistribution { value: String },
}

#[derive(Debug, Deserialize)]
struct OntogenyRecord {
    molecule: String,
    species: String,
    group: String,
    /// Postmenstrual age in years
    pma: f64,
    factor: f64,
    deviation: f64,
}

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    container: String,
    parameter: String,
    population: String,
    #[serde(default)]
    sub_population: Option<String>,
    gender: String,
    age: f64,
    mean: f64,
    deviation: f64,
    distribution: String,
    group: String,
}

fn reader_from<R: Read>(source: R) -> Result<csv::Reader<R>, CalibrationError> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .has_headers(true)
        .from_reader(source);

    // Convert headers to lowercase
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect::<Vec<_>>();
    reader.set_headers(csv::StringRecord::from(headers));
    Ok(reader)
}

fn parse_gender(value: &str) -> Result<Gender, CalibrationError> {
    match value.to_uppercase().as_str() {
        "MALE" => Ok(Gender::Male),
        "FEMALE" => Ok(Gender::Female),
        _ => Err(CalibrationError::InvalidGender {
            value: value.to_string(),
        }),
    }
}

fn parse_distribution(value: &str) -> Result<DistributionType, CalibrationError> {
    match value.to_uppercase().as_str() {
        "NORMAL" => Ok(DistributionType::Normal),
        "LOGNORMAL" => Ok(DistributionType::LogNormal),
        "UNIFORM" => Ok(DistributionType::Uniform),
        _ => Err(CalibrationError::InvalidDistribution {
            value: value.to_string(),
        }),
    }
}

/// Read ontogeny calibration rows from any reader
pub fn read_ontogeny_rows<R: Read>(source: R) -> Result<Vec<OntogenyRow>, CalibrationError> {
    let mut rows = Vec::new();
    for record in reader_from(source)?.deserialize() {
        let record: OntogenyRecord = record?;
        rows.push(OntogenyRow {
            molecule: record.molecule,
            species: record.species,
            group: record.group,
            postmenstrual_age: record.pma,
            factor: record.factor,
            deviation: record.deviation,
        });
    }
    Ok(rows)
}

/// Read distributed-parameter calibration rows from any reader
pub fn read_parameter_rows<R: Read>(source: R) -> Result<Vec<ParameterRow>, CalibrationError> {
    let mut rows = Vec::new();
    for record in reader_from(source)?.deserialize() {
        let record: ParameterRecord = record?;
        rows.push(ParameterRow {
            container: record.container,
            parameter: record.parameter,
            population: record.population,
            sub_population: record.sub_population.filter(|s| !s.is_empty()),
            gender: parse_gender(&record.gender)?,
            age: record.age,
            mean: record.mean,
            deviation: record.deviation,
            distribution: parse_distribution(&record.distribution)?,
            group: record.group,
        });
    }
    Ok(rows)
}

/// Read a pair of calibration files into a [CalibrationSet]
///
/// # Errors
///
/// Fails on unreadable files, malformed CSV, or rows with an unknown gender
/// or distribution type.
pub fn read_calibration(
    ontogeny_path: impl AsRef<Path>,
    parameters_path: impl AsRef<Path>,
) -> Result<CalibrationSet, CalibrationError> {
    let mut set = CalibrationSet::new();
    for row in read_ontogeny_rows(std::fs::File::open(ontogeny_path)?)? {
        set.add_ontogeny_row(row);
    }
    for row in read_parameter_rows(std::fs::File::open(parameters_path)?)? {
        set.add_parameter_row(row);
    }
    Ok(set)
}
