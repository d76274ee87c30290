use thiserror::Error;

use crate::catalog::{CalibrationError, CatalogError};
use crate::convert::ConversionError;
use crate::data::{PopulationDataError, TableError};
use crate::math::MathError;

/// Top-level error type aggregating all module errors
#[derive(Error, Debug)]
pub enum AgetabError {
    #[error("Math error: {0}")]
    MathError(#[from] MathError),
    #[error("Table error: {0}")]
    TableError(#[from] TableError),
    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Population data error: {0}")]
    PopulationDataError(#[from] PopulationDataError),
    #[error("Conversion error: {0}")]
    ConversionError(#[from] ConversionError),
}
