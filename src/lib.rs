//! # agetab
//!
//! `agetab` converts statistically distributed, age-dependent physiological
//! parameters (organ volumes, blood flows, protein and enzyme ontogeny
//! factors, body height) into explicit, deterministic time-indexed table
//! formulas for consumption by an ODE-based physiological simulator.
//!
//! The central idea is the *percentile-preserving trajectory*: an individual's
//! age-varying values are built by holding their statistical percentile fixed
//! across ages, rather than letting the trajectory revert to the cohort mean.
//!
//! The main entry point is [AgingConverter], which drives a full conversion
//! pass for a single subject and, optionally, for every member of a virtual
//! population:
//!
//! ```ignore
//! let catalog = DistributionCatalog::new(calibration, "Human");
//! let converter = AgingConverter::new(&catalog);
//! let mut target = MemoryTarget::for_subject(&subject);
//! let summary = converter.convert(&subject, &mut target)?;
//! ```
//!
//! ## Units
//!
//! Ages are expressed in years, gestational ages in weeks, and table time
//! offsets in the simulation base time unit (minutes).

pub mod catalog;
pub mod convert;
pub mod data;
pub mod error;
pub mod math;

pub use crate::catalog::{
    read_calibration, CalibrationError, CalibrationSet, CatalogError, DistributionCatalog,
    OntogenyRow, ParameterRow, ReferenceSource,
};
pub use crate::convert::target::{
    AgingTarget, MemoryPopulationTarget, MemoryTarget, PopulationTarget,
};
pub use crate::convert::{
    AgingConverter, ConversionError, ConversionSummary, PopulationOptions, PopulationReport,
};
pub use crate::data::*;
pub use crate::error::AgetabError;
pub use crate::math::{Distribution, DistributionType, MathError};

pub mod prelude {
    pub use crate::catalog::{CalibrationSet, DistributionCatalog, ReferenceSource};
    pub use crate::convert::target::{
        AgingTarget, MemoryPopulationTarget, MemoryTarget, PopulationTarget,
    };
    pub use crate::convert::{AgingConverter, PopulationOptions};
    pub use crate::data::*;
    pub use crate::math::{Distribution, DistributionType};
}
