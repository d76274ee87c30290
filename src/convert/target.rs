//! Output targets of a conversion pass
//!
//! The converter never mutates a simulation model directly; it hands its
//! results to an [AgingTarget] (single subject) or a [PopulationTarget]
//! (one table per parameter per individual). The in-memory implementations
//! here back the tests and serve as the reference behavior for integrations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::SUPPORTED_PLASMA_PROTEINS;
use crate::data::{names, organism_parameter_path, AgeFormula, Subject, TableFormula};

/// Receiver of single-subject conversion results
pub trait AgingTarget {
    /// Whether the consuming model defines the parameter at all; tables of
    /// absent parameters are skipped
    fn has_parameter(&self, path: &str) -> bool;

    /// Replace the parameter's constant value with an aging table
    fn apply_table(&mut self, path: &str, table: TableFormula);

    /// Register a hidden auxiliary parameter supporting the age formula
    fn add_hidden_parameter(&mut self, name: &str, value: f64);

    /// Replace the age parameter with a pure function of simulated time
    fn set_age_formula(&mut self, formula: AgeFormula);
}

/// Receiver of per-individual population conversion results
pub trait PopulationTarget {
    fn write_individual_table(&mut self, path: &str, individual: usize, table: TableFormula);
}

/// In-memory [AgingTarget]
///
/// Tracks which parameter paths exist, collects applied tables and marks them
/// read-only the way a consuming simulator would.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryTarget {
    parameters: BTreeSet<String>,
    tables: BTreeMap<String, TableFormula>,
    read_only: BTreeSet<String>,
    hidden: BTreeMap<String, f64>,
    age_formula: Option<AgeFormula>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        MemoryTarget::default()
    }

    /// Target pre-registered with every parameter path the subject can
    /// produce a table for
    pub fn for_subject(subject: &Subject) -> Self {
        let mut target = MemoryTarget::new();
        for parameter in subject.parameters() {
            target.register_parameter(parameter.path());
        }
        target.register_parameter(organism_parameter_path(names::HEIGHT));
        for molecule in subject.molecules() {
            target.register_parameter(molecule.ontogeny_factor_path());
            target.register_parameter(molecule.ontogeny_factor_gi_path());
        }
        for protein in SUPPORTED_PLASMA_PROTEINS.iter() {
            target.register_parameter(organism_parameter_path(protein.parameter));
        }
        target
    }

    /// Declare that the consuming model defines a parameter path
    pub fn register_parameter(&mut self, path: impl Into<String>) {
        self.parameters.insert(path.into());
    }

    pub fn table(&self, path: &str) -> Option<&TableFormula> {
        self.tables.get(path)
    }

    pub fn tables(&self) -> &BTreeMap<String, TableFormula> {
        &self.tables
    }

    pub fn is_read_only(&self, path: &str) -> bool {
        self.read_only.contains(path)
    }

    pub fn hidden_parameter(&self, name: &str) -> Option<f64> {
        self.hidden.get(name).copied()
    }

    pub fn age_formula(&self) -> Option<&AgeFormula> {
        self.age_formula.as_ref()
    }
}

impl AgingTarget for MemoryTarget {
    fn has_parameter(&self, path: &str) -> bool {
        self.parameters.contains(path)
    }

    fn apply_table(&mut self, path: &str, table: TableFormula) {
        self.read_only.insert(path.to_string());
        self.tables.insert(path.to_string(), table);
    }

    fn add_hidden_parameter(&mut self, name: &str, value: f64) {
        self.hidden.insert(name.to_string(), value);
    }

    fn set_age_formula(&mut self, formula: AgeFormula) {
        self.age_formula = Some(formula);
    }
}

/// In-memory [PopulationTarget]: tables keyed by path, then individual
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryPopulationTarget {
    tables: BTreeMap<String, BTreeMap<usize, TableFormula>>,
}

impl MemoryPopulationTarget {
    pub fn new() -> Self {
        MemoryPopulationTarget::default()
    }

    pub fn table(&self, path: &str, individual: usize) -> Option<&TableFormula> {
        self.tables.get(path)?.get(&individual)
    }

    pub fn tables_for(&self, path: &str) -> Option<&BTreeMap<usize, TableFormula>> {
        self.tables.get(path)
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl PopulationTarget for MemoryPopulationTarget {
    fn write_individual_table(&mut self, path: &str, individual: usize, table: TableFormula) {
        self.tables
            .entry(path.to_string())
            .or_default()
            .insert(individual, table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applied_tables_become_read_only() {
        let mut target = MemoryTarget::new();
        target.register_parameter("Organism|Liver|Volume");
        assert!(target.has_parameter("Organism|Liver|Volume"));
        assert!(!target.is_read_only("Organism|Liver|Volume"));

        let mut table = TableFormula::new("Organism|Liver|Volume");
        table.add_point(0.0, 1.0).unwrap();
        target.apply_table("Organism|Liver|Volume", table);
        assert!(target.is_read_only("Organism|Liver|Volume"));
        assert_eq!(target.table("Organism|Liver|Volume").unwrap().len(), 1);
    }

    #[test]
    fn population_target_keys_by_path_and_individual() {
        let mut target = MemoryPopulationTarget::new();
        let mut table = TableFormula::new("Organism|Liver|Volume");
        table.add_point(0.0, 1.0).unwrap();
        target.write_individual_table("Organism|Liver|Volume", 3, table.clone());
        target.write_individual_table("Organism|Liver|Volume", 5, table);
        assert_eq!(target.len(), 2);
        assert!(target.table("Organism|Liver|Volume", 3).is_some());
        assert!(target.table("Organism|Liver|Volume", 4).is_none());
    }
}
