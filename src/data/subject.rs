use serde::{Deserialize, Serialize};

use crate::data::{names, DistributionMetaData, OriginData, PATH_SEPARATOR};

/// The kind of container a parameter lives in
///
/// Allometric height scaling only applies to volumes of anatomical organs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Organ,
    Compartment,
    Organism,
}

/// A distributed parameter of the subject's organism
///
/// Carries the subject's current value and percentile within the parameter's
/// distribution at the subject's current age, plus the distribution itself as
/// metadata for the table's anchor point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributedParameter {
    path: String,
    container: ContainerKind,
    value: f64,
    percentile: f64,
    metadata: DistributionMetaData,
    allometric_scale_factor: Option<f64>,
}

impl DistributedParameter {
    pub fn new(
        path: impl Into<String>,
        container: ContainerKind,
        value: f64,
        percentile: f64,
        metadata: DistributionMetaData,
    ) -> Self {
        DistributedParameter {
            path: path.into(),
            container,
            value,
            percentile,
            metadata,
            allometric_scale_factor: None,
        }
    }

    pub fn with_allometric_scale_factor(mut self, alpha: f64) -> Self {
        self.allometric_scale_factor = Some(alpha);
        self
    }

    /// Full path of the parameter, e.g. `Organism|Liver|Volume`
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, the parameter name
    pub fn name(&self) -> &str {
        self.path
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.path)
    }

    /// Second-to-last path segment, the parent container's name
    pub fn container_name(&self) -> &str {
        let mut segments = self.path.rsplit(PATH_SEPARATOR);
        segments.next();
        segments.next().unwrap_or(&self.path)
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    pub fn metadata(&self) -> DistributionMetaData {
        self.metadata
    }

    /// Exponent of the allometric scale factor of the parent container
    pub fn allometric_scale_factor(&self) -> Option<f64> {
        self.allometric_scale_factor
    }
}

/// A molecule (enzyme, transporter or binding protein) expressed by the
/// subject, with its ontogeny and current ontogeny factors
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    name: String,
    ontogeny: Option<String>,
    ontogeny_factor: f64,
    ontogeny_factor_gi: f64,
}

impl Molecule {
    pub fn new(
        name: impl Into<String>,
        ontogeny: Option<String>,
        ontogeny_factor: f64,
        ontogeny_factor_gi: f64,
    ) -> Self {
        Molecule {
            name: name.into(),
            ontogeny,
            ontogeny_factor,
            ontogeny_factor_gi,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the ontogeny in the calibration set, when one is defined
    pub fn ontogeny(&self) -> Option<&str> {
        self.ontogeny.as_deref()
    }

    pub fn ontogeny_factor(&self) -> f64 {
        self.ontogeny_factor
    }

    pub fn ontogeny_factor_gi(&self) -> f64 {
        self.ontogeny_factor_gi
    }

    pub fn ontogeny_factor_path(&self) -> String {
        molecule_parameter_path(&self.name, names::ONTOGENY_FACTOR)
    }

    pub fn ontogeny_factor_gi_path(&self) -> String {
        molecule_parameter_path(&self.name, names::ONTOGENY_FACTOR_GI)
    }
}

fn molecule_parameter_path(molecule: &str, parameter: &str) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        names::ORGANISM,
        molecule,
        parameter,
        sep = PATH_SEPARATOR
    )
}

/// Path of a parameter that sits directly on the organism
pub fn organism_parameter_path(parameter: &str) -> String {
    format!("{}{}{}", names::ORGANISM, PATH_SEPARATOR, parameter)
}

/// One simulated subject: origin data plus the distributed parameters and
/// molecules of its organism
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    origin: OriginData,
    allow_aging: bool,
    parameters: Vec<DistributedParameter>,
    molecules: Vec<Molecule>,
}

impl Subject {
    pub fn builder(origin: OriginData) -> SubjectBuilder {
        SubjectBuilder {
            origin,
            allow_aging: true,
            parameters: Vec::new(),
            molecules: Vec::new(),
        }
    }

    pub fn origin(&self) -> &OriginData {
        &self.origin
    }

    /// Whether the subject's simulation ages at all; when false, conversion
    /// is a no-op
    pub fn allow_aging(&self) -> bool {
        self.allow_aging
    }

    pub fn parameters(&self) -> &[DistributedParameter] {
        &self.parameters
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }
}

/// Builder for [Subject]
pub struct SubjectBuilder {
    origin: OriginData,
    allow_aging: bool,
    parameters: Vec<DistributedParameter>,
    molecules: Vec<Molecule>,
}

impl SubjectBuilder {
    pub fn allow_aging(mut self, allow: bool) -> Self {
        self.allow_aging = allow;
        self
    }

    pub fn parameter(mut self, parameter: DistributedParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Add an organ-volume parameter, the only kind subject to allometric
    /// height scaling
    pub fn organ_volume(
        self,
        organ: &str,
        value: f64,
        percentile: f64,
        metadata: DistributionMetaData,
        allometric_scale_factor: f64,
    ) -> Self {
        let path = format!(
            "{}{sep}{}{sep}{}",
            names::ORGANISM,
            organ,
            names::VOLUME,
            sep = PATH_SEPARATOR
        );
        self.parameter(
            DistributedParameter::new(path, ContainerKind::Organ, value, percentile, metadata)
                .with_allometric_scale_factor(allometric_scale_factor),
        )
    }

    pub fn molecule(mut self, molecule: Molecule) -> Self {
        self.molecules.push(molecule);
        self
    }

    pub fn build(self) -> Subject {
        Subject {
            origin: self.origin,
            allow_aging: self.allow_aging,
            parameters: self.parameters,
            molecules: self.molecules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Gender, Population};
    use crate::math::DistributionType;

    fn origin() -> OriginData {
        OriginData {
            age: 30.0,
            gestational_age: None,
            height: 176.0,
            weight: 73.0,
            gender: Gender::Male,
            population: Population::new("European", true),
            sub_population: None,
        }
    }

    #[test]
    fn path_segments_resolve_name_and_container() {
        let meta = DistributionMetaData {
            mean: 1.0,
            deviation: 0.1,
            distribution: DistributionType::Normal,
        };
        let p = DistributedParameter::new(
            "Organism|Liver|Volume",
            ContainerKind::Organ,
            1.2,
            0.5,
            meta,
        );
        assert_eq!(p.name(), "Volume");
        assert_eq!(p.container_name(), "Liver");
    }

    #[test]
    fn molecule_paths_follow_the_organism_convention() {
        let m = Molecule::new("CYP3A4", Some("CYP3A4".to_string()), 0.5, 0.3);
        assert_eq!(m.ontogeny_factor_path(), "Organism|CYP3A4|Ontogeny factor");
        assert_eq!(
            m.ontogeny_factor_gi_path(),
            "Organism|CYP3A4|Ontogeny factor GI"
        );
    }

    #[test]
    fn builder_collects_parameters_and_molecules() {
        let meta = DistributionMetaData {
            mean: 1.0,
            deviation: 0.1,
            distribution: DistributionType::Normal,
        };
        let subject = Subject::builder(origin())
            .organ_volume("Liver", 1.4, 0.6, meta, 0.75)
            .molecule(Molecule::new("CYP3A4", Some("CYP3A4".to_string()), 1.0, 1.0))
            .build();
        assert!(subject.allow_aging());
        assert_eq!(subject.parameters().len(), 1);
        assert_eq!(subject.molecules().len(), 1);
        assert_eq!(
            subject.parameters()[0].allometric_scale_factor(),
            Some(0.75)
        );
    }
}
