use agetab::prelude::*;
use agetab::{names, organism_parameter_path, ConversionError, MINUTES_PER_YEAR};
use approx::assert_relative_eq;
use std::sync::atomic::{AtomicBool, Ordering};

const SPECIES: &str = "Human";
const POPULATION: &str = "European";

fn origin(age: f64, height: f64, gender: Gender) -> OriginData {
    OriginData {
        age,
        gestational_age: None,
        height,
        weight: 12.5,
        gender,
        population: Population::new(POPULATION, true),
        sub_population: None,
    }
}

fn volume_row(age: f64, mean: f64, gender: Gender) -> agetab::ParameterRow {
    agetab::ParameterRow {
        container: "Liver".to_string(),
        parameter: names::VOLUME.to_string(),
        population: POPULATION.to_string(),
        sub_population: None,
        gender,
        age,
        mean,
        deviation: mean * 0.1,
        distribution: DistributionType::Normal,
        group: "Liver".to_string(),
    }
}

fn height_row(age: f64, mean: f64, deviation: f64) -> agetab::ParameterRow {
    agetab::ParameterRow {
        container: names::ORGANISM.to_string(),
        parameter: names::HEIGHT.to_string(),
        population: POPULATION.to_string(),
        sub_population: None,
        gender: Gender::Male,
        age,
        mean,
        deviation,
        distribution: DistributionType::Normal,
        group: names::ORGANISM.to_string(),
    }
}

fn ontogeny_row(pma: f64, factor: f64, deviation: f64) -> agetab::OntogenyRow {
    agetab::OntogenyRow {
        molecule: "CYP3A4".to_string(),
        species: SPECIES.to_string(),
        group: "Liver".to_string(),
        postmenstrual_age: pma,
        factor,
        deviation,
    }
}

fn liver_calibration() -> CalibrationSet {
    let mut set = CalibrationSet::new();
    for (age, mean) in [(1.0, 1.0), (5.0, 3.0), (10.0, 6.0), (80.0, 10.0)] {
        set.add_parameter_row(volume_row(age, mean, Gender::Male));
    }
    set
}

fn liver_subject(percentile: f64) -> Subject {
    let metadata = DistributionMetaData {
        mean: 1.5,
        deviation: 0.15,
        distribution: DistributionType::Normal,
    };
    Subject::builder(origin(2.0, 86.0, Gender::Male))
        .organ_volume("Liver", 1.6, percentile, metadata, 0.75)
        .build()
}

#[test]
fn liver_volume_trajectory_holds_the_percentile_across_ages() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.6);
    let mut target = MemoryTarget::for_subject(&subject);
    let summary = converter.convert(&subject, &mut target).unwrap();

    assert_eq!(summary.tables_created, 1);
    let table = target.table("Organism|Liver|Volume").unwrap();
    let points = table.points();
    assert_eq!(points.len(), 4);

    // "now" is anchored with the subject's own value
    assert_eq!(points[0].time(), 0.0);
    assert_eq!(points[0].value(), 1.6);

    // calibration ages 5, 10 and 80 become offsets of 3, 8 and 78 years
    for (point, (offset, mean)) in points[1..]
        .iter()
        .zip([(3.0, 3.0), (8.0, 6.0), (78.0, 10.0)])
    {
        assert_relative_eq!(point.time(), offset * MINUTES_PER_YEAR, epsilon = 1e-6);
        let expected = Distribution::Normal {
            mean,
            deviation: mean * 0.1,
        }
        .value_from_percentile(0.6)
        .unwrap();
        assert_relative_eq!(point.value(), expected, epsilon = 1e-12);
        // the percentile within each point's own distribution is preserved
        let back = point
            .metadata()
            .unwrap()
            .to_distribution()
            .percentile_from_value(point.value())
            .unwrap();
        assert_relative_eq!(back, 0.6, epsilon = 1e-9);
    }
}

#[test]
fn conversion_twice_is_bit_identical() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.37);
    let mut first = MemoryTarget::for_subject(&subject);
    let mut second = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut first).unwrap();
    converter.convert(&subject, &mut second).unwrap();
    assert_eq!(first.tables(), second.tables());
    assert_eq!(first.age_formula(), second.age_formula());
}

#[test]
fn mixed_gender_calibration_uses_only_the_subjects_gender() {
    let mut set = liver_calibration();
    // female livers calibrated twice as large to make mixups obvious
    for (age, mean) in [(5.0, 6.0), (10.0, 12.0), (80.0, 20.0)] {
        set.add_parameter_row(volume_row(age, mean, Gender::Female));
    }
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.5);
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let table = target.table("Organism|Liver|Volume").unwrap();
    // at the median the values are the male means exactly
    assert_relative_eq!(table.points()[1].value(), 3.0, epsilon = 1e-9);
    assert_relative_eq!(table.points()[3].value(), 10.0, epsilon = 1e-9);
}

#[test]
fn no_calibration_means_no_table_and_no_error() {
    let catalog = DistributionCatalog::new(CalibrationSet::new(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    // an unusable percentile must not matter when there is nothing to build
    let subject = liver_subject(f64::NAN);
    let mut target = MemoryTarget::for_subject(&subject);
    let summary = converter.convert(&subject, &mut target).unwrap();
    assert_eq!(summary.tables_created, 0);
    assert!(target.table("Organism|Liver|Volume").is_none());
    // the age machinery is installed regardless
    assert!(target.age_formula().is_some());
}

#[test]
fn invalid_percentile_with_calibration_is_an_error() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(1.5);
    let mut target = MemoryTarget::for_subject(&subject);
    let result = converter.convert(&subject, &mut target);
    assert!(matches!(
        result,
        Err(ConversionError::InvalidPercentile { .. })
    ));
}

#[test]
fn average_height_subject_gets_unscaled_tables() {
    let mut set = liver_calibration();
    set.add_parameter_row(height_row(1.0, 75.0, 3.0));
    set.add_parameter_row(height_row(5.0, 110.0, 5.0));
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);

    // height at age 2 interpolates to 83.75; a subject of exactly that height
    // must see the identity scaling path
    let metadata = DistributionMetaData {
        mean: 1.5,
        deviation: 0.15,
        distribution: DistributionType::Normal,
    };
    let subject = Subject::builder(origin(2.0, 83.75, Gender::Male))
        .organ_volume("Liver", 1.6, 0.5, metadata, 0.75)
        .build();
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let table = target.table("Organism|Liver|Volume").unwrap();
    assert_relative_eq!(table.points()[1].value(), 3.0, epsilon = 1e-9);
}

#[test]
fn tall_subject_gets_allometrically_scaled_volumes() {
    let mut set = liver_calibration();
    set.add_parameter_row(height_row(1.0, 75.0, 3.0));
    set.add_parameter_row(height_row(5.0, 110.0, 5.0));
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);

    // one interpolated standard deviation above the mean at age 2
    let mean_height = 83.75;
    let sd = 3.5;
    let subject = {
        let metadata = DistributionMetaData {
            mean: 1.5,
            deviation: 0.15,
            distribution: DistributionType::Normal,
        };
        Subject::builder(origin(2.0, mean_height + sd, Gender::Male))
            .organ_volume("Liver", 1.6, 0.5, metadata, 0.75)
            .build()
    };
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let table = target.table("Organism|Liver|Volume").unwrap();
    // at the volume median the value is the scaled mean; one sd above the
    // height mean at age 5 is 115 cm against a 110 cm mean
    let expected = 3.0 * (115.0f64 / 110.0).powf(0.75);
    assert_relative_eq!(table.points()[1].value(), expected, epsilon = 1e-9);

    // the height table itself is produced alongside
    let height_table = target.table("Organism|Height").unwrap();
    assert_eq!(height_table.points()[0].value(), mean_height + sd);
    assert_relative_eq!(height_table.points()[1].value(), 115.0, epsilon = 1e-6);
}

#[test]
fn ontogeny_tables_cover_main_and_gi_groups() {
    let mut set = CalibrationSet::new();
    for (pma, factor) in [(0.77, 0.1), (5.0, 0.8), (20.0, 1.0)] {
        set.add_ontogeny_row(ontogeny_row(pma, factor, 1.0));
    }
    let mut duodenum = ontogeny_row(5.0, 0.4, 1.0);
    duodenum.group = "Duodenum".to_string();
    set.add_ontogeny_row(duodenum);
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);

    let subject = Subject::builder(origin(2.0, 86.0, Gender::Male))
        .molecule(Molecule::new("CYP3A4", Some("CYP3A4".to_string()), 0.5, 0.2))
        .build();
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let main = target.table("Organism|CYP3A4|Ontogeny factor").unwrap();
    assert_eq!(main.points()[0].value(), 0.5);
    assert_eq!(main.len(), 3);

    let gi = target.table("Organism|CYP3A4|Ontogeny factor GI").unwrap();
    assert_eq!(gi.points()[0].value(), 0.2);
    assert_eq!(gi.len(), 2);
    assert_eq!(gi.points()[1].value(), 0.4);
}

#[test]
fn plasma_protein_tables_come_from_builtin_support() {
    let mut set = CalibrationSet::new();
    for (pma, factor) in [(0.77, 0.3), (5.0, 0.9), (20.0, 1.0)] {
        let mut row = ontogeny_row(pma, factor, 1.0);
        row.molecule = "Albumin".to_string();
        row.group = "Plasma".to_string();
        set.add_ontogeny_row(row);
    }
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);

    let subject = Subject::builder(origin(2.0, 86.0, Gender::Male)).build();
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let path = organism_parameter_path(names::ONTOGENY_FACTOR_ALBUMIN);
    let table = target.table(&path).unwrap();
    assert_eq!(table.len(), 3);
    // the anchor is the interpolated factor at the subject's own age
    assert!(table.points()[0].value() > 0.3 && table.points()[0].value() < 0.9);
    // AGP has no calibration, so no table appears for it
    let agp = organism_parameter_path(names::ONTOGENY_FACTOR_AGP);
    assert!(target.table(&agp).is_none());
}

fn population_of(ages: &[f64]) -> PopulationData {
    let n = ages.len();
    let mut population = PopulationData::new(
        ages.to_vec(),
        vec![None; n],
        vec![86.0; n],
        vec![Gender::Male; n],
    )
    .unwrap();
    let values: Vec<f64> = ages.iter().map(|a| 0.5 + a * 0.1).collect();
    let percentiles: Vec<f64> = (0..n).map(|i| 0.2 + 0.1 * i as f64).collect();
    population
        .set_parameter("Organism|Liver|Volume", values, percentiles)
        .unwrap();
    population
}

#[test]
fn population_members_get_independent_tables() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.5);
    let population = population_of(&[0.5, 2.0, 40.0]);
    let mut target = MemoryPopulationTarget::new();

    let report = converter
        .convert_population(
            &subject,
            &population,
            &mut target,
            PopulationOptions::default(),
        )
        .unwrap();
    assert_eq!(report.individuals, 3);
    assert!(report.failures.is_empty());
    assert!(!report.cancelled);

    // younger members see more future calibration ages
    let young = target.table("Organism|Liver|Volume", 0).unwrap();
    let adult = target.table("Organism|Liver|Volume", 2).unwrap();
    assert_eq!(young.len(), 5);
    assert_eq!(adult.len(), 2);
    // each anchor is the member's own value
    assert_relative_eq!(young.points()[0].value(), 0.55, epsilon = 1e-12);
    assert_relative_eq!(adult.points()[0].value(), 4.5, epsilon = 1e-12);
}

#[test]
fn seeded_population_randomization_is_reproducible() {
    let mut set = CalibrationSet::new();
    for (pma, factor) in [(0.77, 0.1), (5.0, 0.8), (20.0, 1.0)] {
        set.add_ontogeny_row(ontogeny_row(pma, factor, 1.4));
    }
    let catalog = DistributionCatalog::new(set, SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = Subject::builder(origin(2.0, 86.0, Gender::Male))
        .molecule(Molecule::new("CYP3A4", Some("CYP3A4".to_string()), 0.5, 0.2))
        .build();
    let population = PopulationData::new(
        vec![0.5, 1.0, 2.0],
        vec![None; 3],
        vec![80.0; 3],
        vec![Gender::Male; 3],
    )
    .unwrap();

    let run = |seed| {
        let mut target = MemoryPopulationTarget::new();
        converter
            .convert_population(
                &subject,
                &population,
                &mut target,
                PopulationOptions {
                    seed: Some(seed),
                    cancel: None,
                },
            )
            .unwrap();
        target
    };
    let first = run(99);
    let second = run(99);
    let other = run(100);

    let path = "Organism|CYP3A4|Ontogeny factor";
    assert_eq!(first.tables_for(path), second.tables_for(path));
    assert_ne!(first.tables_for(path), other.tables_for(path));
    // different members draw different percentiles
    assert_ne!(
        first.table(path, 0).unwrap().points()[1].value(),
        first.table(path, 1).unwrap().points()[1].value()
    );
}

#[test]
fn failing_individuals_do_not_poison_the_population() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.5);
    let mut population = population_of(&[0.5, 2.0, 40.0]);
    // the middle member carries an unusable percentile
    population
        .set_parameter(
            "Organism|Liver|Volume",
            vec![0.55, 0.7, 4.5],
            vec![0.3, f64::NAN, 0.8],
        )
        .unwrap();
    let mut target = MemoryPopulationTarget::new();

    let report = converter
        .convert_population(
            &subject,
            &population,
            &mut target,
            PopulationOptions::default(),
        )
        .unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 1);
    assert!(target.table("Organism|Liver|Volume", 0).is_some());
    assert!(target.table("Organism|Liver|Volume", 1).is_none());
    assert!(target.table("Organism|Liver|Volume", 2).is_some());
}

#[test]
fn cancellation_stops_remaining_individuals() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.5);
    let population = population_of(&[0.5, 2.0, 40.0]);
    let cancel = AtomicBool::new(false);
    cancel.store(true, Ordering::Relaxed);
    let mut target = MemoryPopulationTarget::new();

    let report = converter
        .convert_population(
            &subject,
            &population,
            &mut target,
            PopulationOptions {
                seed: None,
                cancel: Some(&cancel),
            },
        )
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.tables_written, 0);
    assert!(target.is_empty());
}

#[test]
fn table_formulas_survive_serialization() {
    let catalog = DistributionCatalog::new(liver_calibration(), SPECIES);
    let converter = AgingConverter::new(&catalog);
    let subject = liver_subject(0.6);
    let mut target = MemoryTarget::for_subject(&subject);
    converter.convert(&subject, &mut target).unwrap();

    let table = target.table("Organism|Liver|Volume").unwrap();
    let json = serde_json::to_string(table).unwrap();
    let back: TableFormula = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, table);
}
