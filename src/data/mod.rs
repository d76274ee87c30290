pub mod origin;
pub mod population;
pub mod sample;
pub mod subject;
pub mod table;

pub use origin::*;
pub use population::*;
pub use sample::*;
pub use subject::*;
pub use table::*;

/// Well-known parameter names
pub mod names {
    pub const ORGANISM: &str = "Organism";
    pub const AGE: &str = "Age";
    pub const AGE_0: &str = "Age_0";
    pub const MIN_TO_YEAR_FACTOR: &str = "Min2YearFactor";
    pub const HEIGHT: &str = "Height";
    pub const MEAN_HEIGHT: &str = "Mean height";
    pub const MEAN_WEIGHT: &str = "Mean weight";
    pub const VOLUME: &str = "Volume";
    pub const ONTOGENY_FACTOR: &str = "Ontogeny factor";
    pub const ONTOGENY_FACTOR_GI: &str = "Ontogeny factor GI";
    pub const ONTOGENY_FACTOR_ALBUMIN: &str = "Ontogeny factor (albumin)";
    pub const ONTOGENY_FACTOR_AGP: &str = "Ontogeny factor (alpha1-acid glycoprotein)";
}

/// Anatomical group names used to key ontogeny calibration rows
pub mod groups {
    pub const LIVER: &str = "Liver";
    pub const DUODENUM: &str = "Duodenum";
    pub const PLASMA: &str = "Plasma";
}

/// Separator between segments of a parameter path
pub const PATH_SEPARATOR: char = '|';
