use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::{DistributionMetaData, MINUTES_PER_YEAR};

/// Error type for table formula construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Table points must have strictly increasing time offsets: {time} follows {previous}")]
    NonIncreasingTime { previous: f64, time: f64 },
    #[error("The first table point must be at time offset 0, got {time}")]
    FirstPointNotAtZero { time: f64 },
}

/// One point of a table formula
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TablePoint {
    time: f64,
    value: f64,
    metadata: Option<DistributionMetaData>,
}

impl TablePoint {
    /// Time offset from the start of the simulation, in minutes
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Provenance of the point, when it was derived from a calibration row
    pub fn metadata(&self) -> Option<&DistributionMetaData> {
        self.metadata.as_ref()
    }
}

/// A function represented as an explicit ordered list of (time, value) points
///
/// The consuming simulator interpolates linearly between points. Invariants:
/// the first point sits at time offset 0 (anchoring "now") and offsets are
/// strictly increasing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableFormula {
    name: String,
    points: Vec<TablePoint>,
}

impl TableFormula {
    pub fn new(name: impl Into<String>) -> Self {
        TableFormula {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Add a point without provenance
    pub fn add_point(&mut self, time: f64, value: f64) -> Result<(), TableError> {
        self.push(TablePoint {
            time,
            value,
            metadata: None,
        })
    }

    /// Add a point carrying the distribution it was derived from
    pub fn add_point_with_metadata(
        &mut self,
        time: f64,
        value: f64,
        metadata: DistributionMetaData,
    ) -> Result<(), TableError> {
        self.push(TablePoint {
            time,
            value,
            metadata: Some(metadata),
        })
    }

    fn push(&mut self, point: TablePoint) -> Result<(), TableError> {
        match self.points.last() {
            None if point.time != 0.0 => {
                return Err(TableError::FirstPointNotAtZero { time: point.time })
            }
            Some(last) if point.time <= last.time => {
                return Err(TableError::NonIncreasingTime {
                    previous: last.time,
                    time: point.time,
                })
            }
            _ => {}
        }
        self.points.push(point);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[TablePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Evaluate the table at a time offset in minutes
    ///
    /// Linear interpolation between points; outside the covered range the
    /// edge value is carried, matching the consuming simulator's behavior.
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let first = self.points.first()?;
        if time <= first.time {
            return Some(first.value);
        }
        let last = self.points.last()?;
        if time >= last.time {
            return Some(last.value);
        }
        let segment = self.points.windows(2).find(|w| time <= w[1].time)?;
        let (a, b) = (&segment[0], &segment[1]);
        let slope = (b.value - a.value) / (b.time - a.time);
        Some(a.value + slope * (time - a.time))
    }
}

impl fmt::Display for TableFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table '{}':", self.name)?;
        for point in &self.points {
            writeln!(f, "  {:.2} y -> {:.6}", point.time / MINUTES_PER_YEAR, point.value)?;
        }
        Ok(())
    }
}

/// The age parameter rebuilt as a pure function of simulated time
///
/// Anchored by two hidden auxiliary parameters: the age at conversion time
/// and the minute-to-year conversion factor. The simulated age then advances
/// without any external callback: `age(t) = age_0 + t * factor`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgeFormula {
    age_0: f64,
    min_to_year_factor: f64,
}

impl AgeFormula {
    pub fn new(age_0: f64) -> Self {
        AgeFormula {
            age_0,
            min_to_year_factor: 1.0 / MINUTES_PER_YEAR,
        }
    }

    /// Age at conversion time, in years
    pub fn age_0(&self) -> f64 {
        self.age_0
    }

    pub fn min_to_year_factor(&self) -> f64 {
        self.min_to_year_factor
    }

    /// Age in years after `time` minutes of simulated time
    pub fn value_at(&self, time: f64) -> f64 {
        self.age_0 + time * self.min_to_year_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_point_must_be_at_zero() {
        let mut table = TableFormula::new("t");
        assert_eq!(
            table.add_point(1.0, 2.0),
            Err(TableError::FirstPointNotAtZero { time: 1.0 })
        );
        assert!(table.add_point(0.0, 2.0).is_ok());
    }

    #[test]
    fn offsets_must_strictly_increase() {
        let mut table = TableFormula::new("t");
        table.add_point(0.0, 1.0).unwrap();
        table.add_point(10.0, 2.0).unwrap();
        assert_eq!(
            table.add_point(10.0, 3.0),
            Err(TableError::NonIncreasingTime {
                previous: 10.0,
                time: 10.0
            })
        );
        assert!(table.add_point(10.5, 3.0).is_ok());
    }

    #[test]
    fn evaluates_linearly_and_clamps_at_edges() {
        let mut table = TableFormula::new("t");
        table.add_point(0.0, 1.0).unwrap();
        table.add_point(10.0, 3.0).unwrap();
        assert_relative_eq!(table.value_at(5.0).unwrap(), 2.0);
        assert_eq!(table.value_at(-1.0).unwrap(), 1.0);
        assert_eq!(table.value_at(100.0).unwrap(), 3.0);
    }

    #[test]
    fn age_formula_advances_with_time() {
        let age = AgeFormula::new(30.0);
        assert_eq!(age.value_at(0.0), 30.0);
        assert_relative_eq!(age.value_at(MINUTES_PER_YEAR), 31.0, epsilon = 1e-12);
    }
}
