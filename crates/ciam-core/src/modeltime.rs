//! Period index: the mapping between zero-based model periods and calendar
//! years.
//!
//! A [`ModeltimeSpec`] is the parsed, unfinalized description of the time
//! horizon. Calling [`ModeltimeSpec::set`] validates it and produces an
//! immutable [`Modeltime`] lookup table.
//!
//! # Design Principles
//!
//! - The year list is computed once in `set()` and never mutated; every
//!   period/year query is a table lookup.
//! - Years are strictly increasing, so year-to-period lookups use binary
//!   search.
//! - Callers never do year arithmetic themselves.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::xml::XmlWriter;

/// Errors that can occur when finalizing a period index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeltimeError {
    /// No timestep segments were given, so there is nothing to simulate.
    #[error("modeltime needs at least one timestep segment")]
    NoTimesteps,

    /// A segment declared a zero-year step.
    #[error("timestep ending in {until_year} has a zero-year step")]
    ZeroStep {
        /// Last year of the offending segment.
        until_year: i32,
    },

    /// A segment does not end after the previous boundary.
    #[error("timestep ending in {until_year} does not follow {previous}")]
    NonIncreasing {
        /// Last year of the offending segment.
        until_year: i32,
        /// Boundary the segment had to exceed.
        previous: i32,
    },

    /// A segment's length is not a multiple of its step.
    #[error("span {previous}..{until_year} is not a multiple of {step} years")]
    UnevenSegment {
        /// First boundary of the segment.
        previous: i32,
        /// Last year of the segment.
        until_year: i32,
        /// The declared step.
        step: u32,
    },

    /// Year arithmetic left the `i32` range.
    #[error("year arithmetic overflow")]
    Overflow,
}

/// One run of equally spaced periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepSpec {
    /// Last year covered by this segment (inclusive).
    pub until_year: i32,
    /// Years between consecutive periods in this segment.
    pub step: u32,
}

/// Unfinalized period-index definition as it appears in a scenario document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeltimeSpec {
    /// Calendar year of period 0.
    pub start_year: i32,
    /// Consecutive segments after the start year.
    #[serde(default)]
    pub timesteps: Vec<TimestepSpec>,
}

impl ModeltimeSpec {
    /// Validate the definition and build the immutable period index.
    ///
    /// # Errors
    ///
    /// Returns [`ModeltimeError`] if the segments are empty, not strictly
    /// increasing, have a zero step, or do not divide evenly.
    pub fn set(&self) -> Result<Modeltime, ModeltimeError> {
        if self.timesteps.is_empty() {
            return Err(ModeltimeError::NoTimesteps);
        }

        let mut years = vec![self.start_year];
        let mut boundary = self.start_year;

        for segment in &self.timesteps {
            if segment.step == 0 {
                return Err(ModeltimeError::ZeroStep {
                    until_year: segment.until_year,
                });
            }
            if segment.until_year <= boundary {
                return Err(ModeltimeError::NonIncreasing {
                    until_year: segment.until_year,
                    previous: boundary,
                });
            }

            let step = i32::try_from(segment.step).map_err(|_err| ModeltimeError::Overflow)?;
            let span = segment
                .until_year
                .checked_sub(boundary)
                .ok_or(ModeltimeError::Overflow)?;
            if span.checked_rem(step).ok_or(ModeltimeError::Overflow)? != 0 {
                return Err(ModeltimeError::UnevenSegment {
                    previous: boundary,
                    until_year: segment.until_year,
                    step: segment.step,
                });
            }

            let mut year = boundary;
            while year < segment.until_year {
                year = year.checked_add(step).ok_or(ModeltimeError::Overflow)?;
                years.push(year);
            }
            boundary = segment.until_year;
        }

        Ok(Modeltime {
            spec: self.clone(),
            years,
        })
    }
}

/// Finalized, immutable period index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modeltime {
    /// The definition this table was built from (kept for serialization).
    spec: ModeltimeSpec,
    /// Calendar year of each period, strictly increasing.
    years: Vec<i32>,
}

impl Modeltime {
    /// Total number of periods in the run.
    pub fn max_period(&self) -> usize {
        self.years.len()
    }

    /// Iterate over all period numbers.
    pub fn periods(&self) -> Range<usize> {
        0..self.years.len()
    }

    /// Calendar year of `period`, or `None` past the horizon.
    pub fn period_to_year(&self, period: usize) -> Option<i32> {
        self.years.get(period).copied()
    }

    /// Period whose calendar year is exactly `year`.
    pub fn year_to_period(&self, year: i32) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    /// Length in years of the step that ends at `period`.
    ///
    /// Period 0 reports the step of the first segment.
    pub fn timestep(&self, period: usize) -> Option<u32> {
        if period == 0 {
            return self.spec.timesteps.first().map(|segment| segment.step);
        }
        let current = *self.years.get(period)?;
        let previous = *self.years.get(period.checked_sub(1)?)?;
        u32::try_from(current.checked_sub(previous)?).ok()
    }

    /// All period years in order.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Calendar year of period 0.
    pub const fn start_year(&self) -> i32 {
        self.spec.start_year
    }

    /// Calendar year of the last period.
    pub fn end_year(&self) -> i32 {
        self.years.last().copied().unwrap_or(self.spec.start_year)
    }

    /// The definition this index was built from.
    pub const fn spec(&self) -> &ModeltimeSpec {
        &self.spec
    }

    /// Serialize the definition.
    pub fn write_xml(&self, xml: &mut XmlWriter<'_>) -> std::io::Result<()> {
        xml.open("modeltime", &[])?;
        xml.element("start-year", self.spec.start_year)?;
        for segment in &self.spec.timesteps {
            let until = segment.until_year.to_string();
            xml.element_with_attrs("timestep", &[("until-year", &until)], segment.step)?;
        }
        xml.close("modeltime")
    }

    /// Write the period/year block of the debug trace.
    pub fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> std::io::Result<()> {
        xml.open("modeltime", &[])?;
        xml.element("period", period)?;
        if let Some(year) = self.period_to_year(period) {
            xml.element("year", year)?;
        }
        xml.element("max-period", self.max_period())?;
        xml.close("modeltime")
    }
}
