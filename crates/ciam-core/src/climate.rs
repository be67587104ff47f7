//! Climate handoff: the boundary where accumulated emissions leave the
//! model.
//!
//! After the time loop the driver writes one plain-text data file and,
//! when configured, runs an external climate program on it. The program's
//! result is logged and otherwise ignored; nothing downstream of the
//! handoff feeds back into the run.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use serde::Serialize;
use tracing::{info, warn};

/// Emission totals per gas per period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmissionsTotals {
    years: Vec<i32>,
    by_gas: BTreeMap<String, Vec<f64>>,
}

impl EmissionsTotals {
    /// Create empty totals for the given period years.
    pub const fn new(years: Vec<i32>) -> Self {
        Self {
            years,
            by_gas: BTreeMap::new(),
        }
    }

    /// Add `amount` of `gas` to `period`'s total.
    ///
    /// Periods outside the horizon are ignored.
    pub fn add(&mut self, gas: &str, period: usize, amount: f64) {
        let period_count = self.years.len();
        let series = self
            .by_gas
            .entry(gas.to_owned())
            .or_insert_with(|| vec![0.0; period_count]);
        if let Some(total) = series.get_mut(period) {
            *total += amount;
        }
    }

    /// Period years the totals are indexed by.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Gas names in sorted order.
    pub fn gases(&self) -> impl Iterator<Item = &str> {
        self.by_gas.keys().map(String::as_str)
    }

    /// Per-period totals of one gas.
    pub fn series(&self, gas: &str) -> Option<&[f64]> {
        self.by_gas.get(gas).map(Vec::as_slice)
    }

    /// Total of one gas in one period.
    pub fn total(&self, gas: &str, period: usize) -> Option<f64> {
        self.by_gas.get(gas)?.get(period).copied()
    }

    /// Emissions of one gas accumulated over the horizon, weighting each
    /// period by the number of years it represents.
    pub fn cumulative(&self, gas: &str) -> f64 {
        let Some(series) = self.by_gas.get(gas) else {
            return 0.0;
        };
        series
            .iter()
            .enumerate()
            .map(|(period, value)| value * f64::from(self.period_length(period)))
            .sum()
    }

    /// Whether no gas has been recorded.
    pub fn is_empty(&self) -> bool {
        self.by_gas.is_empty()
    }

    /// Years represented by `period`; period 0 borrows the first step.
    fn period_length(&self, period: usize) -> i32 {
        let (from, to) = if period == 0 { (0, 1) } else { (period.saturating_sub(1), period) };
        match (self.years.get(from), self.years.get(to)) {
            (Some(start), Some(end)) => end.saturating_sub(*start),
            _ => 1,
        }
    }
}

/// Write the climate model input file.
///
/// Layout: the number of years, the scenario name, a `Year,<gas>,...`
/// header, then one row per period.
pub fn write_climate_data(
    out: &mut dyn Write,
    scenario_name: &str,
    totals: &EmissionsTotals,
) -> io::Result<()> {
    writeln!(out, "{}", totals.years.len())?;
    writeln!(out, "{scenario_name}")?;

    write!(out, "Year")?;
    for gas in totals.gases() {
        write!(out, ",{gas}")?;
    }
    writeln!(out)?;

    for (period, year) in totals.years.iter().enumerate() {
        write!(out, "{year}")?;
        for series in totals.by_gas.values() {
            let value = series.get(period).copied().unwrap_or(0.0);
            write!(out, ",{value}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// An independent climate-response computation fed by the data file.
pub trait ClimateModel {
    /// Run the computation on `data_file`. Failures are the model's own
    /// business and are never reported back.
    fn run(&mut self, data_file: &Path);
}

/// Skips the climate computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClimateModel;

impl ClimateModel for NoClimateModel {
    fn run(&mut self, data_file: &Path) {
        info!(data_file = %data_file.display(), "No climate model configured");
    }
}

/// Runs an external program synchronously with the data file path as its
/// final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalClimateModel {
    program: String,
    args: Vec<String>,
}

impl ExternalClimateModel {
    /// Build from an argv list. Returns `None` for an empty command.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl ClimateModel for ExternalClimateModel {
    fn run(&mut self, data_file: &Path) {
        info!(program = self.program, data_file = %data_file.display(), "Calling climate model");
        match Command::new(&self.program)
            .args(&self.args)
            .arg(data_file)
            .status()
        {
            Ok(status) => info!(%status, "Finished with climate model"),
            Err(e) => warn!(error = %e, program = self.program, "Climate model could not be started"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn totals() -> EmissionsTotals {
        let mut totals = EmissionsTotals::new(vec![2000, 2010, 2030]);
        totals.add("CO2", 0, 1.0);
        totals.add("CO2", 1, 2.0);
        totals.add("CO2", 1, 0.5);
        totals.add("CO2", 2, 3.0);
        totals.add("CH4", 2, 0.25);
        totals
    }

    #[test]
    fn add_accumulates_per_period() {
        let totals = totals();
        assert_eq!(totals.total("CO2", 1), Some(2.5));
        assert_eq!(totals.total("CH4", 0), Some(0.0));
        assert_eq!(totals.total("N2O", 0), None);
        assert_eq!(totals.gases().collect::<Vec<_>>(), vec!["CH4", "CO2"]);
    }

    #[test]
    fn out_of_range_period_is_ignored() {
        let mut totals = totals();
        totals.add("CO2", 9, 100.0);
        assert_eq!(totals.series("CO2").unwrap(), &[1.0, 2.5, 3.0]);
    }

    #[test]
    fn cumulative_weights_by_period_length() {
        let totals = totals();
        // 1.0 * 10 + 2.5 * 10 + 3.0 * 20
        assert_eq!(totals.cumulative("CO2"), 95.0);
        assert_eq!(totals.cumulative("SF6"), 0.0);
    }

    #[test]
    fn climate_data_layout() {
        let mut out = Vec::new();
        write_climate_data(&mut out, "reference", &totals()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "3\nreference\nYear,CH4,CO2\n2000,0,1\n2010,0,2.5\n2030,0.25,3\n"
        );
    }

    #[test]
    fn empty_command_builds_no_external_model() {
        assert!(ExternalClimateModel::from_command(&[]).is_none());
        let model = ExternalClimateModel::from_command(&["magicc".to_owned(), "-q".to_owned()]);
        assert_eq!(
            model,
            Some(ExternalClimateModel {
                program: "magicc".to_owned(),
                args: vec!["-q".to_owned()],
            })
        );
    }
}
