//! The period-stepped run driver.
//!
//! [`run_scenario`] is the only code that knows the order of operations.
//! Period 0 is a fixed bootstrap point: prices are initialized, the world is
//! evaluated once, and nothing is solved. Every later period runs
//!
//! 1. null demands and supplies,
//! 2. carry the previous period's converged state into the shadow and seed
//!    the new period's prices from it,
//! 3. `init_calc`, `calc`, then solve,
//! 4. summarize and compute emissions,
//! 5. append to the traces and (optionally) export a graph.
//!
//! Reordering these steps does not fail loudly; it silently corrupts the
//! trajectory. Output failures are logged and skipped so the run always
//! reaches the end of the horizon.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::climate::{ClimateModel, write_climate_data};
use crate::config::RunConfig;
use crate::market::Marketplace;
use crate::scenario::{Scenario, ScenarioError, ScenarioParts, xml_date};
use crate::sinks::{OutputSinks, SinkError};
use crate::solver::{MarketSolver, SolveReport};
use crate::trace::{DebugTrace, SupplyDemandTrace};
use crate::world::WorldModel;

/// Errors that stop a run before the first period.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The scenario is missing a part.
    #[error("scenario error: {source}")]
    Scenario {
        /// The underlying scenario error.
        #[from]
        source: ScenarioError,
    },
}

/// The configuration toggles the loop reads.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Set up calibration markets before the first price initialization.
    pub calibration_active: bool,
    /// Write the sector dependency report after period 0.
    pub print_sector_dependencies: bool,
    /// Write a dependency graph for every solved period.
    pub print_dependency_graphs: bool,
}

impl From<&RunConfig> for RunOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            calibration_active: config.calibration_active,
            print_sector_dependencies: config.print_sector_dependencies,
            print_dependency_graphs: config.print_dependency_graphs,
        }
    }
}

/// What happened in one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodSummary {
    /// Period number.
    pub period: usize,
    /// Calendar year of the period.
    pub year: i32,
    /// Solver report; `None` for the unsolved bootstrap period.
    pub solved: Option<SolveReport>,
}

/// Callback invoked after each period completes.
pub trait PeriodCallback {
    /// Called once per period, period 0 included, after its outputs are
    /// written.
    fn on_period(&mut self, summary: &PeriodSummary, marketplace: &Marketplace);
}

/// A no-op period callback.
pub struct NoOpCallback;

impl PeriodCallback for NoOpCallback {
    fn on_period(&mut self, _summary: &PeriodSummary, _marketplace: &Marketplace) {}
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Number of periods run.
    pub periods: usize,
    /// Year of the last period.
    pub final_year: i32,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Solver reports for periods 1 onward, in order.
    pub solve_reports: Vec<SolveReport>,
}

impl RunSummary {
    /// Number of solved periods whose markets did not converge.
    pub fn unconverged_periods(&self) -> usize {
        self.solve_reports
            .iter()
            .filter(|report| !report.converged)
            .count()
    }
}

/// Collaborators for one run.
pub struct RunContext<'a> {
    /// Configuration toggles.
    pub options: RunOptions,
    /// Equilibrium solver.
    pub solver: &'a mut dyn MarketSolver,
    /// Output writers.
    pub sinks: &'a dyn OutputSinks,
    /// Climate step after the time loop.
    pub climate: &'a mut dyn ClimateModel,
    /// Per-period observer.
    pub callback: &'a mut dyn PeriodCallback,
    /// Timestamp stamped on the debug trace.
    pub started_at: DateTime<Utc>,
}

/// Run every period of `scenario` in order.
///
/// The scenario must have been through [`Scenario::complete_init`].
///
/// # Errors
///
/// Returns [`RunError`] if the scenario has no period index or no world.
/// Nothing that happens once the loop has started is an error.
pub fn run_scenario<W: WorldModel>(
    scenario: &mut Scenario<W>,
    context: RunContext<'_>,
) -> Result<RunSummary, RunError> {
    let RunContext {
        options,
        solver,
        sinks,
        climate,
        callback,
        started_at,
    } = context;

    let mut parts = scenario.parts_mut()?;
    let max_period = parts.modeltime.max_period();
    let date = xml_date(started_at);
    info!(
        scenario = parts.name,
        max_period,
        calibration_active = options.calibration_active,
        "Scenario run starting"
    );

    let mut debug_trace = DebugTrace::new(open_or_discard(sinks.debug_trace()));
    let mut sd_trace = SupplyDemandTrace::new(open_or_discard(sinks.supply_demand_trace()));

    run_first_period(&mut parts, options, sinks, &mut debug_trace, &date, callback);

    let mut solve_reports = Vec::with_capacity(max_period.saturating_sub(1));
    for period in 1..max_period {
        let report = run_period(
            &mut parts,
            options,
            &mut *solver,
            sinks,
            &mut debug_trace,
            &mut sd_trace,
            period,
        );
        let summary = PeriodSummary {
            period,
            year: year_of(&parts, period),
            solved: Some(report),
        };
        callback.on_period(&summary, parts.marketplace);
        solve_reports.push(report);
    }

    parts.write_debug_close(&mut debug_trace);

    parts.world.calculate_emissions_totals();
    hand_off_climate_data(&parts, sinks, climate);

    debug_trace.finish();
    sd_trace.finish();

    let summary = RunSummary {
        periods: max_period,
        final_year: parts.modeltime.end_year(),
        started_at,
        solve_reports,
    };
    info!(
        scenario = parts.name,
        periods = summary.periods,
        final_year = summary.final_year,
        unconverged_periods = summary.unconverged_periods(),
        "Scenario run complete"
    );
    Ok(summary)
}

/// The bootstrap period: evaluated once, never solved.
fn run_first_period<W: WorldModel>(
    parts: &mut ScenarioParts<'_, W>,
    options: RunOptions,
    sinks: &dyn OutputSinks,
    debug_trace: &mut DebugTrace,
    date: &str,
    callback: &mut dyn PeriodCallback,
) {
    let period = 0;

    if options.calibration_active {
        info!("Setting up calibration markets");
        parts.world.setup_calibration_markets(parts.marketplace);
    }

    parts.marketplace.init_prices();
    parts.marketplace.null_demands(period);
    parts.marketplace.null_supplies(period);

    parts.write_debug_open(debug_trace, date, period);

    parts.world.calc(parts.marketplace, period);
    parts.world.update_summary(parts.marketplace, period);
    parts.world.emiss_ind(period);

    let year = year_of(parts, period);
    info!(period, year, "Period");
    info!(period, "Period 0 not solved");

    if options.print_sector_dependencies {
        export_sector_dependencies(parts, sinks);
    }

    let summary = PeriodSummary {
        period,
        year,
        solved: None,
    };
    callback.on_period(&summary, parts.marketplace);
}

/// One steady-state period.
fn run_period<W: WorldModel>(
    parts: &mut ScenarioParts<'_, W>,
    options: RunOptions,
    solver: &mut dyn MarketSolver,
    sinks: &dyn OutputSinks,
    debug_trace: &mut DebugTrace,
    sd_trace: &mut SupplyDemandTrace,
    period: usize,
) -> SolveReport {
    let year = year_of(parts, period);
    info!(period, year, "Period");
    sd_trace.write_period_header(period, year);

    parts.marketplace.null_demands(period);
    parts.marketplace.null_supplies(period);
    parts.marketplace.store_to_last(period);
    parts.marketplace.init_to_last(period);
    debug!(period, "Carried previous period into shadow state");

    parts.world.init_calc(parts.marketplace, period);
    parts.world.calc(parts.marketplace, period);
    let report = parts.marketplace.solve(solver, &mut *parts.world, period);
    parts.world.update_summary(parts.marketplace, period);
    parts.world.emiss_ind(period);

    parts.write_debug_period(debug_trace, period);
    sd_trace.write_markets(parts.marketplace, period);

    if options.print_dependency_graphs {
        export_graph(parts, sinks, period);
    }

    report
}

fn year_of<W>(parts: &ScenarioParts<'_, W>, period: usize) -> i32 {
    parts
        .modeltime
        .period_to_year(period)
        .unwrap_or_else(|| parts.modeltime.end_year())
}

fn export_graph<W: WorldModel>(parts: &ScenarioParts<'_, W>, sinks: &dyn OutputSinks, period: usize) {
    let mut out = match sinks.dependency_graph(period) {
        Ok(out) => out,
        Err(e) => {
            warn!(period, error = %e, "Dependency graph skipped");
            return;
        }
    };
    let result = parts
        .world
        .print_graphs(&mut out, period)
        .and_then(|()| out.flush());
    if let Err(e) = result {
        warn!(period, error = %e, "Dependency graph write failed");
    }
}

fn export_sector_dependencies<W: WorldModel>(parts: &ScenarioParts<'_, W>, sinks: &dyn OutputSinks) {
    let mut out = match sinks.sector_dependencies() {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "Sector dependency report skipped");
            return;
        }
    };
    let result = parts
        .world
        .print_sector_dependencies(&mut out)
        .and_then(|()| out.flush());
    if let Err(e) = result {
        warn!(error = %e, "Sector dependency report write failed");
    }
}

/// Write the climate data file and, once it is closed, run the climate
/// model on it.
fn hand_off_climate_data<W: WorldModel>(
    parts: &ScenarioParts<'_, W>,
    sinks: &dyn OutputSinks,
    climate: &mut dyn ClimateModel,
) {
    let written = match sinks.climate_data() {
        Ok(mut out) => write_climate_data(&mut out, parts.name, parts.world.emissions_totals())
            .and_then(|()| out.flush()),
        Err(e) => {
            warn!(error = %e, "Climate data file skipped");
            return;
        }
    };
    if let Err(e) = written {
        warn!(error = %e, "Climate data write failed");
        return;
    }
    match sinks.climate_data_path() {
        Some(path) => climate.run(&path),
        None => debug!("Climate data has no path, climate model not run"),
    }
}

fn open_or_discard(opened: Result<Box<dyn Write>, SinkError>) -> Box<dyn Write> {
    opened.unwrap_or_else(|e| {
        warn!(error = %e, "Output discarded");
        Box::new(io::sink())
    })
}
