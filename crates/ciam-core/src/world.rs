//! World model traits: the operations the run driver needs from the
//! region/sector/technology graph.
//!
//! The driver never looks inside the world. It calls whole-graph
//! operations keyed by period, in a fixed order, and hands the market state
//! in whenever the world needs to read prices or contribute quantities.
//!
//! [`WorldCalc`] is the object-safe slice a [`MarketSolver`] needs to
//! re-evaluate supply and demand during its iterations. [`WorldModel`] adds
//! construction, per-period setup, reporting, and export hooks.
//!
//! [`MarketSolver`]: crate::solver::MarketSolver

use std::io::{self, Write};

use serde::de::DeserializeOwned;

use crate::climate::EmissionsTotals;
use crate::market::Marketplace;
use crate::modeltime::Modeltime;
use crate::xml::XmlWriter;

/// One supply/demand evaluation pass over the whole world.
pub trait WorldCalc {
    /// Read `period`'s prices and add every object's supply and demand to
    /// the market registers.
    ///
    /// The caller is responsible for nulling the registers first; this call
    /// only accumulates.
    fn calc(&mut self, marketplace: &mut Marketplace, period: usize);
}

/// The full world model contract used by the scenario and run driver.
pub trait WorldModel: WorldCalc + Sized {
    /// Typed definition of (part of) the world, as found under a `world`
    /// node of a scenario document.
    type Spec: DeserializeOwned;

    /// Error returned when the world cannot complete initialization.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create an empty world whose period-indexed storage is sized from
    /// `modeltime`.
    fn new(modeltime: &Modeltime) -> Self;

    /// Merge a parsed definition into this world.
    ///
    /// Called once per `world` node; later definitions augment earlier
    /// ones.
    fn apply_spec(&mut self, spec: Self::Spec);

    /// Finish initialization after all definitions are applied, creating
    /// every market the world trades in.
    ///
    /// # Errors
    ///
    /// Returns [`WorldModel::Error`] if the assembled world is unusable.
    fn complete_init(&mut self, marketplace: &mut Marketplace) -> Result<(), Self::Error>;

    /// Create the markets that calibrate the world to reference data.
    ///
    /// Runs at most once per run, before the first price initialization.
    fn setup_calibration_markets(&mut self, marketplace: &mut Marketplace);

    /// Per-period setup that must not be repeated inside solver iterations.
    fn init_calc(&mut self, marketplace: &mut Marketplace, period: usize);

    /// Refresh reporting summaries from `period`'s converged state.
    fn update_summary(&mut self, marketplace: &Marketplace, period: usize);

    /// Compute `period`'s industrial emissions.
    fn emiss_ind(&mut self, period: usize);

    /// Aggregate emissions across all periods once the time loop is done.
    fn calculate_emissions_totals(&mut self);

    /// Emissions aggregated by [`WorldModel::calculate_emissions_totals`].
    fn emissions_totals(&self) -> &EmissionsTotals;

    /// Serialize the world definition.
    fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()>;

    /// Write `period`'s state to the debug trace.
    fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()>;

    /// Write `period`'s sector dependency graph in DOT format.
    fn print_graphs(&self, out: &mut dyn Write, period: usize) -> io::Result<()>;

    /// Write every region's sector dependencies as CSV.
    fn print_sector_dependencies(&self, out: &mut dyn Write) -> io::Result<()>;
}
