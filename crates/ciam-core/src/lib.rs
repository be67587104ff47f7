//! Period-stepped run driver for the CIAM integrated assessment model.
//!
//! This crate owns the scenario aggregate and the simulation loop that
//! steps it through time: reset, carryover, calculate, solve, summarize,
//! emit. The world model itself is a collaborator reached through the
//! [`WorldModel`] trait.
//!
//! # Modules
//!
//! - [`climate`] -- Emission totals, the climate data file, and the
//!   [`ClimateModel`] step.
//! - [`config`] -- Configuration loading from `ciam-config.yaml` into
//!   strongly-typed structs.
//! - [`document`] -- Typed scenario documents parsed from YAML or JSON.
//! - [`market`] -- Per-period price/supply/demand registers and carryover.
//! - [`modeltime`] -- Period number to calendar year lookup.
//! - [`runner`] -- [`run_scenario`], the period loop.
//! - [`scenario`] -- The [`Scenario`] aggregate and document application.
//! - [`sinks`] -- [`OutputSinks`] with file and in-memory implementations.
//! - [`solver`] -- [`MarketSolver`] trait and [`BisectNewtonSolver`].
//! - [`trace`] -- Debug XML and supply/demand CSV traces.
//! - [`world`] -- [`WorldCalc`] and [`WorldModel`] traits.
//! - [`xml`] -- Indented XML writer.
//!
//! [`ClimateModel`]: climate::ClimateModel
//! [`run_scenario`]: runner::run_scenario
//! [`Scenario`]: scenario::Scenario
//! [`OutputSinks`]: sinks::OutputSinks
//! [`MarketSolver`]: solver::MarketSolver
//! [`BisectNewtonSolver`]: solver::BisectNewtonSolver
//! [`WorldCalc`]: world::WorldCalc
//! [`WorldModel`]: world::WorldModel

pub mod climate;
pub mod config;
pub mod document;
pub mod market;
pub mod modeltime;
pub mod runner;
pub mod scenario;
pub mod sinks;
pub mod solver;
pub mod trace;
pub mod world;
pub mod xml;
