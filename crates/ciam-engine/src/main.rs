//! Run driver binary for the CIAM integrated assessment model.
//!
//! This is the main entry point that wires together configuration,
//! scenario documents, the reference world, output sinks, the equilibrium
//! solver, and the climate step, then runs one scenario over its whole
//! time horizon.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument,
//!    `CIAM_CONFIG`, or `ciam-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Load the base scenario document and every add-on
//! 4. Complete scenario initialization (world markets)
//! 5. Create output sinks, solver, and climate model
//! 6. Run the period loop
//! 7. Write the serialized scenario
//! 8. Log the result

mod error;
mod progress;

use std::path::{Path, PathBuf};

use chrono::Utc;
use ciam_core::climate::{ClimateModel, ExternalClimateModel, NoClimateModel};
use ciam_core::config::{LogFormat, LoggingConfig, RunConfig};
use ciam_core::document::ScenarioDocument;
use ciam_core::runner::{RunContext, RunOptions, run_scenario};
use ciam_core::scenario::{Scenario, xml_date};
use ciam_core::sinks::{FileSinks, OutputSinks};
use ciam_core::solver::BisectNewtonSolver;
use ciam_core::xml::XmlWriter;
use ciam_world::{ReferenceWorld, WorldSpec};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::progress::ProgressCallback;

/// Environment variable naming the configuration file.
const CONFIG_ENV: &str = "CIAM_CONFIG";

/// Configuration file used when neither an argument nor `CIAM_CONFIG`
/// names one.
const DEFAULT_CONFIG_FILE: &str = "ciam-config.yaml";

/// Application entry point for the run driver.
///
/// # Errors
///
/// Returns an error if configuration, document loading, scenario
/// initialization, or output setup fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(config = %config_path.display(), "ciam-engine starting");
    info!(
        scenario = %config.scenario.file.display(),
        add_ons = config.scenario.add_ons.len(),
        calibration_active = config.calibration_active,
        output_dir = %config.files.output_dir.display(),
        "Configuration loaded"
    );

    if let Err(e) = run(&config) {
        error!(error = %e, "ciam-engine failed");
        return Err(e.into());
    }
    Ok(())
}

fn run(config: &RunConfig) -> Result<(), EngineError> {
    // 3. Load the scenario documents.
    let mut scenario = Scenario::<ReferenceWorld>::new();
    let documents = std::iter::once(&config.scenario.file).chain(&config.scenario.add_ons);
    for path in documents {
        let document = ScenarioDocument::<WorldSpec>::from_file(path).map_err(|source| {
            EngineError::Document {
                path: path.clone(),
                source,
            }
        })?;
        let diagnostics = scenario.apply_document(document);
        info!(
            document = %path.display(),
            rejected_nodes = diagnostics.len(),
            "Scenario document applied"
        );
    }

    // 4. Complete initialization.
    scenario.complete_init()?;

    // 5. Create collaborators.
    let output_dir = &config.files.output_dir;
    std::fs::create_dir_all(output_dir).map_err(|source| EngineError::OutputDir {
        path: output_dir.clone(),
        source,
    })?;
    let sinks = FileSinks::new(&config.files);
    let mut solver = BisectNewtonSolver::new(&config.solver);
    let mut climate = climate_model(&config.climate.command);
    let mut callback = ProgressCallback::new();
    let started_at = Utc::now();

    // 6. Run.
    let summary = run_scenario(
        &mut scenario,
        RunContext {
            options: RunOptions::from(config),
            solver: &mut solver,
            sinks: &sinks,
            climate: climate.as_mut(),
            callback: &mut callback,
            started_at,
        },
    )?;

    // 7. Write the serialized scenario.
    let mut xml = XmlWriter::from_boxed(sinks.scenario_output()?);
    scenario.write_xml(&mut xml, &xml_date(started_at))?;
    info!(
        file = %output_dir.join(&config.files.xml_output_file_name).display(),
        "Scenario output written"
    );

    // 8. Log results.
    if !callback.unconverged_years().is_empty() {
        warn!(
            years = ?callback.unconverged_years(),
            "Some periods did not clear"
        );
    }
    info!(
        scenario = scenario.name(),
        periods = summary.periods,
        final_year = summary.final_year,
        unconverged_periods = summary.unconverged_periods(),
        "ciam-engine shutdown complete"
    );
    Ok(())
}

/// First argument, then `CIAM_CONFIG`, then the default file name.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the run configuration. A missing default file means defaults; a
/// missing file that was asked for by name is an error.
fn load_config(path: &Path) -> Result<RunConfig, EngineError> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_FILE) {
        let mut config = RunConfig::default();
        config.apply_env_overrides();
        return Ok(config);
    }
    Ok(RunConfig::from_file(path)?)
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn climate_model(command: &[String]) -> Box<dyn ClimateModel> {
    match ExternalClimateModel::from_command(command) {
        Some(model) => Box::new(model),
        None => Box::new(NoClimateModel),
    }
}
