//! End-to-end runs of the reference world through the `ciam-core` driver.
//!
//! These tests load the scenario documents shipped under `scenarios/`,
//! solve every period with the bisection/Newton solver, and inspect the in-memory
//! outputs.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use std::path::{Path, PathBuf};

use chrono::Utc;

use ciam_core::climate::NoClimateModel;
use ciam_core::config::{FilesConfig, SolverConfig};
use ciam_core::document::ScenarioDocument;
use ciam_core::market::{MarketKey, MarketKind};
use ciam_core::runner::{NoOpCallback, RunContext, RunOptions, RunSummary, run_scenario};
use ciam_core::scenario::Scenario;
use ciam_core::sinks::{MemorySinks, OutputSinks};
use ciam_core::solver::{BisectNewtonSolver, relative_excess};
use ciam_core::world::WorldModel;
use ciam_core::xml::XmlWriter;
use ciam_world::{ReferenceWorld, WorldSpec};

fn scenario_path(file_name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("scenarios")
        .join(file_name)
}

fn load(files: &[&str]) -> Scenario<ReferenceWorld> {
    let mut scenario = Scenario::new();
    for file in files {
        let document = ScenarioDocument::<WorldSpec>::from_file(&scenario_path(file)).unwrap();
        let diagnostics = scenario.apply_document(document);
        assert!(diagnostics.is_empty(), "{file}: {diagnostics:?}");
    }
    scenario.complete_init().unwrap();
    scenario
}

fn run(scenario: &mut Scenario<ReferenceWorld>, options: RunOptions) -> (RunSummary, MemorySinks) {
    let sinks = MemorySinks::new(&FilesConfig::default());
    let mut solver = BisectNewtonSolver::new(&SolverConfig {
        tolerance: 1e-4,
        newton_threshold: 0.05,
        max_iterations: 400,
        max_bracket_steps: 30,
    });
    let mut climate = NoClimateModel;
    let mut callback = NoOpCallback;
    let summary = run_scenario(
        scenario,
        RunContext {
            options,
            solver: &mut solver,
            sinks: &sinks,
            climate: &mut climate,
            callback: &mut callback,
            started_at: Utc::now(),
        },
    )
    .unwrap();
    (summary, sinks)
}

fn all_outputs() -> RunOptions {
    RunOptions {
        calibration_active: false,
        print_sector_dependencies: true,
        print_dependency_graphs: true,
    }
}

fn electricity() -> MarketKey {
    MarketKey::new("usa", "electricity")
}

fn coal() -> MarketKey {
    MarketKey::new("usa", "coal")
}

fn calibration() -> MarketKey {
    MarketKey::new("usa", "electricity-calibration")
}

// ---------------------------------------------------------------------------
// Equilibrium
// ---------------------------------------------------------------------------

#[test]
fn reference_scenario_clears_every_solved_period() {
    let mut scenario = load(&["reference.yaml"]);
    let (summary, _) = run(&mut scenario, all_outputs());

    assert_eq!(summary.periods, 3);
    assert_eq!(summary.final_year, 2020);
    assert_eq!(summary.unconverged_periods(), 0);

    let marketplace = scenario.marketplace();
    for period in 1..3 {
        for key in [electricity(), coal()] {
            let record = marketplace.record(&key, period).unwrap();
            assert!(
                relative_excess(&record) <= 1e-4,
                "{key} not cleared in period {period}: {record:?}"
            );
        }
    }
}

#[test]
fn growing_demand_raises_the_electricity_price() {
    let mut scenario = load(&["reference.yaml"]);
    run(&mut scenario, all_outputs());

    let marketplace = scenario.marketplace();
    let p2010 = marketplace.price(&electricity(), 1).unwrap();
    let p2020 = marketplace.price(&electricity(), 2).unwrap();
    assert!(p2020 > p2010, "{p2020} <= {p2010}");

    let region = scenario.world().unwrap().region("usa").unwrap();
    let output = &region.summary().output["electricity"];
    assert!(output[2] > output[1]);
}

#[test]
fn period_zero_is_evaluated_at_initial_prices() {
    let mut scenario = load(&["reference.yaml"]);
    run(&mut scenario, all_outputs());

    let record = scenario.marketplace().record(&electricity(), 0).unwrap();
    assert_eq!(record.price, 5.0);
    // coal: 50 * (5 / 4); wind: 20 * (5 / 6) ^ 1.5
    let expected = 62.5 + 20.0 * (5.0_f64 / 6.0).powf(1.5);
    assert!((record.supply - expected).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

#[test]
fn calibration_markets_exist_only_when_active() {
    let mut scenario = load(&["reference.yaml"]);
    run(&mut scenario, all_outputs());
    assert!(scenario.marketplace().market(&calibration()).is_none());
}

#[test]
fn calibration_scale_is_solved_in_target_years_and_carried_after() {
    let mut scenario = load(&["reference.yaml"]);
    let options = RunOptions {
        calibration_active: true,
        ..all_outputs()
    };
    let (summary, _) = run(&mut scenario, options);
    assert_eq!(summary.unconverged_periods(), 0);

    let marketplace = scenario.marketplace();
    let market = marketplace.market(&calibration()).unwrap();
    assert_eq!(market.kind(), MarketKind::Calibration);
    assert_eq!(marketplace.price(&calibration(), 0), Some(1.0));

    assert!(marketplace.is_solvable(&calibration(), 1));
    assert!(!marketplace.is_solvable(&calibration(), 2));

    let target = marketplace.record(&calibration(), 1).unwrap();
    assert_eq!(target.demand, 80.0);
    assert!(relative_excess(&target) <= 1e-4, "{target:?}");
    for key in [electricity(), coal()] {
        let record = marketplace.record(&key, 1).unwrap();
        assert!(relative_excess(&record) <= 1e-4, "{key}: {record:?}");
    }

    let scale_2010 = marketplace.price(&calibration(), 1).unwrap();
    let scale_2020 = marketplace.price(&calibration(), 2).unwrap();
    assert!(scale_2010 != 1.0);
    assert_eq!(scale_2020, scale_2010);

    let idle = marketplace.record(&calibration(), 2).unwrap();
    assert_eq!((idle.supply, idle.demand), (0.0, 0.0));
}

// ---------------------------------------------------------------------------
// Add-ons
// ---------------------------------------------------------------------------

#[test]
fn calibration_clears_with_the_wind_add_on() {
    let mut scenario = load(&["reference.yaml", "wind-expansion.yaml"]);
    let options = RunOptions {
        calibration_active: true,
        ..all_outputs()
    };
    let (summary, _) = run(&mut scenario, options);
    assert_eq!(summary.unconverged_periods(), 0);

    let record = scenario.marketplace().record(&calibration(), 1).unwrap();
    assert!(relative_excess(&record) <= 1e-4, "{record:?}");
    let region = scenario.world().unwrap().region("usa").unwrap();
    let output = region.summary().output["electricity"][1];
    assert!((output - 80.0).abs() < 0.05, "{output}");
}

#[test]
fn add_on_augments_the_reference_world() {
    let scenario = load(&["reference.yaml", "wind-expansion.yaml"]);
    let world = scenario.world().unwrap();
    let sector = &world.region("usa").unwrap().sectors()[0];
    let names: Vec<&str> = sector.technologies().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["coal", "wind", "offshore-wind"]);
    assert_eq!(sector.technologies()[1].cost(), 5.0);
}

#[test]
fn add_on_cannot_change_modeltime() {
    let mut scenario = load(&["reference.yaml"]);
    let add_on = ScenarioDocument::<WorldSpec>::from_yaml_str(
        "scenario:\n  name: longer\n  nodes:\n    - modeltime: { start_year: 1990, timesteps: [{ until_year: 2100, step: 5 }] }\n",
    )
    .unwrap();
    let diagnostics = scenario.apply_document(add_on);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message,
        "Modeltime information cannot be modified in a scenario add-on."
    );
    assert_eq!(scenario.modeltime().unwrap().max_period(), 3);
}

#[test]
fn json_documents_load_and_solve() {
    let json = serde_json::json!({
        "scenario": {
            "name": "json",
            "nodes": [
                { "modeltime": { "start_year": 2000, "timesteps": [{ "until_year": 2010, "step": 10 }] } },
                { "world": { "regions": [{
                    "name": "usa",
                    "sectors": [{ "name": "coal", "technologies": [
                        { "name": "mine", "base_output": 30.0, "cost": 2.0 }
                    ]}],
                    "demands": [{ "good": "coal", "base_quantity": 30.0, "price_elasticity": -1.0, "base_price": 2.0 }]
                }]}}
            ]
        }
    });
    let document = ScenarioDocument::<WorldSpec>::from_json_str(&json.to_string()).unwrap();
    let mut scenario = Scenario::<ReferenceWorld>::new();
    assert!(scenario.apply_document(document).is_empty());
    scenario.complete_init().unwrap();

    let (summary, _) = run(&mut scenario, all_outputs());
    assert_eq!(summary.unconverged_periods(), 0);
    let price = scenario.marketplace().price(&coal(), 1).unwrap();
    assert!((price - 2.0).abs() < 1e-3, "{price}");
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[test]
fn dependency_outputs_describe_the_coal_chain() {
    let mut scenario = load(&["reference.yaml"]);
    let (_, sinks) = run(&mut scenario, all_outputs());

    assert_eq!(
        sinks.contents("sector_dependencies.csv").unwrap(),
        "Region,Sector,Dependencies\nusa,electricity,usa/coal\nusa,coal\n"
    );

    let names = sinks.names();
    assert!(!names.contains(&"graph_0.dot".to_owned()));
    for period in 1..3 {
        let graph = sinks.contents(&format!("graph_{period}.dot")).unwrap();
        assert!(graph.starts_with(&format!("digraph period_{period} {{")));
        assert!(graph.contains("\"usa/coal\" -> \"usa/electricity\" [label=\"coal ("));
    }
}

#[test]
fn traces_cover_every_period() {
    let mut scenario = load(&["reference.yaml"]);
    let (_, sinks) = run(&mut scenario, all_outputs());

    let debug = sinks.contents("debug.xml").unwrap();
    for period in 0..3 {
        assert!(debug.contains(&format!("<world period=\"{period}\">")));
    }
    assert!(debug.trim_end().ends_with("</scenario>"));

    let sd = sinks.contents("sdcurve.csv").unwrap();
    assert!(sd.contains("Period 1: 2010"));
    assert!(sd.contains("Period 2: 2020"));
    assert!(sd.contains("usa,electricity,"));
}

#[test]
fn climate_data_lists_both_gases() {
    let mut scenario = load(&["reference.yaml"]);
    let (_, sinks) = run(&mut scenario, all_outputs());

    let data = sinks.contents("gas.emk").unwrap();
    let lines: Vec<&str> = data.lines().collect();
    assert_eq!(lines[..3], ["3", "reference", "Year,CH4,CO2"]);
    assert_eq!(lines.len(), 6);
    assert!(lines[3].starts_with("2000,"));
    assert!(lines[5].starts_with("2020,"));

    let world = scenario.world().unwrap();
    let co2 = world.emissions_totals().total("CO2", 1).unwrap();
    assert!(co2 > 0.0);
}

#[test]
fn serialized_scenario_contains_the_definition() {
    let mut scenario = load(&["reference.yaml"]);
    let (_, sinks) = run(&mut scenario, all_outputs());

    {
        let mut xml = XmlWriter::from_boxed(sinks.scenario_output().unwrap());
        scenario.write_xml(&mut xml, "2026-01-01T00:00:00Z").unwrap();
    }
    let text = sinks.contents("output.xml").unwrap();
    assert!(text.starts_with("<?xml"));
    assert!(text.contains("<scenario name=\"reference\" date=\"2026-01-01T00:00:00Z\">"));
    assert!(text.contains("SRES B2 Scenario is used for this Reference Scenario"));
    assert!(text.contains("<modeltime>"));
    assert!(text.contains("<sector name=\"electricity\" good=\"electricity\" market=\"usa\">"));
    assert!(text.contains("<technology name=\"wind\">"));
    assert!(text.trim_end().ends_with("</scenario>"));
}
