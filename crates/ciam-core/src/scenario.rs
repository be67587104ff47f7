//! The scenario aggregate: one period index, one world, one marketplace.
//!
//! A [`Scenario`] starts empty and is populated by applying typed
//! [`ScenarioDocument`]s: the base document first, then any add-ons. This is
//! the only place the period index and the world come into existence.
//! Rejected and unknown nodes are reported as [`Diagnostic`]s and skipped;
//! they never abort construction.
//!
//! After the last document, [`Scenario::complete_init`] finishes the world
//! and creates its markets. The run driver then borrows the three parts
//! together through [`Scenario::parts_mut`].

use std::io;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::document::{ScenarioDocument, ScenarioNode};
use crate::market::Marketplace;
use crate::modeltime::Modeltime;
use crate::trace::DebugTrace;
use crate::world::WorldModel;
use crate::xml::XmlWriter;

/// Summary line every serialized scenario carries. A parsed `summary` node
/// is kept on the scenario but not written back.
pub const SUMMARY_LINE: &str = "SRES B2 Scenario is used for this Reference Scenario";

/// Errors for operations that need a fully constructed scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// No `world` node was applied.
    #[error("scenario has no world model")]
    MissingWorld,

    /// No `modeltime` node was applied.
    #[error("scenario has no modeltime")]
    MissingModeltime,

    /// The world could not finish initialization.
    #[error("world initialization failed: {source}")]
    WorldInit {
        /// The world's own error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Writing the serialized scenario failed.
    #[error("failed to write scenario: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },
}

/// A node the scenario reported and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Tag of the offending node.
    pub tag: String,
    /// What went wrong.
    pub message: String,
}

impl Diagnostic {
    fn new(tag: &str, message: impl Into<String>) -> Self {
        Self {
            tag: tag.to_owned(),
            message: message.into(),
        }
    }
}

/// A scenario and everything it owns.
#[derive(Debug)]
pub struct Scenario<W> {
    name: String,
    summary: String,
    modeltime: Option<Modeltime>,
    world: Option<W>,
    marketplace: Marketplace,
}

impl<W: WorldModel> Default for Scenario<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WorldModel> Scenario<W> {
    /// An empty scenario with no period index and no world.
    pub const fn new() -> Self {
        Self {
            name: String::new(),
            summary: String::new(),
            modeltime: None,
            world: None,
            marketplace: Marketplace::new(0),
        }
    }

    /// Scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text summary from the documents.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// The period index, once a `modeltime` node has been applied.
    pub const fn modeltime(&self) -> Option<&Modeltime> {
        self.modeltime.as_ref()
    }

    /// The world, once a `world` node has been applied.
    pub const fn world(&self) -> Option<&W> {
        self.world.as_ref()
    }

    /// The market state.
    pub const fn marketplace(&self) -> &Marketplace {
        &self.marketplace
    }

    /// Apply one document's nodes in order.
    ///
    /// Returns every node that was rejected. Each one has already been
    /// logged; the caller may ignore the list.
    pub fn apply_document(&mut self, document: ScenarioDocument<W::Spec>) -> Vec<Diagnostic> {
        if !document.name.is_empty() {
            self.name = document.name;
        }

        let mut diagnostics = Vec::new();
        for node in document.nodes {
            if let Some(diagnostic) = self.apply_node(node) {
                warn!(tag = diagnostic.tag, "{}", diagnostic.message);
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }

    fn apply_node(&mut self, node: ScenarioNode<W::Spec>) -> Option<Diagnostic> {
        match node {
            ScenarioNode::Summary(text) => {
                self.summary = text;
                None
            }
            ScenarioNode::Modeltime(spec) => {
                if self.modeltime.is_some() {
                    return Some(Diagnostic::new(
                        "modeltime",
                        "Modeltime information cannot be modified in a scenario add-on.",
                    ));
                }
                match spec.set() {
                    Ok(modeltime) => {
                        info!(
                            start_year = modeltime.start_year(),
                            end_year = modeltime.end_year(),
                            max_period = modeltime.max_period(),
                            "Modeltime set"
                        );
                        self.marketplace = Marketplace::new(modeltime.max_period());
                        self.modeltime = Some(modeltime);
                        None
                    }
                    Err(e) => Some(Diagnostic::new(
                        "modeltime",
                        format!("Invalid modeltime ignored: {e}"),
                    )),
                }
            }
            ScenarioNode::World(spec) => {
                let Some(modeltime) = self.modeltime.as_ref() else {
                    return Some(Diagnostic::new(
                        "world",
                        "World found before modeltime; world definition ignored.",
                    ));
                };
                self.world
                    .get_or_insert_with(|| W::new(modeltime))
                    .apply_spec(spec);
                None
            }
            ScenarioNode::Malformed { tag, reason } => {
                let message = format!("Malformed {tag} node ignored: {reason}");
                Some(Diagnostic { tag, message })
            }
            ScenarioNode::Unrecognized { tag } => {
                let message = format!("Unrecognized text string: {tag} found while parsing scenario.");
                Some(Diagnostic { tag, message })
            }
        }
    }

    /// Finish world initialization and create its markets.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::MissingModeltime`] or
    /// [`ScenarioError::MissingWorld`] if no document supplied them, and
    /// [`ScenarioError::WorldInit`] if the world rejects its definition.
    pub fn complete_init(&mut self) -> Result<(), ScenarioError> {
        if self.modeltime.is_none() {
            return Err(ScenarioError::MissingModeltime);
        }
        let world = self.world.as_mut().ok_or(ScenarioError::MissingWorld)?;
        world
            .complete_init(&mut self.marketplace)
            .map_err(|e| ScenarioError::WorldInit {
                source: Box::new(e),
            })?;
        info!(
            scenario = self.name,
            markets = self.marketplace.len(),
            "Scenario initialized"
        );
        Ok(())
    }

    /// Borrow the period index, world, and marketplace together.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::MissingModeltime`] or
    /// [`ScenarioError::MissingWorld`] if either part is absent.
    pub fn parts_mut(&mut self) -> Result<ScenarioParts<'_, W>, ScenarioError> {
        let modeltime = self
            .modeltime
            .as_ref()
            .ok_or(ScenarioError::MissingModeltime)?;
        let world = self.world.as_mut().ok_or(ScenarioError::MissingWorld)?;
        Ok(ScenarioParts {
            name: &self.name,
            modeltime,
            world,
            marketplace: &mut self.marketplace,
        })
    }

    /// Serialize the scenario definition.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::MissingModeltime`] or
    /// [`ScenarioError::MissingWorld`] for an incomplete scenario, and
    /// [`ScenarioError::Io`] if writing fails.
    pub fn write_xml(&self, xml: &mut XmlWriter<'_>, date: &str) -> Result<(), ScenarioError> {
        let modeltime = self
            .modeltime
            .as_ref()
            .ok_or(ScenarioError::MissingModeltime)?;
        let world = self.world.as_ref().ok_or(ScenarioError::MissingWorld)?;

        xml.declaration()?;
        xml.open("scenario", &[("name", &self.name), ("date", date)])?;
        xml.element("summary", SUMMARY_LINE)?;
        modeltime.write_xml(xml)?;
        world.write_xml(xml)?;
        xml.close("scenario")?;
        xml.flush()?;
        Ok(())
    }
}

/// Simultaneous borrows of a scenario's parts for the run driver.
#[derive(Debug)]
pub struct ScenarioParts<'a, W> {
    /// Scenario name.
    pub name: &'a str,
    /// The period index.
    pub modeltime: &'a Modeltime,
    /// The world.
    pub world: &'a mut W,
    /// The market state.
    pub marketplace: &'a mut Marketplace,
}

impl<W: WorldModel> ScenarioParts<'_, W> {
    /// Open the debug trace root and write the block for `period`.
    pub fn write_debug_open(&self, trace: &mut DebugTrace, date: &str, period: usize) {
        trace.open_root(self.name, date);
        self.write_debug_period(trace, period);
    }

    /// Append one `<period>` block: the period index, world, and market
    /// state as they stand for `period`.
    pub fn write_debug_period(&self, trace: &mut DebugTrace, period: usize) {
        let year = self
            .modeltime
            .period_to_year(period)
            .map(|year| year.to_string())
            .unwrap_or_default();
        let number = period.to_string();
        trace.write_block(|xml| {
            xml.open("period", &[("number", &number), ("year", &year)])?;
            self.modeltime.write_debug_xml(period, xml)?;
            self.world.write_debug_xml(period, xml)?;
            self.marketplace.write_debug_xml(period, xml)?;
            xml.close("period")
        });
    }

    /// Close the debug trace root.
    pub fn write_debug_close(&self, trace: &mut DebugTrace) {
        trace.close_root();
    }
}

/// Format a timestamp for the `date` attribute of scenario output.
pub fn xml_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::io::Write;

    use chrono::TimeZone;
    use serde::Deserialize;

    use super::*;
    use crate::climate::EmissionsTotals;
    use crate::market::MarketKind;
    use crate::market::MarketKey;
    use crate::modeltime::{ModeltimeSpec, TimestepSpec};
    use crate::world::WorldCalc;

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    struct TinySpec {
        goods: Vec<String>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("tiny world has no goods")]
    struct TinyError;

    #[derive(Debug)]
    struct TinyWorld {
        periods: usize,
        goods: Vec<String>,
        totals: EmissionsTotals,
    }

    impl WorldCalc for TinyWorld {
        fn calc(&mut self, _marketplace: &mut Marketplace, _period: usize) {}
    }

    impl WorldModel for TinyWorld {
        type Spec = TinySpec;
        type Error = TinyError;

        fn new(modeltime: &Modeltime) -> Self {
            Self {
                periods: modeltime.max_period(),
                goods: Vec::new(),
                totals: EmissionsTotals::new(modeltime.years().to_vec()),
            }
        }

        fn apply_spec(&mut self, spec: TinySpec) {
            self.goods.extend(spec.goods);
        }

        fn complete_init(&mut self, marketplace: &mut Marketplace) -> Result<(), TinyError> {
            if self.goods.is_empty() {
                return Err(TinyError);
            }
            for good in &self.goods {
                marketplace.create_market(MarketKey::new("global", good), MarketKind::Normal, 1.0);
            }
            Ok(())
        }

        fn setup_calibration_markets(&mut self, _marketplace: &mut Marketplace) {}
        fn init_calc(&mut self, _marketplace: &mut Marketplace, _period: usize) {}
        fn update_summary(&mut self, _marketplace: &Marketplace, _period: usize) {}
        fn emiss_ind(&mut self, _period: usize) {}
        fn calculate_emissions_totals(&mut self) {}

        fn emissions_totals(&self) -> &EmissionsTotals {
            &self.totals
        }

        fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
            xml.open("world", &[])?;
            for good in &self.goods {
                xml.element("good", good)?;
            }
            xml.close("world")
        }

        fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()> {
            xml.element("world-period", period)
        }

        fn print_graphs(&self, out: &mut dyn Write, period: usize) -> io::Result<()> {
            writeln!(out, "digraph period_{period} {{}}")
        }

        fn print_sector_dependencies(&self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "Region,Sector")
        }
    }

    fn modeltime(start_year: i32) -> ScenarioNode<TinySpec> {
        ScenarioNode::Modeltime(ModeltimeSpec {
            start_year,
            timesteps: vec![TimestepSpec {
                until_year: start_year + 20,
                step: 10,
            }],
        })
    }

    fn world(goods: &[&str]) -> ScenarioNode<TinySpec> {
        ScenarioNode::World(TinySpec {
            goods: goods.iter().map(|good| (*good).to_owned()).collect(),
        })
    }

    fn document(name: &str, nodes: Vec<ScenarioNode<TinySpec>>) -> ScenarioDocument<TinySpec> {
        ScenarioDocument {
            name: name.to_owned(),
            nodes,
        }
    }

    #[test]
    fn base_document_builds_every_part() {
        let mut scenario = Scenario::<TinyWorld>::new();
        let diagnostics = scenario.apply_document(document(
            "reference",
            vec![
                ScenarioNode::Summary("Reference run".to_owned()),
                modeltime(2000),
                world(&["oil"]),
            ],
        ));
        assert!(diagnostics.is_empty());
        assert_eq!(scenario.name(), "reference");
        assert_eq!(scenario.summary(), "Reference run");
        assert_eq!(scenario.modeltime().unwrap().max_period(), 3);
        assert_eq!(scenario.world().unwrap().periods, 3);
        assert_eq!(scenario.marketplace().period_count(), 3);
    }

    #[test]
    fn second_modeltime_is_rejected() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document("base", vec![modeltime(2000)]));
        let diagnostics = scenario.apply_document(document("", vec![modeltime(1990)]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].tag, "modeltime");
        assert_eq!(scenario.modeltime().unwrap().start_year(), 2000);
        assert_eq!(scenario.name(), "base");
    }

    #[test]
    fn add_on_world_augments_the_same_instance() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document("base", vec![modeltime(2000), world(&["oil"])]));
        scenario.apply_document(document("addon", vec![world(&["gas"])]));
        assert_eq!(scenario.world().unwrap().goods, vec!["oil", "gas"]);
        assert_eq!(scenario.name(), "addon");
    }

    #[test]
    fn unrecognized_tag_changes_nothing() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document("base", vec![modeltime(2000), world(&["oil"])]));
        let diagnostics = scenario.apply_document(document(
            "",
            vec![ScenarioNode::Unrecognized {
                tag: "marketplace".to_owned(),
            }],
        ));
        assert_eq!(
            diagnostics[0].message,
            "Unrecognized text string: marketplace found while parsing scenario."
        );
        assert_eq!(scenario.modeltime().unwrap().start_year(), 2000);
        assert_eq!(scenario.world().unwrap().goods, vec!["oil"]);
    }

    #[test]
    fn world_before_modeltime_is_rejected() {
        let mut scenario = Scenario::<TinyWorld>::new();
        let diagnostics = scenario.apply_document(document("base", vec![world(&["oil"])]));
        assert_eq!(diagnostics.len(), 1);
        assert!(scenario.world().is_none());
    }

    #[test]
    fn invalid_modeltime_is_a_diagnostic() {
        let mut scenario = Scenario::<TinyWorld>::new();
        let diagnostics = scenario.apply_document(document(
            "base",
            vec![ScenarioNode::Modeltime(ModeltimeSpec {
                start_year: 2000,
                timesteps: Vec::new(),
            })],
        ));
        assert_eq!(diagnostics.len(), 1);
        assert!(scenario.modeltime().is_none());
    }

    #[test]
    fn complete_init_requires_a_world() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document("base", vec![modeltime(2000)]));
        assert!(matches!(
            scenario.complete_init(),
            Err(ScenarioError::MissingWorld)
        ));

        let mut empty = Scenario::<TinyWorld>::new();
        assert!(matches!(
            empty.complete_init(),
            Err(ScenarioError::MissingModeltime)
        ));
    }

    #[test]
    fn complete_init_surfaces_world_errors() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document("base", vec![modeltime(2000), world(&[])]));
        assert!(matches!(
            scenario.complete_init(),
            Err(ScenarioError::WorldInit { .. })
        ));
    }

    #[test]
    fn write_xml_wraps_parts_in_scenario_root() {
        let mut scenario = Scenario::<TinyWorld>::new();
        scenario.apply_document(document(
            "ref & co",
            vec![
                ScenarioNode::Summary("Carbon tax sensitivity".to_owned()),
                modeltime(2000),
                world(&["oil"]),
            ],
        ));
        scenario.complete_init().unwrap();

        let mut out = Vec::new();
        let date = xml_date(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        scenario.write_xml(&mut XmlWriter::new(&mut out), &date).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(
            "<scenario name=\"ref &amp; co\" date=\"2024-05-01T12:00:00Z\">"
        ));
        assert!(text.contains(&format!("\t<summary>{SUMMARY_LINE}</summary>")));
        assert!(!text.contains("Carbon tax sensitivity"));
        assert_eq!(scenario.summary(), "Carbon tax sensitivity");
        assert!(text.contains("\t<modeltime>"));
        assert!(text.contains("\t\t<good>oil</good>"));
        assert!(text.ends_with("</scenario>\n"));
    }
}
