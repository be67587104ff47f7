//! Producing sectors and their technologies.
//!
//! A [`Sector`] sells one good into one market. Each of its
//! [`Technology`] entries responds to the good's price with a
//! constant-elasticity supply curve,
//!
//! ```text
//! output = base_output * scale * (price / cost) ^ supply_elasticity
//! ```
//!
//! and buys its intermediate inputs in fixed proportion to output. `scale`
//! is 1 unless the sector is calibrated, in which case it is the "price" of
//! the sector's calibration market.

use std::collections::BTreeMap;
use std::io;

use ciam_core::market::{MarketKey, MarketKind, Marketplace};
use ciam_core::xml::XmlWriter;
use tracing::debug;

use crate::spec::{DEFAULT_INITIAL_PRICE, SectorSpec, TechnologySpec};

/// Prices are floored here before entering a power law.
pub const MIN_PRICE: f64 = 1e-9;

/// Starting scale factor of a calibration market.
pub const INITIAL_CALIBRATION_SCALE: f64 = 1.0;

/// An intermediate input, resolved to its market.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    /// Market the input is bought in.
    pub key: MarketKey,
    /// Units consumed per unit of output.
    pub coefficient: f64,
}

/// A production technology with per-period output.
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    name: String,
    base_output: f64,
    cost: f64,
    supply_elasticity: f64,
    inputs: Vec<Input>,
    emissions: BTreeMap<String, f64>,
    output: Vec<f64>,
}

impl Technology {
    fn from_spec(spec: &TechnologySpec, region: &str, period_count: usize) -> Self {
        let inputs = spec
            .inputs
            .iter()
            .map(|input| Input {
                key: MarketKey::new(input.market.as_deref().unwrap_or(region), &input.good),
                coefficient: input.coefficient,
            })
            .collect();
        Self {
            name: spec.name.clone(),
            base_output: spec.base_output,
            cost: spec.cost,
            supply_elasticity: spec.supply_elasticity,
            inputs,
            emissions: spec.emissions.clone(),
            output: vec![0.0; period_count],
        }
    }

    /// Technology name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit cost.
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Resolved intermediate inputs.
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Output at `price` with calibration factor `scale`.
    pub fn output_at(&self, price: f64, scale: f64) -> f64 {
        let relative = price.max(MIN_PRICE) / self.cost;
        self.base_output * scale.max(0.0) * relative.powf(self.supply_elasticity)
    }

    /// Output of the most recent evaluation of `period`.
    pub fn output(&self, period: usize) -> f64 {
        self.output.get(period).copied().unwrap_or(0.0)
    }

    /// Emissions of every gas in `period`.
    pub fn emissions(&self, period: usize) -> impl Iterator<Item = (&str, f64)> {
        let output = self.output(period);
        self.emissions
            .iter()
            .map(move |(gas, coefficient)| (gas.as_str(), output * coefficient))
    }

    fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("technology", &[("name", &self.name)])?;
        xml.element("base-output", self.base_output)?;
        xml.element("cost", self.cost)?;
        xml.element("supply-elasticity", self.supply_elasticity)?;
        for input in &self.inputs {
            xml.element_with_attrs(
                "input",
                &[("good", &input.key.good), ("market", &input.key.region)],
                input.coefficient,
            )?;
        }
        for (gas, coefficient) in &self.emissions {
            xml.element_with_attrs("emission", &[("gas", gas)], coefficient)?;
        }
        xml.close("technology")
    }
}

/// A producing sector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    name: String,
    key: MarketKey,
    initial_price: f64,
    calibrated_output: BTreeMap<i32, f64>,
    calibration_key: Option<MarketKey>,
    technologies: Vec<Technology>,
}

impl Sector {
    pub(crate) fn from_spec(spec: &SectorSpec, region: &str, period_count: usize) -> Self {
        let technologies = spec
            .technologies
            .iter()
            .map(|technology| Technology::from_spec(technology, region, period_count))
            .collect();
        Self {
            name: spec.name.clone(),
            key: MarketKey::new(spec.market.as_deref().unwrap_or(region), spec.good()),
            initial_price: spec.initial_price.unwrap_or(DEFAULT_INITIAL_PRICE),
            calibrated_output: spec.calibrated_output.clone(),
            calibration_key: None,
            technologies,
        }
    }

    /// Sector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Market the sector sells into.
    pub const fn key(&self) -> &MarketKey {
        &self.key
    }

    /// Starting price of the sector's market.
    pub const fn initial_price(&self) -> f64 {
        self.initial_price
    }

    /// Technologies in definition order.
    pub fn technologies(&self) -> &[Technology] {
        &self.technologies
    }

    /// The calibration market, once one has been set up.
    pub const fn calibration_key(&self) -> Option<&MarketKey> {
        self.calibration_key.as_ref()
    }

    /// Reference output for `year`, if any.
    pub fn calibration_target(&self, year: i32) -> Option<f64> {
        self.calibrated_output.get(&year).copied()
    }

    /// Whether the sector carries any calibration target.
    pub fn is_calibrated(&self) -> bool {
        !self.calibrated_output.is_empty()
    }

    /// Total output of every technology in `period`.
    pub fn output(&self, period: usize) -> f64 {
        self.technologies.iter().map(|t| t.output(period)).sum()
    }

    /// Quantity of each input market bought in `period`.
    pub fn input_flows(&self, period: usize) -> BTreeMap<&MarketKey, f64> {
        let mut flows = BTreeMap::new();
        for technology in &self.technologies {
            let output = technology.output(period);
            for input in &technology.inputs {
                *flows.entry(&input.key).or_insert(0.0) += output * input.coefficient;
            }
        }
        flows
    }

    /// Create the sector's market if no other sector already did.
    pub(crate) fn create_markets(&self, marketplace: &mut Marketplace) {
        marketplace.create_market(self.key.clone(), MarketKind::Normal, self.initial_price);
    }

    /// Create the calibration market when the sector has targets.
    pub(crate) fn setup_calibration_market(&mut self, region: &str, marketplace: &mut Marketplace) {
        if !self.is_calibrated() {
            return;
        }
        let key = MarketKey::new(region, format!("{}-calibration", self.name));
        marketplace.create_market(key.clone(), MarketKind::Calibration, INITIAL_CALIBRATION_SCALE);
        debug!(sector = self.name, market = %key, "Calibration market set up");
        self.calibration_key = Some(key);
    }

    /// Let the solver move the calibration scale only in target years.
    pub(crate) fn init_calc(&self, marketplace: &mut Marketplace, period: usize, year: i32) {
        if let Some(key) = &self.calibration_key {
            let has_target = self.calibration_target(year).is_some();
            marketplace.set_solvable(key, period, has_target);
        }
    }

    pub(crate) fn calc(&mut self, marketplace: &mut Marketplace, period: usize, year: i32) {
        let price = marketplace
            .price(&self.key, period)
            .unwrap_or(self.initial_price);
        let scale = self
            .calibration_key
            .as_ref()
            .and_then(|key| marketplace.price(key, period))
            .unwrap_or(INITIAL_CALIBRATION_SCALE);

        let mut total = 0.0;
        for technology in &mut self.technologies {
            let output = technology.output_at(price, scale);
            if let Some(slot) = technology.output.get_mut(period) {
                *slot = output;
            }
            total += output;
            for input in &technology.inputs {
                marketplace.add_to_demand(&input.key, period, output * input.coefficient);
            }
        }
        marketplace.add_to_supply(&self.key, period, total);

        if let (Some(key), Some(target)) = (&self.calibration_key, self.calibration_target(year)) {
            marketplace.add_to_supply(key, period, total);
            marketplace.add_to_demand(key, period, target);
        }
    }

    pub(crate) fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open(
            "sector",
            &[
                ("name", &self.name),
                ("good", &self.key.good),
                ("market", &self.key.region),
            ],
        )?;
        xml.element("initial-price", self.initial_price)?;
        for (year, target) in &self.calibrated_output {
            xml.element_with_attrs("calibrated-output", &[("year", &year.to_string())], target)?;
        }
        for technology in &self.technologies {
            technology.write_xml(xml)?;
        }
        xml.close("sector")
    }

    pub(crate) fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("sector", &[("name", &self.name)])?;
        xml.element("output", self.output(period))?;
        for technology in &self.technologies {
            xml.element_with_attrs(
                "technology-output",
                &[("name", &technology.name)],
                technology.output(period),
            )?;
        }
        xml.close("sector")
    }
}
