//! Market state: per-period price, supply, and demand registers for every
//! traded good.
//!
//! Each [`Market`] holds one [`MarketRecord`] per model period plus a
//! "last period" shadow record. The shadow is how converged state crosses
//! period boundaries: [`Marketplace::store_to_last`] copies period `p - 1`
//! into it, and [`Marketplace::init_to_last`] seeds period `p`'s price from
//! it.
//!
//! Supply and demand registers are accumulators. World objects add to them
//! during `calc`, so they must be nulled before every evaluation of a period.
//! Contributions aimed at unknown markets or periods outside the horizon are
//! logged and dropped rather than failing the run.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::solver::{MarketSolver, SolveReport};
use crate::world::WorldCalc;
use crate::xml::XmlWriter;

/// Identifies a market: a good traded within a market region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    /// Market region (several model regions may share one).
    pub region: String,
    /// Traded good.
    pub good: String,
}

impl MarketKey {
    /// Build a key from a market region and a good name.
    pub fn new(region: impl Into<String>, good: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            good: good.into(),
        }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.region, self.good)
    }
}

/// What a market clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    /// An ordinary goods market; the price is a price.
    Normal,
    /// A calibration market; the "price" is a scale factor that is solved
    /// so that modelled output meets a reference target.
    Calibration,
}

impl MarketKind {
    /// Lowercase name used in output files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Calibration => "calibration",
        }
    }
}

/// Price, supply, and demand of one market in one period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketRecord {
    /// Market price (or calibration scale factor).
    pub price: f64,
    /// Total supply contributed this period.
    pub supply: f64,
    /// Total demand contributed this period.
    pub demand: f64,
}

impl MarketRecord {
    /// Demand minus supply.
    pub fn excess_demand(&self) -> f64 {
        self.demand - self.supply
    }
}

/// A single market with one register per period.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    key: MarketKey,
    kind: MarketKind,
    initial_price: f64,
    records: Vec<MarketRecord>,
    last: MarketRecord,
    solvable: Vec<bool>,
}

impl Market {
    fn new(key: MarketKey, kind: MarketKind, initial_price: f64, period_count: usize) -> Self {
        Self {
            key,
            kind,
            initial_price,
            records: vec![MarketRecord::default(); period_count],
            last: MarketRecord::default(),
            solvable: vec![true; period_count],
        }
    }

    /// The market's key.
    pub const fn key(&self) -> &MarketKey {
        &self.key
    }

    /// The market's kind.
    pub const fn kind(&self) -> MarketKind {
        self.kind
    }

    /// Starting price applied by [`Marketplace::init_prices`].
    pub const fn initial_price(&self) -> f64 {
        self.initial_price
    }

    /// Register for `period`.
    pub fn record(&self, period: usize) -> Option<&MarketRecord> {
        self.records.get(period)
    }

    /// The "last period" shadow record.
    pub const fn last(&self) -> &MarketRecord {
        &self.last
    }

    /// Whether the solver may move this market's price in `period`.
    pub fn is_solvable(&self, period: usize) -> bool {
        self.solvable.get(period).copied().unwrap_or(false)
    }
}

/// Owner of every market's registers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Marketplace {
    period_count: usize,
    markets: BTreeMap<MarketKey, Market>,
}

impl Marketplace {
    /// Create an empty marketplace whose markets carry `period_count`
    /// registers.
    pub const fn new(period_count: usize) -> Self {
        Self {
            period_count,
            markets: BTreeMap::new(),
        }
    }

    /// Number of periods each market stores.
    pub const fn period_count(&self) -> usize {
        self.period_count
    }

    /// Number of markets.
    pub fn len(&self) -> usize {
        self.markets.len()
    }

    /// Whether no market has been created yet.
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    /// Create a market if it does not exist yet.
    ///
    /// Returns `true` when a new market was created. Re-creating an
    /// existing market keeps the original and returns `false`.
    pub fn create_market(&mut self, key: MarketKey, kind: MarketKind, initial_price: f64) -> bool {
        if self.markets.contains_key(&key) {
            return false;
        }
        debug!(market = %key, kind = kind.as_str(), initial_price, "Market created");
        let market = Market::new(key.clone(), kind, initial_price, self.period_count);
        self.markets.insert(key, market);
        true
    }

    /// Look up a market.
    pub fn market(&self, key: &MarketKey) -> Option<&Market> {
        self.markets.get(key)
    }

    /// Iterate over all markets in key order.
    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    /// Set every period's price of every market to its initial price.
    pub fn init_prices(&mut self) {
        for market in self.markets.values_mut() {
            let initial = market.initial_price;
            for record in &mut market.records {
                record.price = initial;
            }
        }
    }

    /// Zero the demand register of every market for `period`.
    pub fn null_demands(&mut self, period: usize) {
        self.for_each_record(period, |record| record.demand = 0.0);
    }

    /// Zero the supply register of every market for `period`.
    pub fn null_supplies(&mut self, period: usize) {
        self.for_each_record(period, |record| record.supply = 0.0);
    }

    /// Copy every market's period `period - 1` register into its shadow.
    ///
    /// Nothing precedes period 0, so the call is a no-op there.
    pub fn store_to_last(&mut self, period: usize) {
        let Some(previous) = period.checked_sub(1) else {
            debug!("store_to_last called for period 0, nothing to carry");
            return;
        };
        for market in self.markets.values_mut() {
            if let Some(record) = market.records.get(previous) {
                market.last = *record;
            }
        }
    }

    /// Seed period `period`'s price from the shadow record.
    ///
    /// Supply and demand are left untouched; they are accumulated afresh by
    /// the world's `calc`.
    pub fn init_to_last(&mut self, period: usize) {
        self.for_each_market_record(period, |last, record| record.price = last.price);
    }

    /// Add `quantity` to a market's supply in `period`.
    pub fn add_to_supply(&mut self, key: &MarketKey, period: usize, quantity: f64) {
        if let Some(record) = self.record_mut(key, period) {
            record.supply += quantity;
        }
    }

    /// Add `quantity` to a market's demand in `period`.
    pub fn add_to_demand(&mut self, key: &MarketKey, period: usize, quantity: f64) {
        if let Some(record) = self.record_mut(key, period) {
            record.demand += quantity;
        }
    }

    /// Overwrite a market's price in `period`.
    pub fn set_price(&mut self, key: &MarketKey, period: usize, price: f64) {
        if let Some(record) = self.record_mut(key, period) {
            record.price = price;
        }
    }

    /// Price of a market in `period`.
    pub fn price(&self, key: &MarketKey, period: usize) -> Option<f64> {
        self.record(key, period).map(|record| record.price)
    }

    /// Full register of a market in `period`.
    pub fn record(&self, key: &MarketKey, period: usize) -> Option<MarketRecord> {
        self.markets.get(key)?.records.get(period).copied()
    }

    /// Shadow record of a market.
    pub fn last(&self, key: &MarketKey) -> Option<MarketRecord> {
        self.markets.get(key).map(|market| market.last)
    }

    /// Demand minus supply of a market in `period`.
    pub fn excess_demand(&self, key: &MarketKey, period: usize) -> Option<f64> {
        self.record(key, period).map(|record| record.excess_demand())
    }

    /// Allow or forbid the solver to move a market's price in `period`.
    pub fn set_solvable(&mut self, key: &MarketKey, period: usize, solvable: bool) {
        let Some(market) = self.markets.get_mut(key) else {
            warn!(market = %key, "set_solvable on unknown market ignored");
            return;
        };
        if let Some(flag) = market.solvable.get_mut(period) {
            *flag = solvable;
        }
    }

    /// Whether the solver may move a market's price in `period`.
    pub fn is_solvable(&self, key: &MarketKey, period: usize) -> bool {
        self.markets
            .get(key)
            .is_some_and(|market| market.is_solvable(period))
    }

    /// Keys of every market the solver may move in `period`.
    pub fn solvable_keys(&self, period: usize) -> Vec<MarketKey> {
        self.markets
            .values()
            .filter(|market| market.is_solvable(period))
            .map(|market| market.key.clone())
            .collect()
    }

    /// Drive the markets of `period` to equilibrium with `solver`.
    ///
    /// The report is informational; callers are not expected to act on it.
    pub fn solve(
        &mut self,
        solver: &mut dyn MarketSolver,
        world: &mut dyn WorldCalc,
        period: usize,
    ) -> SolveReport {
        solver.solve(self, world, period)
    }

    /// Write one CSV row per market for `period`:
    /// `market,name,price,supply,demand`.
    pub fn write_supply_demand(&self, period: usize, out: &mut dyn Write) -> io::Result<()> {
        for market in self.markets.values() {
            let Some(record) = market.records.get(period) else {
                continue;
            };
            writeln!(
                out,
                "{},{},{},{},{}",
                market.key.region, market.key.good, record.price, record.supply, record.demand
            )?;
        }
        Ok(())
    }

    /// Write every market's register for `period` to the debug trace.
    pub fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("marketplace", &[])?;
        for market in self.markets.values() {
            let Some(record) = market.records.get(period) else {
                continue;
            };
            xml.open(
                "market",
                &[
                    ("region", &market.key.region),
                    ("good", &market.key.good),
                    ("kind", market.kind.as_str()),
                ],
            )?;
            xml.element("price", record.price)?;
            xml.element("supply", record.supply)?;
            xml.element("demand", record.demand)?;
            xml.close("market")?;
        }
        xml.close("marketplace")
    }

    fn record_mut(&mut self, key: &MarketKey, period: usize) -> Option<&mut MarketRecord> {
        let Some(market) = self.markets.get_mut(key) else {
            warn!(market = %key, period, "Contribution to unknown market ignored");
            return None;
        };
        let record = market.records.get_mut(period);
        if record.is_none() {
            warn!(market = %key, period, "Contribution outside the model horizon ignored");
        }
        record
    }

    fn for_each_record(&mut self, period: usize, mut apply: impl FnMut(&mut MarketRecord)) {
        self.for_each_market_record(period, |_last, record| apply(record));
    }

    fn for_each_market_record(
        &mut self,
        period: usize,
        mut apply: impl FnMut(&MarketRecord, &mut MarketRecord),
    ) {
        if period >= self.period_count {
            warn!(period, period_count = self.period_count, "Period outside the model horizon");
            return;
        }
        for market in self.markets.values_mut() {
            let last = market.last;
            if let Some(record) = market.records.get_mut(period) {
                apply(&last, record);
            }
        }
    }
}
