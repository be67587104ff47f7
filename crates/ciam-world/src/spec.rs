//! Typed world definitions as they appear under a scenario's `world` node.
//!
//! A base document and its add-ons may each carry a `world` node. The
//! definitions are merged before the runtime world is built:
//!
//! - regions merge by `name`,
//! - sectors merge by `name` within a region: scalar fields set in the
//!   later definition override, calibration targets are extended, and
//!   technologies are replaced (or added) by `name`,
//! - demands are replaced (or added) by `good`.
//!
//! ```yaml
//! world:
//!   regions:
//!     - name: usa
//!       sectors:
//!         - name: electricity
//!           initial_price: 5.0
//!           calibrated_output: { "2010": 80.0 }
//!           technologies:
//!             - { name: coal, base_output: 50.0, cost: 4.0 }
//!       demands:
//!         - { good: electricity, base_quantity: 70.0, price_elasticity: -0.5, base_price: 5.0 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The whole world definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    /// Model regions.
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
}

impl WorldSpec {
    /// Merge a later definition into this one.
    pub fn merge(&mut self, other: Self) {
        for region in other.regions {
            match self.regions.iter_mut().find(|r| r.name == region.name) {
                Some(existing) => existing.merge(region),
                None => self.regions.push(region),
            }
        }
    }
}

/// One model region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Region name; also the default market region of its goods.
    pub name: String,
    /// Producing sectors.
    #[serde(default)]
    pub sectors: Vec<SectorSpec>,
    /// Final demands.
    #[serde(default)]
    pub demands: Vec<DemandSpec>,
}

impl RegionSpec {
    fn merge(&mut self, other: Self) {
        for sector in other.sectors {
            match self.sectors.iter_mut().find(|s| s.name == sector.name) {
                Some(existing) => existing.merge(sector),
                None => self.sectors.push(sector),
            }
        }
        for demand in other.demands {
            match self.demands.iter_mut().find(|d| d.good == demand.good) {
                Some(existing) => *existing = demand,
                None => self.demands.push(demand),
            }
        }
    }
}

/// A sector producing one good from one or more technologies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorSpec {
    /// Sector name, unique within its region.
    pub name: String,
    /// Good produced; defaults to the sector name.
    #[serde(default)]
    pub good: Option<String>,
    /// Market region the good trades in; defaults to the model region.
    #[serde(default)]
    pub market: Option<String>,
    /// Starting price of the good's market; defaults to
    /// [`DEFAULT_INITIAL_PRICE`].
    #[serde(default)]
    pub initial_price: Option<f64>,
    /// Reference output by calendar year. Years listed here get a
    /// calibration market when calibration is active.
    #[serde(default)]
    pub calibrated_output: BTreeMap<i32, f64>,
    /// Production technologies.
    #[serde(default)]
    pub technologies: Vec<TechnologySpec>,
}

/// Starting price of a sector market whose definition gives none.
pub const DEFAULT_INITIAL_PRICE: f64 = 1.0;

impl SectorSpec {
    fn merge(&mut self, other: Self) {
        if other.good.is_some() {
            self.good = other.good;
        }
        if other.market.is_some() {
            self.market = other.market;
        }
        if other.initial_price.is_some() {
            self.initial_price = other.initial_price;
        }
        self.calibrated_output.extend(other.calibrated_output);
        for technology in other.technologies {
            match self
                .technologies
                .iter_mut()
                .find(|t| t.name == technology.name)
            {
                Some(existing) => *existing = technology,
                None => self.technologies.push(technology),
            }
        }
    }

    /// The good this sector produces.
    pub fn good(&self) -> &str {
        self.good.as_deref().unwrap_or(&self.name)
    }
}

/// A production technology with a constant-elasticity supply response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologySpec {
    /// Technology name, unique within its sector.
    pub name: String,
    /// Output at a price equal to `cost`.
    pub base_output: f64,
    /// Unit cost; output responds to `price / cost`.
    pub cost: f64,
    /// Exponent of the supply response.
    #[serde(default = "default_supply_elasticity")]
    pub supply_elasticity: f64,
    /// Intermediate goods consumed per unit of output.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Emissions per unit of output, by gas.
    #[serde(default)]
    pub emissions: BTreeMap<String, f64>,
}

const fn default_supply_elasticity() -> f64 {
    1.0
}

/// An intermediate input of a technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Good consumed.
    pub good: String,
    /// Market region the good is bought in; defaults to the model region.
    #[serde(default)]
    pub market: Option<String>,
    /// Units consumed per unit of output.
    pub coefficient: f64,
}

/// Final (consumer) demand for one good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSpec {
    /// Good demanded.
    pub good: String,
    /// Market region the good is bought in; defaults to the model region.
    #[serde(default)]
    pub market: Option<String>,
    /// Quantity demanded in the start year at `base_price`.
    pub base_quantity: f64,
    /// Annual growth rate of demand at constant price.
    #[serde(default)]
    pub growth: f64,
    /// Own-price elasticity; zero or negative.
    #[serde(default)]
    pub price_elasticity: f64,
    /// Price at which `base_quantity` is demanded.
    #[serde(default = "default_base_price")]
    pub base_price: f64,
}

const fn default_base_price() -> f64 {
    1.0
}
