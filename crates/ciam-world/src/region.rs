//! Model regions: the owners of sectors, final demands, and per-period
//! reporting.

use std::collections::BTreeMap;
use std::io;

use ciam_core::market::{MarketKind, Marketplace};
use ciam_core::xml::XmlWriter;
use tracing::warn;

use crate::demand::FinalDemand;
use crate::error::WorldError;
use crate::sector::Sector;
use crate::spec::{DEFAULT_INITIAL_PRICE, RegionSpec};

/// Per-period results kept for reporting once a period has converged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSummary {
    /// Output by good, one entry per period.
    pub output: BTreeMap<String, Vec<f64>>,
    /// Market price of each produced good, one entry per period.
    pub prices: BTreeMap<String, Vec<f64>>,
}

/// One model region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    period_count: usize,
    sectors: Vec<Sector>,
    demands: Vec<FinalDemand>,
    emissions: BTreeMap<String, Vec<f64>>,
    summary: RegionSummary,
}

impl Region {
    /// Validate a region definition and build its runtime form.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] for non-positive costs, initial prices, or
    /// base prices, and for demands that rise with price.
    pub fn from_spec(spec: &RegionSpec, period_count: usize) -> Result<Self, WorldError> {
        validate(spec)?;
        let sectors = spec
            .sectors
            .iter()
            .map(|sector| Sector::from_spec(sector, &spec.name, period_count))
            .collect();
        let demands = spec
            .demands
            .iter()
            .map(|demand| FinalDemand::from_spec(demand, &spec.name, period_count))
            .collect();
        Ok(Self {
            name: spec.name.clone(),
            period_count,
            sectors,
            demands,
            emissions: BTreeMap::new(),
            summary: RegionSummary::default(),
        })
    }

    /// Region name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sectors in definition order.
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Final demands in definition order.
    pub fn demands(&self) -> &[FinalDemand] {
        &self.demands
    }

    /// Reporting summary.
    pub const fn summary(&self) -> &RegionSummary {
        &self.summary
    }

    /// Emissions of `gas` in `period`, as of the last `emiss_ind` call.
    pub fn emissions(&self, gas: &str, period: usize) -> f64 {
        self.emissions
            .get(gas)
            .and_then(|series| series.get(period))
            .copied()
            .unwrap_or(0.0)
    }

    /// Per-period emissions of every gas.
    pub const fn emissions_by_gas(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.emissions
    }

    /// Whether the region has nothing to compute.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty() && self.demands.is_empty()
    }

    /// Create the markets this region's sectors sell into.
    pub(crate) fn create_sector_markets(&self, marketplace: &mut Marketplace) {
        for sector in &self.sectors {
            sector.create_markets(marketplace);
        }
    }

    /// Create input and demand markets no sector has created. Runs after
    /// every region's sector markets exist, so a market created here has no
    /// seller.
    pub(crate) fn create_purchase_markets(&self, marketplace: &mut Marketplace) {
        let inputs = self
            .sectors
            .iter()
            .flat_map(|sector| sector.technologies())
            .flat_map(|technology| technology.inputs())
            .map(|input| &input.key);
        let demanded = self.demands.iter().map(FinalDemand::key);
        for key in inputs.chain(demanded) {
            if marketplace.create_market(key.clone(), MarketKind::Normal, DEFAULT_INITIAL_PRICE) {
                warn!(region = self.name, market = %key, "Good is bought but no sector sells it");
            }
        }
    }

    pub(crate) fn setup_calibration_markets(&mut self, marketplace: &mut Marketplace) {
        for sector in &mut self.sectors {
            sector.setup_calibration_market(&self.name, marketplace);
        }
    }

    pub(crate) fn init_calc(&self, marketplace: &mut Marketplace, period: usize, year: i32) {
        for sector in &self.sectors {
            sector.init_calc(marketplace, period, year);
        }
    }

    pub(crate) fn calc(
        &mut self,
        marketplace: &mut Marketplace,
        period: usize,
        year: i32,
        years_elapsed: i32,
    ) {
        for sector in &mut self.sectors {
            sector.calc(marketplace, period, year);
        }
        for demand in &mut self.demands {
            demand.calc(marketplace, period, years_elapsed);
        }
    }

    pub(crate) fn update_summary(&mut self, marketplace: &Marketplace, period: usize) {
        let period_count = self.period_count;
        for sector in &self.sectors {
            let good = &sector.key().good;
            let output = self
                .summary
                .output
                .entry(good.clone())
                .or_insert_with(|| vec![0.0; period_count]);
            if let Some(slot) = output.get_mut(period) {
                *slot = sector.output(period);
            }
            let price = marketplace
                .price(sector.key(), period)
                .unwrap_or(sector.initial_price());
            let prices = self
                .summary
                .prices
                .entry(good.clone())
                .or_insert_with(|| vec![0.0; period_count]);
            if let Some(slot) = prices.get_mut(period) {
                *slot = price;
            }
        }
    }

    pub(crate) fn emiss_ind(&mut self, period: usize) {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for technology in self.sectors.iter().flat_map(Sector::technologies) {
            for (gas, amount) in technology.emissions(period) {
                *totals.entry(gas).or_insert(0.0) += amount;
            }
        }
        let period_count = self.period_count;
        for (gas, amount) in totals {
            let series = self
                .emissions
                .entry(gas.to_owned())
                .or_insert_with(|| vec![0.0; period_count]);
            if let Some(slot) = series.get_mut(period) {
                *slot = amount;
            }
        }
    }

    pub(crate) fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("region", &[("name", &self.name)])?;
        for sector in &self.sectors {
            sector.write_xml(xml)?;
        }
        for demand in &self.demands {
            demand.write_xml(xml)?;
        }
        xml.close("region")
    }

    pub(crate) fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("region", &[("name", &self.name)])?;
        for sector in &self.sectors {
            sector.write_debug_xml(period, xml)?;
        }
        for demand in &self.demands {
            xml.element_with_attrs(
                "consumption",
                &[("good", &demand.key().good)],
                demand.consumption(period),
            )?;
        }
        for (gas, series) in &self.emissions {
            let amount = series.get(period).copied().unwrap_or(0.0);
            xml.element_with_attrs("emissions", &[("gas", gas)], amount)?;
        }
        xml.close("region")
    }
}

fn validate(spec: &RegionSpec) -> Result<(), WorldError> {
    for sector in &spec.sectors {
        if let Some(initial_price) = sector.initial_price.filter(|price| *price <= 0.0) {
            return Err(WorldError::NonPositiveInitialPrice {
                region: spec.name.clone(),
                sector: sector.name.clone(),
                initial_price,
            });
        }
        if let Some(technology) = sector.technologies.iter().find(|t| t.cost <= 0.0) {
            return Err(WorldError::NonPositiveCost {
                region: spec.name.clone(),
                sector: sector.name.clone(),
                technology: technology.name.clone(),
                cost: technology.cost,
            });
        }
    }
    for demand in &spec.demands {
        if demand.price_elasticity > 0.0 {
            return Err(WorldError::PositiveDemandElasticity {
                region: spec.name.clone(),
                good: demand.good.clone(),
                elasticity: demand.price_elasticity,
            });
        }
        if demand.base_price <= 0.0 {
            return Err(WorldError::NonPositiveBasePrice {
                region: spec.name.clone(),
                good: demand.good.clone(),
                base_price: demand.base_price,
            });
        }
    }
    Ok(())
}
