//! Final demand: the consumers at the end of every supply chain.

use std::io;

use ciam_core::market::{MarketKey, Marketplace};
use ciam_core::xml::XmlWriter;

use crate::sector::MIN_PRICE;
use crate::spec::DemandSpec;

/// Consumer demand for one good, growing over time and responding to its
/// price:
///
/// ```text
/// quantity = base_quantity * (1 + growth) ^ (year - start_year)
///          * (price / base_price) ^ price_elasticity
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FinalDemand {
    key: MarketKey,
    base_quantity: f64,
    growth: f64,
    price_elasticity: f64,
    base_price: f64,
    consumption: Vec<f64>,
}

impl FinalDemand {
    pub(crate) fn from_spec(spec: &DemandSpec, region: &str, period_count: usize) -> Self {
        Self {
            key: MarketKey::new(spec.market.as_deref().unwrap_or(region), &spec.good),
            base_quantity: spec.base_quantity,
            growth: spec.growth,
            price_elasticity: spec.price_elasticity,
            base_price: spec.base_price,
            consumption: vec![0.0; period_count],
        }
    }

    /// Market the good is bought in.
    pub const fn key(&self) -> &MarketKey {
        &self.key
    }

    /// Quantity demanded at `price`, `years_elapsed` after the start year.
    pub fn quantity_at(&self, price: f64, years_elapsed: i32) -> f64 {
        let trend = (1.0 + self.growth).powi(years_elapsed);
        let relative = price.max(MIN_PRICE) / self.base_price;
        self.base_quantity * trend * relative.powf(self.price_elasticity)
    }

    /// Quantity consumed in the most recent evaluation of `period`.
    pub fn consumption(&self, period: usize) -> f64 {
        self.consumption.get(period).copied().unwrap_or(0.0)
    }

    pub(crate) fn calc(&mut self, marketplace: &mut Marketplace, period: usize, years_elapsed: i32) {
        let price = marketplace
            .price(&self.key, period)
            .unwrap_or(self.base_price);
        let quantity = self.quantity_at(price, years_elapsed);
        if let Some(slot) = self.consumption.get_mut(period) {
            *slot = quantity;
        }
        marketplace.add_to_demand(&self.key, period, quantity);
    }

    pub(crate) fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open(
            "demand",
            &[("good", &self.key.good), ("market", &self.key.region)],
        )?;
        xml.element("base-quantity", self.base_quantity)?;
        xml.element("growth", self.growth)?;
        xml.element("price-elasticity", self.price_elasticity)?;
        xml.element("base-price", self.base_price)?;
        xml.close("demand")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use ciam_core::market::MarketKind;

    use super::*;

    fn electricity() -> FinalDemand {
        let spec = DemandSpec {
            good: "electricity".to_owned(),
            market: None,
            base_quantity: 100.0,
            growth: 0.1,
            price_elasticity: -1.0,
            base_price: 5.0,
        };
        FinalDemand::from_spec(&spec, "usa", 2)
    }

    #[test]
    fn quantity_grows_and_responds_to_price() {
        let demand = electricity();
        assert_eq!(demand.quantity_at(5.0, 0), 100.0);
        assert_eq!(demand.quantity_at(10.0, 0), 50.0);
        assert!((demand.quantity_at(5.0, 2) - 121.0).abs() < 1e-9);
    }

    #[test]
    fn calc_adds_demand_at_market_price() {
        let mut demand = electricity();
        let mut marketplace = Marketplace::new(2);
        marketplace.create_market(demand.key().clone(), MarketKind::Normal, 2.5);
        marketplace.init_prices();

        demand.calc(&mut marketplace, 1, 0);
        demand.calc(&mut marketplace, 1, 0);

        assert_eq!(demand.consumption(1), 200.0);
        assert_eq!(marketplace.record(demand.key(), 1).unwrap().demand, 400.0);
    }
}
