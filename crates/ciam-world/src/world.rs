//! [`ReferenceWorld`], the region/sector/technology world driven by the
//! run loop.

use std::io::{self, Write};

use ciam_core::climate::EmissionsTotals;
use ciam_core::market::Marketplace;
use ciam_core::modeltime::Modeltime;
use ciam_core::world::{WorldCalc, WorldModel};
use ciam_core::xml::XmlWriter;
use tracing::{debug, info};

use crate::error::WorldError;
use crate::graph::{write_dependency_graph, write_sector_dependencies};
use crate::region::Region;
use crate::spec::WorldSpec;

/// A world of regions, each with producing sectors and final demands.
///
/// Definitions accumulate in a [`WorldSpec`] until
/// [`complete_init`](WorldModel::complete_init) validates them and builds
/// the runtime regions. Until then the world computes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceWorld {
    spec: WorldSpec,
    years: Vec<i32>,
    regions: Vec<Region>,
    totals: EmissionsTotals,
}

impl ReferenceWorld {
    /// The merged definition.
    pub const fn spec(&self) -> &WorldSpec {
        &self.spec
    }

    /// Runtime regions; empty before `complete_init`.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Look up a region by name.
    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.name() == name)
    }

    fn year(&self, period: usize) -> i32 {
        self.years
            .get(period)
            .or_else(|| self.years.last())
            .copied()
            .unwrap_or_default()
    }

    fn years_elapsed(&self, period: usize) -> i32 {
        let start = self.years.first().copied().unwrap_or_default();
        self.year(period).saturating_sub(start)
    }
}

impl WorldCalc for ReferenceWorld {
    fn calc(&mut self, marketplace: &mut Marketplace, period: usize) {
        let year = self.year(period);
        let years_elapsed = self.years_elapsed(period);
        for region in &mut self.regions {
            region.calc(marketplace, period, year, years_elapsed);
        }
    }
}

impl WorldModel for ReferenceWorld {
    type Spec = WorldSpec;
    type Error = WorldError;

    fn new(modeltime: &Modeltime) -> Self {
        let years = modeltime.years().to_vec();
        Self {
            spec: WorldSpec::default(),
            totals: EmissionsTotals::new(years.clone()),
            years,
            regions: Vec::new(),
        }
    }

    fn apply_spec(&mut self, spec: WorldSpec) {
        debug!(regions = spec.regions.len(), "World definition merged");
        self.spec.merge(spec);
    }

    fn complete_init(&mut self, marketplace: &mut Marketplace) -> Result<(), WorldError> {
        let period_count = self.years.len();
        let regions = self
            .spec
            .regions
            .iter()
            .map(|spec| Region::from_spec(spec, period_count))
            .collect::<Result<Vec<_>, _>>()?;
        if regions.iter().all(Region::is_empty) {
            return Err(WorldError::EmptyWorld);
        }

        for region in &regions {
            region.create_sector_markets(marketplace);
        }
        for region in &regions {
            region.create_purchase_markets(marketplace);
        }

        info!(
            regions = regions.len(),
            markets = marketplace.len(),
            "World initialized"
        );
        self.regions = regions;
        Ok(())
    }

    fn setup_calibration_markets(&mut self, marketplace: &mut Marketplace) {
        for region in &mut self.regions {
            region.setup_calibration_markets(marketplace);
        }
    }

    fn init_calc(&mut self, marketplace: &mut Marketplace, period: usize) {
        let year = self.year(period);
        for region in &self.regions {
            region.init_calc(marketplace, period, year);
        }
    }

    fn update_summary(&mut self, marketplace: &Marketplace, period: usize) {
        for region in &mut self.regions {
            region.update_summary(marketplace, period);
        }
    }

    fn emiss_ind(&mut self, period: usize) {
        for region in &mut self.regions {
            region.emiss_ind(period);
        }
    }

    fn calculate_emissions_totals(&mut self) {
        let mut totals = EmissionsTotals::new(self.years.clone());
        for region in &self.regions {
            for (gas, series) in region.emissions_by_gas() {
                for (period, amount) in series.iter().enumerate() {
                    totals.add(gas, period, *amount);
                }
            }
        }
        self.totals = totals;
    }

    fn emissions_totals(&self) -> &EmissionsTotals {
        &self.totals
    }

    fn write_xml(&self, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("world", &[])?;
        for region in &self.regions {
            region.write_xml(xml)?;
        }
        xml.close("world")
    }

    fn write_debug_xml(&self, period: usize, xml: &mut XmlWriter<'_>) -> io::Result<()> {
        xml.open("world", &[("period", &period.to_string())])?;
        for region in &self.regions {
            region.write_debug_xml(period, xml)?;
        }
        xml.close("world")
    }

    fn print_graphs(&self, out: &mut dyn Write, period: usize) -> io::Result<()> {
        write_dependency_graph(out, &self.regions, period)
    }

    fn print_sector_dependencies(&self, out: &mut dyn Write) -> io::Result<()> {
        write_sector_dependencies(out, &self.regions)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use ciam_core::market::MarketKey;
    use ciam_core::modeltime::{ModeltimeSpec, TimestepSpec};

    use super::*;
    use crate::spec::{DemandSpec, RegionSpec, SectorSpec, TechnologySpec};

    fn modeltime() -> Modeltime {
        ModeltimeSpec {
            start_year: 2000,
            timesteps: vec![TimestepSpec {
                until_year: 2020,
                step: 10,
            }],
        }
        .set()
        .unwrap()
    }

    fn oil_region() -> RegionSpec {
        RegionSpec {
            name: "gulf".to_owned(),
            sectors: vec![SectorSpec {
                name: "oil".to_owned(),
                initial_price: Some(3.0),
                calibrated_output: BTreeMap::from([(2010, 12.0)]),
                technologies: vec![TechnologySpec {
                    name: "conventional".to_owned(),
                    base_output: 10.0,
                    cost: 3.0,
                    supply_elasticity: 1.0,
                    inputs: Vec::new(),
                    emissions: BTreeMap::from([("CO2".to_owned(), 0.5)]),
                }],
                ..SectorSpec::default()
            }],
            demands: vec![DemandSpec {
                good: "oil".to_owned(),
                market: None,
                base_quantity: 10.0,
                growth: 0.0,
                price_elasticity: -1.0,
                base_price: 3.0,
            }],
        }
    }

    fn initialized() -> (ReferenceWorld, Marketplace) {
        let modeltime = modeltime();
        let mut world = ReferenceWorld::new(&modeltime);
        world.apply_spec(WorldSpec {
            regions: vec![oil_region()],
        });
        let mut marketplace = Marketplace::new(modeltime.max_period());
        world.complete_init(&mut marketplace).unwrap();
        (world, marketplace)
    }

    #[test]
    fn empty_world_is_rejected() {
        let mut world = ReferenceWorld::new(&modeltime());
        let mut marketplace = Marketplace::new(3);
        assert_eq!(
            world.complete_init(&mut marketplace),
            Err(WorldError::EmptyWorld)
        );
        assert!(marketplace.is_empty());
    }

    #[test]
    fn add_on_definitions_merge_before_init() {
        let mut world = ReferenceWorld::new(&modeltime());
        world.apply_spec(WorldSpec {
            regions: vec![oil_region()],
        });
        world.apply_spec(WorldSpec {
            regions: vec![RegionSpec {
                name: "gulf".to_owned(),
                sectors: vec![SectorSpec {
                    name: "oil".to_owned(),
                    initial_price: Some(4.0),
                    ..SectorSpec::default()
                }],
                demands: Vec::new(),
            }],
        });
        let mut marketplace = Marketplace::new(3);
        world.complete_init(&mut marketplace).unwrap();

        let oil = marketplace.market(&MarketKey::new("gulf", "oil")).unwrap();
        assert_eq!(oil.initial_price(), 4.0);
        assert_eq!(world.regions().len(), 1);
        assert_eq!(world.region("gulf").unwrap().sectors()[0].technologies().len(), 1);
    }

    #[test]
    fn calc_uses_period_year_for_growth_and_targets() {
        let (mut world, mut marketplace) = initialized();
        world.setup_calibration_markets(&mut marketplace);
        marketplace.init_prices();

        world.init_calc(&mut marketplace, 1);
        world.calc(&mut marketplace, 1);

        let calibration = MarketKey::new("gulf", "oil-calibration");
        assert!(marketplace.is_solvable(&calibration, 1));
        let record = marketplace.record(&calibration, 1).unwrap();
        assert_eq!((record.supply, record.demand), (10.0, 12.0));

        world.init_calc(&mut marketplace, 2);
        assert!(!marketplace.is_solvable(&calibration, 2));
    }

    #[test]
    fn emissions_totals_sum_regions() {
        let (mut world, mut marketplace) = initialized();
        marketplace.init_prices();
        for period in 0..3 {
            world.calc(&mut marketplace, period);
            world.emiss_ind(period);
        }
        world.calculate_emissions_totals();

        let totals = world.emissions_totals();
        assert_eq!(totals.years(), &[2000, 2010, 2020]);
        assert_eq!(totals.series("CO2").unwrap(), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn world_xml_lists_regions_and_sectors() {
        let (world, _) = initialized();
        let mut out = Vec::new();
        {
            let mut xml = XmlWriter::new(&mut out);
            world.write_xml(&mut xml).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("<world>\n"));
        assert!(text.contains("\t<region name=\"gulf\">\n"));
        assert!(text.contains("<sector name=\"oil\" good=\"oil\" market=\"gulf\">"));
        assert!(text.contains("<calibrated-output year=\"2010\">12</calibrated-output>"));
        assert!(text.contains("<demand good=\"oil\" market=\"gulf\">"));
    }
}
