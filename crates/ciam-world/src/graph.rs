//! Sector dependency exports: a DOT graph per period and a CSV report.
//!
//! A sector depends on every sector that sells into a market one of its
//! technologies buys from. Sectors are named `region/sector` so that the
//! same sector name in two regions stays distinct.

use std::collections::BTreeMap;
use std::io::{self, Write};

use ciam_core::market::MarketKey;

use crate::region::Region;
use crate::sector::Sector;

/// `region/sector`, the node name used by both exports.
pub fn node_name(region: &str, sector: &str) -> String {
    format!("{region}/{sector}")
}

/// Every sector selling into each market.
fn producers(regions: &[Region]) -> BTreeMap<&MarketKey, Vec<String>> {
    let mut producers: BTreeMap<&MarketKey, Vec<String>> = BTreeMap::new();
    for region in regions {
        for sector in region.sectors() {
            producers
                .entry(sector.key())
                .or_default()
                .push(node_name(region.name(), sector.name()));
        }
    }
    producers
}

/// Producers a sector buys from, in input order, without repeats.
fn dependencies<'a>(
    sector: &Sector,
    producers: &'a BTreeMap<&MarketKey, Vec<String>>,
) -> Vec<&'a str> {
    let mut found: Vec<&str> = Vec::new();
    let keys = sector
        .technologies()
        .iter()
        .flat_map(|technology| technology.inputs())
        .map(|input| &input.key);
    for key in keys {
        for producer in producers.get(key).into_iter().flatten() {
            if !found.contains(&producer.as_str()) {
                found.push(producer);
            }
        }
    }
    found
}

/// Write `period`'s dependency graph in DOT format. Edges run from producer
/// to consumer and are labelled with the good and the quantity bought.
pub fn write_dependency_graph(
    out: &mut dyn Write,
    regions: &[Region],
    period: usize,
) -> io::Result<()> {
    let producers = producers(regions);
    writeln!(out, "digraph period_{period} {{")?;
    for region in regions {
        for sector in region.sectors() {
            writeln!(out, "\t\"{}\";", node_name(region.name(), sector.name()))?;
        }
    }
    for region in regions {
        for sector in region.sectors() {
            let consumer = node_name(region.name(), sector.name());
            for (key, flow) in sector.input_flows(period) {
                for producer in producers.get(key).into_iter().flatten() {
                    writeln!(
                        out,
                        "\t\"{producer}\" -> \"{consumer}\" [label=\"{} ({flow:.2})\"];",
                        key.good
                    )?;
                }
            }
        }
    }
    writeln!(out, "}}")
}

/// Write one CSV row per sector: its region, its name, then every sector it
/// buys from.
pub fn write_sector_dependencies(out: &mut dyn Write, regions: &[Region]) -> io::Result<()> {
    let producers = producers(regions);
    writeln!(out, "Region,Sector,Dependencies")?;
    for region in regions {
        for sector in region.sectors() {
            write!(out, "{},{}", region.name(), sector.name())?;
            for dependency in dependencies(sector, &producers) {
                write!(out, ",{dependency}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ciam_core::market::Marketplace;

    use super::*;
    use crate::spec::{InputSpec, RegionSpec, SectorSpec, TechnologySpec};

    fn technology(name: &str, inputs: &[(&str, &str)]) -> TechnologySpec {
        TechnologySpec {
            name: name.to_owned(),
            base_output: 10.0,
            cost: 1.0,
            supply_elasticity: 1.0,
            inputs: inputs
                .iter()
                .map(|(market, good)| InputSpec {
                    good: (*good).to_owned(),
                    market: Some((*market).to_owned()),
                    coefficient: 0.5,
                })
                .collect(),
            emissions: BTreeMap::new(),
        }
    }

    fn sector(name: &str, inputs: &[(&str, &str)]) -> SectorSpec {
        SectorSpec {
            name: name.to_owned(),
            technologies: vec![technology(name, inputs)],
            ..SectorSpec::default()
        }
    }

    fn regions() -> Vec<Region> {
        let usa = RegionSpec {
            name: "usa".to_owned(),
            sectors: vec![
                sector("electricity", &[("usa", "coal"), ("usa", "gas")]),
                sector("coal", &[]),
            ],
            demands: Vec::new(),
        };
        let canada = RegionSpec {
            name: "canada".to_owned(),
            sectors: vec![SectorSpec {
                market: Some("usa".to_owned()),
                ..sector("coal", &[])
            }],
            demands: Vec::new(),
        };
        vec![
            Region::from_spec(&usa, 2).unwrap(),
            Region::from_spec(&canada, 2).unwrap(),
        ]
    }

    #[test]
    fn dependencies_list_every_producer_of_every_input() {
        let mut out = Vec::new();
        write_sector_dependencies(&mut out, &regions()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Region,Sector,Dependencies\n\
             usa,electricity,usa/coal,canada/coal\n\
             usa,coal\n\
             canada,coal\n"
        );
    }

    #[test]
    fn graph_edges_carry_input_flows() {
        let mut regions = regions();
        let mut marketplace = Marketplace::new(2);
        for region in &regions {
            region.create_sector_markets(&mut marketplace);
        }
        for region in &regions {
            region.create_purchase_markets(&mut marketplace);
        }
        marketplace.init_prices();
        for region in &mut regions {
            region.calc(&mut marketplace, 1, 2010, 10);
        }

        let mut out = Vec::new();
        write_dependency_graph(&mut out, &regions, 1).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph period_1 {\n"));
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\t\"canada/coal\";\n"));
        assert!(text.contains("\t\"usa/coal\" -> \"usa/electricity\" [label=\"coal (5.00)\"];\n"));
        assert!(text.contains("\t\"canada/coal\" -> \"usa/electricity\" [label=\"coal (5.00)\"];\n"));
        assert!(!text.contains("label=\"gas"));
    }
}
