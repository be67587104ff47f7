//! Error types for the `ciam-world` crate.
//!
//! The world only fails while it is being assembled. Once
//! [`complete_init`](ciam_core::world::WorldModel::complete_init) has
//! succeeded, every per-period operation is infallible.

/// Errors that can occur while assembling the reference world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// No region defines a sector or a demand.
    #[error("world has no regions with sectors or demands")]
    EmptyWorld,

    /// A technology's unit cost is zero or negative.
    #[error("technology {technology} in {region}/{sector} has non-positive cost {cost}")]
    NonPositiveCost {
        /// Region of the technology.
        region: String,
        /// Sector of the technology.
        sector: String,
        /// The offending technology.
        technology: String,
        /// The declared cost.
        cost: f64,
    },

    /// A final demand rises with its own price.
    #[error("demand for {good} in {region} has positive price elasticity {elasticity}")]
    PositiveDemandElasticity {
        /// Region of the demand.
        region: String,
        /// Demanded good.
        good: String,
        /// The declared elasticity.
        elasticity: f64,
    },

    /// A final demand's reference price is zero or negative.
    #[error("demand for {good} in {region} has non-positive base price {base_price}")]
    NonPositiveBasePrice {
        /// Region of the demand.
        region: String,
        /// Demanded good.
        good: String,
        /// The declared base price.
        base_price: f64,
    },

    /// A sector's starting price is zero or negative.
    #[error("sector {region}/{sector} has non-positive initial price {initial_price}")]
    NonPositiveInitialPrice {
        /// Region of the sector.
        region: String,
        /// The offending sector.
        sector: String,
        /// The declared initial price.
        initial_price: f64,
    },
}
