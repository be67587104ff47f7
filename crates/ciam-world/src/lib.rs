//! Reference world model for the CIAM run driver.
//!
//! This crate models a small economy: regions own producing sectors and
//! final demands, sectors produce one good each from one or more
//! technologies, and every good is traded in a market shared with the
//! rest of the world. It implements
//! [`WorldModel`](ciam_core::world::WorldModel) so that scenarios can be run
//! end to end.
//!
//! # Modules
//!
//! - [`demand`] -- [`FinalDemand`] with growth and price response.
//! - [`error`] -- Error types for world assembly.
//! - [`graph`] -- DOT dependency graphs and the sector dependency report.
//! - [`region`] -- [`Region`] with its per-period summary and emissions.
//! - [`sector`] -- [`Sector`] and [`Technology`] supply curves and
//!   calibration.
//! - [`spec`] -- Typed, mergeable world definitions.
//! - [`world`] -- [`ReferenceWorld`], the [`WorldModel`] implementation.
//!
//! [`FinalDemand`]: demand::FinalDemand
//! [`Region`]: region::Region
//! [`Sector`]: sector::Sector
//! [`Technology`]: sector::Technology
//! [`ReferenceWorld`]: world::ReferenceWorld
//! [`WorldModel`]: ciam_core::world::WorldModel

pub mod demand;
pub mod error;
pub mod graph;
pub mod region;
pub mod sector;
pub mod spec;
pub mod world;

// Re-export primary types at crate root.
pub use error::WorldError;
pub use spec::WorldSpec;
pub use world::ReferenceWorld;
