//! Physical device models for the hub and synthetic upstream generators.

/// Battery energy storage model.
pub mod bess;
/// Charging socket model.
pub mod charger;
/// Fleet layout and session sampling.
pub mod fleet;
/// Mall demand profile generator.
pub mod mall_load;
/// Solar photovoltaic generation model.
pub mod solar;
pub mod types;

// Re-export the main types for convenience
pub use bess::{Bess, BessMode, BessState};
pub use charger::{Charger, ChargerClass, DrawLimit};
pub use fleet::{FleetSampler, Session, fleet_layout};
pub use mall_load::MallLoad;
pub use solar::SolarPv;
pub use types::HourlySource;
