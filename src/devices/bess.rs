use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::BessConfig;
use crate::error::StateError;

/// Tolerance for SOC bound checks, absorbing floating-point drift.
pub const SOC_TOLERANCE: f64 = 1e-9;

/// Operating mode of the battery during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BessMode {
    Charge,
    Discharge,
    /// Sitting above the floor without moving energy.
    Hold,
    /// Sitting at the floor.
    #[default]
    Idle,
}

impl fmt::Display for BessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Charge => "charge",
            Self::Discharge => "discharge",
            Self::Hold => "hold",
            Self::Idle => "idle",
        };
        f.write_str(s)
    }
}

/// Dynamic battery state owned by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BessState {
    /// State of charge as a fraction of capacity.
    pub soc: f64,
    pub mode: BessMode,
}

impl BessState {
    /// State at the floor, as after `reset`.
    pub fn at_floor(spec: &Bess) -> Self {
        Self {
            soc: spec.soc_min,
            mode: BessMode::Idle,
        }
    }
}

/// A battery energy storage system with separate charge and discharge efficiencies.
///
/// `Bess` holds only static parameters; the SOC lives in [`BessState`]
/// so the dispatch engine can stay a pure function.
///
/// # Energy convention
/// - `charge_in` is energy drawn from the bus (kWh); `eta_c · charge_in` is stored.
/// - `discharge_out` is energy delivered to the bus (kWh); `discharge_out / eta_d` leaves storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bess {
    /// Battery capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Maximum charge or discharge power in kilowatts.
    pub max_power_kw: f64,

    /// Lower SOC bound (fraction).
    pub soc_min: f64,

    /// Upper SOC bound (fraction).
    pub soc_max: f64,

    /// Charging efficiency (0..1.0).
    pub eta_c: f64,

    /// Discharging efficiency (0..1.0).
    pub eta_d: f64,
}

impl Bess {
    /// Builds the battery model from its configuration.
    pub fn from_config(cfg: &BessConfig) -> Self {
        Self {
            capacity_kwh: cfg.capacity_kwh,
            max_power_kw: cfg.power_kw,
            soc_min: cfg.soc_min,
            soc_max: cfg.soc_max,
            eta_c: cfg.eta_charge(),
            eta_d: cfg.eta_discharge(),
        }
    }

    /// Product of both efficiencies.
    pub fn round_trip_efficiency(&self) -> f64 {
        self.eta_c * self.eta_d
    }

    /// Fails with [`StateError::InfeasibleSoc`] when `soc` is outside the configured bounds.
    pub fn check_soc(&self, soc: f64) -> Result<(), StateError> {
        if !soc.is_finite()
            || soc < self.soc_min - SOC_TOLERANCE
            || soc > self.soc_max + SOC_TOLERANCE
        {
            return Err(StateError::InfeasibleSoc {
                soc,
                soc_min: self.soc_min,
                soc_max: self.soc_max,
            });
        }
        Ok(())
    }

    /// Energy (kWh, bus side) the battery can accept over one hour before
    /// reaching `ceiling_soc` or its power limit.
    pub fn charge_headroom_kwh(&self, soc: f64, ceiling_soc: f64, dt_hours: f64) -> f64 {
        let by_soc = (ceiling_soc.min(self.soc_max) - soc).max(0.0) * self.capacity_kwh / self.eta_c;
        by_soc.min(self.max_power_kw * dt_hours)
    }

    /// Energy (kWh, bus side) the battery can deliver before reaching the floor.
    /// Not limited by power.
    pub fn stored_above_floor_kwh(&self, soc: f64) -> f64 {
        (soc - self.soc_min).max(0.0) * self.capacity_kwh * self.eta_d
    }

    /// Energy (kWh, bus side) the battery can deliver over one step, limited by power.
    pub fn discharge_available_kwh(&self, soc: f64, dt_hours: f64) -> f64 {
        self.stored_above_floor_kwh(soc)
            .min(self.max_power_kw * dt_hours)
    }

    /// SOC after moving `charge_in` into and `discharge_out` out of the battery,
    /// minus `bleed_kwh` written off from storage directly.
    pub fn soc_after(&self, soc: f64, charge_in: f64, discharge_out: f64, bleed_kwh: f64) -> f64 {
        let stored = self.eta_c * charge_in - discharge_out / self.eta_d - bleed_kwh;
        soc + stored / self.capacity_kwh
    }
}
