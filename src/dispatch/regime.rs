//! Six-phase daily regime, selected by table lookup on hour of day.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RegimeHours;

/// One of the six time-of-day bands governing what the BESS and chargers may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// PV surplus goes to the BESS first; chargers draw only leftover PV.
    ChargePriority,
    /// PV serves load and EVs first; the surplus charges the BESS.
    ChargeServe,
    /// BESS stays full; it only shaves load spikes above the peak target.
    HoldFull,
    /// BESS discharges into load then EVs, gliding toward the floor.
    PeakShave,
    /// Closing hour: the BESS is pulled to `soc_min`.
    DischargeToFloor,
    /// BESS parked at the floor; chargers inactive.
    IdleAtFloor,
}

impl Regime {
    /// All phases, in daily order.
    pub const ALL: [Regime; 6] = [
        Regime::ChargePriority,
        Regime::ChargeServe,
        Regime::HoldFull,
        Regime::PeakShave,
        Regime::DischargeToFloor,
        Regime::IdleAtFloor,
    ];

    /// Looks up the phase for `hour` (0..24).
    ///
    /// The closing phase starts at `closing_hour` and runs until
    /// `hours.idle`, always covering at least the closing hour itself.
    pub fn for_hour(hour: usize, hours: &RegimeHours, closing_hour: usize) -> Self {
        let hour = hour % 24;
        let idle_start = hours.idle.max(closing_hour + 1);
        if (closing_hour..idle_start).contains(&hour) {
            Regime::DischargeToFloor
        } else if (hours.charge_prio..hours.charge_serve).contains(&hour) {
            Regime::ChargePriority
        } else if (hours.charge_serve..hours.hold).contains(&hour) {
            Regime::ChargeServe
        } else if (hours.hold..hours.discharge).contains(&hour) {
            Regime::HoldFull
        } else if (hours.discharge..closing_hour).contains(&hour) {
            Regime::PeakShave
        } else {
            Regime::IdleAtFloor
        }
    }

    /// The BESS may absorb PV surplus.
    pub fn allows_charge(self) -> bool {
        matches!(
            self,
            Regime::ChargePriority | Regime::ChargeServe | Regime::HoldFull
        )
    }

    /// The BESS may deliver energy (possibly restricted, see [`Regime::HoldFull`]).
    pub fn allows_discharge(self) -> bool {
        matches!(
            self,
            Regime::HoldFull | Regime::PeakShave | Regime::DischargeToFloor
        )
    }

    /// Chargers may draw at all.
    pub fn chargers_active(self) -> bool {
        self != Regime::IdleAtFloor
    }

    /// Chargers may only draw PV left over after the BESS.
    pub fn ev_pv_only(self) -> bool {
        self == Regime::ChargePriority
    }

    /// Stable integer code, used in telemetry exports.
    pub fn code(self) -> u8 {
        match self {
            Regime::ChargePriority => 0,
            Regime::ChargeServe => 1,
            Regime::HoldFull => 2,
            Regime::PeakShave => 3,
            Regime::DischargeToFloor => 4,
            Regime::IdleAtFloor => 5,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::ChargePriority => "charge_priority",
            Regime::ChargeServe => "charge_serve",
            Regime::HoldFull => "hold_full",
            Regime::PeakShave => "peak_shave",
            Regime::DischargeToFloor => "discharge_to_floor",
            Regime::IdleAtFloor => "idle_at_floor",
        };
        f.write_str(s)
    }
}

/// Hours from `hour` up to and including `closing_hour`, wrapping at midnight.
pub fn hours_until_closing_inclusive(hour: usize, closing_hour: usize) -> usize {
    (closing_hour + 24 - hour % 24) % 24 + 1
}
