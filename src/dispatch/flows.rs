//! Per-step energy flows, saturation records and departure events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::devices::ChargerClass;

/// Energy moved along each edge of the hub during one step (kWh, all >= 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub pv_to_load: f64,
    pub pv_to_ev: f64,
    pub pv_to_bess: f64,
    pub pv_export: f64,
    pub bess_to_load: f64,
    pub bess_to_ev: f64,
    pub grid_to_load: f64,
    pub grid_to_ev: f64,
    /// Energy drawn from the bus into the BESS.
    pub bess_charge_in: f64,
    /// Energy delivered by the BESS to the bus.
    pub bess_discharge_out: f64,
}

impl FlowRecord {
    /// Field names in declaration order, for exports.
    pub const FIELDS: [&'static str; 10] = [
        "pv_to_load",
        "pv_to_ev",
        "pv_to_bess",
        "pv_export",
        "bess_to_load",
        "bess_to_ev",
        "grid_to_load",
        "grid_to_ev",
        "bess_charge_in",
        "bess_discharge_out",
    ];

    /// Values in the order of [`FlowRecord::FIELDS`].
    pub fn values(&self) -> [f64; 10] {
        [
            self.pv_to_load,
            self.pv_to_ev,
            self.pv_to_bess,
            self.pv_export,
            self.bess_to_load,
            self.bess_to_ev,
            self.grid_to_load,
            self.grid_to_ev,
            self.bess_charge_in,
            self.bess_discharge_out,
        ]
    }

    /// Total grid import (kWh).
    pub fn grid_import(&self) -> f64 {
        self.grid_to_load + self.grid_to_ev
    }

    /// Total energy delivered to vehicles (kWh).
    pub fn ev_delivered(&self) -> f64 {
        self.pv_to_ev + self.bess_to_ev + self.grid_to_ev
    }

    /// Energy served locally from PV or the BESS (kWh).
    pub fn local_served(&self) -> f64 {
        self.pv_to_load + self.pv_to_ev + self.bess_to_load + self.bess_to_ev
    }

    /// Adds every field of `other` into `self`.
    pub fn accumulate(&mut self, other: &FlowRecord) {
        self.pv_to_load += other.pv_to_load;
        self.pv_to_ev += other.pv_to_ev;
        self.pv_to_bess += other.pv_to_bess;
        self.pv_export += other.pv_export;
        self.bess_to_load += other.bess_to_load;
        self.bess_to_ev += other.bess_to_ev;
        self.grid_to_load += other.grid_to_load;
        self.grid_to_ev += other.grid_to_ev;
        self.bess_charge_in += other.bess_charge_in;
        self.bess_discharge_out += other.bess_discharge_out;
    }
}

/// Which limit reduced a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    /// BESS command above the inverter power rating.
    BessPower,
    /// BESS charge limited by SOC headroom, or discharge by stored energy.
    BessHeadroom,
    /// BESS command not permitted by the current regime.
    BessRegime,
    /// BESS charge limited by available PV, or discharge by residual demand.
    BessEnergy,
    /// Socket draw limited by the vehicle's remaining need.
    SocketHeadroom,
    /// Socket draw blocked or reduced by the current regime.
    EvRegime,
    /// Stored energy written off by the closing pull.
    ClosingBleed,
}

impl ClipKind {
    /// True for clips on the BESS command.
    pub fn is_bess(self) -> bool {
        matches!(
            self,
            ClipKind::BessPower | ClipKind::BessHeadroom | ClipKind::BessRegime | ClipKind::BessEnergy
        )
    }

    /// True for clips on socket draws.
    pub fn is_ev(self) -> bool {
        matches!(self, ClipKind::SocketHeadroom | ClipKind::EvRegime)
    }
}

impl fmt::Display for ClipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClipKind::BessPower => "bess_power",
            ClipKind::BessHeadroom => "bess_headroom",
            ClipKind::BessRegime => "bess_regime",
            ClipKind::BessEnergy => "bess_energy",
            ClipKind::SocketHeadroom => "socket_headroom",
            ClipKind::EvRegime => "ev_regime",
            ClipKind::ClosingBleed => "closing_bleed",
        };
        f.write_str(s)
    }
}

/// A physical saturation: `requested_kwh` was reduced to `granted_kwh`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub kind: ClipKind,
    /// Socket index for EV clips.
    pub socket: Option<usize>,
    pub requested_kwh: f64,
    pub granted_kwh: f64,
}

impl Clip {
    /// Energy cut by this clip.
    pub fn shortfall_kwh(&self) -> f64 {
        (self.requested_kwh - self.granted_kwh).max(0.0)
    }
}

/// A vehicle leaving at the end of the step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Departure {
    pub socket: usize,
    pub class: ChargerClass,
    /// SOC when the vehicle leaves.
    pub delivered_soc: f64,
    pub required_soc: f64,
    /// Grid-side energy delivered over the whole session (kWh).
    pub session_kwh: f64,
}

impl Departure {
    /// `delivered_soc / required_soc`, clipped to `[0, 1]`.
    ///
    /// A zero requirement counts as fully satisfied.
    pub fn satisfaction(&self) -> f64 {
        if self.required_soc <= 0.0 {
            return 1.0;
        }
        (self.delivered_soc / self.required_soc).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_fields() {
        let mut total = FlowRecord::default();
        let step = FlowRecord {
            pv_to_load: 1.0,
            grid_to_ev: 2.0,
            ..FlowRecord::default()
        };
        total.accumulate(&step);
        total.accumulate(&step);
        assert_eq!(total.pv_to_load, 2.0);
        assert_eq!(total.grid_import(), 4.0);
    }

    #[test]
    fn values_follow_field_order() {
        let f = FlowRecord {
            pv_export: 3.0,
            bess_discharge_out: 7.0,
            ..FlowRecord::default()
        };
        let v = f.values();
        assert_eq!(v[3], 3.0);
        assert_eq!(v[9], 7.0);
        assert_eq!(FlowRecord::FIELDS[3], "pv_export");
    }

    #[test]
    fn satisfaction_is_clipped() {
        let d = Departure {
            socket: 0,
            class: ChargerClass::Moto,
            delivered_soc: 0.95,
            required_soc: 0.9,
            session_kwh: 1.0,
        };
        assert_eq!(d.satisfaction(), 1.0);
        let zero = Departure { required_soc: 0.0, ..d };
        assert_eq!(zero.satisfaction(), 1.0);
    }
}
