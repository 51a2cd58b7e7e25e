use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Vehicle class served by a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargerClass {
    /// Electric motorcycle.
    Moto,
    /// Electric three-wheel taxi.
    Mototaxi,
}

impl ChargerClass {
    /// All classes, in reporting order.
    pub const ALL: [ChargerClass; 2] = [ChargerClass::Moto, ChargerClass::Mototaxi];

    /// Typical socket power for the class (kW).
    pub fn default_socket_power_kw(self) -> f64 {
        match self {
            Self::Moto => 2.0,
            Self::Mototaxi => 3.0,
        }
    }

    /// Typical vehicle battery for the class (kWh).
    pub fn default_battery_capacity_kwh(self) -> f64 {
        match self {
            Self::Moto => 5.19,
            Self::Mototaxi => 7.40,
        }
    }

    /// Index into per-class arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Moto => 0,
            Self::Mototaxi => 1,
        }
    }
}

impl fmt::Display for ChargerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moto => f.write_str("moto"),
            Self::Mototaxi => f.write_str("mototaxi"),
        }
    }
}

impl FromStr for ChargerClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "moto" | "motorcycle" => Ok(Self::Moto),
            "mototaxi" | "moto_taxi" => Ok(Self::Mototaxi),
            other => Err(format!("unknown charger class \"{other}\"")),
        }
    }
}

/// Default charging efficiency shared by both classes.
pub const DEFAULT_CHARGER_EFFICIENCY: f64 = 0.92;

/// Static attributes of one charging socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charger {
    pub id: String,
    pub class: ChargerClass,
    /// Maximum socket power in kilowatts.
    pub socket_power_kw: f64,
    /// Battery capacity of the vehicle class served (kWh).
    pub battery_capacity_kwh: f64,
    /// Wall-to-battery efficiency (0..1.0].
    pub efficiency: f64,
}

/// Why a socket drew less than its command allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLimit {
    /// The command itself was the binding limit.
    Command,
    /// The socket power limit bound the draw.
    SocketPower,
    /// The vehicle's remaining need up to its target SOC bound the draw.
    SocHeadroom,
}

impl Charger {
    /// Creates a socket with the class defaults for power, capacity and efficiency.
    pub fn with_class_defaults(id: impl Into<String>, class: ChargerClass) -> Self {
        Self {
            id: id.into(),
            class,
            socket_power_kw: class.default_socket_power_kw(),
            battery_capacity_kwh: class.default_battery_capacity_kwh(),
            efficiency: DEFAULT_CHARGER_EFFICIENCY,
        }
    }

    /// Energy (kWh, grid side) the vehicle still needs to reach `target_soc`.
    pub fn need_kwh(&self, soc: f64, target_soc: f64) -> f64 {
        (target_soc - soc).max(0.0) * self.battery_capacity_kwh / self.efficiency
    }

    /// Feasible draw over one hour for a command in `[0, 1]`.
    ///
    /// Returns `(draw_kwh, requested_kwh, limit)` where `requested_kwh` is what
    /// the command asked for before the SOC cap.
    pub fn feasible_draw_kwh(
        &self,
        cmd: f64,
        soc: f64,
        target_soc: f64,
        dt_hours: f64,
    ) -> (f64, f64, DrawLimit) {
        let cmd = cmd.clamp(0.0, 1.0);
        let requested = cmd * self.socket_power_kw * dt_hours;
        let need = self.need_kwh(soc, target_soc);
        if need < requested {
            (need, requested, DrawLimit::SocHeadroom)
        } else if cmd >= 1.0 {
            (requested, requested, DrawLimit::SocketPower)
        } else {
            (requested, requested, DrawLimit::Command)
        }
    }

    /// SOC after `delivered_kwh` (grid side) has been charged.
    pub fn soc_after(&self, soc: f64, delivered_kwh: f64) -> f64 {
        (soc + delivered_kwh * self.efficiency / self.battery_capacity_kwh).clamp(0.0, 1.0)
    }
}
