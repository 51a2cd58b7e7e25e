//! TOML-based hub configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::schema::DatasetSchema;

/// Tolerance used when checking that reward weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Top-level hub configuration parsed from TOML.
///
/// All fields have defaults matching the reference mall site. Load from
/// TOML with [`HubConfig::from_toml_file`] or start from
/// [`HubConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Steps per episode; the dataset must hold exactly this many hours.
    pub episode_hours: usize,
    /// Number of charging sockets; must match the dataset.
    pub socket_count: usize,
    /// Grid import level above which the grid-stability term penalises (kW).
    pub peak_target_kw: f64,
    /// Hour of day at which the BESS must sit at `soc_min`.
    pub closing_hour: usize,
    /// Optional kg CO2 credited per kWh delivered to a departing vehicle.
    pub avoided_fuel_factor: Option<f64>,
    /// Price paid for exported PV energy (currency per kWh).
    pub export_tariff_per_kwh: f64,
    /// Carbon intensity credited for locally served renewable energy.
    /// Falls back to the hour's grid intensity when unset.
    pub displaced_carbon_intensity: Option<f64>,
    /// Battery storage parameters.
    pub bess: BessConfig,
    /// Daily regime table.
    pub regime: RegimeConfig,
    /// Reward weights.
    pub weights: RewardWeights,
    /// Reward normalisation parameters.
    pub reward: RewardConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            episode_hours: 8760,
            socket_count: 128,
            peak_target_kw: 300.0,
            closing_hour: 22,
            avoided_fuel_factor: None,
            export_tariff_per_kwh: 0.0,
            displaced_carbon_intensity: None,
            bess: BessConfig::default(),
            regime: RegimeConfig::default(),
            weights: RewardWeights::default(),
            reward: RewardConfig::default(),
        }
    }
}

/// How the round-trip loss is split between charging and discharging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LossSplit {
    /// The whole loss is taken on the way in (`eta_c = rte`, `eta_d = 1`).
    #[default]
    Charge,
    /// The loss is shared evenly (`eta_c = eta_d = sqrt(rte)`).
    Symmetric,
}

/// Battery storage parameters. Also the shape of the upstream BESS JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BessConfig {
    /// Usable energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charge and discharge power (kW).
    pub power_kw: f64,
    /// Lower SOC bound (fraction).
    pub soc_min: f64,
    /// Upper SOC bound (fraction).
    pub soc_max: f64,
    /// Fraction of stored energy retrievable after a full cycle.
    pub round_trip_efficiency: f64,
    /// Loss attribution between the two directions.
    pub loss_split: LossSplit,
}

impl Default for BessConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 2000.0,
            power_kw: 400.0,
            soc_min: 0.20,
            soc_max: 1.00,
            round_trip_efficiency: 0.95,
            loss_split: LossSplit::Charge,
        }
    }
}

impl BessConfig {
    /// Charge efficiency implied by the loss split.
    pub fn eta_charge(&self) -> f64 {
        match self.loss_split {
            LossSplit::Charge => self.round_trip_efficiency,
            LossSplit::Symmetric => self.round_trip_efficiency.sqrt(),
        }
    }

    /// Discharge efficiency implied by the loss split.
    pub fn eta_discharge(&self) -> f64 {
        match self.loss_split {
            LossSplit::Charge => 1.0,
            LossSplit::Symmetric => self.round_trip_efficiency.sqrt(),
        }
    }
}

/// Regime table parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeConfig {
    /// Start hour of each phase.
    pub hours: RegimeHours,
}

/// Start hour of each daily phase. Each phase lasts until the next one starts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeHours {
    pub charge_prio: usize,
    pub charge_serve: usize,
    pub hold: usize,
    pub discharge: usize,
    /// Start of the overnight idle phase. Hours from `closing_hour` up to
    /// here stay in the closing phase.
    pub idle: usize,
}

impl Default for RegimeHours {
    fn default() -> Self {
        Self {
            charge_prio: 6,
            charge_serve: 9,
            hold: 15,
            discharge: 17,
            idle: 22,
        }
    }
}

/// Non-negative reward weights summing to one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RewardWeights {
    pub co2: f64,
    pub cost: f64,
    pub solar: f64,
    pub ev: f64,
    pub grid: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            co2: 0.50,
            cost: 0.15,
            solar: 0.20,
            ev: 0.10,
            grid: 0.05,
        }
    }
}

impl RewardWeights {
    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.co2 + self.cost + self.solar + self.ev + self.grid
    }

    fn as_array(&self) -> [(&'static str, f64); 5] {
        [
            ("weights.co2", self.co2),
            ("weights.cost", self.cost),
            ("weights.solar", self.solar),
            ("weights.ev", self.ev),
            ("weights.grid", self.grid),
        ]
    }
}

/// Reward normalisation parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RewardConfig {
    /// kg CO2 mapped to a reward of -1. `0` derives it from the dataset.
    pub co2_scale_kg: f64,
    /// Cost mapped to a reward of -1. `0` derives it from the dataset.
    pub cost_scale: f64,
    /// SOC margin below `soc_max` at which hold-full stops charging.
    pub hold_epsilon: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            co2_scale_kg: 0.0,
            cost_scale: 0.0,
            hold_epsilon: 0.01,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"bess.soc_min"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl HubConfig {
    /// Available preset names.
    pub const PRESETS: &[&str] = &[
        "default",
        "balanced",
        "co2_focus",
        "cost_focus",
        "ev_focus",
        "solar_focus",
    ];

    fn with_weights(co2: f64, cost: f64, solar: f64, ev: f64, grid: f64) -> Self {
        Self {
            weights: RewardWeights {
                co2,
                cost,
                solar,
                ev,
                grid,
            },
            ..Self::default()
        }
    }

    /// Even spread across all objectives.
    pub fn balanced() -> Self {
        Self::with_weights(0.30, 0.25, 0.20, 0.15, 0.10)
    }

    /// Returns the CO2-focused preset.
    pub fn co2_focus() -> Self {
        Self::with_weights(0.35, 0.10, 0.20, 0.30, 0.05)
    }

    /// Returns the energy-cost-focused preset.
    pub fn cost_focus() -> Self {
        Self::with_weights(0.30, 0.35, 0.15, 0.15, 0.05)
    }

    /// Returns the EV-service-focused preset.
    pub fn ev_focus() -> Self {
        Self::with_weights(0.25, 0.15, 0.15, 0.35, 0.10)
    }

    /// Returns the PV-self-consumption-focused preset.
    pub fn solar_focus() -> Self {
        Self::with_weights(0.30, 0.15, 0.40, 0.10, 0.05)
    }

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::default()),
            "balanced" => Ok(Self::balanced()),
            "co2_focus" => Ok(Self::co2_focus()),
            "cost_focus" => Ok(Self::cost_focus()),
            "ev_focus" => Ok(Self::ev_focus()),
            "solar_focus" => Ok(Self::solar_focus()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Returns a copy whose episode length, socket count and BESS come from a dataset schema.
    pub fn aligned_to(&self, schema: &DatasetSchema) -> Self {
        Self {
            episode_hours: schema.episode_hours,
            socket_count: schema.chargers.len(),
            bess: schema.bess,
            ..self.clone()
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ConfigError {
                field: field.to_string(),
                message,
            });
        };

        if self.episode_hours == 0 {
            push("episode_hours", "must be > 0".into());
        }
        if !(self.peak_target_kw > 0.0) {
            push("peak_target_kw", "must be > 0".into());
        }
        if self.export_tariff_per_kwh < 0.0 {
            push("export_tariff_per_kwh", "must be >= 0".into());
        }
        if let Some(f) = self.avoided_fuel_factor {
            if !(f >= 0.0) {
                push("avoided_fuel_factor", "must be >= 0".into());
            }
        }
        if let Some(ci) = self.displaced_carbon_intensity {
            if !(ci >= 0.0) {
                push("displaced_carbon_intensity", "must be >= 0".into());
            }
        }

        let b = &self.bess;
        if !(b.capacity_kwh > 0.0) {
            push("bess.capacity_kwh", "must be > 0".into());
        }
        if !(b.power_kw > 0.0) {
            push("bess.power_kw", "must be > 0".into());
        }
        if !(0.0 <= b.soc_min && b.soc_min < b.soc_max && b.soc_max <= 1.0) {
            push(
                "bess.soc_min",
                format!(
                    "must satisfy 0 <= soc_min < soc_max <= 1, got {} / {}",
                    b.soc_min, b.soc_max
                ),
            );
        }
        if !(b.round_trip_efficiency > 0.0 && b.round_trip_efficiency <= 1.0) {
            push("bess.round_trip_efficiency", "must be in (0, 1]".into());
        }

        let h = &self.regime.hours;
        let ordered = h.charge_prio < h.charge_serve
            && h.charge_serve < h.hold
            && h.hold < h.discharge
            && h.discharge <= self.closing_hour
            && self.closing_hour <= h.idle
            && h.idle < 24;
        if !ordered {
            push(
                "regime.hours",
                "must satisfy charge_prio < charge_serve < hold < discharge <= closing_hour <= idle < 24"
                    .into(),
            );
        }

        for (field, w) in self.weights.as_array() {
            if !(w >= 0.0) {
                push(field, "must be >= 0".into());
            }
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            push("weights", format!("must sum to 1, got {sum:.6}"));
        }

        let r = &self.reward;
        if r.co2_scale_kg < 0.0 {
            push("reward.co2_scale_kg", "must be >= 0".into());
        }
        if r.cost_scale < 0.0 {
            push("reward.cost_scale", "must be >= 0".into());
        }
        if !(0.0..0.5).contains(&r.hold_epsilon) {
            push("reward.hold_epsilon", "must be in [0, 0.5)".into());
        }

        errors
    }
}
