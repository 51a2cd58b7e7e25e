//! Reward Decomposer: five normalised components and their weighted total.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{HubConfig, RewardWeights};
use crate::dispatch::{Departure, FlowRecord};
use crate::store::GridStep;

/// One step's reward, in native units and as normalised terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardComponents {
    /// kg CO2 from grid import.
    pub co2_grid_kg: f64,
    /// kg CO2 credited for local supply and avoided fuel.
    pub co2_avoided_kg: f64,
    /// `co2_grid_kg - co2_avoided_kg`.
    pub co2_net_kg: f64,
    /// Import cost minus export revenue.
    pub cost: f64,
    /// Grid import above the peak target (kW).
    pub grid_overshoot_kw: f64,
    pub r_co2: f64,
    pub r_cost: f64,
    pub r_solar: f64,
    pub r_ev: f64,
    pub r_grid: f64,
    /// Weighted sum of the five terms, always finite.
    pub total: f64,
    /// Non-finite terms counted as 0 in `total` this step.
    pub coercions: u32,
}

/// Maps flows, prices and departures to reward components.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardDecomposer {
    weights: RewardWeights,
    peak_target_kw: f64,
    co2_scale_kg: f64,
    cost_scale: f64,
    export_tariff: f64,
    displaced_intensity: Option<f64>,
    avoided_fuel_factor: Option<f64>,
}

impl RewardDecomposer {
    /// Builds a decomposer from the configuration.
    ///
    /// `max_carbon_intensity` and `max_tariff` are the dataset maxima used
    /// when the configured scales are 0.
    pub fn new(cfg: &HubConfig, max_carbon_intensity: f64, max_tariff: f64) -> Self {
        let derive = |configured: f64, max: f64| {
            if configured > 0.0 {
                configured
            } else {
                (cfg.peak_target_kw * max).max(f64::MIN_POSITIVE)
            }
        };
        Self {
            weights: cfg.weights,
            peak_target_kw: cfg.peak_target_kw,
            co2_scale_kg: derive(cfg.reward.co2_scale_kg, max_carbon_intensity),
            cost_scale: derive(cfg.reward.cost_scale, max_tariff),
            export_tariff: cfg.export_tariff_per_kwh,
            displaced_intensity: cfg.displaced_carbon_intensity,
            avoided_fuel_factor: cfg.avoided_fuel_factor,
        }
    }

    pub fn co2_scale_kg(&self) -> f64 {
        self.co2_scale_kg
    }

    pub fn cost_scale(&self) -> f64 {
        self.cost_scale
    }

    /// Computes all components for one step.
    ///
    /// Components are reported as computed, NaN and infinities included.
    /// Only the weighted total sees them as `0.0`; each such term is logged
    /// and counted in [`RewardComponents::coercions`].
    pub fn decompose(
        &self,
        t: usize,
        flows: &FlowRecord,
        grid: &GridStep,
        pv_kwh: f64,
        departures: &[Departure],
    ) -> RewardComponents {
        let intensity = grid.carbon_intensity_kg_per_kwh;
        let displaced = self.displaced_intensity.unwrap_or(intensity);
        let import = flows.grid_import();

        let co2_grid_kg = import * intensity;
        let fuel_credit = match self.avoided_fuel_factor {
            Some(factor) => departures.iter().map(|d| d.session_kwh * factor).sum(),
            None => 0.0,
        };
        let co2_avoided_kg = flows.local_served() * displaced + fuel_credit;
        let co2_net_kg = co2_grid_kg - co2_avoided_kg;
        let cost = import * grid.tariff_per_kwh - flows.pv_export * self.export_tariff;

        let r_co2 = (-co2_net_kg / self.co2_scale_kg).clamp(-1.0, 1.0);
        let r_cost = (-cost / self.cost_scale).clamp(-1.0, 1.0);
        let r_solar = if pv_kwh > 0.0 {
            (1.0 - flows.pv_export / pv_kwh).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let r_ev = if departures.is_empty() {
            0.0
        } else {
            let sum: f64 = departures.iter().map(Departure::satisfaction).sum();
            sum / departures.len() as f64
        };

        // Hourly steps: kWh imported equals mean kW.
        let grid_overshoot_kw = (import - self.peak_target_kw).max(0.0);
        let ratio = grid_overshoot_kw / self.peak_target_kw;
        let r_grid = -(ratio * ratio).min(1.0);

        let mut coercions = 0;
        let mut usable = |name: &str, value: f64| {
            if value.is_finite() {
                value
            } else {
                warn!(t, component = name, value, "non-finite reward component counted as 0");
                coercions += 1;
                0.0
            }
        };
        let w = &self.weights;
        let weighted: f64 = [
            ("r_co2", w.co2, r_co2),
            ("r_cost", w.cost, r_cost),
            ("r_solar", w.solar, r_solar),
            ("r_ev", w.ev, r_ev),
            ("r_grid", w.grid, r_grid),
        ]
        .into_iter()
        .map(|(name, weight, value)| weight * usable(name, value))
        .sum();
        let total = usable("total", weighted);

        RewardComponents {
            co2_grid_kg,
            co2_avoided_kg,
            co2_net_kg,
            cost,
            grid_overshoot_kw,
            r_co2,
            r_cost,
            r_solar,
            r_ev,
            r_grid,
            total,
            coercions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::ChargerClass;

    fn grid() -> GridStep {
        GridStep {
            carbon_intensity_kg_per_kwh: 0.4521,
            tariff_per_kwh: 0.28,
            is_peak_hour: false,
        }
    }

    fn decomposer() -> RewardDecomposer {
        RewardDecomposer::new(&HubConfig::default(), 0.4521, 0.45)
    }

    #[test]
    fn scales_derive_from_dataset() {
        let d = decomposer();
        assert!((d.co2_scale_kg() - 300.0 * 0.4521).abs() < 1e-12);
        assert!((d.cost_scale() - 300.0 * 0.45).abs() < 1e-12);
    }

    #[test]
    fn night_idle_has_no_solar_or_grid_penalty() {
        let flows = FlowRecord {
            grid_to_load: 40.0,
            ..FlowRecord::default()
        };
        let r = decomposer().decompose(0, &flows, &grid(), 0.0, &[]);
        assert_eq!(r.r_solar, 0.0);
        assert_eq!(r.r_grid, 0.0);
        assert_eq!(r.r_ev, 0.0);
        assert!(r.r_co2 < 0.0);
        assert!((r.co2_grid_kg - 40.0 * 0.4521).abs() < 1e-12);
    }

    #[test]
    fn grid_penalty_above_target() {
        let flows = FlowRecord {
            grid_to_load: 450.0,
            ..FlowRecord::default()
        };
        let r = decomposer().decompose(0, &flows, &grid(), 0.0, &[]);
        assert_eq!(r.grid_overshoot_kw, 150.0);
        assert!((r.r_grid + 0.25).abs() < 1e-12);

        let under = FlowRecord {
            grid_to_load: 200.0,
            ..FlowRecord::default()
        };
        assert_eq!(decomposer().decompose(0, &under, &grid(), 0.0, &[]).r_grid, 0.0);
    }

    #[test]
    fn grid_penalty_saturates() {
        let flows = FlowRecord {
            grid_to_load: 5000.0,
            ..FlowRecord::default()
        };
        assert_eq!(decomposer().decompose(0, &flows, &grid(), 0.0, &[]).r_grid, -1.0);
    }

    #[test]
    fn solar_fraction() {
        let flows = FlowRecord {
            pv_to_load: 75.0,
            pv_export: 25.0,
            ..FlowRecord::default()
        };
        let r = decomposer().decompose(0, &flows, &grid(), 100.0, &[]);
        assert!((r.r_solar - 0.75).abs() < 1e-12);
    }

    #[test]
    fn ev_term_averages_departures() {
        let d = |delivered_soc| Departure {
            socket: 0,
            class: ChargerClass::Moto,
            delivered_soc,
            required_soc: 1.0,
            session_kwh: 2.0,
        };
        let r = decomposer().decompose(0, &FlowRecord::default(), &grid(), 0.0, &[d(0.8), d(1.0)]);
        assert!((r.r_ev - 0.9).abs() < 1e-12);
    }

    #[test]
    fn avoided_fuel_credit_is_optional() {
        let dep = Departure {
            socket: 0,
            class: ChargerClass::Mototaxi,
            delivered_soc: 1.0,
            required_soc: 1.0,
            session_kwh: 4.0,
        };
        let cfg = HubConfig {
            avoided_fuel_factor: Some(2.146),
            ..HubConfig::default()
        };
        let with = RewardDecomposer::new(&cfg, 0.4521, 0.45).decompose(0, &FlowRecord::default(), &grid(), 0.0, &[dep]);
        let without = decomposer().decompose(0, &FlowRecord::default(), &grid(), 0.0, &[dep]);
        assert!((with.co2_avoided_kg - 4.0 * 2.146).abs() < 1e-12);
        assert_eq!(without.co2_avoided_kg, 0.0);
        assert!(with.r_co2 > without.r_co2);
    }

    #[test]
    fn non_finite_terms_are_coerced() {
        let flows = FlowRecord {
            pv_export: f64::NAN,
            ..FlowRecord::default()
        };
        let r = decomposer().decompose(0, &flows, &grid(), 10.0, &[]);
        assert!(r.r_solar.is_nan());
        assert!(r.cost.is_nan());
        // r_solar and r_cost
        assert_eq!(r.coercions, 2);
        assert!(r.total.is_finite());
    }

    #[test]
    fn raw_terms_reach_the_info_json() {
        use crate::devices::BessMode;
        use crate::dispatch::Regime;
        use crate::env::StepInfo;

        let flows = FlowRecord {
            pv_export: f64::NAN,
            ..FlowRecord::default()
        };
        let mut info = StepInfo::initial(0, Regime::ChargeServe, 0.5, BessMode::Hold);
        info.reward = decomposer().decompose(0, &flows, &grid(), 10.0, &[]);
        let v = info.to_json();
        assert_eq!(v["r_solar"], serde_json::Value::String("NaN".into()));
        assert_eq!(v["cost"], serde_json::Value::String("NaN".into()));
        assert!(v["reward"].is_number());
    }

    #[test]
    fn default_weights_total() {
        let flows = FlowRecord {
            pv_to_load: 100.0,
            ..FlowRecord::default()
        };
        let r = decomposer().decompose(0, &flows, &grid(), 100.0, &[]);
        let expected = 0.5 * r.r_co2 + 0.15 * r.r_cost + 0.2 * r.r_solar + 0.1 * r.r_ev + 0.05 * r.r_grid;
        assert!((r.total - expected).abs() < 1e-12);
    }
}
