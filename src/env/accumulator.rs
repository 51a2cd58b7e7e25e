//! Episode-level sums of flows, emissions, costs and vehicle service.

use serde::Serialize;

use crate::devices::ChargerClass;
use crate::dispatch::{ClipKind, FlowRecord};
use crate::env::info::StepInfo;

/// Satisfaction ratio at or above which a departure counts as fully served.
pub const FULLY_SATISFIED_RATIO: f64 = 0.999;

/// Departure statistics for one vehicle class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassService {
    pub departures: u32,
    pub satisfaction_sum: f64,
    pub fully_satisfied: u32,
    pub delivered_kwh: f64,
}

impl ClassService {
    /// Mean satisfaction over departures, or `None` when nobody left.
    pub fn mean_satisfaction(&self) -> Option<f64> {
        (self.departures > 0).then(|| self.satisfaction_sum / f64::from(self.departures))
    }

    /// Share of departures that were fully served, or `None` when nobody left.
    pub fn fully_satisfied_rate(&self) -> Option<f64> {
        (self.departures > 0).then(|| f64::from(self.fully_satisfied) / f64::from(self.departures))
    }
}

/// Running totals over the steps of one episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeAccumulator {
    pub steps: usize,
    pub flows: FlowRecord,
    pub pv_kwh: f64,
    pub mall_kwh: f64,
    pub co2_grid_kg: f64,
    pub co2_avoided_kg: f64,
    pub co2_net_kg: f64,
    pub cost: f64,
    pub closing_bleed_kwh: f64,
    pub clips: u64,
    pub clip_bess_kwh: f64,
    pub clip_ev_kwh: f64,
    pub reward_sum: f64,
    pub numeric_coercions: u32,
    /// Highest hourly grid import seen (kW).
    pub peak_grid_import_kw: f64,
    /// Indexed by [`ChargerClass::index`].
    pub service: [ClassService; 2],
}

impl EpisodeAccumulator {
    /// Folds one step into the totals.
    pub fn record(&mut self, info: &StepInfo) {
        let flows = &info.flows;
        let reward = &info.reward;
        self.steps += 1;
        self.flows.accumulate(flows);
        self.pv_kwh += info.pv_kwh;
        self.mall_kwh += info.mall_kwh;
        self.co2_grid_kg += reward.co2_grid_kg;
        self.co2_avoided_kg += reward.co2_avoided_kg;
        self.co2_net_kg += reward.co2_net_kg;
        self.cost += reward.cost;
        self.closing_bleed_kwh += info.closing_bleed_kwh;
        self.reward_sum += reward.total;
        self.numeric_coercions += reward.coercions;
        self.peak_grid_import_kw = self.peak_grid_import_kw.max(flows.grid_import());

        self.clips += info.clips.len() as u64;
        self.clip_bess_kwh += info.clipped_kwh(ClipKind::is_bess);
        self.clip_ev_kwh += info.clipped_kwh(ClipKind::is_ev);

        for d in &info.departures {
            let s = &mut self.service[d.class.index()];
            let ratio = d.satisfaction();
            s.departures += 1;
            s.satisfaction_sum += ratio;
            s.delivered_kwh += d.session_kwh;
            if ratio >= FULLY_SATISFIED_RATIO {
                s.fully_satisfied += 1;
            }
        }
    }

    /// Statistics for one class.
    pub fn class(&self, class: ChargerClass) -> &ClassService {
        &self.service[class.index()]
    }

    /// Fraction of PV consumed on site, or 0 when there was no PV.
    pub fn self_consumption(&self) -> f64 {
        if self.pv_kwh > 0.0 {
            (1.0 - self.flows.pv_export / self.pv_kwh).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Mean satisfaction over all departures, or `None` when nobody left.
    pub fn ev_satisfaction(&self) -> Option<f64> {
        let departures: u32 = self.service.iter().map(|s| s.departures).sum();
        let sum: f64 = self.service.iter().map(|s| s.satisfaction_sum).sum();
        (departures > 0).then(|| sum / f64::from(departures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::BessMode;
    use crate::dispatch::{Departure, Regime};

    fn info() -> StepInfo {
        StepInfo::initial(0, Regime::ChargeServe, 0.2, BessMode::Idle)
    }

    fn departure(class: ChargerClass, delivered_soc: f64) -> Departure {
        Departure {
            socket: 0,
            class,
            delivered_soc,
            required_soc: 1.0,
            session_kwh: 2.0,
        }
    }

    #[test]
    fn sums_flows_and_tracks_peak() {
        let mut acc = EpisodeAccumulator::default();
        for import in [100.0, 350.0, 200.0] {
            let mut step = info();
            step.flows.grid_to_load = import;
            step.mall_kwh = import;
            acc.record(&step);
        }
        assert_eq!(acc.steps, 3);
        assert_eq!(acc.flows.grid_to_load, 650.0);
        assert_eq!(acc.peak_grid_import_kw, 350.0);
        assert_eq!(acc.mall_kwh, 650.0);
    }

    #[test]
    fn per_class_service() {
        let mut acc = EpisodeAccumulator::default();
        let mut step = info();
        step.departures = vec![
            departure(ChargerClass::Moto, 1.0),
            departure(ChargerClass::Moto, 0.5),
            departure(ChargerClass::Mototaxi, 0.9),
        ];
        acc.record(&step);
        let moto = acc.class(ChargerClass::Moto);
        assert_eq!(moto.departures, 2);
        assert_eq!(moto.fully_satisfied, 1);
        assert_eq!(moto.mean_satisfaction(), Some(0.75));
        assert_eq!(acc.class(ChargerClass::Mototaxi).fully_satisfied_rate(), Some(0.0));
        assert!((acc.ev_satisfaction().unwrap_or_default() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn self_consumption_without_pv_is_zero() {
        assert_eq!(EpisodeAccumulator::default().self_consumption(), 0.0);
        assert_eq!(EpisodeAccumulator::default().ev_satisfaction(), None);
    }
}
