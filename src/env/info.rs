//! Per-step diagnostics and their serializer-safe forms.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::devices::BessMode;
use crate::dispatch::{Clip, ClipKind, Departure, FlowRecord, Regime};
use crate::reward::RewardComponents;

/// Everything observable about one step besides the observation and reward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub t: usize,
    pub hour: usize,
    pub regime: Regime,
    pub flows: FlowRecord,
    pub reward: RewardComponents,
    pub clips: Vec<Clip>,
    pub departures: Vec<Departure>,
    /// BESS SOC at the end of the step.
    pub bess_soc: f64,
    pub bess_mode: BessMode,
    pub closing_bleed_kwh: f64,
    pub pv_kwh: f64,
    pub mall_kwh: f64,
    /// Running count of coerced reward terms in this episode.
    pub numeric_coercions: u32,
}

impl StepInfo {
    /// Info returned by `reset`: nothing has moved yet.
    pub fn initial(hour: usize, regime: Regime, bess_soc: f64, bess_mode: BessMode) -> Self {
        Self {
            t: 0,
            hour,
            regime,
            flows: FlowRecord::default(),
            reward: RewardComponents::default(),
            clips: Vec::new(),
            departures: Vec::new(),
            bess_soc,
            bess_mode,
            closing_bleed_kwh: 0.0,
            pv_kwh: 0.0,
            mall_kwh: 0.0,
            numeric_coercions: 0,
        }
    }

    /// Total shortfall of clips matching `pred` (kWh).
    pub fn clipped_kwh(&self, pred: impl Fn(ClipKind) -> bool) -> f64 {
        self.clips
            .iter()
            .filter(|c| pred(c.kind))
            .map(Clip::shortfall_kwh)
            .sum()
    }

    /// Flat map of scalar fields. Values may be non-finite; see [`StepInfo::to_json`].
    pub fn to_scalars(&self) -> BTreeMap<&'static str, f64> {
        let mut m = BTreeMap::new();
        m.insert("t", self.t as f64);
        m.insert("hour", self.hour as f64);
        m.insert("regime", f64::from(self.regime.code()));
        for (name, value) in FlowRecord::FIELDS.into_iter().zip(self.flows.values()) {
            m.insert(name, value);
        }
        let r = &self.reward;
        m.insert("co2_grid_kg", r.co2_grid_kg);
        m.insert("co2_avoided_kg", r.co2_avoided_kg);
        m.insert("co2_net_kg", r.co2_net_kg);
        m.insert("cost", r.cost);
        m.insert("grid_overshoot_kw", r.grid_overshoot_kw);
        m.insert("r_co2", r.r_co2);
        m.insert("r_cost", r.r_cost);
        m.insert("r_solar", r.r_solar);
        m.insert("r_ev", r.r_ev);
        m.insert("r_grid", r.r_grid);
        m.insert("reward", r.total);
        m.insert("clips", self.clips.len() as f64);
        m.insert("clip_bess_kwh", self.clipped_kwh(ClipKind::is_bess));
        m.insert("clip_ev_kwh", self.clipped_kwh(ClipKind::is_ev));
        m.insert("closing_bleed_kwh", self.closing_bleed_kwh);
        m.insert("departures", self.departures.len() as f64);
        m.insert("bess_soc", self.bess_soc);
        m.insert("pv_kwh", self.pv_kwh);
        m.insert("mall_kwh", self.mall_kwh);
        m.insert("numeric_coercions", f64::from(self.numeric_coercions));
        m
    }

    /// JSON object of the scalar map with NaN and infinities as string sentinels.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .to_scalars()
            .into_iter()
            .map(|(k, v)| (k.to_string(), json_safe(v)))
            .collect();
        Value::Object(map)
    }
}

/// Maps a float to a JSON number, or to `"NaN"`, `"Infinity"` or `"-Infinity"`.
pub fn json_safe(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(n) => Value::Number(n),
        None if value.is_nan() => Value::String("NaN".into()),
        None if value > 0.0 => Value::String("Infinity".into()),
        None => Value::String("-Infinity".into()),
    }
}
