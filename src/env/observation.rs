//! Observation assembly, a pure function of the store, the step and the BESS state.

use std::f64::consts::TAU;

use crate::dataset::schema::{CARBON_INTENSITY, MALL_KWH, Normalization, PV_KWH, TARIFF};
use crate::devices::BessState;
use crate::store::TimeseriesStore;

/// Site-level fields before the per-socket block.
pub const SITE_FIELDS: [&str; 8] = [
    "hour_sin",
    "hour_cos",
    "pv_next_hour",
    "mall_demand",
    "bess_soc",
    "carbon_intensity",
    "tariff",
    "peak_flag",
];

/// Observation length for `sockets` sockets: `8 + 2 * sockets`.
pub fn observation_dim(sockets: usize) -> usize {
    SITE_FIELDS.len() + 2 * sockets
}

/// Box bounds of a real vector space.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// True if every entry of `x` lies within the bounds.
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| *lo <= *v && *v <= *hi)
    }
}

/// Observation bounds: hour encodings in `[-1, 1]`, everything else in `[0, 1]`.
pub fn observation_space(sockets: usize) -> BoxSpace {
    let dim = observation_dim(sockets);
    let mut low = vec![0.0; dim];
    low[0] = -1.0;
    low[1] = -1.0;
    BoxSpace {
        low,
        high: vec![1.0; dim],
    }
}

/// Action bounds: `1 + sockets` entries in `[-1, 1]`.
pub fn action_space(sockets: usize) -> BoxSpace {
    BoxSpace {
        low: vec![-1.0; 1 + sockets],
        high: vec![1.0; 1 + sockets],
    }
}

fn norm(store: &TimeseriesStore, column: &str) -> Normalization {
    store
        .schema()
        .column(column)
        .map_or(Normalization::UNIT, |c| c.normalization)
}

/// Builds the observation for step `t`.
///
/// Steps past the end of the store yield the last step's signals; PV next
/// hour is 0 at and beyond the final step.
pub fn observe(store: &TimeseriesStore, t: usize, state: &BessState) -> Vec<f64> {
    let mut obs = Vec::with_capacity(observation_dim(store.socket_count()));
    let last = store.len().saturating_sub(1);
    let t = t.min(last);

    let hour = store.hour_of_day(t) as f64;
    let angle = TAU * hour / 24.0;
    obs.push(angle.sin());
    obs.push(angle.cos());

    let Some(view) = store.step(t) else {
        obs.resize(observation_dim(store.socket_count()), 0.0);
        return obs;
    };

    obs.push(norm(store, PV_KWH).apply(store.pv_kwh(t + 1)));
    obs.push(norm(store, MALL_KWH).apply(view.mall.demand_kwh));
    obs.push(state.soc.clamp(0.0, 1.0));
    obs.push(norm(store, CARBON_INTENSITY).apply(view.grid.carbon_intensity_kg_per_kwh));
    obs.push(norm(store, TARIFF).apply(view.grid.tariff_per_kwh));
    obs.push(if view.grid.is_peak_hour { 1.0 } else { 0.0 });

    for socket in &view.chargers {
        obs.push(if socket.available { 1.0 } else { 0.0 });
        obs.push(socket.soc.clamp(0.0, 1.0));
    }
    obs
}
