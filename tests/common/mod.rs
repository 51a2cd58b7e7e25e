//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use evhub_sim::config::HubConfig;
use evhub_sim::dataset::{Dataset, SocketSeries, SyntheticSite};
use evhub_sim::env::Environment;

/// Synthetic site with 3 moto and 1 mototaxi sockets.
pub fn synthetic(days: usize, seed: u64) -> Dataset {
    SyntheticSite::small(days, seed)
        .build()
        .expect("synthetic site should build")
}

/// One-day site with constant PV and mall demand and no vehicles.
///
/// Row 0 is midnight, so step `t` runs at hour `t`.
pub fn flat_site(pv_kwh: f64, mall_kwh: f64) -> Dataset {
    let mut ds = synthetic(1, 1);
    let n = ds.table.len();
    ds.table.pv_kwh = vec![pv_kwh; n];
    ds.table.mall_kwh = vec![mall_kwh; n];
    ds.table.sockets = vec![SocketSeries::idle(n); ds.schema.chargers.len()];
    ds
}

/// Places a single-hour session on `socket` at hour `t`.
pub fn with_visit(mut ds: Dataset, socket: usize, t: usize, soc: f64, required_soc: f64) -> Dataset {
    let s = &mut ds.table.sockets[socket];
    s.available[t] = true;
    s.soc[t] = soc;
    s.required_soc[t] = required_soc;
    s.departure[t] = true;
    ds
}

/// Default configuration aligned to the dataset.
pub fn config_for(ds: &Dataset) -> HubConfig {
    HubConfig::default().aligned_to(&ds.schema)
}

/// Environment over `ds` with the default configuration.
pub fn environment(ds: Dataset) -> Environment {
    let config = config_for(&ds);
    Environment::new(config, ds.into_store().expect("store should load")).expect("valid config")
}

/// Action with the BESS at `bess` and every socket at `chargers`.
pub fn action(sockets: usize, bess: f64, chargers: f64) -> Vec<f64> {
    let mut a = vec![chargers; 1 + sockets];
    a[0] = bess;
    a
}
