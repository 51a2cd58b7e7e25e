//! Seeded synthetic upstream artifacts for demos and tests.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::config::BessConfig;
use crate::dataset::align::HourlySeries;
use crate::dataset::builder::{DatasetBuilder, UpstreamArtifacts};
use crate::dataset::canonical::Dataset;
use crate::dataset::fleet::events_from_sessions;
use crate::dataset::grid::{GridSource, LocationMeta};
use crate::dataset::pv::{PvQuantity, PvSamples};
use crate::devices::{FleetSampler, HourlySource, MallLoad, SolarPv, fleet_layout};
use crate::error::DatasetError;

/// Parameters of a synthetic mall site.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSite {
    pub seed: u64,
    pub hours: usize,
    /// Calendar year of the first hour; the series starts on 1 January at 00:00.
    pub year: i32,
    pub moto_sockets: usize,
    pub mototaxi_sockets: usize,
    pub pv_ac_kw: f64,
    pub mall_night_kwh: f64,
    pub mall_open_kwh: f64,
    pub mall_peak_extra_kwh: f64,
    pub bess: BessConfig,
    pub grid: LocationMeta,
}

impl Default for SyntheticSite {
    fn default() -> Self {
        Self {
            seed: 42,
            hours: 8760,
            year: 2024,
            moto_sockets: 112,
            mototaxi_sockets: 16,
            pv_ac_kw: 600.0,
            mall_night_kwh: 60.0,
            mall_open_kwh: 180.0,
            mall_peak_extra_kwh: 320.0,
            bess: BessConfig::default(),
            grid: LocationMeta::default(),
        }
    }
}

impl SyntheticSite {
    /// A small site over `days` days; handy for tests.
    pub fn small(days: usize, seed: u64) -> Self {
        Self {
            seed,
            hours: days * 24,
            moto_sockets: 3,
            mototaxi_sockets: 1,
            ..Self::default()
        }
    }

    pub fn socket_count(&self) -> usize {
        self.moto_sockets + self.mototaxi_sockets
    }

    /// Generates the upstream artifacts. Each source draws from its own
    /// seed derived from `self.seed`.
    ///
    /// # Errors
    ///
    /// [`DatasetError::Inconsistent`] if `year` has no 1 January.
    pub fn artifacts(&self) -> Result<UpstreamArtifacts, DatasetError> {
        let start: NaiveDateTime = NaiveDate::from_ymd_opt(self.year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| DatasetError::Inconsistent(format!("invalid year {}", self.year)))?;
        let timestamps: Vec<NaiveDateTime> = (0..self.hours)
            .map(|h| start + TimeDelta::hours(h as i64))
            .collect();

        let mut pv = SolarPv::new(self.pv_ac_kw, 6, 18, 0.15, 0, self.seed);
        let mut mall = MallLoad::new(
            self.mall_night_kwh,
            self.mall_open_kwh,
            self.mall_peak_extra_kwh,
            9,
            22,
            19,
            12.0,
            0,
            self.seed.wrapping_add(1),
        );
        let pv_kwh: Vec<f64> = (0..self.hours).map(|t| pv.energy_kwh(t)).collect();
        let mall_kwh: Vec<f64> = (0..self.hours).map(|t| mall.energy_kwh(t)).collect();

        let chargers = fleet_layout(self.moto_sockets, self.mototaxi_sockets);
        let sessions = FleetSampler::new(self.seed.wrapping_add(2)).sample(chargers.len(), self.hours, 0);
        let events = events_from_sessions(&sessions, &chargers, &timestamps);
        debug!(
            sources = ?[pv.label(), mall.label()],
            sessions = sessions.len(),
            "synthetic artifacts generated"
        );

        Ok(UpstreamArtifacts {
            pv: PvSamples {
                timestamps: timestamps.clone(),
                values: pv_kwh,
                quantity: PvQuantity::EnergyKwh,
            },
            installed_pv_ac_kw: Some(self.pv_ac_kw),
            mall: HourlySeries {
                timestamps,
                values: mall_kwh,
            },
            chargers,
            sessions: events,
            bess: self.bess,
            grid: GridSource::Location(self.grid),
        })
    }

    /// Generates and builds the canonical dataset.
    ///
    /// # Errors
    ///
    /// Any error from [`SyntheticSite::artifacts`] or [`DatasetBuilder::build`].
    pub fn build(&self) -> Result<Dataset, DatasetError> {
        DatasetBuilder::new(self.hours).build(self.artifacts()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_dataset() {
        let a = SyntheticSite::small(3, 7).build().expect("built");
        let b = SyntheticSite::small(3, 7).build().expect("built");
        assert_eq!(a, b);
    }

    #[test]
    fn small_site_shape() {
        let ds = SyntheticSite::small(2, 1).build().expect("built");
        assert_eq!(ds.table.len(), 48);
        assert_eq!(ds.schema.chargers.len(), 4);
        assert!(ds.table.pv_kwh.iter().all(|&p| (0.0..=600.0).contains(&p)));
        assert_eq!(ds.table.pv_kwh[0], 0.0);
        assert!(ds.table.sockets.iter().any(|s| s.available.iter().any(|a| *a)));
    }

    #[test]
    fn opens_as_store() {
        let store = SyntheticSite::small(1, 3).build().and_then(|d| Ok(d.into_store()?));
        assert_eq!(store.expect("store").len(), 24);
    }
}
