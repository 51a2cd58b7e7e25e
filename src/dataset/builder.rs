//! Dataset Builder: aligns and validates upstream artifacts and emits the
//! canonical table with its schema.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::BessConfig;
use crate::dataset::align::{HourlySeries, check_finite};
use crate::dataset::canonical::Dataset;
use crate::dataset::fleet::{SessionEvent, expand_sessions, read_chargers_json, read_sessions_csv};
use crate::dataset::grid::GridSource;
use crate::dataset::mall::read_mall_csv;
use crate::dataset::parse::{format_timestamp, read_text};
use crate::dataset::pv::PvSamples;
use crate::dataset::schema::{
    CARBON_INTENSITY, ColumnSpec, DatasetSchema, MALL_KWH, Normalization, PEAK_FLAG, PV_KWH, TARIFF,
    socket_column,
};
use crate::dataset::table::CanonicalTable;
use crate::devices::Charger;
use crate::error::{DataRangeError, DatasetError};

/// Slack allowed when comparing hourly PV energy with the inverter limit.
const AC_LIMIT_TOLERANCE: f64 = 1e-9;

/// Everything the builder consumes, already parsed.
#[derive(Debug, Clone)]
pub struct UpstreamArtifacts {
    pub pv: PvSamples,
    /// Inverter AC limit. When unset it is taken as the hourly PV maximum.
    pub installed_pv_ac_kw: Option<f64>,
    pub mall: HourlySeries,
    pub chargers: Vec<Charger>,
    pub sessions: Vec<SessionEvent>,
    pub bess: BessConfig,
    pub grid: GridSource,
}

/// File locations of the upstream artifacts.
#[derive(Debug, Clone)]
pub struct UpstreamPaths {
    pub pv: PathBuf,
    pub mall: PathBuf,
    pub chargers: PathBuf,
    pub sessions: PathBuf,
    pub bess: PathBuf,
    /// Grid profile CSV or location JSON. Site defaults apply when unset.
    pub grid: Option<PathBuf>,
    pub installed_pv_ac_kw: Option<f64>,
}

impl UpstreamArtifacts {
    /// Reads every artifact from disk.
    ///
    /// # Errors
    ///
    /// The first read or parse failure, tagged with its file.
    pub fn read(paths: &UpstreamPaths) -> Result<Self, DatasetError> {
        let grid = match &paths.grid {
            Some(path) => GridSource::read(path)?,
            None => GridSource::default(),
        };
        Ok(Self {
            pv: PvSamples::read_csv(&paths.pv)?,
            installed_pv_ac_kw: paths.installed_pv_ac_kw,
            mall: read_mall_csv(&paths.mall)?,
            chargers: read_chargers_json(&paths.chargers)?,
            sessions: read_sessions_csv(&paths.sessions)?,
            bess: serde_json::from_str(&read_text(&paths.bess)?)?,
            grid,
        })
    }
}

/// Builds canonical datasets of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct DatasetBuilder {
    episode_hours: usize,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new(8760)
    }
}

impl DatasetBuilder {
    pub fn new(episode_hours: usize) -> Self {
        Self { episode_hours }
    }

    pub fn episode_hours(&self) -> usize {
        self.episode_hours
    }

    /// Aligns, validates and assembles the canonical dataset.
    ///
    /// The only resampling is the quarter-hour to hour sum for PV; every
    /// other gap or range violation fails.
    ///
    /// # Errors
    ///
    /// - [`DataRangeError`] for cadence, gaps, length, NaN or infinite
    ///   values, negative values, PV above the inverter limit and SOC range
    ///   violations.
    /// - [`DatasetError::Inconsistent`] for misaligned series, duplicate or
    ///   unknown socket ids and invalid charger or BESS parameters.
    pub fn build(&self, artifacts: UpstreamArtifacts) -> Result<Dataset, DatasetError> {
        // 1. Align PV onto the hourly grid
        let cadence = artifacts.pv.cadence()?;
        let pv = artifacts.pv.hourly_kwh()?;
        debug!(?cadence, rows = artifacts.pv.timestamps.len(), hours = pv.len(), "pv aligned");

        // 2. Lengths and timestamp agreement
        self.check_length("pv", pv.len())?;
        self.check_length("mall", artifacts.mall.len())?;
        if let Some(ts) = pv
            .timestamps
            .iter()
            .zip(&artifacts.mall.timestamps)
            .find(|(a, b)| a != b)
            .map(|(a, _)| a)
        {
            return Err(DataRangeError::MissingHour {
                series: "mall",
                hour: format_timestamp(ts),
            }
            .into());
        }
        let timestamps = pv.timestamps;

        // 3. Ranges
        check_finite("pv", &pv.values)?;
        check_finite("mall", &artifacts.mall.values)?;
        let installed = match artifacts.installed_pv_ac_kw {
            Some(limit) if !limit.is_finite() => {
                return Err(DataRangeError::NonFinite {
                    series: "pv.installed_ac_kw",
                    row: 0,
                    value: limit,
                }
                .into());
            }
            Some(limit) if limit <= 0.0 => {
                return Err(DataRangeError::NotPositive {
                    series: "pv.installed_ac_kw",
                    row: 0,
                    value: limit,
                }
                .into());
            }
            Some(limit) => limit,
            None => series_max(&pv.values),
        };
        if let Some((row, &value)) = pv
            .values
            .iter()
            .enumerate()
            .find(|(_, v)| **v > installed + AC_LIMIT_TOLERANCE)
        {
            return Err(DataRangeError::AboveInstalledAc {
                row,
                value,
                limit: installed,
            }
            .into());
        }
        if let Some((row, &value)) = artifacts.mall.values.iter().enumerate().find(|(_, v)| **v < 0.0) {
            return Err(DataRangeError::Negative {
                series: "mall",
                row,
                value,
            }
            .into());
        }
        check_chargers(&artifacts.chargers)?;
        check_bess(&artifacts.bess)?;

        // 4. Grid and sessions
        let grid = artifacts.grid.resolve(&timestamps)?;
        let sockets = expand_sessions(&artifacts.sessions, &artifacts.chargers, &timestamps)?;

        let Some(&start) = timestamps.first() else {
            return Err(DatasetError::Inconsistent("dataset has no rows".into()));
        };
        let mut columns = vec![
            ColumnSpec::new(PV_KWH, "kWh", "pv", Normalization::zero_to(installed)),
            ColumnSpec::new(MALL_KWH, "kWh", "mall", Normalization::zero_to(series_max(&artifacts.mall.values))),
            ColumnSpec::new(
                CARBON_INTENSITY,
                "kg/kWh",
                "grid",
                Normalization::zero_to(series_max(&grid.carbon_intensity)),
            ),
            ColumnSpec::new(TARIFF, "currency/kWh", "grid", Normalization::zero_to(series_max(&grid.tariff))),
            ColumnSpec::new(PEAK_FLAG, "flag", "grid", Normalization::UNIT),
        ];
        for charger in &artifacts.chargers {
            for (suffix, unit) in [
                ("available", "flag"),
                ("soc", "fraction"),
                ("required_soc", "fraction"),
                ("departure", "flag"),
            ] {
                columns.push(ColumnSpec::new(
                    socket_column(&charger.id, suffix),
                    unit,
                    "sessions",
                    Normalization::UNIT,
                ));
            }
        }

        let sessions: usize = sockets.iter().map(|s| s.departure.iter().filter(|d| **d).count()).sum();
        info!(
            hours = timestamps.len(),
            sockets = artifacts.chargers.len(),
            sessions,
            pv_kwh = pv.values.iter().sum::<f64>(),
            mall_kwh = artifacts.mall.values.iter().sum::<f64>(),
            installed_pv_ac_kw = installed,
            "dataset built"
        );

        let schema = DatasetSchema {
            episode_hours: self.episode_hours,
            start,
            installed_pv_ac_kw: installed,
            chargers: artifacts.chargers,
            bess: artifacts.bess,
            columns,
        };
        let table = CanonicalTable {
            timestamps,
            pv_kwh: pv.values,
            mall_kwh: artifacts.mall.values,
            carbon_intensity: grid.carbon_intensity,
            tariff: grid.tariff,
            peak_flag: grid.peak_flag,
            sockets,
        };
        Ok(Dataset { schema, table })
    }

    fn check_length(&self, series: &'static str, actual: usize) -> Result<(), DataRangeError> {
        if actual == self.episode_hours {
            Ok(())
        } else {
            Err(DataRangeError::WrongLength {
                series,
                expected: self.episode_hours,
                actual,
            })
        }
    }
}

fn series_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn check_chargers(chargers: &[Charger]) -> Result<(), DatasetError> {
    for (i, c) in chargers.iter().enumerate() {
        if chargers[..i].iter().any(|other| other.id == c.id) {
            return Err(DatasetError::Inconsistent(format!("duplicate socket id \"{}\"", c.id)));
        }
        let valid = c.socket_power_kw > 0.0
            && c.battery_capacity_kwh > 0.0
            && c.efficiency > 0.0
            && c.efficiency <= 1.0;
        if !valid {
            return Err(DatasetError::Inconsistent(format!(
                "socket \"{}\" needs positive power and capacity and efficiency in (0, 1]",
                c.id
            )));
        }
    }
    Ok(())
}

fn check_bess(b: &BessConfig) -> Result<(), DatasetError> {
    let valid = b.capacity_kwh > 0.0
        && b.power_kw > 0.0
        && 0.0 <= b.soc_min
        && b.soc_min < b.soc_max
        && b.soc_max <= 1.0
        && b.round_trip_efficiency > 0.0
        && b.round_trip_efficiency <= 1.0;
    if valid {
        Ok(())
    } else {
        Err(DatasetError::Inconsistent(format!("invalid BESS parameters: {b:?}")))
    }
}
