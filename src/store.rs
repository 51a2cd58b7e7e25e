//! Timeseries Store: typed, aligned hourly arrays for one episode.
//!
//! The store is built once from a canonical dataset and is read-only
//! afterwards, except for each socket's SOC entries, which the owning
//! environment overwrites as vehicles charge. [`TimeseriesStore::reset_socs`]
//! restores the pristine SOC arrays.

use chrono::{NaiveDateTime, TimeDelta};

use crate::config::BessConfig;
use crate::dataset::schema::{DatasetSchema, REQUIRED_COLUMNS, socket_column};
use crate::dataset::table::{CanonicalTable, SocketSeries};
use crate::devices::Charger;
use crate::error::SchemaError;

/// PV output over one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvStep {
    /// AC energy over the hour (kWh), numerically the mean AC power in kW.
    pub ac_kwh: f64,
}

/// Mall demand over one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MallLoadStep {
    pub demand_kwh: f64,
}

/// Grid signals for one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStep {
    pub carbon_intensity_kg_per_kwh: f64,
    pub tariff_per_kwh: f64,
    pub is_peak_hour: bool,
}

/// Per-socket state at the start of one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargerStep {
    /// A vehicle is present.
    pub available: bool,
    /// Vehicle SOC at hour start.
    pub soc: f64,
    /// The session's required SOC, known for every hour of the session.
    pub target_soc: f64,
    /// Set when the vehicle leaves at the end of this hour.
    pub required_soc_on_departure: Option<f64>,
}

impl ChargerStep {
    /// An empty socket.
    pub const VACANT: ChargerStep = ChargerStep {
        available: false,
        soc: 0.0,
        target_soc: 0.0,
        required_soc_on_departure: None,
    };
}

/// Everything the environment needs about hour `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepView {
    pub t: usize,
    /// Hour of day, `(start_hour + t) mod 24`.
    pub hour: usize,
    pub pv: PvStep,
    pub mall: MallLoadStep,
    pub grid: GridStep,
    pub chargers: Vec<ChargerStep>,
}

/// Immutable hourly arrays plus the mutable per-socket SOC trajectory.
#[derive(Debug, Clone)]
pub struct TimeseriesStore {
    schema: DatasetSchema,
    timestamps: Vec<NaiveDateTime>,
    pv: Vec<f64>,
    mall: Vec<f64>,
    carbon: Vec<f64>,
    tariff: Vec<f64>,
    peak: Vec<bool>,
    sockets: Vec<SocketSeries>,
    pristine_soc: Vec<Vec<f64>>,
}

impl TimeseriesStore {
    /// Validates `table` against `schema` and takes ownership of both.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingField`] if the schema omits a required column
    ///   or a socket column.
    /// - [`SchemaError::SocketCountMismatch`] if the table and schema disagree
    ///   on the number of sockets.
    /// - [`SchemaError::LengthMismatch`] if any array length differs from
    ///   `schema.episode_hours`.
    /// - [`SchemaError::NotHourly`] if timestamps are not strictly hourly.
    /// - [`SchemaError::NonFinite`] on any NaN or infinite value.
    pub fn load(schema: DatasetSchema, table: CanonicalTable) -> Result<Self, SchemaError> {
        for name in REQUIRED_COLUMNS {
            if schema.column(name).is_none() {
                return Err(SchemaError::MissingField(name.to_string()));
            }
        }
        for charger in &schema.chargers {
            let name = socket_column(&charger.id, "soc");
            if schema.column(&name).is_none() {
                return Err(SchemaError::MissingField(name));
            }
        }
        if schema.chargers.len() != table.sockets.len() {
            return Err(SchemaError::SocketCountMismatch {
                schema: schema.chargers.len(),
                table: table.sockets.len(),
            });
        }

        let expected = schema.episode_hours;
        check_len("timestamp", expected, table.timestamps.len())?;
        check_len("pv_kwh", expected, table.pv_kwh.len())?;
        check_len("mall_kwh", expected, table.mall_kwh.len())?;
        check_len("carbon_intensity", expected, table.carbon_intensity.len())?;
        check_len("tariff", expected, table.tariff.len())?;
        check_len("peak_flag", expected, table.peak_flag.len())?;
        for (charger, series) in schema.chargers.iter().zip(&table.sockets) {
            check_len(&socket_column(&charger.id, "available"), expected, series.available.len())?;
            check_len(&socket_column(&charger.id, "soc"), expected, series.soc.len())?;
            check_len(
                &socket_column(&charger.id, "required_soc"),
                expected,
                series.required_soc.len(),
            )?;
            check_len(&socket_column(&charger.id, "departure"), expected, series.departure.len())?;
        }

        check_hourly(&table.timestamps)?;

        check_finite("pv_kwh", &table.pv_kwh)?;
        check_finite("mall_kwh", &table.mall_kwh)?;
        check_finite("carbon_intensity", &table.carbon_intensity)?;
        check_finite("tariff", &table.tariff)?;
        for (charger, series) in schema.chargers.iter().zip(&table.sockets) {
            check_finite(&socket_column(&charger.id, "soc"), &series.soc)?;
            check_finite(&socket_column(&charger.id, "required_soc"), &series.required_soc)?;
        }

        let pristine_soc = table.sockets.iter().map(|s| s.soc.clone()).collect();
        Ok(Self {
            schema,
            timestamps: table.timestamps,
            pv: table.pv_kwh,
            mall: table.mall_kwh,
            carbon: table.carbon_intensity,
            tariff: table.tariff,
            peak: table.peak_flag,
            sockets: table.sockets,
            pristine_soc,
        })
    }

    /// Number of hourly steps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn chargers(&self) -> &[Charger] {
        &self.schema.chargers
    }

    pub fn bess(&self) -> &BessConfig {
        &self.schema.bess
    }

    pub fn timestamp(&self, t: usize) -> Option<NaiveDateTime> {
        self.timestamps.get(t).copied()
    }

    /// Hour of day of step `t`.
    pub fn hour_of_day(&self, t: usize) -> usize {
        (self.schema.start_hour() + t) % 24
    }

    /// PV energy at `t`, or 0 past the end of the series.
    pub fn pv_kwh(&self, t: usize) -> f64 {
        self.pv.get(t).copied().unwrap_or(0.0)
    }

    pub fn max_carbon_intensity(&self) -> f64 {
        self.carbon.iter().copied().fold(0.0, f64::max)
    }

    pub fn max_tariff(&self) -> f64 {
        self.tariff.iter().copied().fold(0.0, f64::max)
    }

    /// Returns all signals for hour `t`, or `None` when `t` is out of range.
    pub fn step(&self, t: usize) -> Option<StepView> {
        if t >= self.len() {
            return None;
        }
        let chargers = self.sockets.iter().map(|s| charger_step(s, t)).collect();
        Some(StepView {
            t,
            hour: self.hour_of_day(t),
            pv: PvStep { ac_kwh: self.pv[t] },
            mall: MallLoadStep {
                demand_kwh: self.mall[t],
            },
            grid: GridStep {
                carbon_intensity_kg_per_kwh: self.carbon[t],
                tariff_per_kwh: self.tariff[t],
                is_peak_hour: self.peak[t],
            },
            chargers,
        })
    }

    /// Carries a served SOC forward into hour `t + 1` when the session continues.
    ///
    /// Returns `true` if the value was written.
    pub fn carry_soc(&mut self, socket: usize, t: usize, soc: f64) -> bool {
        let Some(series) = self.sockets.get_mut(socket) else {
            return false;
        };
        if !series.continues_after(t) {
            return false;
        }
        series.soc[t + 1] = soc.clamp(0.0, 1.0);
        true
    }

    /// Restores every socket's SOC array to its loaded values.
    pub fn reset_socs(&mut self) {
        for (series, pristine) in self.sockets.iter_mut().zip(&self.pristine_soc) {
            series.soc.clone_from(pristine);
        }
    }

    /// Copy of this store with every PV value set to zero.
    pub fn without_pv(&self) -> Self {
        let mut store = self.clone();
        store.pv.fill(0.0);
        store
    }

    /// True when a session starts on `socket` at `t`.
    pub fn arrives_at(&self, socket: usize, t: usize) -> bool {
        self.sockets.get(socket).is_some_and(|s| s.arrives_at(t))
    }
}

fn charger_step(series: &SocketSeries, t: usize) -> ChargerStep {
    if !series.available[t] {
        return ChargerStep::VACANT;
    }
    ChargerStep {
        available: true,
        soc: series.soc[t],
        target_soc: series.required_soc[t],
        required_soc_on_departure: series.departure[t].then_some(series.required_soc[t]),
    }
}

fn check_len(column: &str, expected: usize, actual: usize) -> Result<(), SchemaError> {
    if expected != actual {
        return Err(SchemaError::LengthMismatch {
            column: column.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn check_hourly(timestamps: &[NaiveDateTime]) -> Result<(), SchemaError> {
    let hour = TimeDelta::hours(1);
    for (i, pair) in timestamps.windows(2).enumerate() {
        if pair[1] - pair[0] != hour {
            return Err(SchemaError::NotHourly {
                row: i + 1,
                previous: pair[0].to_string(),
                current: pair[1].to_string(),
            });
        }
    }
    Ok(())
}

fn check_finite(column: &str, values: &[f64]) -> Result<(), SchemaError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(row) => Err(SchemaError::NonFinite {
            column: column.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::schema::{ColumnSpec, Normalization, SOCKET_SUFFIXES};
    use crate::devices::ChargerClass;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    fn fixture(hours: usize) -> (DatasetSchema, CanonicalTable) {
        let chargers = vec![Charger::with_class_defaults("a", ChargerClass::Moto)];
        let mut columns: Vec<ColumnSpec> = REQUIRED_COLUMNS
            .iter()
            .map(|c| ColumnSpec::new(*c, "kWh", "test", Normalization::UNIT))
            .collect();
        for s in SOCKET_SUFFIXES {
            columns.push(ColumnSpec::new(socket_column("a", s), "-", "test", Normalization::UNIT));
        }
        let schema = DatasetSchema {
            episode_hours: hours,
            start: start(),
            installed_pv_ac_kw: 10.0,
            chargers,
            bess: BessConfig::default(),
            columns,
        };
        let mut socket = SocketSeries::idle(hours);
        socket.available[1] = true;
        socket.available[2] = true;
        socket.soc[1] = 0.4;
        socket.soc[2] = 0.4;
        socket.required_soc[1] = 0.9;
        socket.required_soc[2] = 0.9;
        socket.departure[2] = true;
        let table = CanonicalTable {
            timestamps: (0..hours).map(|h| start() + TimeDelta::hours(h as i64)).collect(),
            pv_kwh: vec![1.0; hours],
            mall_kwh: vec![2.0; hours],
            carbon_intensity: vec![0.45; hours],
            tariff: vec![0.28; hours],
            peak_flag: vec![false; hours],
            sockets: vec![socket],
        };
        (schema, table)
    }

    #[test]
    fn loads_consistent_table() {
        let (schema, table) = fixture(4);
        let store = TimeseriesStore::load(schema, table).expect("should load");
        assert_eq!(store.len(), 4);
        let view = store.step(2).expect("in range");
        assert_eq!(view.hour, 2);
        assert_eq!(view.chargers[0].required_soc_on_departure, Some(0.9));
        assert!(store.step(4).is_none());
    }

    #[test]
    fn rejects_short_column() {
        let (schema, mut table) = fixture(4);
        table.mall_kwh.pop();
        let err = TimeseriesStore::load(schema, table).unwrap_err();
        assert!(matches!(err, SchemaError::LengthMismatch { ref column, .. } if column == "mall_kwh"));
    }

    #[test]
    fn rejects_gap_in_timestamps() {
        let (schema, mut table) = fixture(4);
        table.timestamps[3] += TimeDelta::hours(1);
        let err = TimeseriesStore::load(schema, table).unwrap_err();
        assert!(matches!(err, SchemaError::NotHourly { row: 3, .. }));
    }

    #[test]
    fn rejects_nan() {
        let (schema, mut table) = fixture(4);
        table.pv_kwh[1] = f64::NAN;
        let err = TimeseriesStore::load(schema, table).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NonFinite {
                column: "pv_kwh".into(),
                row: 1
            }
        );
    }

    #[test]
    fn rejects_missing_column() {
        let (mut schema, table) = fixture(4);
        schema.columns.retain(|c| c.name != "tariff");
        let err = TimeseriesStore::load(schema, table).unwrap_err();
        assert_eq!(err, SchemaError::MissingField("tariff".into()));
    }

    #[test]
    fn carried_soc_is_restored_on_reset() {
        let (schema, table) = fixture(4);
        let mut store = TimeseriesStore::load(schema, table).expect("should load");
        assert!(store.carry_soc(0, 1, 0.7));
        assert_eq!(store.step(2).map(|v| v.chargers[0].soc), Some(0.7));
        // departure at 2 ends the session
        assert!(!store.carry_soc(0, 2, 0.9));
        store.reset_socs();
        assert_eq!(store.step(2).map(|v| v.chargers[0].soc), Some(0.4));
    }
}
