//! PV inverter export reader.

use std::path::Path;

use chrono::NaiveDateTime;

use crate::dataset::align::{Cadence, HourlySeries, check_finite, detect_cadence, to_hourly};
use crate::dataset::parse::{column_index, detect_delimiter, parse_number, parse_timestamp, read_text};
use crate::error::{DataRangeError, DatasetError, SchemaError};

const SERIES: &str = "pv";

/// What the value column of a PV file measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvQuantity {
    /// Mean AC power over the interval (kW).
    PowerKw,
    /// AC energy over the interval (kWh).
    EnergyKwh,
}

/// Raw PV rows as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PvSamples {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
    pub quantity: PvQuantity,
}

impl PvSamples {
    /// Reads a PV CSV with `timestamp` and `ac_power_kw` or `ac_energy_kwh`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_csv(path: &Path) -> Result<Self, DatasetError> {
        Self::parse(&read_text(path)?)
    }

    /// Parses PV CSV text.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingField`] without a timestamp or value column.
    /// - [`DataRangeError::Parse`] on an unreadable cell.
    pub fn parse(text: &str) -> Result<Self, DatasetError> {
        let delimiter = detect_delimiter(text);
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers = rdr.headers()?.clone();

        let ts_col = column_index(&headers, &["timestamp", "time", "datetime"])
            .ok_or_else(|| SchemaError::MissingField("pv.timestamp".into()))?;
        let (value_col, quantity) = if let Some(i) = column_index(&headers, &["ac_power_kw"]) {
            (i, PvQuantity::PowerKw)
        } else if let Some(i) = column_index(&headers, &["ac_energy_kwh"]) {
            (i, PvQuantity::EnergyKwh)
        } else {
            return Err(SchemaError::MissingField("pv.ac_power_kw".into()).into());
        };

        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let cell = |i: usize| record.get(i).unwrap_or_default();
            let ts = parse_timestamp(cell(ts_col)).ok_or_else(|| parse_error(row, "timestamp", cell(ts_col)))?;
            let value = parse_number(cell(value_col), delimiter == b';')
                .ok_or_else(|| parse_error(row, "value", cell(value_col)))?;
            timestamps.push(ts);
            values.push(value);
        }
        Ok(Self {
            timestamps,
            values,
            quantity,
        })
    }

    /// Hourly AC energy (kWh), summing quarter-hour energies where needed.
    ///
    /// # Errors
    ///
    /// - [`DataRangeError::NonFinite`] on a NaN or infinite sample.
    /// - [`DataRangeError::Negative`] on a negative sample.
    /// - Any alignment error from [`to_hourly`].
    pub fn hourly_kwh(&self) -> Result<HourlySeries, DataRangeError> {
        check_finite(SERIES, &self.values)?;
        if let Some((row, &value)) = self.values.iter().enumerate().find(|(_, v)| **v < 0.0) {
            return Err(DataRangeError::Negative {
                series: SERIES,
                row,
                value,
            });
        }
        let cadence = detect_cadence(SERIES, &self.timestamps)?;
        let energy: Vec<f64> = match self.quantity {
            PvQuantity::PowerKw => self.values.iter().map(|p| p * cadence.hours()).collect(),
            PvQuantity::EnergyKwh => self.values.clone(),
        };
        to_hourly(SERIES, &self.timestamps, &energy)
    }

    /// Cadence of the raw rows.
    ///
    /// # Errors
    ///
    /// [`DataRangeError::UnsupportedCadence`] for anything but hourly or quarter-hourly.
    pub fn cadence(&self) -> Result<Cadence, DataRangeError> {
        detect_cadence(SERIES, &self.timestamps)
    }
}

fn parse_error(row: usize, what: &str, cell: &str) -> DataRangeError {
    DataRangeError::Parse {
        series: SERIES,
        row,
        message: format!("cannot parse {what} \"{cell}\""),
    }
}
