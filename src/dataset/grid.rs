//! Grid carbon intensity, tariff and peak window per hour.

use std::path::Path;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::dataset::align::check_finite;
use crate::dataset::parse::{column_index, format_timestamp, parse_flag, parse_number, parse_timestamp, read_text};
use crate::error::{DataRangeError, DatasetError, SchemaError};

const SERIES: &str = "grid";

/// Static grid description of a site. Defaults describe an isolated
/// thermal grid with a time-of-use tariff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationMeta {
    pub carbon_intensity_kg_per_kwh: f64,
    pub tariff_offpeak_per_kwh: f64,
    pub tariff_peak_per_kwh: f64,
    /// First peak hour of day.
    pub peak_start_hour: usize,
    /// First hour of day after the peak window.
    pub peak_end_hour: usize,
}

impl Default for LocationMeta {
    fn default() -> Self {
        Self {
            carbon_intensity_kg_per_kwh: 0.4521,
            tariff_offpeak_per_kwh: 0.28,
            tariff_peak_per_kwh: 0.45,
            peak_start_hour: 18,
            peak_end_hour: 23,
        }
    }
}

impl LocationMeta {
    pub fn is_peak(&self, hour: usize) -> bool {
        (self.peak_start_hour..self.peak_end_hour).contains(&hour)
    }
}

/// Hourly grid signals aligned with the dataset timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridColumns {
    pub carbon_intensity: Vec<f64>,
    pub tariff: Vec<f64>,
    pub peak_flag: Vec<bool>,
}

/// Where the grid columns come from.
#[derive(Debug, Clone, PartialEq)]
pub enum GridSource {
    /// Explicit per-hour profile, one row per dataset hour.
    Profile {
        timestamps: Vec<NaiveDateTime>,
        columns: GridColumns,
    },
    /// Location metadata expanded over the episode.
    Location(LocationMeta),
}

impl Default for GridSource {
    fn default() -> Self {
        Self::Location(LocationMeta::default())
    }
}

impl GridSource {
    /// Reads either a CSV profile or a location JSON, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, DatasetError> {
        let text = read_text(path)?;
        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(Self::Location(serde_json::from_str(&text)?))
        } else {
            parse_profile(&text)
        }
    }

    /// Grid columns for `timestamps`.
    ///
    /// # Errors
    ///
    /// - [`DataRangeError::WrongLength`] if a profile has a different number of rows.
    /// - [`DataRangeError::MissingHour`] if a profile row's timestamp differs.
    /// - [`DataRangeError::NonFinite`] for NaN or infinite cells.
    /// - [`DataRangeError::NotPositive`] for a carbon intensity at or below zero.
    /// - [`DataRangeError::Negative`] for a negative tariff.
    pub fn resolve(&self, timestamps: &[NaiveDateTime]) -> Result<GridColumns, DataRangeError> {
        let columns = match self {
            Self::Location(meta) => GridColumns {
                carbon_intensity: vec![meta.carbon_intensity_kg_per_kwh; timestamps.len()],
                tariff: timestamps
                    .iter()
                    .map(|ts| {
                        if meta.is_peak(ts.hour() as usize) {
                            meta.tariff_peak_per_kwh
                        } else {
                            meta.tariff_offpeak_per_kwh
                        }
                    })
                    .collect(),
                peak_flag: timestamps.iter().map(|ts| meta.is_peak(ts.hour() as usize)).collect(),
            },
            Self::Profile {
                timestamps: own,
                columns,
            } => {
                if own.len() != timestamps.len() {
                    return Err(DataRangeError::WrongLength {
                        series: SERIES,
                        expected: timestamps.len(),
                        actual: own.len(),
                    });
                }
                if let Some(expected) = own.iter().zip(timestamps).find(|(a, b)| a != b).map(|(_, b)| b) {
                    return Err(DataRangeError::MissingHour {
                        series: SERIES,
                        hour: format_timestamp(expected),
                    });
                }
                columns.clone()
            }
        };

        check_finite("grid.carbon_intensity", &columns.carbon_intensity)?;
        check_finite("grid.tariff", &columns.tariff)?;
        if let Some((row, &value)) = columns.carbon_intensity.iter().enumerate().find(|(_, v)| **v <= 0.0) {
            return Err(DataRangeError::NotPositive {
                series: "grid.carbon_intensity",
                row,
                value,
            });
        }
        if let Some((row, &value)) = columns.tariff.iter().enumerate().find(|(_, v)| **v < 0.0) {
            return Err(DataRangeError::Negative {
                series: "grid.tariff",
                row,
                value,
            });
        }
        Ok(columns)
    }
}

fn parse_profile(text: &str) -> Result<GridSource, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    let col = |name: &str| {
        column_index(&headers, &[name]).ok_or_else(|| SchemaError::MissingField(format!("grid.{name}")))
    };
    let ts_col = col("timestamp")?;
    let ci_col = col("carbon_intensity_kg_per_kwh")?;
    let tariff_col = col("tariff_per_kwh")?;
    let peak_col = col("peak_flag")?;

    let mut timestamps = Vec::new();
    let mut columns = GridColumns::default();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or_default();
        let bad = |i: usize| DataRangeError::Parse {
            series: SERIES,
            row,
            message: format!("cannot parse \"{}\"", cell(i)),
        };
        timestamps.push(parse_timestamp(cell(ts_col)).ok_or_else(|| bad(ts_col))?);
        columns
            .carbon_intensity
            .push(parse_number(cell(ci_col), false).ok_or_else(|| bad(ci_col))?);
        columns
            .tariff
            .push(parse_number(cell(tariff_col), false).ok_or_else(|| bad(tariff_col))?);
        columns
            .peak_flag
            .push(parse_flag(cell(peak_col)).ok_or_else(|| bad(peak_col))?);
    }
    Ok(GridSource::Profile { timestamps, columns })
}
