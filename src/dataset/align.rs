//! Alignment of raw upstream series onto the hourly grid.
//!
//! The only resampling ever performed is summing four quarter-hour energies
//! into one hour. Every other gap fails loudly.

use chrono::{NaiveDateTime, TimeDelta, Timelike};

use crate::dataset::parse::format_timestamp;
use crate::error::DataRangeError;

/// Sampling interval of an upstream series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Hourly,
    QuarterHourly,
}

impl Cadence {
    /// Interval length in hours.
    pub fn hours(self) -> f64 {
        match self {
            Self::Hourly => 1.0,
            Self::QuarterHourly => 0.25,
        }
    }

    fn step(self) -> TimeDelta {
        match self {
            Self::Hourly => TimeDelta::hours(1),
            Self::QuarterHourly => TimeDelta::minutes(15),
        }
    }
}

/// An hourly series: energy (kWh) or a per-hour signal keyed by hour start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Rejects the first NaN or infinite value of a series.
///
/// # Errors
///
/// [`DataRangeError::NonFinite`] naming the series and row.
pub fn check_finite(series: &'static str, values: &[f64]) -> Result<(), DataRangeError> {
    match values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        Some((row, &value)) => Err(DataRangeError::NonFinite { series, row, value }),
        None => Ok(()),
    }
}

/// Detects the cadence from the first two timestamps. A single row is hourly.
///
/// # Errors
///
/// [`DataRangeError::UnsupportedCadence`] for anything other than 60 or 15 minutes.
pub fn detect_cadence(series: &'static str, timestamps: &[NaiveDateTime]) -> Result<Cadence, DataRangeError> {
    let [first, second, ..] = timestamps else {
        return Ok(Cadence::Hourly);
    };
    match (*second - *first).num_minutes() {
        60 => Ok(Cadence::Hourly),
        15 => Ok(Cadence::QuarterHourly),
        minutes => Err(DataRangeError::UnsupportedCadence { series, minutes }),
    }
}

fn hour_floor(ts: NaiveDateTime) -> NaiveDateTime {
    ts - TimeDelta::minutes(i64::from(ts.minute()))
        - TimeDelta::seconds(i64::from(ts.second()))
        - TimeDelta::nanoseconds(i64::from(ts.nanosecond()))
}

fn check_spacing(
    series: &'static str,
    timestamps: &[NaiveDateTime],
    cadence: Cadence,
) -> Result<(), DataRangeError> {
    let step = cadence.step();
    for (row, pair) in timestamps.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        if delta <= TimeDelta::zero() {
            return Err(DataRangeError::Parse {
                series,
                row: row + 1,
                message: format!(
                    "timestamps not increasing: {} -> {}",
                    format_timestamp(&pair[0]),
                    format_timestamp(&pair[1])
                ),
            });
        }
        if delta != step {
            return Err(DataRangeError::MissingHour {
                series,
                hour: format_timestamp(&hour_floor(pair[0] + step)),
            });
        }
    }
    Ok(())
}

/// Puts `values` (one per timestamp, already in kWh per interval) on the
/// hourly grid.
///
/// Hourly input is checked for gaps and returned unchanged. Quarter-hour
/// input is summed per hour; each hour needs its four rows starting at `:00`.
///
/// # Errors
///
/// - [`DataRangeError::UnsupportedCadence`] for other cadences.
/// - [`DataRangeError::MissingHour`] on a gap or an incomplete hour.
/// - [`DataRangeError::Parse`] if timestamps go backwards.
pub fn to_hourly(
    series: &'static str,
    timestamps: &[NaiveDateTime],
    values: &[f64],
) -> Result<HourlySeries, DataRangeError> {
    let cadence = detect_cadence(series, timestamps)?;
    check_spacing(series, timestamps, cadence)?;

    match cadence {
        Cadence::Hourly => Ok(HourlySeries {
            timestamps: timestamps.to_vec(),
            values: values.to_vec(),
        }),
        Cadence::QuarterHourly => {
            if let Some(first) = timestamps.first().filter(|ts| ts.minute() != 0) {
                return Err(DataRangeError::MissingHour {
                    series,
                    hour: format_timestamp(&hour_floor(*first)),
                });
            }
            if let Some(last) = timestamps.last().filter(|_| timestamps.len() % 4 != 0) {
                return Err(DataRangeError::MissingHour {
                    series,
                    hour: format_timestamp(&hour_floor(*last)),
                });
            }
            Ok(HourlySeries {
                timestamps: timestamps.chunks(4).map(|c| c[0]).collect(),
                values: values.chunks(4).map(|c| c.iter().sum()).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid")
    }

    #[test]
    fn quarter_hours_are_summed() {
        let stamps: Vec<_> = (0..8).map(|i| ts(i / 4, (i % 4) * 15)).collect();
        let values = [1.0, 2.0, 3.0, 4.0, 0.5, 0.5, 0.5, 0.5];
        let hourly = to_hourly("pv", &stamps, &values).expect("aligned");
        assert_eq!(hourly.timestamps, vec![ts(0, 0), ts(1, 0)]);
        assert_eq!(hourly.values, vec![10.0, 2.0]);
    }

    #[test]
    fn incomplete_last_hour_fails() {
        let stamps: Vec<_> = (0..6).map(|i| ts(i / 4, (i % 4) * 15)).collect();
        let err = to_hourly("pv", &stamps, &[0.0; 6]).unwrap_err();
        assert!(matches!(err, DataRangeError::MissingHour { .. }));
    }

    #[test]
    fn gap_in_hourly_series_names_the_hour() {
        let stamps = [ts(0, 0), ts(1, 0), ts(3, 0)];
        let err = to_hourly("mall", &stamps, &[1.0; 3]).unwrap_err();
        assert_eq!(
            err,
            DataRangeError::MissingHour {
                series: "mall",
                hour: "2024-01-01 02:00:00".into()
            }
        );
    }

    #[test]
    fn thirty_minute_cadence_rejected() {
        let err = detect_cadence("pv", &[ts(0, 0), ts(0, 30)]).unwrap_err();
        assert_eq!(err, DataRangeError::UnsupportedCadence { series: "pv", minutes: 30 });
    }
}
