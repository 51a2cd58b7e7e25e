//! Charger specifications and charging sessions.
//!
//! Sessions arrive in long format, one row per event, and are expanded
//! into per-socket hourly series aligned to the dataset timestamps.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::dataset::parse::{column_index, parse_flag, parse_number, parse_timestamp, read_text};
use crate::dataset::table::SocketSeries;
use crate::devices::{Charger, Session};
use crate::error::{DataRangeError, DatasetError, SchemaError};

const SERIES: &str = "sessions";

/// One row of the session table.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// Data row in the source file (0-based); used in error messages.
    pub row: usize,
    pub timestamp: NaiveDateTime,
    pub socket_id: String,
    pub soc_start: f64,
    pub arrival: bool,
    pub departure: bool,
    pub required_soc: f64,
}

/// Reads the chargers JSON array.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a charger array.
pub fn read_chargers_json(path: &Path) -> Result<Vec<Charger>, DatasetError> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

/// Reads the long-format session CSV.
///
/// # Errors
///
/// See [`parse_sessions`].
pub fn read_sessions_csv(path: &Path) -> Result<Vec<SessionEvent>, DatasetError> {
    parse_sessions(&read_text(path)?)
}

/// Parses `timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc`.
///
/// # Errors
///
/// - [`SchemaError::MissingField`] for a missing column.
/// - [`DataRangeError::Parse`] on an unreadable cell.
pub fn parse_sessions(text: &str) -> Result<Vec<SessionEvent>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    let col = |name: &str| {
        column_index(&headers, &[name]).ok_or_else(|| SchemaError::MissingField(format!("sessions.{name}")))
    };
    let ts_col = col("timestamp")?;
    let socket_col = col("socket_id")?;
    let soc_col = col("soc_start")?;
    let arrival_col = col("arrival_flag")?;
    let departure_col = col("departure_flag")?;
    let required_col = col("required_soc")?;

    let mut events = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or_default();
        let bad = |what: &str, i: usize| DataRangeError::Parse {
            series: SERIES,
            row,
            message: format!("cannot parse {what} \"{}\"", cell(i)),
        };
        events.push(SessionEvent {
            row,
            timestamp: parse_timestamp(cell(ts_col)).ok_or_else(|| bad("timestamp", ts_col))?,
            socket_id: cell(socket_col).to_string(),
            soc_start: parse_number(cell(soc_col), false).ok_or_else(|| bad("soc_start", soc_col))?,
            arrival: parse_flag(cell(arrival_col)).ok_or_else(|| bad("arrival_flag", arrival_col))?,
            departure: parse_flag(cell(departure_col)).ok_or_else(|| bad("departure_flag", departure_col))?,
            required_soc: parse_number(cell(required_col), false)
                .ok_or_else(|| bad("required_soc", required_col))?,
        });
    }
    Ok(events)
}

/// Converts sampled sessions into arrival/departure events.
pub fn events_from_sessions(
    sessions: &[Session],
    chargers: &[Charger],
    timestamps: &[NaiveDateTime],
) -> Vec<SessionEvent> {
    let mut events = Vec::with_capacity(sessions.len() * 2);
    for (row, s) in sessions.iter().enumerate() {
        let (Some(charger), Some(&arrive), Some(&depart)) = (
            chargers.get(s.socket),
            timestamps.get(s.arrival),
            timestamps.get(s.departure),
        ) else {
            continue;
        };
        let event = |timestamp, arrival, departure| SessionEvent {
            row,
            timestamp,
            socket_id: charger.id.clone(),
            soc_start: s.soc_start,
            arrival,
            departure,
            required_soc: s.required_soc,
        };
        if s.arrival == s.departure {
            events.push(event(arrive, true, true));
        } else {
            events.push(event(arrive, true, false));
            events.push(event(depart, false, true));
        }
    }
    events
}

/// Reads a SOC that may be given as a fraction or a percent.
fn soc_fraction(socket: &str, row: usize, value: f64) -> Result<f64, DataRangeError> {
    let soc = if value > 1.0 { value / 100.0 } else { value };
    if (0.0..=1.0).contains(&soc) {
        Ok(soc)
    } else {
        Err(DataRangeError::SocOutOfRange {
            socket: socket.to_string(),
            row,
            value,
        })
    }
}

/// Expands session events into one hourly series per charger.
///
/// A vehicle is present from its arrival hour through its departure hour
/// inclusive. Rows carrying neither flag are ignored.
///
/// # Errors
///
/// - [`DatasetError::Inconsistent`] for an unknown socket id.
/// - [`DataRangeError::Parse`] for an event outside the episode, an arrival
///   during an open session or a departure without an arrival, and for a
///   session left open at the end.
/// - [`DataRangeError::SocOutOfRange`] for SOCs outside `[0, 1]` after
///   percent conversion.
pub fn expand_sessions(
    events: &[SessionEvent],
    chargers: &[Charger],
    timestamps: &[NaiveDateTime],
) -> Result<Vec<SocketSeries>, DatasetError> {
    let len = timestamps.len();
    let index_of: HashMap<&str, usize> = chargers.iter().enumerate().map(|(i, c)| (c.id.as_str(), i)).collect();
    let hour_of: HashMap<NaiveDateTime, usize> = timestamps.iter().enumerate().map(|(i, ts)| (*ts, i)).collect();

    let mut per_socket: Vec<Vec<(usize, &SessionEvent)>> = vec![Vec::new(); chargers.len()];
    for event in events.iter().filter(|e| e.arrival || e.departure) {
        let socket = *index_of
            .get(event.socket_id.as_str())
            .ok_or_else(|| DatasetError::Inconsistent(format!("unknown socket id \"{}\"", event.socket_id)))?;
        let hour = *hour_of.get(&event.timestamp).ok_or_else(|| DataRangeError::Parse {
            series: SERIES,
            row: event.row,
            message: format!("timestamp {} is not an hour of the episode", event.timestamp),
        })?;
        per_socket[socket].push((hour, event));
    }

    let mut out = Vec::with_capacity(chargers.len());
    for (charger, mut socket_events) in chargers.iter().zip(per_socket) {
        // Arrivals sort ahead of departures within the same hour.
        socket_events.sort_by_key(|(hour, e)| (*hour, !e.arrival));
        let mut series = SocketSeries::idle(len);
        let mut open: Option<(usize, f64, f64, usize)> = None;

        for (hour, event) in socket_events {
            if event.arrival {
                if open.is_some() {
                    return Err(session_error(event, "arrival while a session is still open"));
                }
                let soc = soc_fraction(&charger.id, event.row, event.soc_start)?;
                let required = soc_fraction(&charger.id, event.row, event.required_soc)?;
                open = Some((hour, soc, required, event.row));
            }
            if event.departure {
                let Some((start, soc, required, _)) = open.take() else {
                    return Err(session_error(event, "departure without a matching arrival"));
                };
                for t in start..=hour {
                    series.available[t] = true;
                    series.soc[t] = soc;
                    series.required_soc[t] = required;
                }
                series.departure[hour] = true;
            }
        }
        if let Some((start, _, _, row)) = open {
            return Err(DataRangeError::Parse {
                series: SERIES,
                row,
                message: format!("socket {}: session arriving at hour {start} never departs", charger.id),
            }
            .into());
        }
        out.push(series);
    }
    Ok(out)
}

fn session_error(event: &SessionEvent, message: &str) -> DatasetError {
    DataRangeError::Parse {
        series: SERIES,
        row: event.row,
        message: format!("socket {}: {message}", event.socket_id),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{ChargerClass, fleet_layout};
    use chrono::TimeDelta;

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = parse_timestamp("2024-01-01 00:00").expect("valid");
        (0..n).map(|i| start + TimeDelta::hours(i as i64)).collect()
    }

    #[test]
    fn percent_soc_and_inclusive_departure() {
        let chargers = vec![Charger::with_class_defaults("a", ChargerClass::Moto)];
        let text = "timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc\n\
                    2024-01-01 01:00,a,40,1,0,90\n\
                    2024-01-01 03:00,a,0,0,1,0\n";
        let events = parse_sessions(text).expect("parsed");
        let series = expand_sessions(&events, &chargers, &hours(5)).expect("expanded");
        let s = &series[0];
        assert_eq!(s.available, vec![false, true, true, true, false]);
        assert_eq!(s.departure, vec![false, false, false, true, false]);
        assert_eq!(s.soc[1], 0.4);
        assert_eq!(s.required_soc[3], 0.9);
    }

    #[test]
    fn orphan_departure_rejected() {
        let chargers = vec![Charger::with_class_defaults("a", ChargerClass::Moto)];
        let text = "timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc\n\
                    2024-01-01 02:00,a,0.5,0,1,1.0\n";
        let events = parse_sessions(text).expect("parsed");
        let err = expand_sessions(&events, &chargers, &hours(4)).unwrap_err();
        assert!(matches!(err, DatasetError::Range(DataRangeError::Parse { .. })));
    }

    #[test]
    fn unknown_socket_is_inconsistent() {
        let chargers = fleet_layout(1, 0);
        let text = "timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc\n\
                    2024-01-01 00:00,zz,0.5,1,1,1.0\n";
        let events = parse_sessions(text).expect("parsed");
        let err = expand_sessions(&events, &chargers, &hours(2)).unwrap_err();
        assert!(matches!(err, DatasetError::Inconsistent(_)));
    }

    #[test]
    fn soc_above_percent_range_rejected() {
        let chargers = vec![Charger::with_class_defaults("a", ChargerClass::Moto)];
        let text = "timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc\n\
                    2024-01-01 00:00,a,150,1,1,1.0\n";
        let events = parse_sessions(text).expect("parsed");
        let err = expand_sessions(&events, &chargers, &hours(2)).unwrap_err();
        assert!(matches!(err, DatasetError::Range(DataRangeError::SocOutOfRange { .. })));
    }

    #[test]
    fn sampled_sessions_round_trip_through_events() {
        let chargers = fleet_layout(1, 1);
        let sessions = vec![
            Session {
                socket: 0,
                arrival: 1,
                departure: 1,
                soc_start: 0.3,
                required_soc: 0.9,
            },
            Session {
                socket: 1,
                arrival: 2,
                departure: 4,
                soc_start: 0.5,
                required_soc: 1.0,
            },
        ];
        let ts = hours(6);
        let events = events_from_sessions(&sessions, &chargers, &ts);
        assert_eq!(events.len(), 3);
        let series = expand_sessions(&events, &chargers, &ts).expect("expanded");
        assert_eq!(series[0].available, vec![false, true, false, false, false, false]);
        assert!(series[0].departure[1]);
        assert_eq!(series[1].available, vec![false, false, true, true, true, false]);
    }
}
