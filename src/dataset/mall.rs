//! Mall demand reader. Accepts both comma CSV and the semicolon /
//! decimal-comma convention of Spanish spreadsheet exports.

use std::path::Path;

use crate::dataset::align::{HourlySeries, to_hourly};
use crate::dataset::parse::{column_index, detect_delimiter, parse_number, parse_timestamp, read_text};
use crate::error::{DataRangeError, DatasetError, SchemaError};

const SERIES: &str = "mall";
const DEMAND_ALIASES: [&str; 3] = ["demand_kwh", "demand_kw", "mall_kwh"];

/// Reads an hourly mall demand CSV.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed; see [`parse_mall`].
pub fn read_mall_csv(path: &Path) -> Result<HourlySeries, DatasetError> {
    parse_mall(&read_text(path)?)
}

/// Parses mall demand text into an hourly series.
///
/// # Errors
///
/// - [`SchemaError::MissingField`] without a timestamp or demand column.
/// - [`DataRangeError::Parse`] on an unreadable cell.
/// - [`DataRangeError::MissingHour`] on a gap.
pub fn parse_mall(text: &str) -> Result<HourlySeries, DatasetError> {
    let delimiter = detect_delimiter(text);
    let decimal_comma = delimiter == b';';
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    let ts_col = column_index(&headers, &["timestamp", "fecha", "datetime"])
        .ok_or_else(|| SchemaError::MissingField("mall.timestamp".into()))?;
    let value_col = column_index(&headers, &DEMAND_ALIASES)
        .ok_or_else(|| SchemaError::MissingField("mall.demand_kwh".into()))?;

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let ts_cell = record.get(ts_col).unwrap_or_default();
        let value_cell = record.get(value_col).unwrap_or_default();
        let ts = parse_timestamp(ts_cell).ok_or_else(|| DataRangeError::Parse {
            series: SERIES,
            row,
            message: format!("cannot parse timestamp \"{ts_cell}\""),
        })?;
        let value = parse_number(value_cell, decimal_comma).ok_or_else(|| DataRangeError::Parse {
            series: SERIES,
            row,
            message: format!("cannot parse demand \"{value_cell}\""),
        })?;
        timestamps.push(ts);
        values.push(value);
    }

    Ok(to_hourly(SERIES, &timestamps, &values)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_with_decimal_comma() {
        let text = "timestamp;demand_kw\n01/01/2024 00:00;1.234,5\n01/01/2024 01:00;980,25\n";
        let mall = parse_mall(text).expect("parsed");
        assert_eq!(mall.values, vec![1234.5, 980.25]);
    }

    #[test]
    fn comma_file_with_alias() {
        let text = "timestamp,mall_kwh\n2024-01-01 00:00,10\n2024-01-01 01:00,12.5\n";
        assert_eq!(parse_mall(text).expect("parsed").values, vec![10.0, 12.5]);
    }

    #[test]
    fn garbage_cell_names_row() {
        let text = "timestamp,demand_kwh\n2024-01-01 00:00,abc\n";
        let err = parse_mall(text).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Range(DataRangeError::Parse { series: "mall", row: 0, .. })
        ));
    }
}
