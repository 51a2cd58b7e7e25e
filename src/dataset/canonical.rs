//! The canonical dataset on disk: `dataset.csv` next to `schema.json`.
//!
//! Floats are written in their shortest round-trip form, so reading a
//! written dataset yields bit-identical values.

use std::fs;
use std::path::Path;

use csv::StringRecord;

use crate::dataset::parse::{format_timestamp, parse_flag, parse_timestamp, read_text};
use crate::dataset::schema::{
    CARBON_INTENSITY, DatasetSchema, MALL_KWH, PEAK_FLAG, PV_KWH, TARIFF, socket_column,
};
use crate::dataset::table::{CanonicalTable, SocketSeries};
use crate::error::{DataRangeError, DatasetError, SchemaError};
use crate::store::TimeseriesStore;

pub const DATASET_FILE: &str = "dataset.csv";
pub const SCHEMA_FILE: &str = "schema.json";

const SERIES: &str = "dataset";

/// Schema plus table, the output of the builder and the input of the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub schema: DatasetSchema,
    pub table: CanonicalTable,
}

impl Dataset {
    /// Writes `dataset.csv` and `schema.json` into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error on any filesystem or serialisation failure.
    pub fn write_dir(&self, dir: &Path) -> Result<(), DatasetError> {
        fs::create_dir_all(dir).map_err(|source| DatasetError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let schema_path = dir.join(SCHEMA_FILE);
        let json = serde_json::to_string_pretty(&self.schema)?;
        fs::write(&schema_path, json).map_err(|source| DatasetError::Io {
            path: schema_path.display().to_string(),
            source,
        })?;

        let mut wtr = csv::Writer::from_path(dir.join(DATASET_FILE))?;
        wtr.write_record(self.schema.header())?;
        let t = &self.table;
        let flag = |b: bool| if b { "1".to_string() } else { "0".to_string() };
        for i in 0..t.len() {
            let mut row = vec![
                format_timestamp(&t.timestamps[i]),
                t.pv_kwh[i].to_string(),
                t.mall_kwh[i].to_string(),
                t.carbon_intensity[i].to_string(),
                t.tariff[i].to_string(),
                flag(t.peak_flag[i]),
            ];
            for s in &t.sockets {
                row.push(flag(s.available[i]));
                row.push(s.soc[i].to_string());
                row.push(s.required_soc[i].to_string());
                row.push(flag(s.departure[i]));
            }
            wtr.write_record(&row)?;
        }
        wtr.flush().map_err(|source| DatasetError::Io {
            path: dir.join(DATASET_FILE).display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Reads a dataset written by [`Dataset::write_dir`].
    ///
    /// Columns are located by name, so extra columns are ignored.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::MissingField`] if a column named by the schema is absent.
    /// - [`DataRangeError::Parse`] on an unreadable cell.
    pub fn read_dir(dir: &Path) -> Result<Self, DatasetError> {
        let schema: DatasetSchema = serde_json::from_str(&read_text(&dir.join(SCHEMA_FILE))?)?;

        let mut rdr = csv::Reader::from_path(dir.join(DATASET_FILE))?;
        let headers = rdr.headers()?.clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SchemaError::MissingField(name.to_string()))
        };
        let ts_col = find("timestamp")?;
        let site = [find(PV_KWH)?, find(MALL_KWH)?, find(CARBON_INTENSITY)?, find(TARIFF)?];
        let peak_col = find(PEAK_FLAG)?;
        let mut socket_cols = Vec::with_capacity(schema.chargers.len());
        for charger in &schema.chargers {
            socket_cols.push([
                find(&socket_column(&charger.id, "available"))?,
                find(&socket_column(&charger.id, "soc"))?,
                find(&socket_column(&charger.id, "required_soc"))?,
                find(&socket_column(&charger.id, "departure"))?,
            ]);
        }

        let mut table = CanonicalTable {
            sockets: vec![SocketSeries::default(); schema.chargers.len()],
            ..CanonicalTable::default()
        };
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let cells = Cells { record: &record, row };
            table.timestamps.push(cells.timestamp(ts_col)?);
            table.pv_kwh.push(cells.number(site[0])?);
            table.mall_kwh.push(cells.number(site[1])?);
            table.carbon_intensity.push(cells.number(site[2])?);
            table.tariff.push(cells.number(site[3])?);
            table.peak_flag.push(cells.flag(peak_col)?);
            for (series, cols) in table.sockets.iter_mut().zip(&socket_cols) {
                series.available.push(cells.flag(cols[0])?);
                series.soc.push(cells.number(cols[1])?);
                series.required_soc.push(cells.number(cols[2])?);
                series.departure.push(cells.flag(cols[3])?);
            }
        }
        Ok(Self { schema, table })
    }

    /// Opens the dataset as a [`TimeseriesStore`].
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] raised by [`TimeseriesStore::load`].
    pub fn into_store(self) -> Result<TimeseriesStore, SchemaError> {
        TimeseriesStore::load(self.schema, self.table)
    }
}

struct Cells<'a> {
    record: &'a StringRecord,
    row: usize,
}

impl Cells<'_> {
    fn raw(&self, col: usize) -> &str {
        self.record.get(col).unwrap_or_default()
    }

    fn error(&self, col: usize) -> DataRangeError {
        DataRangeError::Parse {
            series: SERIES,
            row: self.row,
            message: format!("column {col}: cannot parse \"{}\"", self.raw(col)),
        }
    }

    fn number(&self, col: usize) -> Result<f64, DataRangeError> {
        self.raw(col).trim().parse().map_err(|_| self.error(col))
    }

    fn flag(&self, col: usize) -> Result<bool, DataRangeError> {
        parse_flag(self.raw(col)).ok_or_else(|| self.error(col))
    }

    fn timestamp(&self, col: usize) -> Result<chrono::NaiveDateTime, DataRangeError> {
        parse_timestamp(self.raw(col)).ok_or_else(|| self.error(col))
    }
}
