//! Declarative schema describing every canonical column.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::BessConfig;
use crate::devices::Charger;

/// Affine map `(x - offset) / scale` used to normalise an observation field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub offset: f64,
    pub scale: f64,
}

impl Normalization {
    /// The identity map on `[0, 1]`.
    pub const UNIT: Normalization = Normalization {
        offset: 0.0,
        scale: 1.0,
    };

    /// Zero-based map scaling `[0, max]` onto `[0, 1]`.
    ///
    /// A non-positive `max` yields the unit map so the result stays finite.
    pub fn zero_to(max: f64) -> Self {
        if max > 0.0 && max.is_finite() {
            Self {
                offset: 0.0,
                scale: max,
            }
        } else {
            Self::UNIT
        }
    }

    /// Applies the map and clamps the result to `[0, 1]`.
    pub fn apply(&self, x: f64) -> f64 {
        ((x - self.offset) / self.scale).clamp(0.0, 1.0)
    }
}

/// Metadata for one canonical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub unit: String,
    /// Upstream artifact the column was derived from.
    pub origin: String,
    pub normalization: Normalization,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, unit: &str, origin: &str, normalization: Normalization) -> Self {
        Self {
            name: name.into(),
            unit: unit.to_string(),
            origin: origin.to_string(),
            normalization,
        }
    }
}

/// Names of the site-level columns, in on-disk order.
pub const PV_KWH: &str = "pv_kwh";
pub const MALL_KWH: &str = "mall_kwh";
pub const CARBON_INTENSITY: &str = "carbon_intensity";
pub const TARIFF: &str = "tariff";
pub const PEAK_FLAG: &str = "peak_flag";

/// Columns every dataset must describe.
pub const REQUIRED_COLUMNS: [&str; 5] = [PV_KWH, MALL_KWH, CARBON_INTENSITY, TARIFF, PEAK_FLAG];

/// Per-socket column suffixes, in on-disk order.
pub const SOCKET_SUFFIXES: [&str; 4] = ["available", "soc", "required_soc", "departure"];

/// Canonical column name for a socket field.
pub fn socket_column(id: &str, suffix: &str) -> String {
    format!("socket_{id}_{suffix}")
}

/// Schema document stored next to the canonical table as `schema.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Number of hourly rows.
    pub episode_hours: usize,
    /// Timestamp of row 0.
    pub start: NaiveDateTime,
    /// Installed PV inverter capacity (kW AC).
    pub installed_pv_ac_kw: f64,
    pub chargers: Vec<Charger>,
    pub bess: BessConfig,
    pub columns: Vec<ColumnSpec>,
}

impl DatasetSchema {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in on-disk order, timestamp first.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["timestamp".to_string()];
        header.extend(REQUIRED_COLUMNS.iter().map(|c| c.to_string()));
        for charger in &self.chargers {
            header.extend(SOCKET_SUFFIXES.iter().map(|s| socket_column(&charger.id, s)));
        }
        header
    }

    /// Hour of day of row 0.
    pub fn start_hour(&self) -> usize {
        use chrono::Timelike;
        self.start.hour() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::ChargerClass;

    #[test]
    fn normalization_clamps() {
        let n = Normalization::zero_to(200.0);
        assert_eq!(n.apply(100.0), 0.5);
        assert_eq!(n.apply(400.0), 1.0);
        assert_eq!(n.apply(-1.0), 0.0);
    }

    #[test]
    fn zero_scale_falls_back_to_unit() {
        assert_eq!(Normalization::zero_to(0.0), Normalization::UNIT);
        assert_eq!(Normalization::zero_to(f64::NAN), Normalization::UNIT);
    }

    #[test]
    fn header_lists_socket_columns_in_order() {
        let schema = DatasetSchema {
            episode_hours: 24,
            start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid date"),
            installed_pv_ac_kw: 100.0,
            chargers: vec![Charger::with_class_defaults("a", ChargerClass::Moto)],
            bess: BessConfig::default(),
            columns: Vec::new(),
        };
        let header = schema.header();
        assert_eq!(header[0], "timestamp");
        assert_eq!(header[1], "pv_kwh");
        assert_eq!(header.len(), 1 + 5 + 4);
        assert_eq!(header[9], "socket_a_departure");
    }
}
