//! Integration tests for building datasets from upstream files.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use evhub_sim::dataset::{Dataset, DatasetBuilder, UpstreamArtifacts, UpstreamPaths};
use evhub_sim::error::{DataRangeError, DatasetError, SchemaError};

const HOURS: usize = 24;

/// Quarter-hour PV power: 40 kW from 08:00 to 16:00, zero otherwise.
fn pv_csv() -> String {
    let mut text = String::from("timestamp,ac_power_kw\n");
    for q in 0..HOURS * 4 {
        let (h, m) = (q / 4, (q % 4) * 15);
        let kw = if (8..16).contains(&h) { 40.0 } else { 0.0 };
        let _ = writeln!(text, "2024-03-01 {h:02}:{m:02}:00,{kw}");
    }
    text
}

/// Semicolon-separated mall demand with decimal commas.
fn mall_csv() -> String {
    let mut text = String::from("timestamp;demand_kwh\n");
    for h in 0..HOURS {
        let _ = writeln!(text, "2024-03-01 {h:02}:00;12,5");
    }
    text
}

const CHARGERS: &str = r#"[
  {"id": "a", "class": "moto", "socket_power_kw": 2.0, "battery_capacity_kwh": 5.19, "efficiency": 0.92},
  {"id": "b", "class": "mototaxi", "socket_power_kw": 3.0, "battery_capacity_kwh": 8.0, "efficiency": 0.92}
]"#;

/// Percent SOC on socket a, fractions on socket b.
const SESSIONS: &str = "timestamp,socket_id,soc_start,arrival_flag,departure_flag,required_soc\n\
2024-03-01 10:00,a,30,1,0,90\n\
2024-03-01 13:00,a,0,0,1,0\n\
2024-03-01 17:00,b,0.25,1,1,0.8\n";

const BESS: &str = r#"{"capacity_kwh": 200.0, "power_kw": 50.0, "soc_min": 0.1, "soc_max": 0.95,
"round_trip_efficiency": 0.9, "loss_split": "symmetric"}"#;

fn write_upstream(dir: &Path, pv: &str) -> UpstreamPaths {
    let paths = UpstreamPaths {
        pv: dir.join("pv.csv"),
        mall: dir.join("mall.csv"),
        chargers: dir.join("chargers.json"),
        sessions: dir.join("sessions.csv"),
        bess: dir.join("bess.json"),
        grid: None,
        installed_pv_ac_kw: Some(50.0),
    };
    fs::write(&paths.pv, pv).expect("write pv");
    fs::write(&paths.mall, mall_csv()).expect("write mall");
    fs::write(&paths.chargers, CHARGERS).expect("write chargers");
    fs::write(&paths.sessions, SESSIONS).expect("write sessions");
    fs::write(&paths.bess, BESS).expect("write bess");
    paths
}

fn build(paths: &UpstreamPaths) -> Result<Dataset, DatasetError> {
    DatasetBuilder::new(HOURS).build(UpstreamArtifacts::read(paths)?)
}

#[test]
fn builds_canonical_dataset_from_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = write_upstream(dir.path(), &pv_csv());
    let ds = build(&paths).expect("dataset should build");

    assert_eq!(ds.table.len(), HOURS);
    assert_eq!(ds.schema.episode_hours, HOURS);
    assert_eq!(ds.schema.start_hour(), 0);
    // Four quarter-hours at 40 kW make 40 kWh
    assert_eq!(ds.table.pv_kwh[8], 40.0);
    assert_eq!(ds.table.pv_kwh[7], 0.0);
    assert_eq!(ds.table.mall_kwh[3], 12.5);
    assert!(ds.table.peak_flag[18] && !ds.table.peak_flag[17] && !ds.table.peak_flag[23]);
    assert_eq!(ds.schema.bess.capacity_kwh, 200.0);

    let a = &ds.table.sockets[0];
    assert_eq!(a.available.iter().filter(|v| **v).count(), 4);
    assert!(a.available[10] && a.available[13] && !a.available[14]);
    assert_eq!(a.soc[10], 0.3);
    assert_eq!(a.required_soc[13], 0.9);
    assert!(a.departure[13]);

    let b = &ds.table.sockets[1];
    assert!(b.available[17] && b.departure[17]);
    assert_eq!(b.soc[17], 0.25);
}

#[test]
fn written_dataset_reopens_as_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = write_upstream(dir.path(), &pv_csv());
    let ds = build(&paths).expect("dataset should build");

    let out = dir.path().join("canonical");
    ds.write_dir(&out).expect("written");
    let back = Dataset::read_dir(&out).expect("read back");
    assert_eq!(back, ds);

    let store = back.into_store().expect("store");
    assert_eq!(store.len(), HOURS);
    assert_eq!(store.socket_count(), 2);
    assert!(store.arrives_at(0, 10));
}

#[test]
fn gap_in_pv_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pv: String = pv_csv()
        .lines()
        .filter(|l| !l.starts_with("2024-03-01 05:30"))
        .map(|l| format!("{l}\n"))
        .collect();
    let paths = write_upstream(dir.path(), &pv);
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Range(DataRangeError::MissingHour { series: "pv", .. })));
}

#[test]
fn pv_above_installed_capacity_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pv = pv_csv().replace(",40\n", ",80\n");
    let paths = write_upstream(dir.path(), &pv);
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Range(DataRangeError::AboveInstalledAc { row: 8, .. })));
}

#[test]
fn non_finite_cells_are_rejected_at_build_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pv = pv_csv().replace("2024-03-01 12:00:00,40", "2024-03-01 12:00:00,NaN");
    let paths = write_upstream(dir.path(), &pv);
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Range(DataRangeError::NonFinite { series: "pv", row: 48, .. })));

    let paths = write_upstream(dir.path(), &pv_csv());
    fs::write(&paths.mall, mall_csv().replace("03:00;12,5", "03:00;inf")).expect("write mall");
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Range(DataRangeError::NonFinite { series: "mall", row: 3, .. })));
}

#[test]
fn short_series_is_wrong_length() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = write_upstream(dir.path(), &pv_csv());
    let err = DatasetBuilder::new(48)
        .build(UpstreamArtifacts::read(&paths).expect("read"))
        .unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Range(DataRangeError::WrongLength {
            series: "pv",
            expected: 48,
            actual: 24
        })
    ));
}

#[test]
fn missing_pv_column_is_a_schema_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pv = pv_csv().replace("ac_power_kw", "dc_power_kw");
    let paths = write_upstream(dir.path(), &pv);
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Schema(SchemaError::MissingField(ref f)) if f == "pv.ac_power_kw"));
}

#[test]
fn missing_file_names_its_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut paths = write_upstream(dir.path(), &pv_csv());
    paths.sessions = dir.path().join("nope.csv");
    let err = build(&paths).unwrap_err();
    assert!(matches!(err, DatasetError::Io { ref path, .. } if path.ends_with("nope.csv")));
}

#[test]
fn grid_location_json_overrides_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut paths = write_upstream(dir.path(), &pv_csv());
    let grid = dir.path().join("grid.json");
    fs::write(&grid, r#"{"carbon_intensity_kg_per_kwh": 0.3, "peak_start_hour": 17}"#).expect("write grid");
    paths.grid = Some(grid);
    let ds = build(&paths).expect("dataset should build");
    assert!(ds.table.carbon_intensity.iter().all(|c| *c == 0.3));
    assert!(ds.table.peak_flag[17]);
    assert_eq!(ds.table.tariff[17], 0.45);
    assert_eq!(ds.table.tariff[12], 0.28);
}
