//! CSV export of step telemetry and KPI summaries.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::dispatch::{ClipKind, FlowRecord};
use crate::env::StepInfo;
use crate::eval::KpiSummary;

/// Columns after the flows in the step telemetry file.
const STEP_TAIL: [&str; 20] = [
    "pv_kwh",
    "mall_kwh",
    "bess_soc",
    "bess_mode",
    "co2_grid_kg",
    "co2_avoided_kg",
    "co2_net_kg",
    "cost",
    "grid_overshoot_kw",
    "r_co2",
    "r_cost",
    "r_solar",
    "r_ev",
    "r_grid",
    "reward",
    "clips",
    "clip_bess_kwh",
    "clip_ev_kwh",
    "closing_bleed_kwh",
    "departures",
];

/// Header of the step telemetry file.
pub fn step_header() -> Vec<&'static str> {
    let mut header = vec!["t", "hour", "regime"];
    header.extend(FlowRecord::FIELDS);
    header.extend(STEP_TAIL);
    header
}

/// Formats a float, spelling out non-finite values.
fn cell(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{value:.6}")
    }
}

/// Exports step infos to a CSV file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_steps_csv(steps: &[StepInfo], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_steps_csv(steps, io::BufWriter::new(file))
}

/// Writes step infos as CSV to any writer, one row per step in a fixed
/// column order. Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_steps_csv(steps: &[StepInfo], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(step_header())?;

    for s in steps {
        let r = &s.reward;
        let mut row = vec![s.t.to_string(), s.hour.to_string(), s.regime.to_string()];
        row.extend(s.flows.values().into_iter().map(cell));
        row.extend([
            cell(s.pv_kwh),
            cell(s.mall_kwh),
            cell(s.bess_soc),
            s.bess_mode.to_string(),
            cell(r.co2_grid_kg),
            cell(r.co2_avoided_kg),
            cell(r.co2_net_kg),
            cell(r.cost),
            cell(r.grid_overshoot_kw),
            cell(r.r_co2),
            cell(r.r_cost),
            cell(r.r_solar),
            cell(r.r_ev),
            cell(r.r_grid),
            cell(r.total),
            s.clips.len().to_string(),
            cell(s.clipped_kwh(ClipKind::is_bess)),
            cell(s.clipped_kwh(ClipKind::is_ev)),
            cell(s.closing_bleed_kwh),
            s.departures.len().to_string(),
        ]);
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Exports KPI summaries to a CSV file at `path`.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_kpis_csv(summaries: &[KpiSummary], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_kpis_csv(summaries, io::BufWriter::new(file))
}

/// Writes one row per summary; undefined values are left empty.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_kpis_csv(summaries: &[KpiSummary], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    let mut header = vec!["policy"];
    header.extend(KpiSummary::COLUMNS);
    wtr.write_record(&header)?;

    for s in summaries {
        let mut row = vec![s.policy.clone()];
        row.extend(s.values().into_iter().map(|v| v.map(cell).unwrap_or_default()));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
