//! Episode KPI summaries for tabular comparison.

use std::fmt;

use serde::Serialize;

use crate::devices::ChargerClass;
use crate::env::{ClassService, EpisodeAccumulator};

/// Scalar KPIs of one episode under one policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub policy: String,
    pub steps: usize,
    /// kg CO2 emitted by grid imports.
    pub co2_grid_kg: f64,
    /// kg CO2 credited for local renewables and avoided fuel.
    pub co2_avoided_kg: f64,
    pub co2_net_kg: f64,
    pub cost: f64,
    /// Fraction of PV consumed on site, in `[0, 1]`.
    pub self_consumption: f64,
    pub peak_grid_import_kw: f64,
    pub pv_kwh: f64,
    pub grid_import_kwh: f64,
    pub pv_export_kwh: f64,
    pub ev_delivered_kwh: f64,
    pub bess_discharge_kwh: f64,
    pub closing_bleed_kwh: f64,
    /// Mean departure satisfaction over all vehicles.
    pub ev_satisfaction: Option<f64>,
    /// Mean departure satisfaction, indexed by [`ChargerClass::index`].
    pub class_satisfaction: [Option<f64>; 2],
    /// Share of fully served departures, indexed by [`ChargerClass::index`].
    pub class_fully_served: [Option<f64>; 2],
    pub clips: u64,
    pub reward_sum: f64,
    pub numeric_coercions: u32,
}

impl KpiSummary {
    /// Builds the summary from a finished episode's accumulator.
    pub fn from_accumulator(policy: impl Into<String>, acc: &EpisodeAccumulator) -> Self {
        let service = |f: fn(&ClassService) -> Option<f64>| ChargerClass::ALL.map(|c| f(acc.class(c)));
        Self {
            policy: policy.into(),
            steps: acc.steps,
            co2_grid_kg: acc.co2_grid_kg,
            co2_avoided_kg: acc.co2_avoided_kg,
            co2_net_kg: acc.co2_net_kg,
            cost: acc.cost,
            self_consumption: acc.self_consumption(),
            peak_grid_import_kw: acc.peak_grid_import_kw,
            pv_kwh: acc.pv_kwh,
            grid_import_kwh: acc.flows.grid_import(),
            pv_export_kwh: acc.flows.pv_export,
            ev_delivered_kwh: acc.flows.ev_delivered(),
            bess_discharge_kwh: acc.flows.bess_discharge_out,
            closing_bleed_kwh: acc.closing_bleed_kwh,
            ev_satisfaction: acc.ev_satisfaction(),
            class_satisfaction: service(ClassService::mean_satisfaction),
            class_fully_served: service(ClassService::fully_satisfied_rate),
            clips: acc.clips,
            reward_sum: acc.reward_sum,
            numeric_coercions: acc.numeric_coercions,
        }
    }

    /// Column names of [`KpiSummary::values`], in order.
    pub const COLUMNS: [&'static str; 20] = [
        "steps",
        "co2_grid_kg",
        "co2_avoided_kg",
        "co2_net_kg",
        "cost",
        "self_consumption",
        "peak_grid_import_kw",
        "pv_kwh",
        "grid_import_kwh",
        "pv_export_kwh",
        "ev_delivered_kwh",
        "bess_discharge_kwh",
        "closing_bleed_kwh",
        "ev_satisfaction",
        "moto_satisfaction",
        "mototaxi_satisfaction",
        "moto_fully_served",
        "mototaxi_fully_served",
        "clips",
        "reward_sum",
    ];

    /// Scalar values in [`KpiSummary::COLUMNS`] order; `None` where undefined.
    pub fn values(&self) -> [Option<f64>; 20] {
        [
            Some(self.steps as f64),
            Some(self.co2_grid_kg),
            Some(self.co2_avoided_kg),
            Some(self.co2_net_kg),
            Some(self.cost),
            Some(self.self_consumption),
            Some(self.peak_grid_import_kw),
            Some(self.pv_kwh),
            Some(self.grid_import_kwh),
            Some(self.pv_export_kwh),
            Some(self.ev_delivered_kwh),
            Some(self.bess_discharge_kwh),
            Some(self.closing_bleed_kwh),
            self.ev_satisfaction,
            self.class_satisfaction[0],
            self.class_satisfaction[1],
            self.class_fully_served[0],
            self.class_fully_served[1],
            Some(self.clips as f64),
            Some(self.reward_sum),
        ]
    }
}

fn pct(x: Option<f64>) -> String {
    x.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", 100.0 * v))
}

impl fmt::Display for KpiSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report: {} ---", self.policy)?;
        writeln!(f, "Steps:                 {}", self.steps)?;
        writeln!(
            f,
            "CO2 net:               {:.1} kg (grid {:.1}, avoided {:.1})",
            self.co2_net_kg, self.co2_grid_kg, self.co2_avoided_kg
        )?;
        writeln!(f, "Cost:                  {:.2}", self.cost)?;
        writeln!(f, "Self-consumption:      {}", pct(Some(self.self_consumption)))?;
        writeln!(f, "Peak grid import:      {:.2} kW", self.peak_grid_import_kw)?;
        writeln!(
            f,
            "Energy:                pv {:.1} kWh, import {:.1} kWh, export {:.1} kWh",
            self.pv_kwh, self.grid_import_kwh, self.pv_export_kwh
        )?;
        writeln!(
            f,
            "EV delivered:          {:.1} kWh, satisfaction {}",
            self.ev_delivered_kwh,
            pct(self.ev_satisfaction)
        )?;
        for class in ChargerClass::ALL {
            writeln!(
                f,
                "  {:<20} {} ({} fully served)",
                format!("{class}:"),
                pct(self.class_satisfaction[class.index()]),
                pct(self.class_fully_served[class.index()])
            )?;
        }
        writeln!(
            f,
            "BESS discharge:        {:.1} kWh (closing bleed {:.1} kWh)",
            self.bess_discharge_kwh, self.closing_bleed_kwh
        )?;
        write!(f, "Clips:                 {}", self.clips)
    }
}

/// Side-by-side rendering of several summaries.
pub struct KpiTable<'a>(pub &'a [KpiSummary]);

impl fmt::Display for KpiTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<24}", "kpi")?;
        for s in self.0 {
            write!(f, " {:>16}", s.policy)?;
        }
        writeln!(f)?;
        for (i, name) in KpiSummary::COLUMNS.iter().enumerate() {
            write!(f, "{name:<24}")?;
            for s in self.0 {
                match s.values()[i] {
                    Some(v) => write!(f, " {v:>16.3}")?,
                    None => write!(f, " {:>16}", "n/a")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
