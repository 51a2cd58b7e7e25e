//! Integration tests comparing the rule policy against the uncontrolled baseline.

mod common;

use evhub_sim::eval::kpi::{KpiSummary, KpiTable};
use evhub_sim::eval::policy::{FnPolicy, Policy, RegimeRulePolicy, UncontrolledPolicy};
use evhub_sim::eval::runner::{NO_PV_BASELINE, baseline, baseline_without_pv, compare};
use evhub_sim::io::export::write_kpis_csv;

fn week() -> (Vec<KpiSummary>, KpiSummary) {
    let ds = common::synthetic(7, 42);
    let config = common::config_for(&ds);
    let store = ds.into_store().expect("store");
    let mut policies: Vec<Box<dyn Policy>> = vec![Box::new(UncontrolledPolicy), Box::new(RegimeRulePolicy)];
    let summaries = compare(&config, &store, &mut policies).expect("compare");
    let base = baseline(&config, &store).expect("baseline");
    (summaries, base)
}

#[test]
fn rule_policy_beats_baseline() {
    let (summaries, base) = week();
    let [uncontrolled, controlled] = [&summaries[0], &summaries[1]];
    assert_eq!(uncontrolled, &base);
    assert_eq!(controlled.steps, 7 * 24);

    assert!(
        controlled.co2_net_kg < base.co2_net_kg,
        "controlled {} vs baseline {}",
        controlled.co2_net_kg,
        base.co2_net_kg
    );
    assert!(controlled.co2_grid_kg < base.co2_grid_kg);
    assert!(controlled.self_consumption > base.self_consumption);
    assert!(controlled.peak_grid_import_kw <= base.peak_grid_import_kw);
    assert!(controlled.bess_discharge_kwh > 0.0);
    assert_eq!(base.bess_discharge_kwh, 0.0);
}

#[test]
fn removing_pv_raises_grid_emissions() {
    let ds = common::synthetic(7, 42);
    let config = common::config_for(&ds);
    let store = ds.into_store().expect("store");
    let with_pv = baseline(&config, &store).expect("baseline");
    let without = baseline_without_pv(&config, &store).expect("baseline without pv");
    assert_eq!(without.policy, NO_PV_BASELINE);
    assert_eq!(without.steps, with_pv.steps);
    assert!(without.co2_grid_kg >= with_pv.co2_grid_kg);
    assert!(without.cost >= with_pv.cost);
    assert_eq!(without.pv_export_kwh, 0.0);
}

#[test]
fn pv_totals_do_not_depend_on_policy() {
    let (summaries, _) = week();
    assert_eq!(summaries[0].pv_kwh, summaries[1].pv_kwh);
    for s in &summaries {
        assert!((0.0..=1.0).contains(&s.self_consumption));
        assert!(s.ev_satisfaction.is_none_or(|v| (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn external_policy_runs_through_compare() {
    let ds = common::synthetic(1, 9);
    let config = common::config_for(&ds);
    let store = ds.into_store().expect("store");
    let idle = FnPolicy::new("idle", |_: &[f64], ctx: &evhub_sim::env::PolicyContext| {
        // BESS idle, every socket off
        let mut a = vec![-1.0; 1 + ctx.sockets];
        a[0] = 0.0;
        a
    });
    let mut policies: Vec<Box<dyn Policy>> = vec![Box::new(idle)];
    let out = compare(&config, &store, &mut policies).expect("compare");
    assert_eq!(out[0].policy, "idle");
    assert_eq!(out[0].ev_delivered_kwh, 0.0);
}

#[test]
fn summaries_render_and_export() {
    let (summaries, _) = week();
    let table = KpiTable(&summaries).to_string();
    assert!(table.contains("regime_rule"));

    let mut buf = Vec::new();
    write_kpis_csv(&summaries, &mut buf).expect("csv");
    let mut rdr = csv::Reader::from_reader(buf.as_slice());
    let rows: Vec<csv::StringRecord> = rdr.records().filter_map(Result::ok).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[1][0], "regime_rule");
}
