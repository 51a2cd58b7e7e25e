//! Full-episode rollouts and policy comparison.

use tracing::info;

use crate::config::HubConfig;
use crate::env::{Environment, StepInfo};
use crate::error::EnvError;
use crate::eval::kpi::KpiSummary;
use crate::eval::policy::{Policy, UncontrolledPolicy};
use crate::store::TimeseriesStore;

/// Result of one rollout.
#[derive(Debug, Clone)]
pub struct EpisodeRun {
    pub summary: KpiSummary,
    /// Per-step infos when a trace was requested, else empty.
    pub trace: Vec<StepInfo>,
}

/// Resets `env` and runs it to termination under `policy`.
///
/// # Errors
///
/// Any [`EnvError`] from `reset` or `step`; a malformed action from the
/// policy aborts the run.
pub fn run_episode(
    env: &mut Environment,
    policy: &mut dyn Policy,
    keep_trace: bool,
) -> Result<EpisodeRun, EnvError> {
    let (mut observation, _) = env.reset()?;
    let mut trace = Vec::new();
    while !env.is_terminated() {
        let ctx = env.policy_context();
        let action = policy.act(&observation, &ctx);
        let outcome = env.step(&action)?;
        if keep_trace {
            trace.push(outcome.info);
        }
        observation = outcome.observation;
    }
    let summary = KpiSummary::from_accumulator(policy.name(), env.accumulator());
    info!(
        policy = policy.name(),
        co2_net_kg = summary.co2_net_kg,
        self_consumption = summary.self_consumption,
        peak_grid_import_kw = summary.peak_grid_import_kw,
        "rollout complete"
    );
    Ok(EpisodeRun { summary, trace })
}

/// Runs each policy on a fresh environment over its own copy of `store`.
///
/// # Errors
///
/// The first environment construction or rollout failure.
pub fn compare(
    config: &HubConfig,
    store: &TimeseriesStore,
    policies: &mut [Box<dyn Policy>],
) -> Result<Vec<KpiSummary>, EnvError> {
    let mut summaries = Vec::with_capacity(policies.len());
    for policy in policies.iter_mut() {
        let mut env = Environment::new(config.clone(), store.clone())?;
        summaries.push(run_episode(&mut env, policy.as_mut(), false)?.summary);
    }
    Ok(summaries)
}

/// KPIs of the uncontrolled baseline.
///
/// # Errors
///
/// As for [`compare`].
pub fn baseline(config: &HubConfig, store: &TimeseriesStore) -> Result<KpiSummary, EnvError> {
    let mut env = Environment::new(config.clone(), store.clone())?;
    Ok(run_episode(&mut env, &mut UncontrolledPolicy, false)?.summary)
}

/// Policy label of the [`baseline_without_pv`] summary.
pub const NO_PV_BASELINE: &str = "uncontrolled_no_pv";

/// KPIs of the uncontrolled baseline on the same loads with PV removed, so
/// every kWh is imported. The gap to [`baseline`] is what the array alone
/// contributes.
///
/// # Errors
///
/// As for [`compare`].
pub fn baseline_without_pv(config: &HubConfig, store: &TimeseriesStore) -> Result<KpiSummary, EnvError> {
    let mut env = Environment::new(config.clone(), store.without_pv())?;
    let mut summary = run_episode(&mut env, &mut UncontrolledPolicy, false)?.summary;
    summary.policy = NO_PV_BASELINE.to_string();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SyntheticSite;
    use crate::eval::policy::{FnPolicy, RegimeRulePolicy};

    fn fixture() -> (HubConfig, TimeseriesStore) {
        let dataset = SyntheticSite::small(2, 5).build().expect("built");
        let config = HubConfig::default().aligned_to(&dataset.schema);
        (config, dataset.into_store().expect("store"))
    }

    #[test]
    fn rollout_covers_every_step() {
        let (config, store) = fixture();
        let mut env = Environment::new(config, store).expect("env");
        let run = run_episode(&mut env, &mut RegimeRulePolicy, true).expect("run");
        assert_eq!(run.summary.steps, 48);
        assert_eq!(run.trace.len(), 48);
        assert_eq!(run.trace[47].t, 47);
    }

    #[test]
    fn compare_returns_one_summary_per_policy() {
        let (config, store) = fixture();
        let mut policies: Vec<Box<dyn Policy>> = vec![Box::new(UncontrolledPolicy), Box::new(RegimeRulePolicy)];
        let out = compare(&config, &store, &mut policies).expect("compared");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].policy, "uncontrolled");
        assert_eq!(out[0], baseline(&config, &store).expect("baseline"));
    }

    #[test]
    fn baseline_without_pv_imports_everything() {
        let (config, store) = fixture();
        let with_pv = baseline(&config, &store).expect("baseline");
        let without = baseline_without_pv(&config, &store).expect("no-pv baseline");
        assert_eq!(without.policy, NO_PV_BASELINE);
        assert_eq!(without.pv_kwh, 0.0);
        assert_eq!(without.self_consumption, 0.0);
        assert!(without.co2_grid_kg >= with_pv.co2_grid_kg);
        assert!(without.grid_import_kwh > with_pv.grid_import_kwh);
    }

    #[test]
    fn malformed_policy_aborts() {
        let (config, store) = fixture();
        let mut env = Environment::new(config, store).expect("env");
        let mut bad = FnPolicy::new("bad", |_: &[f64], _: &crate::env::PolicyContext| vec![0.0]);
        let err = run_episode(&mut env, &mut bad, false).unwrap_err();
        assert!(matches!(err, EnvError::Action(_)));
    }
}
