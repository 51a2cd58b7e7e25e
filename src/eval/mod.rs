//! Baseline Evaluator: rollouts under fixed or supplied policies and KPI summaries.

pub mod kpi;
pub mod policy;
pub mod runner;

pub use kpi::{KpiSummary, KpiTable};
pub use policy::{FnPolicy, Policy, RegimeRulePolicy, UncontrolledPolicy};
pub use runner::{EpisodeRun, NO_PV_BASELINE, baseline, baseline_without_pv, compare, run_episode};
