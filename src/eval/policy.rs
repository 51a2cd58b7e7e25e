//! Policies map an observation to an action vector in `[-1, 1]^(1+S)`.

use crate::dispatch::Regime;
use crate::env::PolicyContext;

/// Anything that can drive an [`crate::env::Environment`].
pub trait Policy {
    /// Returns the action for the step described by `ctx`.
    fn act(&mut self, observation: &[f64], ctx: &PolicyContext) -> Vec<f64>;

    /// Name used in summaries.
    fn name(&self) -> &str;
}

/// The baseline: BESS idle, every socket at full command.
///
/// The deterministic glide and closing pull still apply.
#[derive(Debug, Default, Clone, Copy)]
pub struct UncontrolledPolicy;

impl Policy for UncontrolledPolicy {
    fn act(&mut self, _observation: &[f64], ctx: &PolicyContext) -> Vec<f64> {
        let mut action = vec![1.0; 1 + ctx.sockets];
        action[0] = 0.0;
        action
    }

    fn name(&self) -> &str {
        "uncontrolled"
    }
}

/// Follows the regime table: charge fully while charging is allowed,
/// discharge fully whenever discharge is allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegimeRulePolicy;

impl RegimeRulePolicy {
    /// Normalised BESS command for a phase.
    pub fn bess_command(regime: Regime) -> f64 {
        match regime {
            Regime::ChargePriority | Regime::ChargeServe => 1.0,
            Regime::HoldFull | Regime::PeakShave | Regime::DischargeToFloor => -1.0,
            Regime::IdleAtFloor => 0.0,
        }
    }
}

impl Policy for RegimeRulePolicy {
    fn act(&mut self, _observation: &[f64], ctx: &PolicyContext) -> Vec<f64> {
        let mut action = vec![1.0; 1 + ctx.sockets];
        action[0] = Self::bess_command(ctx.regime);
        action
    }

    fn name(&self) -> &str {
        "regime_rule"
    }
}

/// Wraps a closure, e.g. a trained network's forward pass.
pub struct FnPolicy<F> {
    name: String,
    f: F,
}

impl<F> FnPolicy<F>
where
    F: FnMut(&[f64], &PolicyContext) -> Vec<f64>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Policy for FnPolicy<F>
where
    F: FnMut(&[f64], &PolicyContext) -> Vec<f64>,
{
    fn act(&mut self, observation: &[f64], ctx: &PolicyContext) -> Vec<f64> {
        (self.f)(observation, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
