//! Post-dispatch balance checks.
//!
//! Every check returns [`StateError::Imbalance`] naming the violated
//! balance; a failure here means the engine produced inconsistent flows.

use crate::dispatch::flows::FlowRecord;
use crate::error::StateError;

/// Absolute tolerance on kWh balances, scaled by the magnitude checked.
pub const BALANCE_EPSILON: f64 = 1e-6;

fn within(residual: f64, scale: f64) -> bool {
    residual.abs() <= BALANCE_EPSILON * (1.0 + scale.abs())
}

fn check(balance: &'static str, step: usize, lhs: f64, rhs: f64) -> Result<(), StateError> {
    let residual = lhs - rhs;
    if within(residual, rhs) {
        Ok(())
    } else {
        Err(StateError::Imbalance {
            balance,
            step,
            residual,
        })
    }
}

/// `pv_to_load + pv_to_ev + pv_to_bess + pv_export == pv`.
pub fn check_pv(step: usize, flows: &FlowRecord, pv_kwh: f64) -> Result<(), StateError> {
    let used = flows.pv_to_load + flows.pv_to_ev + flows.pv_to_bess + flows.pv_export;
    check("pv", step, used, pv_kwh)
}

/// `pv_to_load + bess_to_load + grid_to_load == mall`.
pub fn check_load(step: usize, flows: &FlowRecord, mall_kwh: f64) -> Result<(), StateError> {
    let served = flows.pv_to_load + flows.bess_to_load + flows.grid_to_load;
    check("load", step, served, mall_kwh)
}

/// BESS bus-side flows match the edges they feed.
pub fn check_bess_edges(step: usize, flows: &FlowRecord) -> Result<(), StateError> {
    check("bess_in", step, flows.bess_charge_in, flows.pv_to_bess)?;
    check(
        "bess_out",
        step,
        flows.bess_discharge_out,
        flows.bess_to_load + flows.bess_to_ev,
    )
}

/// `Δsoc · capacity == η_c · in − out / η_d − bleed`.
#[expect(clippy::too_many_arguments)]
pub fn check_bess_energy(
    step: usize,
    soc_before: f64,
    soc_after: f64,
    capacity_kwh: f64,
    eta_c: f64,
    eta_d: f64,
    flows: &FlowRecord,
    bleed_kwh: f64,
) -> Result<(), StateError> {
    let stored = (soc_after - soc_before) * capacity_kwh;
    let expected = eta_c * flows.bess_charge_in - flows.bess_discharge_out / eta_d - bleed_kwh;
    check("bess_energy", step, stored, expected)
}

/// Every flow is non-negative.
pub fn check_non_negative(flows: &FlowRecord) -> Result<(), StateError> {
    for (field, value) in FlowRecord::FIELDS.into_iter().zip(flows.values()) {
        if !(value >= -BALANCE_EPSILON) {
            return Err(StateError::NegativeInput { field, value });
        }
    }
    Ok(())
}

/// The BESS never charges and discharges in the same step.
pub fn check_exclusive(flows: &FlowRecord) -> Result<(), StateError> {
    if flows.bess_charge_in > BALANCE_EPSILON && flows.bess_discharge_out > BALANCE_EPSILON {
        return Err(StateError::SimultaneousChargeDischarge {
            charge_kwh: flows.bess_charge_in,
            discharge_kwh: flows.bess_discharge_out,
        });
    }
    Ok(())
}
