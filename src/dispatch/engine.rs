//! Pure dispatch function: one hour of prioritized energy flows.

use tracing::debug;

use crate::config::{HubConfig, RegimeHours};
use crate::devices::{Bess, BessMode, BessState, Charger, DrawLimit};
use crate::error::StateError;
use crate::store::ChargerStep;

use super::balance;
use super::flows::{Clip, ClipKind, Departure, FlowRecord};
use super::regime::{Regime, hours_until_closing_inclusive};

/// Shortfalls smaller than this are not recorded as clips.
const CLIP_EPSILON: f64 = 1e-9;

/// Decoded agent command for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    /// BESS power in kW; positive charges, negative discharges.
    pub bess_cmd_kw: f64,
    /// Per-socket fraction of socket power in `[0, 1]`.
    pub charger_cmd: Vec<f64>,
}

impl Control {
    /// No BESS action, every socket at full power.
    pub fn uncontrolled(sockets: usize) -> Self {
        Self {
            bess_cmd_kw: 0.0,
            charger_cmd: vec![1.0; sockets],
        }
    }
}

/// Static parameters of the dispatch, fixed for an episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchParams {
    pub bess: Bess,
    pub peak_target_kw: f64,
    /// Margin below `soc_max` at which hold-full stops charging.
    pub hold_epsilon: f64,
    pub closing_hour: usize,
    pub regime_hours: RegimeHours,
    pub dt_hours: f64,
}

impl DispatchParams {
    pub fn from_config(cfg: &HubConfig) -> Self {
        Self {
            bess: Bess::from_config(&cfg.bess),
            peak_target_kw: cfg.peak_target_kw,
            hold_epsilon: cfg.reward.hold_epsilon,
            closing_hour: cfg.closing_hour,
            regime_hours: cfg.regime.hours,
            dt_hours: 1.0,
        }
    }

    /// Regime in force at `hour`.
    pub fn regime(&self, hour: usize) -> Regime {
        Regime::for_hour(hour, &self.regime_hours, self.closing_hour)
    }
}

/// Physical inputs for one step.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    /// Step index, used in error reports.
    pub t: usize,
    pub hour: usize,
    pub pv_kwh: f64,
    pub mall_kwh: f64,
    pub chargers: &'a [Charger],
    pub sockets: &'a [ChargerStep],
    /// Energy delivered to each socket earlier in its current session.
    pub session_kwh: &'a [f64],
    pub state: BessState,
}

/// Everything one dispatch step produces.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub regime: Regime,
    pub flows: FlowRecord,
    /// BESS state at the end of the step.
    pub state: BessState,
    /// Grid-side energy delivered to each socket this step.
    pub socket_kwh: Vec<f64>,
    /// Vehicle SOC at the end of the step (0 for vacant sockets).
    pub socket_soc: Vec<f64>,
    pub departures: Vec<Departure>,
    pub clips: Vec<Clip>,
    /// Stored energy written off by the closing pull (kWh).
    pub closing_bleed_kwh: f64,
}

/// Reduces `requested` to `cap`, recording a clip when it binds.
fn limit(clips: &mut Vec<Clip>, kind: ClipKind, socket: Option<usize>, requested: f64, cap: f64) -> f64 {
    let granted = requested.min(cap.max(0.0));
    if requested - granted > CLIP_EPSILON {
        clips.push(Clip {
            kind,
            socket,
            requested_kwh: requested,
            granted_kwh: granted,
        });
    }
    granted
}

fn check_input(field: &'static str, value: f64) -> Result<(), StateError> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(StateError::NegativeInput { field, value });
    }
    Ok(())
}

/// Runs one hour of the hub's energy balance.
///
/// The agent proposes through `control`; the regime table, power ratings,
/// SOC headroom and available energy clip the proposal, and every
/// reduction is returned as a [`Clip`].
///
/// # Errors
///
/// - [`StateError::InfeasibleSoc`] if `inputs.state.soc` is outside the BESS bounds.
/// - [`StateError::NegativeInput`] on a negative or non-finite PV or mall input.
/// - [`StateError::SocketCountMismatch`] if the control vector, socket steps,
///   session energies and chargers disagree in length.
/// - [`StateError::Imbalance`] or [`StateError::SimultaneousChargeDischarge`]
///   if the resulting flows violate a balance.
pub fn dispatch(
    params: &DispatchParams,
    inputs: &StepInputs<'_>,
    control: &Control,
) -> Result<DispatchOutcome, StateError> {
    let bess = &params.bess;
    let soc = inputs.state.soc;
    bess.check_soc(soc)?;
    check_input("pv_kwh", inputs.pv_kwh)?;
    check_input("mall_kwh", inputs.mall_kwh)?;
    let n = inputs.sockets.len();
    for len in [control.charger_cmd.len(), inputs.chargers.len(), inputs.session_kwh.len()] {
        if len != n {
            return Err(StateError::SocketCountMismatch {
                expected: n,
                actual: len,
            });
        }
    }

    let dt = params.dt_hours;
    let regime = params.regime(inputs.hour);
    let mut clips = Vec::new();
    let mut flows = FlowRecord::default();

    // 1. PV serves the mall first
    flows.pv_to_load = inputs.pv_kwh.min(inputs.mall_kwh);
    let mut pv_rem = (inputs.pv_kwh - flows.pv_to_load).max(0.0);
    let load_rem = (inputs.mall_kwh - flows.pv_to_load).max(0.0);

    // 2. Feasible per-socket draws
    let mut draws = vec![0.0; n];
    for (i, (charger, step)) in inputs.chargers.iter().zip(inputs.sockets).enumerate() {
        if !step.available {
            continue;
        }
        let (draw, requested, why) =
            charger.feasible_draw_kwh(control.charger_cmd[i], step.soc, step.target_soc, dt);
        if !regime.chargers_active() {
            limit(&mut clips, ClipKind::EvRegime, Some(i), requested, 0.0);
            continue;
        }
        if why == DrawLimit::SocHeadroom {
            limit(&mut clips, ClipKind::SocketHeadroom, Some(i), requested, draw);
        }
        draws[i] = draw;
    }
    let ev_demand: f64 = draws.iter().sum();

    // 3. BESS charge request, reduced by power, regime and SOC headroom
    let charge_req = control.bess_cmd_kw.max(0.0) * dt;
    let mut charge = limit(&mut clips, ClipKind::BessPower, None, charge_req, bess.max_power_kw * dt);
    let hold_full = regime == Regime::HoldFull && soc >= bess.soc_max - params.hold_epsilon;
    if !regime.allows_charge() || hold_full {
        charge = limit(&mut clips, ClipKind::BessRegime, None, charge, 0.0);
    }
    charge = limit(
        &mut clips,
        ClipKind::BessHeadroom,
        None,
        charge,
        bess.charge_headroom_kwh(soc, bess.soc_max, dt),
    );

    // 4. Split the PV surplus between EVs and the BESS, in regime order
    if regime.ev_pv_only() {
        flows.pv_to_bess = limit(&mut clips, ClipKind::BessEnergy, None, charge, pv_rem);
        pv_rem = (pv_rem - flows.pv_to_bess).max(0.0);
        flows.pv_to_ev = ev_demand.min(pv_rem);
        pv_rem = (pv_rem - flows.pv_to_ev).max(0.0);
    } else {
        flows.pv_to_ev = ev_demand.min(pv_rem);
        pv_rem = (pv_rem - flows.pv_to_ev).max(0.0);
        flows.pv_to_bess = limit(&mut clips, ClipKind::BessEnergy, None, charge, pv_rem);
        pv_rem = (pv_rem - flows.pv_to_bess).max(0.0);
    }
    flows.pv_export = pv_rem;
    flows.bess_charge_in = flows.pv_to_bess;
    let ev_rem = (ev_demand - flows.pv_to_ev).max(0.0);

    // 5. BESS discharge into residual load, then EVs
    let discharge_req = (-control.bess_cmd_kw).max(0.0) * dt;
    let mut agent = limit(&mut clips, ClipKind::BessPower, None, discharge_req, bess.max_power_kw * dt);
    let (demand_cap, safety) = match regime {
        Regime::HoldFull => {
            let spike = (load_rem - params.peak_target_kw * dt).max(0.0);
            agent = limit(&mut clips, ClipKind::BessRegime, None, agent, spike);
            (load_rem, 0.0)
        }
        Regime::PeakShave => {
            let hours = hours_until_closing_inclusive(inputs.hour, params.closing_hour) as f64;
            (load_rem + ev_rem, bess.stored_above_floor_kwh(soc) / hours)
        }
        Regime::DischargeToFloor => (load_rem + ev_rem, bess.stored_above_floor_kwh(soc)),
        _ => {
            agent = limit(&mut clips, ClipKind::BessRegime, None, agent, 0.0);
            (0.0, 0.0)
        }
    };
    let available = bess.discharge_available_kwh(soc, dt);
    agent = limit(&mut clips, ClipKind::BessHeadroom, None, agent, available);
    agent = limit(&mut clips, ClipKind::BessEnergy, None, agent, demand_cap);
    let discharge = agent.max(safety.min(available).min(demand_cap));

    flows.bess_to_load = discharge.min(load_rem);
    flows.bess_to_ev = (discharge - flows.bess_to_load).max(0.0);
    flows.bess_discharge_out = flows.bess_to_load + flows.bess_to_ev;
    flows.grid_to_load = (load_rem - flows.bess_to_load).max(0.0);

    // 6. Grid covers what is left of EV demand, except when EVs are PV-only
    let ev_after_bess = (ev_rem - flows.bess_to_ev).max(0.0);
    flows.grid_to_ev = if regime.ev_pv_only() { 0.0 } else { ev_after_bess };

    // 7. Update sockets and the BESS
    let served = flows.ev_delivered();
    let share = if ev_demand > 0.0 {
        (served / ev_demand).min(1.0)
    } else {
        0.0
    };
    let mut socket_kwh = vec![0.0; n];
    let mut socket_soc = vec![0.0; n];
    let mut departures = Vec::new();
    for (i, (charger, step)) in inputs.chargers.iter().zip(inputs.sockets).enumerate() {
        if !step.available {
            continue;
        }
        let delivered = draws[i] * share;
        if regime.ev_pv_only() {
            limit(&mut clips, ClipKind::EvRegime, Some(i), draws[i], delivered);
        }
        socket_kwh[i] = delivered;
        socket_soc[i] = charger.soc_after(step.soc, delivered);
        if let Some(required_soc) = step.required_soc_on_departure {
            departures.push(Departure {
                socket: i,
                class: charger.class,
                delivered_soc: socket_soc[i],
                required_soc,
                session_kwh: inputs.session_kwh[i] + delivered,
            });
        }
    }

    let mut bleed = 0.0;
    let mut next_soc = bess.soc_after(soc, flows.bess_charge_in, flows.bess_discharge_out, 0.0);
    if regime == Regime::DischargeToFloor {
        // Whatever the pull could not deliver is written off at the floor.
        bleed = ((next_soc - bess.soc_min) * bess.capacity_kwh).max(0.0);
        if bleed > CLIP_EPSILON {
            clips.push(Clip {
                kind: ClipKind::ClosingBleed,
                socket: None,
                requested_kwh: bleed,
                granted_kwh: 0.0,
            });
        }
        next_soc = bess.soc_min;
    }
    bess.check_soc(next_soc)?;
    let next_soc = next_soc.clamp(bess.soc_min, bess.soc_max);

    let mode = if flows.bess_charge_in > 0.0 {
        BessMode::Charge
    } else if flows.bess_discharge_out > 0.0 || bleed > 0.0 {
        BessMode::Discharge
    } else if next_soc > bess.soc_min + crate::devices::bess::SOC_TOLERANCE {
        BessMode::Hold
    } else {
        BessMode::Idle
    };

    balance::check_non_negative(&flows)?;
    balance::check_exclusive(&flows)?;
    balance::check_pv(inputs.t, &flows, inputs.pv_kwh)?;
    balance::check_load(inputs.t, &flows, inputs.mall_kwh)?;
    balance::check_bess_edges(inputs.t, &flows)?;
    balance::check_bess_energy(
        inputs.t,
        soc,
        next_soc,
        bess.capacity_kwh,
        bess.eta_c,
        bess.eta_d,
        &flows,
        bleed,
    )?;

    debug!(
        t = inputs.t,
        hour = inputs.hour,
        %regime,
        soc_before = soc,
        soc_after = next_soc,
        grid_import = flows.grid_import(),
        clips = clips.len(),
        "dispatch step"
    );

    Ok(DispatchOutcome {
        regime,
        flows,
        state: BessState {
            soc: next_soc,
            mode,
        },
        socket_kwh,
        socket_soc,
        departures,
        clips,
        closing_bleed_kwh: bleed,
    })
}
