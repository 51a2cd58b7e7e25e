//! Action validation and decoding.

use crate::dispatch::Control;
use crate::error::ActionError;

/// Entries this far outside `[-1, 1]` are clipped instead of rejected.
pub const ACTION_TOLERANCE: f64 = 1e-6;

/// Validates an agent action and maps it to physical commands.
///
/// `action[0]` maps affinely from `[-1, 1]` to `[-p_max_kw, p_max_kw]`;
/// `action[1..]` map to per-socket commands in `[0, 1]` via `(x + 1) / 2`.
///
/// # Errors
///
/// - [`ActionError::WrongShape`] if `action.len() != 1 + sockets`.
/// - [`ActionError::NonFinite`] on NaN or infinite entries.
/// - [`ActionError::OutOfBounds`] if an entry lies outside `[-1, 1]` by
///   more than [`ACTION_TOLERANCE`].
pub fn decode(action: &[f64], p_max_kw: f64, sockets: usize) -> Result<Control, ActionError> {
    if action.len() != 1 + sockets {
        return Err(ActionError::WrongShape {
            expected: 1 + sockets,
            actual: action.len(),
        });
    }
    let mut clipped = Vec::with_capacity(action.len());
    for (index, &value) in action.iter().enumerate() {
        if !value.is_finite() {
            return Err(ActionError::NonFinite { index, value });
        }
        if value.abs() > 1.0 + ACTION_TOLERANCE {
            return Err(ActionError::OutOfBounds { index, value });
        }
        clipped.push(value.clamp(-1.0, 1.0));
    }

    Ok(Control {
        bess_cmd_kw: clipped[0] * p_max_kw,
        charger_cmd: clipped[1..].iter().map(|x| (x + 1.0) / 2.0).collect(),
    })
}

/// Inverse of [`decode`] for building actions from physical commands.
pub fn encode(control: &Control, p_max_kw: f64) -> Vec<f64> {
    let mut action = Vec::with_capacity(1 + control.charger_cmd.len());
    let bess = if p_max_kw > 0.0 {
        control.bess_cmd_kw / p_max_kw
    } else {
        0.0
    };
    action.push(bess.clamp(-1.0, 1.0));
    action.extend(control.charger_cmd.iter().map(|c| (2.0 * c - 1.0).clamp(-1.0, 1.0)));
    action
}
