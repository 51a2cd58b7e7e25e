//! Dispatch Engine: the hourly energy balance under the six-phase regime.

pub mod balance;
pub mod engine;
pub mod flows;
pub mod regime;

pub use engine::{Control, DispatchOutcome, DispatchParams, StepInputs, dispatch};
pub use flows::{Clip, ClipKind, Departure, FlowRecord};
pub use regime::Regime;
