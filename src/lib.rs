//! Mall-sited EV charging hub simulator: hourly dataset building, a
//! rule-constrained PV/BESS/grid dispatch engine, decomposed multi-objective
//! reward and a gym-style environment for policy training and evaluation.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod devices;
/// Dispatch engine, regime table and energy balances.
pub mod dispatch;
pub mod env;
pub mod error;
pub mod eval;
pub mod io;
pub mod reward;
pub mod store;
pub mod telemetry;
