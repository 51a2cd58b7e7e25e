//! File output for rollouts.

pub mod export;

pub use export::{export_kpis_csv, export_steps_csv, write_kpis_csv, write_steps_csv};
