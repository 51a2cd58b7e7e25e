//! Dataset Builder and the canonical on-disk dataset.
//!
//! Upstream artifacts (PV export, mall demand, fleet sessions, BESS and
//! grid parameters) are read, aligned to the hourly grid, validated and
//! written as `dataset.csv` plus `schema.json`.

pub mod align;
pub mod builder;
pub mod canonical;
pub mod fleet;
pub mod grid;
pub mod mall;
pub mod parse;
pub mod pv;
pub mod schema;
pub mod synthetic;
pub mod table;

pub use builder::{DatasetBuilder, UpstreamArtifacts, UpstreamPaths};
pub use canonical::Dataset;
pub use grid::{GridSource, LocationMeta};
pub use schema::DatasetSchema;
pub use synthetic::SyntheticSite;
pub use table::{CanonicalTable, SocketSeries};
