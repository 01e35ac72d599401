//! Snapshot loading and lineage graph construction
//!
//! This crate handles:
//! - Parsing the exported BI metadata snapshot (dashboards + datasets)
//! - Skipping and reporting malformed records
//! - Building the dataset -> dashboard lineage graph

pub mod snapshot;
pub mod graph;

pub use snapshot::{parse, Dashboard, Dataset, ParsedSnapshot, SkipTally, SnapshotError, SnapshotLoader};
pub use graph::{DuplicateArn, Edge, LineageGraph, UNKNOWN_DATASET};
