//! Sightline engine - lineage queries and reporting
//!
//! This crate implements the analysis layer over a loaded snapshot:
//! - Impact analysis and orphan detection
//! - Labelled graph views (DOT / Mermaid export)
//! - Report generation

pub mod query;
pub mod graph_view;
pub mod report_builder;

pub use query::{DatasetImpact, LineageQuery, QueryError};
pub use graph_view::{GraphView, NodeKind, ViewEdge, ViewNode};
pub use report_builder::LineageReportBuilder;
