//! Lineage query operations
//!
//! Derived views over an immutable [`LineageGraph`]:
//! - Impact analysis (dashboards reading a dataset)
//! - Orphan detection (datasets no dashboard reads)
//! - Summary counts
//!
//! Every query is a pure read and total over its input: unknown ARNs give
//! empty results, never errors.

use sightline_core::LineageSummary;
use sightline_snapshot::{Dashboard, Dataset, LineageGraph};

/// A dataset together with the dashboards that read it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetImpact<'a> {
    pub dataset: &'a Dataset,
    pub dashboards: Vec<&'a Dashboard>,
}

impl DatasetImpact<'_> {
    /// No downstream consumers
    pub fn is_safe(&self) -> bool {
        self.dashboards.is_empty()
    }
}

/// Query interface over a loaded graph
#[derive(Debug, Clone, Copy)]
pub struct LineageQuery<'a> {
    graph: &'a LineageGraph,
}

impl<'a> LineageQuery<'a> {
    /// Create a new query for the given graph
    pub fn new(graph: &'a LineageGraph) -> Self {
        Self { graph }
    }

    /// Dashboards that would be affected by changing the dataset
    ///
    /// Single hop: dashboards never feed other dashboards. An empty result
    /// means the dataset is safe to modify.
    pub fn impact_of(&self, arn: &str) -> Vec<&'a Dashboard> {
        self.graph.dashboards_using(arn)
    }

    /// Datasets not referenced by any dashboard, in snapshot order
    pub fn orphans(&self) -> Vec<&'a Dataset> {
        self.graph
            .datasets()
            .iter()
            .filter(|d| !self.graph.is_used(&d.arn))
            .collect()
    }

    /// Headline counts, recomputed on every call
    pub fn summary(&self) -> LineageSummary {
        LineageSummary {
            dataset_count: self.graph.datasets().len(),
            dashboard_count: self.graph.dashboards().len(),
            orphan_count: self.orphans().len(),
            edge_count: self.graph.edge_count(),
            dangling_reference_count: self.graph.dangling_arns().len(),
        }
    }

    /// Impact of every dataset, in snapshot order
    pub fn impact_table(&self) -> Vec<DatasetImpact<'a>> {
        self.graph
            .datasets()
            .iter()
            .map(|dataset| DatasetImpact {
                dataset,
                dashboards: self.impact_of(&dataset.arn),
            })
            .collect()
    }

    /// Resolve a user-supplied selector (ARN or display name) to a dataset
    ///
    /// Names are not unique; an ambiguous name resolves to the first match
    /// in snapshot order.
    pub fn resolve_dataset(&self, selector: &str) -> Result<&'a Dataset, QueryError> {
        if let Some(dataset) = self.graph.dataset_by_arn(selector) {
            return Ok(dataset);
        }

        let matches = self.graph.find_datasets_by_name(selector);
        if matches.len() > 1 {
            tracing::warn!(
                name = selector,
                candidates = matches.len(),
                "dataset name is ambiguous, using the first match"
            );
        }

        matches
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::DatasetNotFound(selector.to_string()))
    }
}

/// Query errors
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Dataset '{0}' not found in snapshot. Use its ARN or exact display name")]
    DatasetNotFound(String),
}
