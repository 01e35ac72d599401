//! Lineage graph construction and lookup
//!
//! A bipartite graph from datasets to the dashboards that read them. The
//! reverse index (ARN -> consuming dashboards) is derived from each
//! dashboard's `used_dataset_arns` once at build time and never mutated.

use std::collections::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use crate::snapshot::{Dashboard, Dataset};

/// Label used for ARNs that do not resolve to a dataset record
pub const UNKNOWN_DATASET: &str = "Unknown Dataset";

/// Directed dependency edge (dataset -> dashboard)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub dataset_arn: String,
    pub dashboard_id: String,
}

/// A dataset record whose ARN repeated an earlier one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateArn {
    /// Position in the input passed to [`LineageGraph::build`]
    pub position: usize,
    pub arn: String,
}

/// Immutable lineage graph for one loaded snapshot
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    /// Datasets in snapshot order, one per distinct ARN
    datasets: Vec<Dataset>,

    /// ARN -> position in `datasets`
    dataset_index: HashMap<String, usize>,

    /// Dashboards in snapshot order
    dashboards: Vec<Dashboard>,

    /// Reverse edges: ARN -> positions of dashboards using it
    consumers: HashMap<String, Vec<usize>>,
}

impl LineageGraph {
    /// Build a graph from decoded records
    pub fn new(datasets: Vec<Dataset>, dashboards: Vec<Dashboard>) -> Self {
        Self::build(datasets, dashboards).0
    }

    /// Build a graph, also reporting datasets whose ARN repeated an earlier
    /// record.
    ///
    /// A repeated ARN replaces the earlier record's contents but keeps the
    /// earlier position, so output order follows first appearance.
    pub fn build(datasets: Vec<Dataset>, dashboards: Vec<Dashboard>) -> (Self, Vec<DuplicateArn>) {
        let mut unique: Vec<Dataset> = Vec::with_capacity(datasets.len());
        let mut dataset_index: HashMap<String, usize> = HashMap::with_capacity(datasets.len());
        let mut duplicates = Vec::new();

        for (position, dataset) in datasets.into_iter().enumerate() {
            match dataset_index.get(&dataset.arn) {
                Some(&existing) => {
                    duplicates.push(DuplicateArn { position, arn: dataset.arn.clone() });
                    unique[existing] = dataset;
                }
                None => {
                    dataset_index.insert(dataset.arn.clone(), unique.len());
                    unique.push(dataset);
                }
            }
        }

        let mut consumers: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, dashboard) in dashboards.iter().enumerate() {
            for arn in dashboard.distinct_arns() {
                consumers.entry(arn.to_string()).or_default().push(position);
            }
        }

        let graph = Self {
            datasets: unique,
            dataset_index,
            dashboards,
            consumers,
        };

        (graph, duplicates)
    }

    /// All datasets, in snapshot order
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// All dashboards, in snapshot order
    pub fn dashboards(&self) -> &[Dashboard] {
        &self.dashboards
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() && self.dashboards.is_empty()
    }

    /// Look up a dataset by ARN
    pub fn dataset_by_arn(&self, arn: &str) -> Option<&Dataset> {
        self.dataset_index.get(arn).map(|&i| &self.datasets[i])
    }

    /// Datasets carrying the given display name (names are not unique)
    pub fn find_datasets_by_name(&self, name: &str) -> Vec<&Dataset> {
        self.datasets.iter().filter(|d| d.name == name).collect()
    }

    /// Every ARN referenced by at least one dashboard
    pub fn all_used_arns(&self) -> HashSet<&str> {
        self.consumers.keys().map(String::as_str).collect()
    }

    /// Whether any dashboard references the ARN
    pub fn is_used(&self, arn: &str) -> bool {
        self.consumers.contains_key(arn)
    }

    /// Dashboards that reference the ARN, in snapshot order
    pub fn dashboards_using(&self, arn: &str) -> Vec<&Dashboard> {
        self.consumers
            .get(arn)
            .map(|positions| positions.iter().map(|&i| &self.dashboards[i]).collect())
            .unwrap_or_default()
    }

    /// Dataset name for an ARN, or [`UNKNOWN_DATASET`] when unresolved
    pub fn display_name(&self, arn: &str) -> &str {
        self.dataset_by_arn(arn)
            .map(|d| d.name.as_str())
            .unwrap_or(UNKNOWN_DATASET)
    }

    /// All edges, by dashboard order then reference order
    pub fn edges(&self) -> Vec<Edge> {
        self.dashboards
            .iter()
            .flat_map(|dashboard| {
                dashboard.distinct_arns().map(move |arn| Edge {
                    dataset_arn: arn.to_string(),
                    dashboard_id: dashboard.id.clone(),
                })
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.consumers.values().map(Vec::len).sum()
    }

    /// Referenced ARNs with no dataset record, in first-seen order
    pub fn dangling_arns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.dashboards
            .iter()
            .flat_map(|d| d.used_dataset_arns.iter())
            .map(String::as_str)
            .filter(|arn| !self.dataset_index.contains_key(*arn))
            .filter(|arn| seen.insert(*arn))
            .collect()
    }
}
