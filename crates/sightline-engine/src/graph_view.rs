//! Presentation-ready view of the lineage graph
//!
//! Nodes are every dashboard plus every dataset ARN that at least one
//! dashboard reads (unused datasets are left off the map). Labels come from
//! [`LineageGraph::display_name`], so dangling references show the
//! unknown-dataset label rather than failing.
//!
//! Edges point at node positions, not keys: dashboard ids are not required to
//! be unique in a snapshot, and two dashboards sharing an id stay two nodes.

use serde::Serialize;
use sightline_snapshot::LineageGraph;
use std::collections::HashMap;
use std::fmt::Write;

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dataset,
    Dashboard,
}

/// A node in the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewNode {
    /// Dataset ARN or dashboard id
    pub key: String,
    pub label: String,
    pub kind: NodeKind,
}

/// A dataset -> dashboard edge with both endpoints labelled
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEdge {
    /// Index of the dataset node in [`GraphView::nodes`]
    pub source: usize,
    /// Index of the dashboard node in [`GraphView::nodes`]
    pub target: usize,
    pub source_key: String,
    pub target_key: String,
    pub source_label: String,
    pub target_label: String,
}

/// Lineage graph flattened into nodes and labelled edges
///
/// Dashboards come first, so node `i` for `i < dashboard count` is the
/// dashboard at input position `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl GraphView {
    pub fn from_graph(graph: &LineageGraph) -> Self {
        let mut nodes: Vec<ViewNode> = graph
            .dashboards()
            .iter()
            .map(|d| ViewNode {
                key: d.id.clone(),
                label: d.name.clone(),
                kind: NodeKind::Dashboard,
            })
            .collect();

        let mut dataset_nodes: HashMap<&str, usize> = HashMap::new();
        let mut edges = Vec::with_capacity(graph.edge_count());

        for (position, dashboard) in graph.dashboards().iter().enumerate() {
            for arn in dashboard.distinct_arns() {
                let label = graph.display_name(arn);

                let source = *dataset_nodes.entry(arn).or_insert_with(|| {
                    nodes.push(ViewNode {
                        key: arn.to_string(),
                        label: label.to_string(),
                        kind: NodeKind::Dataset,
                    });
                    nodes.len() - 1
                });

                edges.push(ViewEdge {
                    source,
                    target: position,
                    source_key: arn.to_string(),
                    target_key: dashboard.id.clone(),
                    source_label: label.to_string(),
                    target_label: dashboard.name.clone(),
                });
            }
        }

        Self { nodes, edges }
    }

    /// Edges as `(dataset label, dashboard label)` pairs
    pub fn labeled_edges(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .map(|e| (e.source_label.clone(), e.target_label.clone()))
            .collect()
    }

    /// Graphviz DOT rendering
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph lineage {\n    rankdir=LR;\n");

        for (i, node) in self.nodes.iter().enumerate() {
            let (shape, color) = match node.kind {
                NodeKind::Dataset => ("ellipse", "#00BFFF"),
                NodeKind::Dashboard => ("box", "#FF9900"),
            };
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\", shape={}, style=filled, fillcolor=\"{}\"];",
                dot_escape(&self.dot_id(i)),
                dot_escape(&node.label),
                shape,
                color
            );
        }

        for edge in &self.edges {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\";",
                dot_escape(&self.dot_id(edge.source)),
                dot_escape(&self.dot_id(edge.target)),
            );
        }

        out.push_str("}\n");
        out
    }

    /// Mermaid flowchart rendering
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph LR\n");

        for (i, node) in self.nodes.iter().enumerate() {
            let label = mermaid_escape(&node.label);
            let _ = match node.kind {
                NodeKind::Dataset => writeln!(out, "    n{}([\"{}\"])", i, label),
                NodeKind::Dashboard => writeln!(out, "    n{}[\"{}\"]", i, label),
            };
        }

        for edge in &self.edges {
            let _ = writeln!(out, "    n{} --> n{}", edge.source, edge.target);
        }

        out
    }

    /// DOT node id: datasets by ARN, dashboards by input position
    fn dot_id(&self, index: usize) -> String {
        match self.nodes.get(index) {
            Some(node) if node.kind == NodeKind::Dataset => format!("dataset:{}", node.key),
            _ => format!("dashboard:{}", index),
        }
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn mermaid_escape(s: &str) -> String {
    s.replace('"', "#quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sightline_snapshot::UNKNOWN_DATASET;

    fn graph() -> LineageGraph {
        sightline_snapshot::parse(
            r#"{
                "datasets": [
                    {"name": "Sales", "arn": "arn:ds1", "id": "1"},
                    {"name": "Quiz", "arn": "arn:ds2", "id": "2"}
                ],
                "dashboards": [
                    {"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1", "arn:ds9"]},
                    {"name": "Ops \"live\"", "id": "d2", "used_datasets": ["arn:ds1"]}
                ]
            }"#,
        )
        .unwrap()
        .graph
    }

    #[test]
    fn labeled_edges_use_display_names() {
        let view = GraphView::from_graph(&graph());

        assert_eq!(
            view.labeled_edges(),
            vec![
                ("Sales".to_string(), "Exec".to_string()),
                (UNKNOWN_DATASET.to_string(), "Exec".to_string()),
                ("Sales".to_string(), "Ops \"live\"".to_string()),
            ]
        );
    }

    #[test]
    fn only_used_datasets_become_nodes() {
        let view = GraphView::from_graph(&graph());

        let datasets: Vec<_> = view
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Dataset)
            .map(|n| n.key.as_str())
            .collect();
        assert_eq!(datasets, vec!["arn:ds1", "arn:ds9"]);
        assert_eq!(view.nodes.len(), 4);
    }

    #[test]
    fn dot_output_escapes_labels() {
        let dot = GraphView::from_graph(&graph()).to_dot();

        assert!(dot.starts_with("digraph lineage {"));
        assert!(dot.contains("\"dataset:arn:ds1\" -> \"dashboard:0\";"));
        assert!(dot.contains("\"dataset:arn:ds1\" -> \"dashboard:1\";"));
        assert!(dot.contains("label=\"Ops \\\"live\\\"\""));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn mermaid_output_links_by_index() {
        let mermaid = GraphView::from_graph(&graph()).to_mermaid();

        assert!(mermaid.starts_with("graph LR\n"));
        // dashboards are n0, n1; datasets follow
        assert!(mermaid.contains("n2([\"Sales\"])"));
        assert!(mermaid.contains("n2 --> n0"));
        assert!(mermaid.contains("n2 --> n1"));
        assert!(mermaid.contains("Ops #quot;live#quot;"));
    }

    #[test]
    fn dashboards_sharing_an_id_stay_separate_nodes() {
        let graph = sightline_snapshot::parse(
            r#"{
                "datasets": [
                    {"name": "Sales", "arn": "arn:ds1", "id": "1"},
                    {"name": "Quiz", "arn": "arn:ds2", "id": "2"}
                ],
                "dashboards": [
                    {"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1"]},
                    {"name": "Ops", "id": "d1", "used_datasets": ["arn:ds2"]}
                ]
            }"#,
        )
        .unwrap()
        .graph;
        let view = GraphView::from_graph(&graph);

        assert_eq!(
            view.labeled_edges(),
            vec![
                ("Sales".to_string(), "Exec".to_string()),
                ("Quiz".to_string(), "Ops".to_string()),
            ]
        );

        // n0 = Exec, n1 = Ops, n2 = Sales, n3 = Quiz
        let mermaid = view.to_mermaid();
        assert!(mermaid.contains("n2 --> n0"));
        assert!(mermaid.contains("n3 --> n1"));
        assert!(!mermaid.contains("n3 --> n0"));

        let dot = view.to_dot();
        assert_eq!(dot.matches("\"dashboard:0\" [").count(), 1);
        assert_eq!(dot.matches("\"dashboard:1\" [").count(), 1);
        assert!(dot.contains("\"dataset:arn:ds1\" -> \"dashboard:0\";"));
        assert!(dot.contains("\"dataset:arn:ds2\" -> \"dashboard:1\";"));
    }

    #[test]
    fn empty_graph_has_empty_view() {
        let view = GraphView::from_graph(&LineageGraph::default());
        assert_eq!(view, GraphView::default());
    }
}
