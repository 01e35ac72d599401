//! Assemble a [`Report`] from a loaded snapshot

use sightline_core::{
    Config, DashboardRef, Diagnostic, DiagnosticCode, EdgeEntry, ImpactEntry, OrphanEntry, Report,
    Severity,
};
use sightline_snapshot::{LineageGraph, ParsedSnapshot};
use crate::graph_view::GraphView;
use crate::query::LineageQuery;

/// Builds the lineage report for one snapshot
pub struct LineageReportBuilder<'a> {
    graph: &'a LineageGraph,
    config: &'a Config,
    warnings: Vec<Diagnostic>,
    fingerprint: Option<String>,
    skipped_records: usize,
}

impl<'a> LineageReportBuilder<'a> {
    pub fn new(graph: &'a LineageGraph, config: &'a Config) -> Self {
        Self {
            graph,
            config,
            warnings: Vec::new(),
            fingerprint: None,
            skipped_records: 0,
        }
    }

    /// Builder pre-filled with the loader's warnings, tally and fingerprint
    pub fn from_snapshot(snapshot: &'a ParsedSnapshot, config: &'a Config) -> Self {
        Self::new(&snapshot.graph, config)
            .with_warnings(snapshot.warnings.clone())
            .with_fingerprint(snapshot.fingerprint.clone())
            .with_skipped_records(snapshot.tally.total())
    }

    pub fn with_warnings(mut self, warnings: Vec<Diagnostic>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn with_skipped_records(mut self, skipped: usize) -> Self {
        self.skipped_records = skipped;
        self
    }

    pub fn build(self) -> Report {
        let query = LineageQuery::new(self.graph);
        let mut report = Report::new();

        report.fingerprint = self.fingerprint;
        report.lineage = query.summary();
        report.summary.skipped_records = self.skipped_records;

        for mut warning in self.warnings {
            warning.severity = self.config.severity.get_severity(warning.code, warning.severity);
            report.add_diagnostic(warning);
        }

        for dataset in query.orphans() {
            let allowlisted = self
                .config
                .allowlist
                .is_orphan_ignored(&dataset.arn, &dataset.name);

            let severity = if allowlisted {
                Severity::Info
            } else {
                self.config
                    .severity
                    .get_severity(DiagnosticCode::LineageOrphanDataset, Severity::Warn)
            };

            report.add_diagnostic(
                Diagnostic::new(
                    DiagnosticCode::LineageOrphanDataset,
                    severity,
                    format!("Dataset '{}' is not used by any dashboard", dataset.name),
                )
                .with_subject(dataset.arn.clone()),
            );

            report.orphans.push(OrphanEntry {
                name: dataset.name.clone(),
                arn: dataset.arn.clone(),
                id: dataset.id.clone(),
                allowlisted,
            });
        }

        let dangling_severity = self
            .config
            .severity
            .get_severity(DiagnosticCode::LineageDanglingReference, Severity::Warn);

        for arn in self.graph.dangling_arns() {
            let dashboards: Vec<String> = query
                .impact_of(arn)
                .iter()
                .map(|d| d.name.clone())
                .collect();

            report.add_diagnostic(
                Diagnostic::new(
                    DiagnosticCode::LineageDanglingReference,
                    dangling_severity,
                    format!("{} dashboard(s) reference a dataset missing from the snapshot", dashboards.len()),
                )
                .with_subject(arn)
                .with_impact(dashboards),
            );
        }

        report.impact = query
            .impact_table()
            .into_iter()
            .map(|entry| ImpactEntry {
                dataset_name: entry.dataset.name.clone(),
                dataset_arn: entry.dataset.arn.clone(),
                dashboards: entry
                    .dashboards
                    .iter()
                    .map(|d| DashboardRef { name: d.name.clone(), id: d.id.clone() })
                    .collect(),
            })
            .collect();

        report.edges = GraphView::from_graph(self.graph)
            .labeled_edges()
            .into_iter()
            .map(|(source, target)| EdgeEntry { source, target })
            .collect();

        tracing::debug!(
            orphans = report.orphans.len(),
            diagnostics = report.summary.total,
            "built lineage report"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SNAPSHOT: &str = r#"{
        "datasets": [
            {"name": "Sales", "arn": "arn:ds1", "id": "1"},
            {"name": "Quiz", "arn": "arn:ds2", "id": "2"},
            {"name": "Scratch", "arn": "arn:sandbox-1", "id": "3"},
            {"name": "broken"}
        ],
        "dashboards": [
            {"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1", "arn:gone"]}
        ]
    }"#;

    #[test]
    fn report_contains_lineage_views() {
        let snapshot = sightline_snapshot::parse(SNAPSHOT).unwrap();
        let config = Config::default();
        let report = LineageReportBuilder::from_snapshot(&snapshot, &config).build();

        assert_eq!(report.lineage.dataset_count, 3);
        assert_eq!(report.lineage.orphan_count, report.orphans.len());
        assert_eq!(report.lineage.dangling_reference_count, 1);
        assert_eq!(report.summary.skipped_records, 1);
        assert!(report.fingerprint.is_some());

        let orphan_names: Vec<_> = report.orphans.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(orphan_names, vec!["Quiz", "Scratch"]);

        assert_eq!(report.impact.len(), 3);
        assert_eq!(report.impact[0].dashboards, vec![DashboardRef { name: "Exec".into(), id: "d1".into() }]);
        assert!(report.impact[1].is_safe());

        assert_eq!(report.edges.len(), 2);
        assert_eq!(report.edges[1].source, sightline_snapshot::UNKNOWN_DATASET);
    }

    #[test]
    fn diagnostics_default_to_warnings() {
        let snapshot = sightline_snapshot::parse(SNAPSHOT).unwrap();
        let config = Config::default();
        let report = LineageReportBuilder::from_snapshot(&snapshot, &config).build();

        // 1 skipped record + 2 orphans + 1 dangling reference
        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.warnings, 4);
        assert!(!report.has_errors());

        let dangling = report
            .diagnostics
            .iter()
            .find(|d| d.code == DiagnosticCode::LineageDanglingReference)
            .unwrap();
        assert_eq!(dangling.subject.as_deref(), Some("arn:gone"));
        assert_eq!(dangling.impact, vec!["Exec".to_string()]);
    }

    #[test]
    fn allowlist_and_overrides_apply() {
        let snapshot = sightline_snapshot::parse(SNAPSHOT).unwrap();
        let config = Config::from_toml(
            r#"
            [allowlist]
            ignore_orphans = ["arn:sandbox-*"]

            [severity.overrides]
            LINEAGE_DANGLING_REFERENCE = "error"
            SNAPSHOT_RECORD_SKIPPED = "info"
            "#,
        )
        .unwrap();
        let report = LineageReportBuilder::from_snapshot(&snapshot, &config).build();

        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.info, 2);
        assert!(report.has_errors());

        let unexpected: Vec<_> = report.unexpected_orphans().map(|o| o.name.as_str()).collect();
        assert_eq!(unexpected, vec!["Quiz"]);
        // Allowlisted orphans still count
        assert_eq!(report.lineage.orphan_count, 2);
    }
}
