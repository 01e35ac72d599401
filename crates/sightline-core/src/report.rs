//! Report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Headline counts for one snapshot
///
/// `orphan_count` always equals the length of the orphan list it was
/// computed alongside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSummary {
    pub dataset_count: usize,
    pub dashboard_count: usize,
    pub orphan_count: usize,

    /// Distinct (dataset ARN, dashboard) pairs
    pub edge_count: usize,

    /// Distinct ARNs referenced by dashboards with no dataset record
    pub dangling_reference_count: usize,
}

/// Diagnostic tallies for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of diagnostics
    pub total: usize,

    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of info messages
    pub info: usize,

    /// Records dropped while loading the snapshot
    pub skipped_records: usize,
}

/// A dataset no dashboard reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanEntry {
    pub name: String,
    pub arn: String,
    pub id: String,

    /// Matched by an allowlist pattern (intentionally unused)
    #[serde(default)]
    pub allowlisted: bool,
}

/// A dashboard as listed in impact results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRef {
    pub name: String,
    pub id: String,
}

/// Downstream consumers of one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactEntry {
    pub dataset_name: String,
    pub dataset_arn: String,
    pub dashboards: Vec<DashboardRef>,
}

impl ImpactEntry {
    /// True when no dashboard would break if the dataset changed
    pub fn is_safe(&self) -> bool {
        self.dashboards.is_empty()
    }
}

/// One labelled dependency edge (dataset -> dashboard)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub source: String,
    pub target: String,
}

/// Lineage report (report.json v1)
///
/// This is the stable output format.
/// All fields are versioned and backward-compatible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// SHA-256 of the snapshot document the report was built from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Lineage counts
    pub lineage: LineageSummary,

    /// Diagnostic tallies
    pub summary: ReportSummary,

    /// Unused datasets, in snapshot order
    pub orphans: Vec<OrphanEntry>,

    /// Per-dataset impact, in snapshot order
    pub impact: Vec<ImpactEntry>,

    /// Labelled dependency edges
    pub edges: Vec<EdgeEntry>,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            fingerprint: None,
            lineage: LineageSummary::default(),
            summary: ReportSummary::default(),
            orphans: Vec::new(),
            impact: Vec::new(),
            edges: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => self.summary.info += 1,
        }

        self.summary.total += 1;
        self.diagnostics.push(diagnostic);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Orphans not covered by the allowlist
    pub fn unexpected_orphans(&self) -> impl Iterator<Item = &OrphanEntry> {
        self.orphans.iter().filter(|o| !o.allowlisted)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}
