//! Diagnostic codes and warning reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Snapshot loading
    /// A dataset or dashboard record lacked required fields and was skipped
    SnapshotRecordSkipped,

    /// Two dataset records share the same ARN; the later one replaced the earlier
    SnapshotDuplicateArn,

    // Lineage findings
    /// A dataset is not used by any dashboard
    LineageOrphanDataset,

    /// A dashboard references an ARN with no matching dataset record
    LineageDanglingReference,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnapshotRecordSkipped => "SNAPSHOT_RECORD_SKIPPED",
            Self::SnapshotDuplicateArn => "SNAPSHOT_DUPLICATE_ARN",
            Self::LineageOrphanDataset => "LINEAGE_ORPHAN_DATASET",
            Self::LineageDanglingReference => "LINEAGE_DANGLING_REFERENCE",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that should fail CI
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Position of a record inside the snapshot document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Top-level collection name (`datasets` or `dashboards`)
    pub collection: String,

    /// Zero-based index of the record within the collection
    pub index: Option<usize>,
}

impl Location {
    /// A whole collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            index: None,
        }
    }

    /// A single record within a collection
    pub fn record(collection: impl Into<String>, index: usize) -> Self {
        Self {
            collection: collection.into(),
            index: Some(index),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.collection, index),
            None => write!(f, "{}", self.collection),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Record location in the snapshot (best-effort)
    pub location: Option<Location>,

    /// ARN the diagnostic is about, if any
    pub subject: Option<String>,

    /// Dashboards affected by this finding
    pub impact: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            location: None,
            subject: None,
            impact: Vec::new(),
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the ARN this diagnostic refers to
    pub fn with_subject(mut self, arn: impl Into<String>) -> Self {
        self.subject = Some(arn.into());
        self
    }

    /// Set affected dashboards
    pub fn with_impact(mut self, impact: Vec<String>) -> Self {
        self.impact = impact;
        self
    }
}
