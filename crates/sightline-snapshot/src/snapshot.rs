//! Snapshot document parsing
//!
//! Decodes the exported `{ "dashboards": [...], "datasets": [...] }` document
//! into typed records. Malformed records are skipped with a warning unless
//! the loader is strict; structurally invalid documents are fatal.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use sightline_core::{Diagnostic, DiagnosticCode, Location, Severity};
use std::collections::HashSet;
use std::path::Path;
use crate::graph::LineageGraph;

pub const DATASETS: &str = "datasets";
pub const DASHBOARDS: &str = "dashboards";

/// A data set record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Display label (not guaranteed unique)
    pub name: String,

    /// Resource identifier, the join key used by dashboards
    pub arn: String,

    pub id: String,
}

/// A dashboard record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub name: String,

    pub id: String,

    /// ARNs this dashboard reads, in document order. May name datasets
    /// that are absent from the snapshot.
    #[serde(rename = "used_datasets", default, deserialize_with = "null_as_empty")]
    pub used_dataset_arns: Vec<String>,
}

impl Dashboard {
    /// Referenced ARNs with repeats removed, first occurrence kept
    pub fn distinct_arns(&self) -> impl Iterator<Item = &str> + '_ {
        let mut seen = HashSet::new();
        self.used_dataset_arns
            .iter()
            .map(String::as_str)
            .filter(move |arn| seen.insert(*arn))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level document shape; records stay untyped until decoded one by one
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    dashboards: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    datasets: Option<Vec<serde_json::Value>>,
}

/// Records dropped per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipTally {
    pub datasets: usize,
    pub dashboards: usize,
}

impl SkipTally {
    pub fn total(&self) -> usize {
        self.datasets + self.dashboards
    }
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct ParsedSnapshot {
    pub graph: LineageGraph,

    /// Non-fatal problems found while decoding
    pub warnings: Vec<Diagnostic>,

    pub tally: SkipTally,

    /// Total records present in the document
    pub total_records: usize,

    /// Hex SHA-256 of the raw document, when loaded from bytes
    pub fingerprint: Option<String>,
}

/// Snapshot loader
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotLoader {
    strict: bool,
}

impl SnapshotLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on the first malformed record instead of skipping it
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Load a snapshot from file
    pub fn load_file(&self, path: &Path) -> Result<ParsedSnapshot, SnapshotError> {
        let contents = std::fs::read(path)
            .map_err(|e| SnapshotError::Io(path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), bytes = contents.len(), "read snapshot file");
        self.load_slice(&contents)
    }

    /// Parse a snapshot from a JSON string
    pub fn load_str(&self, json: &str) -> Result<ParsedSnapshot, SnapshotError> {
        self.load_slice(json.as_bytes())
    }

    /// Parse a snapshot from raw JSON bytes
    pub fn load_slice(&self, bytes: &[u8]) -> Result<ParsedSnapshot, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| SnapshotError::Malformed(e.to_string()))?;

        let mut parsed = self.decode(raw)?;
        parsed.fingerprint = Some(fingerprint(bytes));
        Ok(parsed)
    }

    /// Decode an already-parsed JSON document
    pub fn load_value(&self, value: serde_json::Value) -> Result<ParsedSnapshot, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_value(value)
            .map_err(|e| SnapshotError::Malformed(e.to_string()))?;

        self.decode(raw)
    }

    fn decode(&self, raw: RawSnapshot) -> Result<ParsedSnapshot, SnapshotError> {
        let dataset_records = raw.datasets.unwrap_or_default();
        let dashboard_records = raw.dashboards.unwrap_or_default();
        let total_records = dataset_records.len() + dashboard_records.len();

        let mut warnings = Vec::new();
        let (datasets, dataset_positions) =
            self.decode_records::<Dataset>(DATASETS, dataset_records, &mut warnings)?;
        let (dashboards, dashboard_positions) =
            self.decode_records::<Dashboard>(DASHBOARDS, dashboard_records, &mut warnings)?;

        let tally = SkipTally {
            datasets: dataset_positions.skipped,
            dashboards: dashboard_positions.skipped,
        };

        let (graph, duplicates) = LineageGraph::build(datasets, dashboards);

        for duplicate in duplicates {
            let index = dataset_positions.indices[duplicate.position];
            tracing::warn!(index, arn = %duplicate.arn, "duplicate dataset ARN replaced an earlier record");
            warnings.push(
                Diagnostic::new(
                    DiagnosticCode::SnapshotDuplicateArn,
                    Severity::Warn,
                    format!("Dataset ARN {} already seen; this record replaces the earlier one", duplicate.arn),
                )
                .with_location(Location::record(DATASETS, index))
                .with_subject(duplicate.arn),
            );
        }

        if graph.is_empty() {
            return Err(SnapshotError::Empty {
                total_records,
                skipped: tally.total(),
            });
        }

        tracing::info!(
            datasets = graph.datasets().len(),
            dashboards = graph.dashboards().len(),
            skipped = tally.total(),
            "loaded snapshot"
        );

        Ok(ParsedSnapshot {
            graph,
            warnings,
            tally,
            total_records,
            fingerprint: None,
        })
    }

    fn decode_records<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        records: Vec<serde_json::Value>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<(Vec<T>, DecodedPositions), SnapshotError> {
        let mut decoded = Vec::with_capacity(records.len());
        let mut positions = DecodedPositions::default();

        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<T>(record) {
                Ok(value) => {
                    decoded.push(value);
                    positions.indices.push(index);
                }
                Err(e) if self.strict => {
                    return Err(SnapshotError::InvalidRecord {
                        location: Location::record(collection, index),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(collection, index, error = %e, "skipping malformed record");
                    positions.skipped += 1;
                    warnings.push(
                        Diagnostic::new(
                            DiagnosticCode::SnapshotRecordSkipped,
                            Severity::Warn,
                            format!("Skipped {} record: {}", collection, e),
                        )
                        .with_location(Location::record(collection, index)),
                    );
                }
            }
        }

        Ok((decoded, positions))
    }
}

/// Which document indices survived decoding
#[derive(Debug, Default)]
struct DecodedPositions {
    /// Document index of each decoded record
    indices: Vec<usize>,
    skipped: usize,
}

/// Parse a snapshot with the default (lenient) loader
pub fn parse(json: &str) -> Result<ParsedSnapshot, SnapshotError> {
    SnapshotLoader::new().load_str(json)
}

/// Hex SHA-256 of a snapshot document
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Snapshot loading errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot file {0}: {1}")]
    Io(String, String),

    #[error("Failed to parse snapshot JSON: {0}")]
    Malformed(String),

    #[error("Invalid record at {location}: {reason}")]
    InvalidRecord { location: Location, reason: String },

    #[error(
        "Snapshot contains no datasets or dashboards: 0 of {total_records} records had all \
         required fields ({skipped} skipped). Check that the export scanned the right region and account."
    )]
    Empty { total_records: usize, skipped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_minimal_snapshot() {
        let parsed = parse(
            r#"{
                "dashboards": [{"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1"]}],
                "datasets": [{"name": "Sales", "arn": "arn:ds1", "id": "1"}]
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.graph.datasets().len(), 1);
        assert_eq!(parsed.graph.dashboards()[0].used_dataset_arns, vec!["arn:ds1".to_string()]);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.total_records, 2);
        assert_eq!(parsed.fingerprint.as_deref().map(str::len), Some(64));
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let parsed = parse(r#"{"datasets": [{"name": "Sales", "arn": "arn:ds1", "id": "1"}]}"#).unwrap();
        assert!(parsed.graph.dashboards().is_empty());

        let parsed = parse(r#"{"dashboards": [{"name": "Exec", "id": "d1"}], "datasets": null}"#).unwrap();
        assert!(parsed.graph.datasets().is_empty());
        assert!(parsed.graph.dashboards()[0].used_dataset_arns.is_empty());
    }

    #[test]
    fn null_used_datasets_is_empty() {
        let parsed = parse(r#"{"dashboards": [{"name": "Exec", "id": "d1", "used_datasets": null}]}"#).unwrap();
        assert!(parsed.graph.dashboards()[0].used_dataset_arns.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn malformed_records_are_skipped() {
        let parsed = parse(
            r#"{
                "dashboards": [{"id": "d0"}, {"name": "Exec", "id": "d1"}],
                "datasets": [
                    {"name": "Sales", "arn": "arn:ds1", "id": "1"},
                    {"name": "No arn", "id": "2"},
                    {"name": "Bad id", "arn": "arn:ds3", "id": 3}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(parsed.tally, SkipTally { datasets: 2, dashboards: 1 });
        assert_eq!(parsed.warnings.len(), 3);
        assert!(parsed
            .warnings
            .iter()
            .all(|w| w.code == DiagnosticCode::SnapshotRecordSkipped));
        assert_eq!(parsed.warnings[0].location, Some(Location::record(DATASETS, 1)));
        assert!(parsed.warnings[0].message.contains("arn"));
        assert_eq!(parsed.warnings[2].location, Some(Location::record(DASHBOARDS, 0)));
    }

    #[test]
    fn strict_loader_rejects_malformed_record() {
        let err = SnapshotLoader::new()
            .strict(true)
            .load_str(r#"{"datasets": [{"name": "Sales", "id": "1"}]}"#)
            .unwrap_err();

        match err {
            SnapshotError::InvalidRecord { location, .. } => {
                assert_eq!(location, Location::record(DATASETS, 0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_snapshot_is_distinct_error() {
        let err = parse(r#"{"dashboards": [], "datasets": []}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Empty { total_records: 0, skipped: 0 }));

        let err = parse(r#"{}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Empty { .. }));
    }

    #[test]
    fn all_records_malformed_is_empty_snapshot() {
        let err = parse(r#"{"datasets": [{"name": "x"}, {"arn": "y"}]}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Empty { total_records: 2, skipped: 2 }));
        assert!(err.to_string().contains("0 of 2 records"));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(parse("{not json"), Err(SnapshotError::Malformed(_))));
        assert!(matches!(parse("[1, 2, 3]"), Err(SnapshotError::Malformed(_))));
        assert!(matches!(parse(r#"{"datasets": "nope"}"#), Err(SnapshotError::Malformed(_))));
    }

    #[test]
    fn duplicate_arn_warns() {
        let parsed = parse(
            r#"{"datasets": [
                {"name": "A", "arn": "arn:ds1", "id": "1"},
                {"name": "bad"},
                {"name": "B", "arn": "arn:ds1", "id": "2"}
            ]}"#,
        )
        .unwrap();

        let duplicate = parsed
            .warnings
            .iter()
            .find(|w| w.code == DiagnosticCode::SnapshotDuplicateArn)
            .unwrap();
        assert_eq!(duplicate.location, Some(Location::record(DATASETS, 2)));
        assert_eq!(duplicate.subject.as_deref(), Some("arn:ds1"));
        assert_eq!(parsed.graph.display_name("arn:ds1"), "B");
    }

    #[test]
    fn load_value_has_no_fingerprint() {
        let value = serde_json::json!({"datasets": [{"name": "A", "arn": "arn:a", "id": "1"}]});
        let parsed = SnapshotLoader::new().load_value(value).unwrap();
        assert!(parsed.fingerprint.is_none());
    }

    #[test]
    fn distinct_arns_keeps_first_occurrence() {
        let dashboard = Dashboard {
            name: "Exec".into(),
            id: "d1".into(),
            used_dataset_arns: vec!["b".into(), "a".into(), "b".into()],
        };
        assert_eq!(dashboard.distinct_arns().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
