//! Configuration schema (sightline.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use crate::diagnostic::{DiagnosticCode, Severity};

/// Default snapshot file name written by the metadata extractor
pub const DEFAULT_SNAPSHOT: &str = "qs_snapshot.json";

/// Default config file name
pub const DEFAULT_CONFIG: &str = "sightline.toml";

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Datasets that are known to be unused on purpose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowlistRules {
    /// ARN or name patterns (`*` wildcard) excluded from orphan warnings
    #[serde(default)]
    pub ignore_orphans: Vec<String>,
}

impl AllowlistRules {
    fn matches_pattern(value: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, value)
            } else {
                pattern == value
            }
        })
    }

    /// Check if an orphaned dataset (by ARN or by name) is allowlisted
    pub fn is_orphan_ignored(&self, arn: &str, name: &str) -> bool {
        Self::matches_pattern(arn, &self.ignore_orphans)
            || Self::matches_pattern(name, &self.ignore_orphans)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot document to analyse
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,

    /// Abort the load when any record is malformed instead of skipping it
    #[serde(default)]
    pub strict: bool,

    /// Fail `check` when datasets outside the allowlist are unused
    #[serde(default)]
    pub fail_on_orphans: bool,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,

    /// Allowlist rules
    #[serde(default)]
    pub allowlist: AllowlistRules,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_snapshot() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            strict: false,
            fail_on_orphans: false,
            severity: SeverityThreshold::default(),
            allowlist: AllowlistRules::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Snapshot path, resolved against the project root when relative
    pub fn snapshot_path(&self) -> PathBuf {
        if self.snapshot.is_absolute() {
            self.snapshot.clone()
        } else {
            self.project_root.join(&self.snapshot)
        }
    }
}

/// Wildcard matching where `*` matches any run of characters
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');

    // split always yields at least one item
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let mut middle: Vec<&str> = parts.collect();
    let last = match middle.pop() {
        Some(last) => last,
        // No '*' at all
        None => return rest.is_empty(),
    };

    for part in middle {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
