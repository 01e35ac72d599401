//! Sightline Core
//!
//! Shared domain types with stable, versioned formats.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{Report, ReportVersion, ReportSummary, LineageSummary, OrphanEntry, ImpactEntry, DashboardRef, EdgeEntry};
pub use config::{Config, ConfigError, SeverityThreshold, AllowlistRules};
