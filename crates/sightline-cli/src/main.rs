use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sightline_core::{Config, OrphanEntry, Report, Severity};
use sightline_engine::{GraphView, LineageQuery, LineageReportBuilder};
use sightline_snapshot::{ParsedSnapshot, SnapshotError, SnapshotLoader};

/// Sightline - dashboard/dataset lineage and impact analysis
#[derive(Parser)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: sightline.toml, or $SIGHTLINE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot JSON to analyse (overrides the config)
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dataset, dashboard and orphan counts
    Summary,

    /// Show which dashboards break if a dataset changes
    Impact {
        /// Dataset to analyze (ARN or display name)
        dataset: String,
    },

    /// List datasets not used by any dashboard
    Orphans {
        /// Also write the list as CSV (name,id)
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Export the dependency graph
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = GraphFormat::Json)]
        format: GraphFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the full lineage report
    Check {
        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GraphFormat {
    Json,
    Dot,
    Mermaid,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    if let Some(snapshot) = &cli.snapshot {
        config.snapshot = snapshot.clone();
        config.project_root = std::env::current_dir().unwrap_or_default();
    }

    match cli.command {
        Commands::Summary => summary_command(&config, cli.verbose),
        Commands::Impact { dataset } => impact_command(&config, &dataset, cli.verbose),
        Commands::Orphans { csv } => orphans_command(&config, csv.as_deref(), cli.verbose),
        Commands::Graph { format, output } => graph_command(&config, format, output.as_deref(), cli.verbose),
        Commands::Check { output, markdown } => check_command(&config, &output, markdown.as_deref(), cli.verbose),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

/// Config from --config, $SIGHTLINE_CONFIG, ./sightline.toml, or defaults
fn load_config(explicit: Option<&Path>, verbose: bool) -> Result<Config> {
    let from_env = std::env::var_os("SIGHTLINE_CONFIG").map(PathBuf::from);

    if let Some(path) = explicit.map(Path::to_path_buf).or(from_env) {
        return load_config_file(&path);
    }

    let default_path = Path::new(sightline_core::config::DEFAULT_CONFIG);
    if default_path.exists() {
        return load_config_file(default_path);
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

fn load_config_file(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))
}

fn load_snapshot(config: &Config, verbose: bool) -> Result<ParsedSnapshot> {
    let path = config.snapshot_path();

    if verbose {
        eprintln!("{} {}", "Loading snapshot from:".cyan(), path.display());
    }

    let loader = SnapshotLoader::new().strict(config.strict);
    let snapshot = match loader.load_file(&path) {
        Ok(snapshot) => snapshot,
        Err(e @ SnapshotError::Empty { .. }) => {
            eprintln!("{}", "⚠ The snapshot has no datasets or dashboards.".yellow().bold());
            eprintln!("Re-run the extraction against the correct region and account.");
            return Err(e.into());
        }
        Err(SnapshotError::Io(_, reason)) => {
            return Err(anyhow::anyhow!(
                "Cannot read snapshot at {} ({}). Run the metadata extraction first or pass --snapshot.",
                path.display(),
                reason
            ));
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to load snapshot {}", path.display())),
    };

    if snapshot.tally.total() > 0 {
        eprintln!(
            "{} {} of {} records skipped (missing required fields)",
            "⚠".yellow(),
            snapshot.tally.total(),
            snapshot.total_records
        );
    }

    Ok(snapshot)
}

fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
}

fn print_footer() {
    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Summary command - headline counts
fn summary_command(config: &Config, verbose: bool) -> Result<()> {
    let snapshot = load_snapshot(config, verbose)?;
    let summary = LineageQuery::new(&snapshot.graph).summary();

    print_banner("Lineage Summary");

    println!("  Total Dashboards:     {}", summary.dashboard_count);
    println!("  Total Datasets:       {}", summary.dataset_count);
    if summary.orphan_count > 0 {
        println!("  Orphan Datasets:      {}", summary.orphan_count.to_string().yellow().bold());
    } else {
        println!("  Orphan Datasets:      {}", summary.orphan_count.to_string().green());
    }
    println!("  Dependencies:         {}", summary.edge_count);
    if summary.dangling_reference_count > 0 {
        println!("  Unknown References:   {}", summary.dangling_reference_count.to_string().red());
    }

    if let Some(fingerprint) = &snapshot.fingerprint {
        println!();
        println!("Snapshot: {}", &fingerprint[..12.min(fingerprint.len())]);
    }

    print_footer();
    Ok(())
}

/// Impact command - dashboards reading a dataset
fn impact_command(config: &Config, selector: &str, verbose: bool) -> Result<()> {
    let snapshot = load_snapshot(config, verbose)?;
    let query = LineageQuery::new(&snapshot.graph);

    let dataset = query.resolve_dataset(selector)?;

    if verbose {
        eprintln!("{} {}", "Analyzing impact for:".cyan(), dataset.arn);
    }

    let affected = query.impact_of(&dataset.arn);

    print_banner("Downstream Impact Analysis");

    println!("{} {}", "Dataset:".bold(), dataset.name.green());
    println!("{} {}", "ARN:".bold(), dataset.arn);
    println!();

    if affected.is_empty() {
        println!("{}", format!("✓ Safe. '{}' is not currently used by any dashboard.", dataset.name).green());
    } else {
        println!(
            "{}",
            format!(
                "⚠ Modifying '{}' will impact {} dashboard(s):",
                dataset.name,
                affected.len()
            )
            .yellow()
            .bold()
        );
        println!();

        for (i, dashboard) in affected.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, dashboard.name.yellow(), dashboard.id);
        }
    }

    print_footer();
    Ok(())
}

/// Orphans command - cleanup candidates
fn orphans_command(config: &Config, csv: Option<&Path>, verbose: bool) -> Result<()> {
    let snapshot = load_snapshot(config, verbose)?;
    let report = LineageReportBuilder::from_snapshot(&snapshot, config).build();

    print_banner("Orphaned Datasets");

    if report.orphans.is_empty() {
        println!("{}", "✓ No orphans found! Your environment is clean.".green().bold());
    } else {
        println!("These datasets are not used by any dashboard:");
        println!();
        for orphan in &report.orphans {
            if orphan.allowlisted {
                println!("  - {} ({}) {}", orphan.name, orphan.id, "[allowlisted]".dimmed());
            } else {
                println!("  - {} ({})", orphan.name.yellow(), orphan.id);
            }
        }
    }

    if let Some(path) = csv {
        std::fs::write(path, orphans_to_csv(&report.orphans))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if verbose {
            eprintln!("{} {}", "CSV saved to:".green(), path.display());
        }
    }

    print_footer();
    Ok(())
}

/// Graph command - export nodes and edges
fn graph_command(config: &Config, format: GraphFormat, output: Option<&Path>, verbose: bool) -> Result<()> {
    let snapshot = load_snapshot(config, verbose)?;
    let view = GraphView::from_graph(&snapshot.graph);

    let rendered = match format {
        GraphFormat::Json => serde_json::to_string_pretty(&view)?,
        GraphFormat::Dot => view.to_dot(),
        GraphFormat::Mermaid => view.to_mermaid(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if verbose {
                eprintln!("{} {}", "Graph saved to:".green(), path.display());
            }
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Check command - full report, CI-friendly exit code
fn check_command(config: &Config, output: &Path, markdown: Option<&Path>, verbose: bool) -> Result<()> {
    let snapshot = load_snapshot(config, verbose)?;
    let report = LineageReportBuilder::from_snapshot(&snapshot, config).build();

    report.save_to_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    if let Some(md_path) = markdown {
        std::fs::write(md_path, generate_markdown_report(&report))?;
        if verbose {
            eprintln!("{} {}", "Markdown report saved to:".green(), md_path.display());
        }
    }

    print_report_summary(&report);

    if check_failed(config, &report) {
        std::process::exit(1);
    }

    Ok(())
}

/// Errors always fail; orphans fail only under `fail_on_orphans` and when not allowlisted
fn check_failed(config: &Config, report: &Report) -> bool {
    let orphan_failure = config.fail_on_orphans && report.unexpected_orphans().next().is_some();
    report.has_errors() || orphan_failure
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN".yellow().bold(),
        Severity::Info => "INFO".cyan(),
    }
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    print_banner("Lineage Check Report");

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Lineage:".bold());
    println!("  Dashboards: {}", report.lineage.dashboard_count);
    println!("  Datasets:   {}", report.lineage.dataset_count);
    println!("  Orphans:    {}", report.lineage.orphan_count);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            println!("  [{}] {}: {}", severity_label(diag.severity), diag.code, diag.message);

            if let Some(loc) = &diag.location {
                println!("    at {}", loc);
            }
            if let Some(subject) = &diag.subject {
                println!("    ARN: {}", subject);
            }
            if !diag.impact.is_empty() {
                println!("    Impact: {} dashboards", diag.impact.len());
                for dashboard in &diag.impact {
                    println!("      - {}", dashboard);
                }
            }
        }
    }

    print_footer();
}

/// Generate markdown report
fn generate_markdown_report(report: &Report) -> String {
    let mut md = String::new();

    md.push_str("# Lineage Check Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.timestamp));
    if let Some(fingerprint) = &report.fingerprint {
        md.push_str(&format!("**Snapshot:** `{}`\n\n", fingerprint));
    }

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Dashboards: {}\n", report.lineage.dashboard_count));
    md.push_str(&format!("- Datasets: {}\n", report.lineage.dataset_count));
    md.push_str(&format!("- Orphan datasets: {}\n", report.lineage.orphan_count));
    md.push_str(&format!("- Unknown references: {}\n", report.lineage.dangling_reference_count));
    md.push_str(&format!("- Skipped records: {}\n", report.summary.skipped_records));
    md.push('\n');

    md.push_str("## Cleanup Candidates\n\n");
    if report.orphans.is_empty() {
        md.push_str("✅ **No orphans found!**\n\n");
    } else {
        md.push_str("| Name | ID | Allowlisted |\n|---|---|---|\n");
        for orphan in &report.orphans {
            md.push_str(&format!(
                "| {} | `{}` | {} |\n",
                md_cell(&orphan.name),
                orphan.id,
                if orphan.allowlisted { "yes" } else { "no" }
            ));
        }
        md.push('\n');
    }

    md.push_str("## Impact\n\n");
    for entry in &report.impact {
        if entry.is_safe() {
            md.push_str(&format!("- **{}**: safe to modify\n", md_cell(&entry.dataset_name)));
        } else {
            let names: Vec<_> = entry.dashboards.iter().map(|d| d.name.as_str()).collect();
            md.push_str(&format!(
                "- **{}**: {} dashboard(s): {}\n",
                md_cell(&entry.dataset_name),
                entry.dashboards.len(),
                names.join(", ")
            ));
        }
    }
    md.push('\n');

    if !report.diagnostics.is_empty() {
        md.push_str("## Diagnostics\n\n");

        for diag in &report.diagnostics {
            let severity_emoji = match diag.severity {
                Severity::Error => "❌",
                Severity::Warn => "⚠️",
                Severity::Info => "ℹ️",
            };

            md.push_str(&format!("### {} {} - {}\n\n", severity_emoji, diag.severity, diag.code));
            md.push_str(&format!("{}\n\n", diag.message));

            if let Some(loc) = &diag.location {
                md.push_str(&format!("**Location:** {}\n\n", loc));
            }
            if let Some(subject) = &diag.subject {
                md.push_str(&format!("**ARN:** `{}`\n\n", subject));
            }
            if !diag.impact.is_empty() {
                md.push_str(&format!("**Impact:** {} dashboards\n\n", diag.impact.len()));
                for dashboard in &diag.impact {
                    md.push_str(&format!("- {}\n", dashboard));
                }
                md.push('\n');
            }
        }
    }

    md
}

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Orphan list as CSV with `name,id` columns
fn orphans_to_csv(orphans: &[OrphanEntry]) -> String {
    let mut out = String::from("name,id\n");
    for orphan in orphans {
        out.push_str(&csv_field(&orphan.name));
        out.push(',');
        out.push_str(&csv_field(&orphan.id));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::DiagnosticCode;

    fn orphan(name: &str, id: &str) -> OrphanEntry {
        OrphanEntry {
            name: name.to_string(),
            arn: format!("arn:{}", id),
            id: id.to_string(),
            allowlisted: false,
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_graph_args() {
        let cli = Cli::try_parse_from(["sightline", "graph", "--format", "mermaid", "-s", "snap.json"]).unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("snap.json")));
        match cli.command {
            Commands::Graph { format, output } => {
                assert_eq!(format, GraphFormat::Mermaid);
                assert!(output.is_none());
            }
            _ => panic!("expected graph command"),
        }
    }

    #[test]
    fn csv_quotes_when_needed() {
        let csv = orphans_to_csv(&[orphan("Quiz", "2"), orphan("Sales, \"EU\"", "3")]);
        assert_eq!(csv, "name,id\nQuiz,2\n\"Sales, \"\"EU\"\"\",3\n");
    }

    fn report_for(config: &Config) -> Report {
        let snapshot = sightline_snapshot::parse(
            r#"{
                "datasets": [
                    {"name": "Sales", "arn": "arn:ds1", "id": "1"},
                    {"name": "Scratch", "arn": "arn:sandbox-1", "id": "2"}
                ],
                "dashboards": [{"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1"]}]
            }"#,
        )
        .unwrap();
        LineageReportBuilder::from_snapshot(&snapshot, config).build()
    }

    #[test]
    fn check_passes_orphans_without_fail_on_orphans() {
        let config = Config::default();
        assert!(!check_failed(&config, &report_for(&config)));
    }

    #[test]
    fn check_fails_on_unexpected_orphans() {
        let config = Config { fail_on_orphans: true, ..Config::default() };
        assert!(check_failed(&config, &report_for(&config)));
    }

    #[test]
    fn check_passes_when_every_orphan_is_allowlisted() {
        let mut config = Config { fail_on_orphans: true, ..Config::default() };
        config.allowlist.ignore_orphans = vec!["arn:sandbox-*".to_string()];

        let report = report_for(&config);
        assert_eq!(report.orphans.len(), 1);
        assert!(!check_failed(&config, &report));
    }

    #[test]
    fn check_fails_on_errors_regardless_of_orphans() {
        let mut config = Config::default();
        config.severity.set_override(DiagnosticCode::LineageOrphanDataset, Severity::Error);

        assert!(check_failed(&config, &report_for(&config)));
    }

    #[test]
    fn config_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sightline.toml");
        std::fs::write(&path, "fail_on_orphans = \"maybe\"").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains(&path.display().to_string()));
    }

    #[test]
    fn markdown_lists_orphans_and_impact() {
        let snapshot = sightline_snapshot::parse(
            r#"{
                "datasets": [
                    {"name": "Sales", "arn": "arn:ds1", "id": "1"},
                    {"name": "Quiz", "arn": "arn:ds2", "id": "2"}
                ],
                "dashboards": [{"name": "Exec", "id": "d1", "used_datasets": ["arn:ds1"]}]
            }"#,
        )
        .unwrap();
        let config = Config::default();
        let report = LineageReportBuilder::from_snapshot(&snapshot, &config).build();

        let md = generate_markdown_report(&report);
        assert!(md.contains("# Lineage Check Report"));
        assert!(md.contains("| Quiz | `2` | no |"));
        assert!(md.contains("- **Sales**: 1 dashboard(s): Exec"));
        assert!(md.contains("- **Quiz**: safe to modify"));
        assert!(md.contains("LINEAGE_ORPHAN_DATASET"));
    }
}
