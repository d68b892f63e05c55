//! Output module for session reports
//!
//! This module handles:
//! - Projecting the metrics ledger into a client report and an internal report
//! - Rendering both as markdown
//! - Writing the internal audit workbook (SQLite)
//! - Writing the metrics summary as JSON

mod markdown;
mod report;
mod sqlite_output;

pub use markdown::{
    format_client_report, format_internal_report, write_client_report, write_internal_report,
};
pub use report::{ClientReport, CostBreakdown, InternalReport, UrlRow, UrlStatus};
pub use sqlite_output::{write_internal_workbook, write_workbook_to};

use crate::config::OutputConfig;
use crate::evaluation::EvaluationReport;
use crate::metrics::{MetricsError, MetricsLedger, MetricsSummary, SessionState};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors raised while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
}

/// Result type alias for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes the metrics summary as pretty-printed JSON
pub fn write_summary_json(summary: &MetricsSummary, output_path: &Path) -> OutputResult<()> {
    let json = serde_json::to_string_pretty(summary)?;

    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;

    Ok(())
}

/// Writes every configured report for a finished session
///
/// # Arguments
///
/// * `config` - Output paths
/// * `ledger` - The session ledger; normally already ended
/// * `evaluation` - Evaluation results, `None` for a crawl-only session
/// * `config_hash` - Hash of the configuration file, recorded in internal reports
///
/// # Returns
///
/// * `Ok(InternalReport)` - The internal report that was written
/// * `Err(OutputError)` - A report could not be written
pub fn write_reports(
    config: &OutputConfig,
    ledger: &MetricsLedger,
    evaluation: Option<&EvaluationReport>,
    config_hash: &str,
) -> OutputResult<InternalReport> {
    let internal = InternalReport::assemble(ledger).with_config_hash(config_hash);
    let client = ClientReport::from_summary(&internal.summary);
    let scores = evaluation.map(|e| e.scores.as_slice()).unwrap_or(&[]);

    write_client_report(&client, scores, Path::new(&config.report_path))?;
    tracing::info!("Client report written to {}", config.report_path);

    write_internal_report(
        &internal,
        evaluation,
        Path::new(&config.internal_markdown_path),
    )?;
    tracing::info!(
        "Internal report written to {}",
        config.internal_markdown_path
    );

    write_internal_workbook(
        &internal,
        scores,
        Path::new(&config.internal_database_path),
    )?;
    tracing::info!(
        "Internal workbook written to {}",
        config.internal_database_path
    );

    if let Some(path) = &config.summary_json_path {
        write_summary_json(&internal.summary, Path::new(path))?;
        tracing::info!("Summary JSON written to {}", path);
    }

    Ok(internal)
}

/// Ends a session cut short by a failure and writes what it recorded
///
/// The ledger is ended if still active, then every report is written
/// without evaluation results, so a failed session leaves the same audit
/// trail as a finished one.
pub fn write_partial_reports(
    config: &OutputConfig,
    ledger: &MetricsLedger,
    config_hash: &str,
) -> OutputResult<InternalReport> {
    if ledger.state() == SessionState::Active {
        ledger.end_session()?;
    }
    write_reports(config, ledger, None, config_hash)
}
