//! SQLite audit workbook
//!
//! The internal report is written as a small SQLite database with one table
//! per sheet: `summary`, `all_urls`, `cost_breakdown` and `heuristic_scores`.
//! Writing replaces any tables left by an earlier session at the same path.

use crate::evaluation::HeuristicScore;
use crate::output::report::InternalReport;
use crate::output::OutputResult;
use rusqlite::{params, Connection};
use std::path::Path;

const WORKBOOK_SQL: &str = r#"
DROP TABLE IF EXISTS summary;
DROP TABLE IF EXISTS all_urls;
DROP TABLE IF EXISTS cost_breakdown;
DROP TABLE IF EXISTS heuristic_scores;

CREATE TABLE summary (
    generated_at TEXT NOT NULL,
    config_hash TEXT,
    elapsed_time TEXT NOT NULL,
    elapsed_seconds REAL NOT NULL,
    pages_requested INTEGER NOT NULL,
    pages_crawled INTEGER NOT NULL,
    pages_skipped INTEGER NOT NULL,
    max_depth_observed INTEGER,
    total_input_tokens INTEGER NOT NULL,
    total_output_tokens INTEGER NOT NULL,
    total_tokens INTEGER NOT NULL,
    api_calls INTEGER NOT NULL,
    estimated_cost_usd REAL NOT NULL,
    cost_per_page REAL NOT NULL,
    model_used TEXT NOT NULL
);

CREATE TABLE all_urls (
    position INTEGER PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    reason TEXT,
    depth INTEGER NOT NULL,
    detail TEXT
);

CREATE TABLE cost_breakdown (
    metric TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE heuristic_scores (
    heuristic TEXT NOT NULL,
    average_score REAL,
    pages_evaluated INTEGER NOT NULL,
    grade TEXT NOT NULL
);
"#;

/// Writes the internal workbook to `path`, creating the file if needed
///
/// # Arguments
///
/// * `report` - The assembled internal report
/// * `scores` - Per-heuristic scores; empty for a crawl-only session
/// * `path` - Path of the SQLite file
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote every table
/// * `Err(OutputError::Database)` - SQLite rejected a statement
pub fn write_internal_workbook(
    report: &InternalReport,
    scores: &[HeuristicScore],
    path: &Path,
) -> OutputResult<()> {
    let mut conn = Connection::open(path)?;
    write_workbook_to(&mut conn, report, scores)
}

/// Writes the workbook tables into an open connection, in one transaction
pub fn write_workbook_to(
    conn: &mut Connection,
    report: &InternalReport,
    scores: &[HeuristicScore],
) -> OutputResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(WORKBOOK_SQL)?;

    let summary = &report.summary;
    tx.execute(
        "INSERT INTO summary (generated_at, config_hash, elapsed_time, elapsed_seconds,
            pages_requested, pages_crawled, pages_skipped, max_depth_observed,
            total_input_tokens, total_output_tokens, total_tokens, api_calls,
            estimated_cost_usd, cost_per_page, model_used)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            report.generated_at.to_rfc3339(),
            report.config_hash,
            summary.elapsed_time,
            summary.elapsed_seconds,
            summary.pages_requested,
            summary.pages_crawled as i64,
            summary.pages_skipped as i64,
            report.max_depth_observed,
            summary.total_input_tokens as i64,
            summary.total_output_tokens as i64,
            summary.total_tokens as i64,
            summary.api_calls as i64,
            summary.estimated_cost_usd,
            summary.cost_per_page,
            summary.model_used,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO all_urls (position, url, status, reason, depth, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, row) in report.urls.iter().enumerate() {
            stmt.execute(params![
                position as i64,
                row.url,
                row.status.to_string(),
                row.reason.map(|r| r.as_str()),
                row.depth,
                row.detail,
            ])?;
        }
    }

    {
        let cost = &report.cost;
        let rows: [(&str, String); 10] = [
            ("model", cost.model.clone()),
            (
                "input_price_per_thousand",
                cost.input_price_per_thousand.to_string(),
            ),
            (
                "output_price_per_thousand",
                cost.output_price_per_thousand.to_string(),
            ),
            ("total_input_tokens", cost.total_input_tokens.to_string()),
            ("total_output_tokens", cost.total_output_tokens.to_string()),
            ("total_tokens", cost.total_tokens.to_string()),
            ("api_calls", cost.api_calls.to_string()),
            ("tokens_per_page", format!("{:.2}", cost.tokens_per_page)),
            ("cost_per_page", format!("{:.4}", cost.cost_per_page)),
            ("total_cost", format!("{:.4}", cost.total_cost)),
        ];

        let mut stmt = tx.prepare("INSERT INTO cost_breakdown (metric, value) VALUES (?1, ?2)")?;
        for (metric, value) in rows.iter() {
            stmt.execute(params![metric, value])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO heuristic_scores (heuristic, average_score, pages_evaluated, grade)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for score in scores {
            stmt.execute(params![
                score.name,
                score.average_score,
                score.pages_evaluated as i64,
                score.grade,
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}
