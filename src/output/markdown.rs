//! Markdown report generation
//!
//! The client report carries the heuristic scores and aggregate metrics of a
//! session and never a URL. The internal report is the URL-level audit:
//! every URL the session met, the skip breakdown, the cost breakdown and,
//! when an evaluation ran, the per-page findings.

use crate::evaluation::{EvaluationReport, HeuristicScore};
use crate::metrics::SkipReason;
use crate::output::report::{ClientReport, InternalReport, UrlStatus};
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the client report
///
/// # Arguments
///
/// * `report` - Client metrics for the session
/// * `scores` - Per-heuristic scores; empty for a crawl-only session
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_client_report(
    report: &ClientReport,
    scores: &[HeuristicScore],
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_client_report(report, scores);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats the client report as markdown
pub fn format_client_report(report: &ClientReport, scores: &[HeuristicScore]) -> String {
    let mut md = String::new();

    md.push_str("# Heuristic Evaluation Report\n\n");

    md.push_str("## Heuristic Scores\n\n");
    if scores.is_empty() {
        md.push_str("No heuristic evaluation was run for this session.\n\n");
    } else {
        md.push_str("| Heuristic | Average Score | Pages Evaluated | Grade |\n");
        md.push_str("|-----------|---------------|-----------------|-------|\n");
        for score in scores {
            let average = score
                .average_score
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "N/A".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                escape_cell(&score.name),
                average,
                score.pages_evaluated,
                score.grade
            ));
        }
        md.push('\n');
    }

    md.push_str("## Crawl & Evaluation Metrics\n\n");
    md.push_str(&format!("- **Elapsed Time**: {}\n", report.elapsed_time));
    md.push_str(&format!(
        "- **Pages Requested**: {}\n",
        report.pages_requested
    ));
    md.push_str(&format!("- **Pages Crawled**: {}\n", report.pages_crawled));
    md.push_str(&format!("- **Pages Skipped**: {}\n", report.pages_skipped));
    md.push_str(&format!("- **Model**: {}\n", report.model_used));
    md.push_str(&format!("- **API Calls**: {}\n", report.api_calls));
    md.push_str(&format!(
        "- **Input Tokens**: {}\n",
        report.total_input_tokens
    ));
    md.push_str(&format!(
        "- **Output Tokens**: {}\n",
        report.total_output_tokens
    ));
    md.push_str(&format!("- **Total Tokens**: {}\n", report.total_tokens));
    md.push_str(&format!(
        "- **Estimated Cost**: ${:.4}\n",
        report.estimated_cost_usd
    ));
    md.push_str(&format!(
        "- **Cost per Page**: ${:.4}\n",
        report.cost_per_page
    ));

    md
}

/// Writes the internal report
///
/// # Arguments
///
/// * `report` - The assembled internal report
/// * `evaluation` - Evaluation results, `None` for a crawl-only session
/// * `output_path` - Path where the markdown file should be written
pub fn write_internal_report(
    report: &InternalReport,
    evaluation: Option<&EvaluationReport>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_internal_report(report, evaluation);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats the internal report as markdown
pub fn format_internal_report(
    report: &InternalReport,
    evaluation: Option<&EvaluationReport>,
) -> String {
    let summary = &report.summary;
    let mut md = String::new();

    md.push_str("# Internal Crawl Audit\n\n");

    // Session metadata
    md.push_str("## Session\n\n");
    md.push_str(&format!(
        "- **Generated**: {}\n",
        report.generated_at.to_rfc3339()
    ));
    if let Some(hash) = &report.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push_str(&format!(
        "- **Elapsed Time**: {} ({:.2} seconds)\n",
        summary.elapsed_time, summary.elapsed_seconds
    ));
    md.push_str(&format!("- **Model**: {}\n\n", summary.model_used));

    // Crawl totals
    md.push_str("## Crawl Summary\n\n");
    md.push_str(&format!(
        "- **Pages Requested**: {}\n",
        summary.pages_requested
    ));
    md.push_str(&format!("- **Pages Crawled**: {}\n", summary.pages_crawled));
    md.push_str(&format!("- **Pages Skipped**: {}\n", summary.pages_skipped));
    match report.max_depth_observed {
        Some(depth) => md.push_str(&format!("- **Max Depth Observed**: {}\n\n", depth)),
        None => md.push_str("- **Max Depth Observed**: none\n\n"),
    }

    // Skip breakdown
    md.push_str("## Skip Reasons\n\n");
    md.push_str("| Reason | Count |\n");
    md.push_str("|--------|-------|\n");
    for reason in SkipReason::all() {
        let count = summary.skip_reasons.get(&reason).map_or(0, Vec::len);
        md.push_str(&format!("| {} | {} |\n", reason, count));
    }
    md.push('\n');

    // Every URL met in the session
    md.push_str("## All URLs\n\n");
    if report.urls.is_empty() {
        md.push_str("No URLs were recorded.\n\n");
    } else {
        md.push_str("| URL | Status | Reason | Depth | Detail |\n");
        md.push_str("|-----|--------|--------|-------|--------|\n");
        for row in &report.urls {
            let reason = row.reason.map(|r| r.as_str()).unwrap_or("");
            let detail = row.detail.as_deref().unwrap_or("");
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                escape_cell(&row.url),
                row.status,
                reason,
                row.depth,
                escape_cell(detail)
            ));
        }
        md.push_str(&format!(
            "\n{} crawled, {} skipped\n\n",
            report.rows(UrlStatus::Crawled).count(),
            report.rows(UrlStatus::Skipped).count()
        ));
    }

    // Cost breakdown
    let cost = &report.cost;
    md.push_str("## Cost Breakdown\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Model | {} |\n", cost.model));
    md.push_str(&format!(
        "| Input Price (per 1K tokens) | ${} |\n",
        cost.input_price_per_thousand
    ));
    md.push_str(&format!(
        "| Output Price (per 1K tokens) | ${} |\n",
        cost.output_price_per_thousand
    ));
    md.push_str(&format!("| API Calls | {} |\n", cost.api_calls));
    md.push_str(&format!("| Input Tokens | {} |\n", cost.total_input_tokens));
    md.push_str(&format!(
        "| Output Tokens | {} |\n",
        cost.total_output_tokens
    ));
    md.push_str(&format!("| Total Tokens | {} |\n", cost.total_tokens));
    md.push_str(&format!(
        "| Tokens per Page | {:.2} |\n",
        cost.tokens_per_page
    ));
    md.push_str(&format!("| Cost per Page | ${:.4} |\n", cost.cost_per_page));
    md.push_str(&format!("| Total Cost | ${:.4} |\n\n", cost.total_cost));

    // Per-page findings
    if let Some(evaluation) = evaluation {
        md.push_str("## Evaluation Details\n\n");
        md.push_str(&format!(
            "{} evaluations, {} failed\n\n",
            evaluation.evaluations.len(),
            evaluation.failed()
        ));
        for result in &evaluation.evaluations {
            md.push_str(&format!("### {} ({})\n\n", result.heuristic, result.url));
            match (&result.output, &result.error) {
                (_, Some(error)) => md.push_str(&format!("Evaluation failed: {}\n\n", error)),
                (Some(output), None) => {
                    md.push_str(output.trim());
                    md.push_str("\n\n");
                }
                (None, None) => md.push_str("No output.\n\n"),
            }
        }
    }

    md
}

/// Escapes a value for use inside a markdown table cell
fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}
