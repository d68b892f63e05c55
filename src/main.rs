//! Sitemeter main entry point
//!
//! This is the command-line interface for the Sitemeter crawler and cost ledger.

use anyhow::{Context, Result};
use clap::Parser;
use sitemeter::config::{load_config_with_hash, Config};
use sitemeter::crawler::http_coordinator;
use sitemeter::evaluation::{run_evaluations, ChatEvaluator, EvaluationReport, EvaluationSettings};
use sitemeter::metrics::MetricsLedger;
use sitemeter::output::{write_partial_reports, write_reports};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Sitemeter: a bounded site crawler with a verifiable cost ledger
///
/// Sitemeter crawls one website under strict page and depth limits,
/// optionally behind a login form, evaluates each crawled page with an LLM,
/// and reports time, tokens and cost for the whole session.
#[derive(Parser, Debug)]
#[command(name = "sitemeter")]
#[command(version)]
#[command(about = "A bounded site crawler with a verifiable cost ledger", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the resolved session without crawling
    #[arg(long, conflicts_with = "crawl_only")]
    dry_run: bool,

    /// Crawl and report, skipping the evaluation stage
    #[arg(long)]
    crawl_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_session(config, &config_hash, cli.crawl_only).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitemeter=info,warn"),
            1 => EnvFilter::new("sitemeter=debug,info"),
            2 => EnvFilter::new("sitemeter=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the resolved configuration
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Sitemeter Dry Run ===\n");

    println!("Crawl:");
    println!("  Start URL: {}", config.start_url()?);
    println!("  Base domain: {}", config.base_domain()?);
    println!("  Max pages: {}", config.crawl.max_pages);
    println!("  Max depth: {}", config.crawl.max_depth);
    println!(
        "  Navigation timeout: {}ms",
        config.crawl.navigation_timeout_ms
    );
    println!("  Politeness delay: {}ms", config.crawl.politeness_delay_ms);

    let prescriptive = config.prescriptive_urls()?;
    println!("\nPrescriptive URLs ({}):", prescriptive.len());
    for url in &prescriptive {
        println!("  - {}", url);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    match config.login() {
        Some(auth) => {
            println!("\nLogin:");
            println!("  URL: {}", auth.login_url);
            println!("  Username: {}", auth.username);
            println!("  Password: (resolved, hidden)");
        }
        None => println!("\nLogin: not required"),
    }

    let pricing = config.pricing_table();
    println!("\nEvaluation:");
    println!("  Model: {}", config.evaluation.model);
    if let Some(price) = pricing.get(&config.evaluation.model) {
        println!(
            "  Price per 1K tokens: ${} input, ${} output",
            price.input_price_per_thousand, price.output_price_per_thousand
        );
    }
    println!("  API base: {}", config.evaluation.api_base);
    println!("  Heuristics ({}):", config.evaluation.heuristics.len());
    for heuristic in &config.evaluation.heuristics {
        println!("    * {}", heuristic.name);
    }

    println!("\nOutput:");
    println!("  Client report: {}", config.output.report_path);
    println!("  Internal report: {}", config.output.internal_markdown_path);
    println!(
        "  Internal workbook: {}",
        config.output.internal_database_path
    );
    if let Some(path) = &config.output.summary_json_path {
        println!("  Summary JSON: {}", path);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl at most {} pages from {}",
        config.crawl.max_pages,
        config.start_url()?
    );

    Ok(())
}

/// Handles a full session: crawl, evaluate, report
async fn handle_session(config: Config, config_hash: &str, crawl_only: bool) -> Result<()> {
    let ledger = Arc::new(MetricsLedger::new(
        config.evaluation.model.clone(),
        config.pricing_table(),
        config.crawl.max_pages,
    )?);

    // Resolve the API key before any page is fetched
    let evaluator = if crawl_only {
        None
    } else {
        Some(ChatEvaluator::from_config(
            &config.evaluation,
            config.navigation_timeout(),
        )?)
    };

    let mut coordinator = http_coordinator(&config, Arc::clone(&ledger))?;

    let abort = coordinator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            abort.abort();
        }
    });

    ledger.start_session()?;
    tracing::info!(
        "Session started: max {} pages, depth {}",
        config.crawl.max_pages,
        config.crawl.max_depth
    );

    let crawl = match coordinator.run().await {
        Ok(crawl) => crawl,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            if let Err(report_err) = write_partial_reports(&config.output, &ledger, config_hash) {
                tracing::error!("Failed to write reports: {}", report_err);
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        "Crawl finished: {} crawled, {} skipped",
        ledger.pages_crawled(),
        ledger.pages_skipped()
    );

    let evaluation = match evaluator {
        Some(_) if crawl.aborted => {
            tracing::warn!("Crawl was interrupted; skipping evaluation");
            None
        }
        Some(evaluator) => match evaluate(&evaluator, &config, &crawl, &ledger).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!("Evaluation failed: {}", e);
                if let Err(report_err) = write_partial_reports(&config.output, &ledger, config_hash)
                {
                    tracing::error!("Failed to write reports: {}", report_err);
                }
                return Err(e);
            }
        },
        None => None,
    };

    ledger.end_session()?;

    let internal = write_reports(&config.output, &ledger, evaluation.as_ref(), config_hash)
        .context("Failed to write reports")?;

    let summary = &internal.summary;
    println!("\n=== Session Summary ===");
    println!("  Elapsed: {}", summary.elapsed_time);
    println!(
        "  Pages: {} crawled / {} requested, {} skipped",
        summary.pages_crawled, summary.pages_requested, summary.pages_skipped
    );
    println!(
        "  Tokens: {} ({} API calls)",
        summary.total_tokens, summary.api_calls
    );
    println!(
        "  Cost: ${:.4} (${:.4} per page)",
        summary.estimated_cost_usd, summary.cost_per_page
    );

    Ok(())
}

/// Runs the evaluation stage over the crawled pages
async fn evaluate(
    evaluator: &ChatEvaluator,
    config: &Config,
    crawl: &sitemeter::CrawlOutput,
    ledger: &MetricsLedger,
) -> Result<EvaluationReport> {
    let settings = EvaluationSettings::from_config(config)?;
    tracing::info!(
        "Evaluating {} pages against {} heuristics via {}",
        crawl.len(),
        config.evaluation.heuristics.len(),
        evaluator.endpoint()
    );

    let report = run_evaluations(
        evaluator,
        &config.evaluation.heuristics,
        crawl,
        ledger,
        &settings,
    )
    .await?;

    if report.failed() > 0 {
        tracing::warn!("{} evaluations failed", report.failed());
    }
    Ok(report)
}
