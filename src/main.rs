//! Evalcharts - search relevance evaluation charts
//!
//! A CLI tool that aggregates search-relevance evaluation documents into
//! chart-ready heatmaps, scatter series and ranked strategy tables.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable input, backend failure, bad config, etc.)
//!   2 - No requested evaluation had results to aggregate yet

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod scanner;
mod source;

use analysis::{HeatmapConfig, TableSort};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat, View};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{Evaluation, EvaluationCharts, GroupBy, Report, ReportMetadata};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("evalcharts v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Aggregation failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .evalcharts.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the backend, metric, groupings and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load, aggregate and write the report. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config
        .aggregation
        .validate()
        .context("Invalid aggregation settings")?;

    let heatmap_config = config.aggregation.heatmap();
    let requested_table_sort = args.requested_table_sort();

    // Step 1: Collect evaluation documents
    let evaluations = collect_evaluations(&args, &config).await?;
    if evaluations.is_empty() {
        anyhow::bail!("No evaluation documents found");
    }
    info!("Loaded {} evaluation(s)", evaluations.len());

    // Step 2: Aggregate
    let charts: Vec<EvaluationCharts> = evaluations
        .iter()
        .map(|evaluation| {
            build_charts(
                evaluation,
                &heatmap_config,
                config.aggregation.scatter_group_by,
                requested_table_sort.as_ref(),
                args.view,
            )
        })
        .collect();

    let report = Report {
        metadata: ReportMetadata {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            metric: heatmap_config.metric.clone(),
            x_group_by: heatmap_config.x_group_by,
            y_group_by: heatmap_config.y_group_by,
            sort: heatmap_config.y_sort_by,
            evaluations: charts.len(),
        },
        evaluations: charts,
    };

    // Step 3: Render and save
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = args.output_path(&config.general.output);
    report::save_report(&output, &output_path)?;

    if !args.quiet {
        print_summary(&report);
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    if report.evaluations.iter().all(EvaluationCharts::is_empty) {
        warn!("No evaluation had results to aggregate yet");
        return Ok(2);
    }

    Ok(0)
}

/// Run every requested aggregation for one evaluation.
fn build_charts(
    evaluation: &Evaluation,
    heatmap_config: &HeatmapConfig,
    scatter_group_by: GroupBy,
    table_sort: Option<&TableSort>,
    view: View,
) -> EvaluationCharts {
    let name = evaluation.display_name().to_string();

    if !evaluation.is_loaded() {
        warn!("{}: results not available yet", name);
    }

    let metrics = evaluation.enabled_metrics();
    if !metrics.is_empty() && !metrics.iter().any(|m| *m == heatmap_config.metric) {
        warn!(
            "{}: metric '{}' is not enabled for this task (enabled: {})",
            name,
            heatmap_config.metric,
            metrics.join(", ")
        );
    }

    let (heatmap_variant, heatmap, x_labels, y_labels) = if view.includes_heatmap() {
        let variant = analysis::select_variant(evaluation, heatmap_config);
        let cells = analysis::build_heatmap_matrix(evaluation, heatmap_config);
        let (xs, ys) = analysis::axis_labels(evaluation, heatmap_config, &cells);
        debug!("{}: {} heatmap cells via {:?}", name, cells.len(), variant);
        (variant, cells, xs, ys)
    } else {
        (None, Vec::new(), Vec::new(), Vec::new())
    };

    let (scatter, scatter_labels) = if view.includes_scatter() {
        let points = analysis::build_scatter_series(evaluation, scatter_group_by);
        let labels = analysis::scatter_labels(evaluation, scatter_group_by, &points);
        (points, labels)
    } else {
        (Vec::new(), Vec::new())
    };

    let table_sort = analysis::resolve_table_sort(table_sort, evaluation);
    let table = if view.includes_table() {
        let mut rows = analysis::build_ranked_table(evaluation);
        analysis::sort_ranked_rows(&mut rows, &table_sort);
        rows
    } else {
        Vec::new()
    };

    EvaluationCharts {
        evaluation_id: evaluation.id.clone(),
        evaluation_name: name,
        status: evaluation.status.clone(),
        heatmap_variant,
        heatmap,
        x_labels,
        y_labels,
        scatter,
        scatter_labels,
        table,
        table_sort,
    }
}

/// Load every evaluation named on the command line, files first.
async fn collect_evaluations(args: &Args, config: &Config) -> Result<Vec<Evaluation>> {
    let mut evaluations = Vec::new();

    for path in &args.input {
        for file in expand_input(path, config)? {
            let evaluation = source::load_from_file(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            evaluations.push(evaluation);
        }
    }

    if !args.evaluation_id.is_empty() {
        evaluations.extend(fetch_evaluations(&args.evaluation_id, config, args.quiet).await?);
    }

    Ok(evaluations)
}

/// A file input stands for itself; a directory expands to its evaluation files.
fn expand_input(path: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let scan_config = scanner::ScanConfig::from(&config.scanner);
    let files = scanner::EvaluationScanner::new(path.to_path_buf(), scan_config).scan()?;
    info!("Found {} evaluation file(s) in {}", files.len(), path.display());
    Ok(files)
}

/// Fetch evaluations from the backend.
async fn fetch_evaluations(ids: &[String], config: &Config, quiet: bool) -> Result<Vec<Evaluation>> {
    let client = source::EvaluationClient::new(source::ClientConfig {
        base_url: config.api.base_url.clone(),
        evaluation_path: config.api.evaluation_path.clone(),
        timeout_seconds: config.api.timeout_seconds,
        concurrency: config.api.concurrency,
    })?;

    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message(format!("Fetching {} evaluation(s) from {}", ids.len(), config.api.base_url));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let results = client.fetch_many(ids).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let mut evaluations = Vec::with_capacity(results.len());
    for (id, result) in ids.iter().zip(results) {
        let evaluation = result.with_context(|| format!("Failed to fetch evaluation {}", id))?;
        evaluations.push(evaluation);
    }

    Ok(evaluations)
}

/// Print a short per-evaluation summary to stdout.
fn print_summary(report: &Report) {
    println!("\n📊 Aggregation Summary:");
    println!(
        "   Metric: {} | Rows: {} | Columns: {} | Order: {}",
        report.metadata.metric,
        report.metadata.y_group_by,
        report.metadata.x_group_by,
        report.metadata.sort
    );
    for charts in &report.evaluations {
        println!(
            "   - {}: {} heatmap cells, {} scatter points, {} strategies",
            charts.evaluation_name,
            charts.heatmap.len(),
            charts.scatter.len(),
            charts.table.len()
        );
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation() -> Evaluation {
        serde_json::from_str(
            r#"{
                "id": "ev1",
                "task": {"metrics": ["precision", "ndcg"]},
                "runtime": {"strategies": {"s1": {"name": "BM25"}}},
                "summary": {"strategy_id": {
                    "s1": {
                        "_total": {"metrics": {"ndcg": {"avg": 0.7}, "precision": {"avg": 0.5}}},
                        "by_scenario_id": {"sc1": {"metrics": {"ndcg": {"avg": 0.7}}}}
                    }
                }}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_charts_all_views() {
        let charts = build_charts(&evaluation(), &HeatmapConfig::default(), GroupBy::StrategyId, None, View::All);

        assert_eq!(charts.evaluation_id.as_deref(), Some("ev1"));
        assert_eq!(charts.heatmap_variant, Some(analysis::HeatmapVariant::Summary));
        assert_eq!(charts.heatmap.len(), 2);
        assert_eq!(charts.y_labels[0].label, "BM25");
        assert_eq!(charts.scatter.len(), 1);
        assert_eq!(charts.scatter_labels[0].label, "BM25");
        assert_eq!(charts.table.len(), 1);
        assert_eq!(
            charts.table_sort.key,
            analysis::TableSortKey::Metric("ndcg".to_string())
        );
        assert!(!charts.is_empty());
    }

    #[test]
    fn test_build_charts_single_view() {
        let charts = build_charts(&evaluation(), &HeatmapConfig::default(), GroupBy::StrategyId, None, View::Table);
        assert!(charts.heatmap.is_empty());
        assert!(charts.scatter.is_empty());
        assert_eq!(charts.table.len(), 1);
    }

    #[test]
    fn test_build_charts_keeps_user_table_sort() {
        let user = TableSort::user(analysis::TableSortKey::Metric("precision".to_string()), models::SortOrder::Asc);
        let charts = build_charts(&evaluation(), &HeatmapConfig::default(), GroupBy::StrategyId, Some(&user), View::Table);
        assert_eq!(charts.table_sort, user);
    }

    #[test]
    fn test_run_rejects_misplaced_grouping_from_config_file() {
        use clap::Parser;

        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.toml");
        std::fs::write(&config_path, "[aggregation]\nx_group_by = \"strategy_id\"\n").unwrap();

        let args = Args::try_parse_from([
            "evalcharts",
            "--evaluation-id",
            "ev1",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        let err = tokio_test::block_on(run(args)).unwrap_err();
        assert!(format!("{:#}", err).contains("x_group_by must be a scenario field"));
    }

    #[test]
    fn test_build_charts_not_loaded() {
        let empty: Evaluation = serde_json::from_str(r#"{"id": "pending"}"#).unwrap();
        let charts = build_charts(&empty, &HeatmapConfig::default(), GroupBy::StrategyId, None, View::All);
        assert!(charts.is_empty());
        assert_eq!(charts.heatmap_variant, None);
    }

    #[test]
    fn test_expand_input_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();

        let files = expand_input(dir.path(), &Config::default()).unwrap();
        assert_eq!(files.len(), 1);

        let single = dir.path().join("b.txt");
        assert_eq!(expand_input(&single, &Config::default()).unwrap(), vec![single]);
    }
}
