//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::{TableSort, TableSortKey};
use crate::models::{GroupBy, SortField, SortOrder};
use clap::Parser;
use std::path::PathBuf;

/// Evalcharts - search relevance evaluation charts
///
/// Aggregate evaluation results into heatmaps, scatter series and
/// ranked strategy tables. Markdown/JSON output.
///
/// Examples:
///   evalcharts --input evaluation.json
///   evalcharts --input ./evaluations --metric precision --format json
///   evalcharts --evaluation-id 3f2a --api-url http://localhost:9200
///   evalcharts --input evaluation.json --y-group-by strategy_tag --sort-order asc
///   evalcharts --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Evaluation JSON file or directory of files (repeatable)
    #[arg(short, long, value_name = "PATH")]
    pub input: Vec<PathBuf>,

    /// Evaluation id to fetch from the backend (comma-separated or repeated)
    #[arg(short, long, value_name = "ID", value_delimiter = ',')]
    pub evaluation_id: Vec<String>,

    /// Evaluation backend base URL
    #[arg(long, value_name = "URL", env = "EVALCHARTS_API_URL")]
    pub api_url: Option<String>,

    /// Metric to plot in the heatmap (e.g. ndcg, precision, recall)
    #[arg(short, long, value_name = "NAME", env = "EVALCHARTS_METRIC")]
    pub metric: Option<String>,

    /// Heatmap column grouping
    #[arg(long, value_name = "FIELD")]
    pub x_group_by: Option<GroupBy>,

    /// Heatmap row grouping
    #[arg(long, value_name = "FIELD")]
    pub y_group_by: Option<GroupBy>,

    /// Sort heatmap rows by value or name
    #[arg(long, value_name = "KEY")]
    pub sort_by: Option<SortField>,

    /// Sort direction for heatmap rows
    #[arg(long, value_name = "ORDER")]
    pub sort_order: Option<SortOrder>,

    /// Sort the strategy table by a metric name or "name"
    ///
    /// Without this the table is sorted by the first of ndcg, precision,
    /// recall enabled for the evaluation's task.
    #[arg(long, value_name = "KEY")]
    pub table_sort: Option<String>,

    /// Sort direction for the strategy table
    #[arg(long, value_name = "ORDER", requires = "table_sort")]
    pub table_order: Option<SortOrder>,

    /// Which charts to produce
    #[arg(long, default_value = "all", value_name = "VIEW")]
    pub view: View,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .evalcharts.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds for backend fetches
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of evaluations fetched concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .evalcharts.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Charts included in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    /// Heatmap, scatter series and ranked table
    #[default]
    All,
    Heatmap,
    Scatter,
    Table,
}

impl View {
    pub fn includes_heatmap(&self) -> bool {
        matches!(self, View::All | View::Heatmap)
    }

    pub fn includes_scatter(&self) -> bool {
        matches!(self, View::All | View::Scatter)
    }

    pub fn includes_table(&self) -> bool {
        matches!(self, View::All | View::Table)
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input.is_empty() && self.evaluation_id.is_empty() {
            return Err("Provide at least one --input or --evaluation-id".to_string());
        }

        if let Some(x) = self.x_group_by {
            if !x.is_scenario() {
                return Err(format!("--x-group-by must be a scenario field, got {}", x));
            }
        }

        if let Some(y) = self.y_group_by {
            if !y.is_strategy() {
                return Err(format!("--y-group-by must be a strategy field, got {}", y));
            }
        }

        if let Some(ref metric) = self.metric {
            if metric.trim().is_empty() {
                return Err("Metric name must not be empty".to_string());
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for path in &self.input {
            if !path.exists() {
                return Err(format!("Input does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Table sort picked on the command line, if any.
    pub fn requested_table_sort(&self) -> Option<TableSort> {
        let key = match self.table_sort.as_deref()? {
            "name" => TableSortKey::Name,
            metric => TableSortKey::Metric(metric.to_string()),
        };
        let order = self.table_order.unwrap_or(match key {
            TableSortKey::Name => SortOrder::Asc,
            TableSortKey::Metric(_) => SortOrder::Desc,
        });
        Some(TableSort::user(key, order))
    }

    /// Output path: the CLI value, else the configured one, with the
    /// extension matched to the output format.
    pub fn output_path(&self, configured: &str) -> PathBuf {
        if let Some(ref output) = self.output {
            return output.clone();
        }
        let path = PathBuf::from(configured);
        match self.format {
            OutputFormat::Json if path.extension().map_or(true, |e| e == "md") => {
                path.with_extension("json")
            }
            _ => path,
        }
    }
}
