//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.evalcharts.toml` files.

use crate::analysis::HeatmapConfig;
use crate::models::{GroupBy, SortBy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".evalcharts.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Evaluation backend settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Aggregation defaults.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Evaluation file discovery settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "evalcharts_report.md".to_string()
}

/// Evaluation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of a single evaluation document; `{id}` is replaced.
    #[serde(default = "default_evaluation_path")]
    pub evaluation_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of evaluations fetched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            evaluation_path: default_evaluation_path(),
            timeout_seconds: default_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_evaluation_path() -> String {
    "/api/evaluations/{id}".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

/// Aggregation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Metric plotted in the heatmap.
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Heatmap column grouping.
    #[serde(default = "default_x_group_by")]
    pub x_group_by: GroupBy,

    /// Heatmap row grouping.
    #[serde(default = "default_y_group_by")]
    pub y_group_by: GroupBy,

    /// Grouping of the scatter series.
    #[serde(default = "default_y_group_by")]
    pub scatter_group_by: GroupBy,

    /// Heatmap row ordering.
    #[serde(default)]
    pub sort_by: SortBy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            x_group_by: default_x_group_by(),
            y_group_by: default_y_group_by(),
            scatter_group_by: default_y_group_by(),
            sort_by: SortBy::default(),
        }
    }
}

fn default_metric() -> String {
    "ndcg".to_string()
}

fn default_x_group_by() -> GroupBy {
    GroupBy::ScenarioId
}

fn default_y_group_by() -> GroupBy {
    GroupBy::StrategyId
}

impl AggregationConfig {
    /// Heatmap settings derived from these defaults.
    pub fn heatmap(&self) -> HeatmapConfig {
        HeatmapConfig {
            metric: self.metric.clone(),
            x_group_by: self.x_group_by,
            y_group_by: self.y_group_by,
            y_sort_by: self.sort_by,
        }
    }

    /// Check the groupings, wherever they were set.
    pub fn validate(&self) -> Result<()> {
        if self.metric.trim().is_empty() {
            anyhow::bail!("aggregation.metric must not be empty");
        }
        if !self.x_group_by.is_scenario() {
            anyhow::bail!(
                "aggregation.x_group_by must be a scenario field, got {}",
                self.x_group_by
            );
        }
        if !self.y_group_by.is_strategy() {
            anyhow::bail!(
                "aggregation.y_group_by must be a strategy field, got {}",
                self.y_group_by
            );
        }
        if !self.scatter_group_by.is_strategy() {
            anyhow::bail!(
                "aggregation.scatter_group_by must be a strategy field, got {}",
                self.scatter_group_by
            );
        }
        Ok(())
    }
}

/// Evaluation file discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Maximum files loaded from one directory.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// File extensions to include.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Names to exclude.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            extensions: default_extensions(),
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_files() -> usize {
    100
}

fn default_extensions() -> Vec<String> {
    vec!["json".to_string()]
}

fn default_excludes() -> Vec<String> {
    vec!["node_modules", "target", "dist", "build"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024 // 64MB
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for metric values in Markdown.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// Shade heatmap cells with colour band glyphs.
    #[serde(default = "default_true")]
    pub color_bands: bool,

    /// Show runtime names instead of raw ids on heatmap axes.
    #[serde(default = "default_true")]
    pub use_labels: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            color_bands: true,
            use_labels: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_precision() -> usize {
    3
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only explicitly provided values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.api.concurrency = concurrency;
        }

        if let Some(ref metric) = args.metric {
            self.aggregation.metric = metric.clone();
        }
        if let Some(x) = args.x_group_by {
            self.aggregation.x_group_by = x;
        }
        if let Some(y) = args.y_group_by {
            self.aggregation.y_group_by = y;
        }
        if let Some(by) = args.sort_by {
            self.aggregation.sort_by.by = by;
        }
        if let Some(order) = args.sort_order {
            self.aggregation.sort_by.order = order;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
