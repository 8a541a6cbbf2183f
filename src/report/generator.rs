//! Report generation.
//!
//! This module renders aggregated chart data as a Markdown report or as
//! JSON for chart widgets.

use crate::analysis::ColorScale;
use crate::config::ReportConfig;
use crate::models::{
    AggregatedCell, AxisLabel, EvaluationCharts, RankedRow, Report, ReportMetadata, ScatterPoint,
};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Placeholder for an absent heatmap cell.
const MISSING_CELL: &str = "–";

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Evaluation Charts\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    for charts in &report.evaluations {
        output.push_str(&generate_evaluation_section(charts, options));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Metric:** `{}`\n", metadata.metric));
    section.push_str(&format!(
        "- **Rows:** `{}` | **Columns:** `{}`\n",
        metadata.y_group_by, metadata.x_group_by
    ));
    section.push_str(&format!("- **Row Order:** {}\n", metadata.sort));
    section.push_str(&format!("- **Evaluations:** {}\n", metadata.evaluations));
    section.push('\n');

    section
}

/// Generate all sections for one evaluation.
fn generate_evaluation_section(charts: &EvaluationCharts, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", charts.evaluation_name));
    if let Some(ref id) = charts.evaluation_id {
        section.push_str(&format!("*Id: `{}`*", id));
        if let Some(ref status) = charts.status {
            section.push_str(&format!(" *| Status: {}*", status));
        }
        section.push_str("\n\n");
    }

    if charts.is_empty() {
        section.push_str("Results are not available yet for this evaluation.\n\n");
        return section;
    }

    if !charts.table.is_empty() {
        section.push_str(&generate_table_section(charts, options.precision));
    }
    if !charts.heatmap.is_empty() {
        section.push_str(&generate_heatmap_section(charts, options));
    }
    if !charts.scatter.is_empty() {
        section.push_str(&generate_scatter_section(charts, options));
    }

    section
}

/// Generate the ranked strategy table.
fn generate_table_section(charts: &EvaluationCharts, precision: usize) -> String {
    let mut section = String::new();

    section.push_str("### Strategies\n\n");
    section.push_str(&format!("*Sorted by {}*\n\n", charts.table_sort));

    let metrics = table_metric_columns(&charts.table);

    section.push_str("| # | Strategy | Tags |");
    for metric in &metrics {
        section.push_str(&format!(" {} |", metric));
    }
    section.push('\n');
    section.push_str("|---:|:---|:---|");
    for _ in &metrics {
        section.push_str(":---:|");
    }
    section.push('\n');

    for (rank, row) in charts.table.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} |",
            rank + 1,
            row.name,
            row.tags.join(", ")
        ));
        for metric in &metrics {
            let value = row
                .metrics
                .get(metric)
                .map(|v| format!("{:.prec$}", v, prec = precision))
                .unwrap_or_else(|| MISSING_CELL.to_string());
            section.push_str(&format!(" {} |", value));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Metric names across all rows, in order of first appearance.
fn table_metric_columns(rows: &[RankedRow]) -> Vec<&str> {
    let mut metrics: Vec<&str> = Vec::new();
    for row in rows {
        for name in row.metrics.keys() {
            if !metrics.contains(&name) {
                metrics.push(name);
            }
        }
    }
    metrics
}

/// Generate the heatmap grid.
fn generate_heatmap_section(charts: &EvaluationCharts, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("### Heatmap\n\n");

    let scale = if options.color_bands {
        ColorScale::from_values(charts.heatmap.iter().map(|c| c.value))
    } else {
        None
    };

    let display = |label: &AxisLabel| -> String {
        if options.use_labels {
            label.label.clone()
        } else {
            label.key.clone()
        }
    };

    section.push_str("| |");
    for x in &charts.x_labels {
        section.push_str(&format!(" {} |", display(x)));
    }
    section.push('\n');
    section.push_str("|:---|");
    for _ in &charts.x_labels {
        section.push_str(":---:|");
    }
    section.push('\n');

    let cells = index_cells(&charts.heatmap);
    for y in &charts.y_labels {
        section.push_str(&format!("| **{}** |", display(y)));
        for x in &charts.x_labels {
            let cell = cells.get(&(x.key.as_str(), y.key.as_str())).copied();
            let text = match (cell, scale) {
                (Some(cell), Some(scale)) => format!(
                    "{} {:.prec$}",
                    scale.band(cell.value),
                    cell.value,
                    prec = options.precision
                ),
                (Some(cell), None) => format!("{:.prec$}", cell.value, prec = options.precision),
                (None, _) => MISSING_CELL.to_string(),
            };
            section.push_str(&format!(" {} |", text));
        }
        section.push('\n');
    }
    section.push('\n');

    if let Some(scale) = scale {
        let points: Vec<String> = scale
            .breakpoints()
            .iter()
            .map(|p| format!("{:.prec$}", p, prec = options.precision))
            .collect();
        section.push_str(&format!("*Band breakpoints: {}*\n\n", points.join(" / ")));
    }

    section
}

/// Heatmap cells keyed by `(x, y)`.
fn index_cells(cells: &[AggregatedCell]) -> HashMap<(&str, &str), &AggregatedCell> {
    cells
        .iter()
        .map(|cell| ((cell.x.as_str(), cell.y.as_str()), cell))
        .collect()
}

/// Generate the scatter series listing.
fn generate_scatter_section(charts: &EvaluationCharts, options: &ReportConfig) -> String {
    let mut section = String::new();
    let precision = options.precision;

    section.push_str("### Precision / Recall\n\n");
    section.push_str("| Point | Precision | Recall | NDCG |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    let fmt = |v: Option<f64>| -> String {
        v.map(|v| format!("{:.prec$}", v, prec = precision))
            .unwrap_or_else(|| MISSING_CELL.to_string())
    };

    let name = |point: &ScatterPoint| -> String {
        let resolved = charts
            .scatter_labels
            .iter()
            .find(|l| l.key == point.label)
            .filter(|_| options.use_labels);
        match resolved {
            Some(label) => label.label.clone(),
            None => point.label.clone(),
        }
    };

    for point in &charts.scatter {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            name(point),
            fmt(point.precision),
            fmt(point.recall),
            fmt(point.ndcg)
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by evalcharts v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Save report content to a file.
pub fn save_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
