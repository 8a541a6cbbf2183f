//! Heatmap matrix construction.
//!
//! The matrix is built from the server-side summary whenever the summary
//! carries the requested row grouping. Groupings the summary doesn't
//! precompute are derived from the raw per-search results instead.

use super::grouping::{
    axis_label, mean, scenario_keys, sort_stable, strategy_keys, AVERAGE_COLUMN,
    RAW_AVERAGE_COLUMN,
};
use crate::models::{
    AggregatedCell, AxisLabel, Evaluation, GroupBy, Keyed, SortBy, StrategyResult, SummaryNode,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Heatmap settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Metric to plot.
    pub metric: String,
    /// Column grouping (a scenario field).
    pub x_group_by: GroupBy,
    /// Row grouping (a strategy field).
    pub y_group_by: GroupBy,
    /// Row ordering.
    pub y_sort_by: SortBy,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            metric: "ndcg".to_string(),
            x_group_by: GroupBy::ScenarioId,
            y_group_by: GroupBy::StrategyId,
            y_sort_by: SortBy::default(),
        }
    }
}

/// Algorithm used to build a heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatmapVariant {
    /// Built from `summary[y_group_by]`.
    Summary,
    /// Built by grouping `results` locally.
    Results,
}

/// Pick the algorithm for this evaluation, or `None` if nothing is loaded.
pub fn select_variant(evaluation: &Evaluation, config: &HeatmapConfig) -> Option<HeatmapVariant> {
    let has_summary_rows = evaluation
        .summary
        .as_ref()
        .and_then(|s| s.group(config.y_group_by))
        .is_some();

    if has_summary_rows {
        Some(HeatmapVariant::Summary)
    } else if evaluation.results.is_some() {
        Some(HeatmapVariant::Results)
    } else {
        None
    }
}

/// Build the ordered heatmap cells for an evaluation.
///
/// Returns an empty sequence while the evaluation has neither `results`
/// nor `summary`. Each `(x, y)` pair appears at most once.
pub fn build_heatmap_matrix(evaluation: &Evaluation, config: &HeatmapConfig) -> Vec<AggregatedCell> {
    match select_variant(evaluation, config) {
        Some(HeatmapVariant::Summary) => {
            let rows = evaluation
                .summary
                .as_ref()
                .and_then(|s| s.group(config.y_group_by));
            match rows {
                Some(rows) => build_from_summary(evaluation, rows, config),
                None => Vec::new(),
            }
        }
        Some(HeatmapVariant::Results) => match evaluation.results.as_deref() {
            Some(results) => build_from_results(evaluation, results, config),
            None => Vec::new(),
        },
        None => Vec::new(),
    }
}

/// Axis labels for every x and y key present in `cells`, in order of first
/// appearance.
pub fn axis_labels(
    evaluation: &Evaluation,
    config: &HeatmapConfig,
    cells: &[AggregatedCell],
) -> (Vec<AxisLabel>, Vec<AxisLabel>) {
    let mut xs: Vec<AxisLabel> = Vec::new();
    let mut ys: Vec<AxisLabel> = Vec::new();

    for cell in cells {
        if !xs.iter().any(|l| l.key == cell.x) {
            xs.push(AxisLabel {
                key: cell.x.clone(),
                label: axis_label(evaluation, config.x_group_by, &cell.x).to_string(),
            });
        }
        if !ys.iter().any(|l| l.key == cell.y) {
            ys.push(AxisLabel {
                key: cell.y.clone(),
                label: axis_label(evaluation, config.y_group_by, &cell.y).to_string(),
            });
        }
    }

    (xs, ys)
}

/// Cells of one heatmap row, kept together while rows are sorted.
struct RowGroup<'a> {
    label: &'a str,
    average: Option<f64>,
    cells: Vec<AggregatedCell>,
}

fn build_from_summary(
    evaluation: &Evaluation,
    rows: &Keyed<SummaryNode>,
    config: &HeatmapConfig,
) -> Vec<AggregatedCell> {
    let metric = config.metric.as_str();
    debug!("Building {} heatmap rows from summary.{}", rows.len(), config.y_group_by);

    let mut groups: Vec<RowGroup<'_>> = rows
        .iter()
        .map(|(y, node)| {
            let average = node.total.avg(metric);
            let mut cells = Vec::new();

            if let Some(value) = average {
                cells.push(AggregatedCell::new(AVERAGE_COLUMN, y, value));
            }

            if let Some(columns) = node.breakdown(config.x_group_by) {
                for (x, column) in columns.iter() {
                    if x == AVERAGE_COLUMN {
                        debug!("Column key collides with the average sentinel in row {}", y);
                        continue;
                    }
                    if let Some(value) = column.avg(metric) {
                        cells.push(AggregatedCell::new(x, y, value));
                    }
                }
            }

            RowGroup {
                label: axis_label(evaluation, config.y_group_by, y),
                average,
                cells,
            }
        })
        .collect();

    sort_stable(&mut groups, config.y_sort_by, |g| g.average, |g| g.label);

    groups.into_iter().flat_map(|g| g.cells).collect()
}

/// One row of the results-driven matrix after averaging.
struct AveragedRow<'a> {
    key: &'a str,
    label: &'a str,
    average: Option<f64>,
    cells: Keyed<f64>,
}

/// One column of the results-driven matrix.
struct Column<'a> {
    key: &'a str,
    label: &'a str,
    average: Option<f64>,
}

fn build_from_results(
    evaluation: &Evaluation,
    results: &[StrategyResult],
    config: &HeatmapConfig,
) -> Vec<AggregatedCell> {
    let metric = config.metric.as_str();
    let mut groups: Keyed<Keyed<Vec<f64>>> = Keyed::new();

    for result in results {
        let y_keys = strategy_keys(evaluation, &result.strategy_id, config.y_group_by);
        if y_keys.is_empty() {
            continue;
        }

        for search in &result.searches {
            let scenario_id = match search.scenario_id.as_deref().or(result.scenario_id.as_deref()) {
                Some(id) => id,
                None => {
                    debug!("Search of {} has no scenario id, skipped", result.strategy_id);
                    continue;
                }
            };

            let value = match search.metrics.get(metric).and_then(|s| s.value()) {
                Some(v) => v,
                None => continue,
            };

            let x_keys = scenario_keys(evaluation, scenario_id, config.x_group_by);
            for y in &y_keys {
                let row = groups.entry_or_default(y);
                for x in &x_keys {
                    if *x == RAW_AVERAGE_COLUMN {
                        debug!("Column key collides with the average sentinel in row {}", y);
                        continue;
                    }
                    row.entry_or_default(x).push(value);
                }
            }
        }
    }

    let mut rows: Vec<AveragedRow<'_>> = groups
        .iter()
        .map(|(y, cells)| {
            let cells: Keyed<f64> = cells
                .iter()
                .filter_map(|(x, values)| mean(values).map(|m| (x.to_string(), m)))
                .collect();
            let values: Vec<f64> = cells.iter().map(|(_, v)| *v).collect();
            AveragedRow {
                key: y,
                label: axis_label(evaluation, config.y_group_by, y),
                average: mean(&values),
                cells,
            }
        })
        .collect();

    let mut columns: Vec<Column<'_>> = Vec::new();
    for (_, cells) in groups.iter() {
        for x in cells.keys() {
            if columns.iter().any(|c| c.key == x) {
                continue;
            }
            let values: Vec<f64> = rows.iter().filter_map(|r| r.cells.get(x).copied()).collect();
            columns.push(Column {
                key: x,
                label: axis_label(evaluation, config.x_group_by, x),
                average: mean(&values),
            });
        }
    }

    sort_stable(&mut rows, config.y_sort_by, |r| r.average, |r| r.label);
    sort_stable(&mut columns, config.y_sort_by, |c| c.average, |c| c.label);

    let mut output = Vec::new();
    for row in &rows {
        if let Some(average) = row.average {
            output.push(AggregatedCell::new(RAW_AVERAGE_COLUMN, row.key, average));
        }
        for column in &columns {
            if let Some(value) = row.cells.get(column.key) {
                output.push(AggregatedCell::new(column.key, row.key, *value));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortField, SortOrder};

    fn parse(json: &str) -> Evaluation {
        serde_json::from_str(json).unwrap()
    }

    fn cells_of(cells: &[AggregatedCell]) -> Vec<(&str, &str)> {
        cells.iter().map(|c| (c.x.as_str(), c.y.as_str())).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn summary_evaluation() -> Evaluation {
        parse(
            r#"{
                "summary": {
                    "strategy_id": {
                        "s1": {
                            "_total": {"metrics": {"ndcg": {"avg": 0.9}}},
                            "by_scenario_id": {"sc1": {"metrics": {"ndcg": {"avg": 0.9}}}}
                        },
                        "s2": {
                            "_total": {"metrics": {"ndcg": {"avg": 0.4}}},
                            "by_scenario_id": {"sc1": {"metrics": {"ndcg": {"avg": 0.4}}}}
                        }
                    }
                }
            }"#,
        )
    }

    fn descending() -> HeatmapConfig {
        HeatmapConfig {
            y_sort_by: SortBy { by: SortField::Value, order: SortOrder::Desc },
            ..HeatmapConfig::default()
        }
    }

    #[test]
    fn test_summary_end_to_end_order() {
        let eval = summary_evaluation();
        let cells = build_heatmap_matrix(&eval, &descending());

        assert_eq!(
            cells,
            vec![
                AggregatedCell::new("Average", "s1", 0.9),
                AggregatedCell::new("sc1", "s1", 0.9),
                AggregatedCell::new("Average", "s2", 0.4),
                AggregatedCell::new("sc1", "s2", 0.4),
            ]
        );
    }

    #[test]
    fn test_summary_ascending_reverses_rows() {
        let eval = summary_evaluation();
        let config = HeatmapConfig {
            y_sort_by: SortBy { by: SortField::Value, order: SortOrder::Asc },
            ..HeatmapConfig::default()
        };
        let cells = build_heatmap_matrix(&eval, &config);
        assert_eq!(
            cells_of(&cells),
            vec![("Average", "s2"), ("sc1", "s2"), ("Average", "s1"), ("sc1", "s1")]
        );
    }

    #[test]
    fn test_summary_average_is_not_recomputed() {
        let eval = parse(
            r#"{
                "summary": {"strategy_id": {
                    "s1": {
                        "_total": {"metrics": {"ndcg": {"avg": 0.75}}},
                        "by_scenario_id": {
                            "a": {"metrics": {"ndcg": {"avg": 0.1}}},
                            "b": {"metrics": {"ndcg": {"avg": 0.2}}}
                        }
                    }
                }}
            }"#,
        );
        let cells = build_heatmap_matrix(&eval, &descending());
        assert_eq!(cells[0], AggregatedCell::new("Average", "s1", 0.75));
        assert_eq!(cells_of(&cells), vec![("Average", "s1"), ("a", "s1"), ("b", "s1")]);
    }

    #[test]
    fn test_summary_rows_complete() {
        let eval = parse(
            r#"{
                "summary": {"strategy_id": {
                    "s1": {"_total": {"metrics": {"ndcg": {"avg": 0.3}}}},
                    "s2": {"_total": {"metrics": {"ndcg": {"avg": 0.8}}}},
                    "s3": {"_total": {"metrics": {"ndcg": {"avg": 0.5}}}}
                }}
            }"#,
        );
        let cells = build_heatmap_matrix(&eval, &descending());
        let mut rows: Vec<&str> = cells.iter().map(|c| c.y.as_str()).collect();
        assert_eq!(rows, vec!["s2", "s3", "s1"]);
        rows.sort();
        assert_eq!(rows, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_summary_ties_keep_key_order() {
        let eval = parse(
            r#"{
                "summary": {"strategy_id": {
                    "b": {"_total": {"metrics": {"ndcg": {"avg": 0.5}}}},
                    "a": {"_total": {"metrics": {"ndcg": {"avg": 0.5}}}}
                }}
            }"#,
        );

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let config = HeatmapConfig {
                y_sort_by: SortBy { by: SortField::Value, order },
                ..HeatmapConfig::default()
            };
            let cells = build_heatmap_matrix(&eval, &config);
            assert_eq!(cells_of(&cells), vec![("Average", "b"), ("Average", "a")]);
        }
    }

    #[test]
    fn test_summary_sort_by_name_uses_labels() {
        let eval = parse(
            r#"{
                "runtime": {"strategies": {
                    "s1": {"name": "Zebra"},
                    "s2": {"name": "Aardvark"}
                }},
                "summary": {"strategy_id": {
                    "s1": {"_total": {"metrics": {"ndcg": {"avg": 0.9}}}},
                    "s2": {"_total": {"metrics": {"ndcg": {"avg": 0.1}}}}
                }}
            }"#,
        );
        let config = HeatmapConfig {
            y_sort_by: SortBy { by: SortField::Name, order: SortOrder::Asc },
            ..HeatmapConfig::default()
        };
        let cells = build_heatmap_matrix(&eval, &config);
        assert_eq!(cells_of(&cells), vec![("Average", "s2"), ("Average", "s1")]);
    }

    #[test]
    fn test_summary_missing_metric_values_are_omitted() {
        let eval = parse(
            r#"{
                "summary": {"strategy_id": {
                    "s1": {
                        "_total": {"metrics": {"recall": {"avg": 0.5}}},
                        "by_scenario_id": {
                            "a": {"metrics": {"ndcg": {"avg": 0.3}}},
                            "b": {"metrics": {"recall": {"avg": 0.2}}}
                        }
                    },
                    "s2": {"_total": {"metrics": {"ndcg": {"avg": 0.1}}}}
                }}
            }"#,
        );
        let cells = build_heatmap_matrix(&eval, &descending());
        assert_eq!(cells_of(&cells), vec![("Average", "s2"), ("a", "s1")]);
        assert!(cells.iter().all(|c| c.value.is_finite()));
    }

    #[test]
    fn test_empty_evaluation_yields_no_cells() {
        let eval = parse("{}");
        assert!(build_heatmap_matrix(&eval, &HeatmapConfig::default()).is_empty());
        assert_eq!(select_variant(&eval, &HeatmapConfig::default()), None);
    }

    #[test]
    fn test_determinism() {
        let eval = summary_evaluation();
        let config = descending();
        assert_eq!(build_heatmap_matrix(&eval, &config), build_heatmap_matrix(&eval, &config));

        let raw = results_evaluation();
        let config = HeatmapConfig {
            y_group_by: GroupBy::StrategyTag,
            ..descending()
        };
        assert_eq!(build_heatmap_matrix(&raw, &config), build_heatmap_matrix(&raw, &config));
    }

    fn results_evaluation() -> Evaluation {
        parse(
            r#"{
                "runtime": {
                    "strategies": {
                        "s1": {"name": "Hybrid BM25", "tags": ["Lexical", "Hybrid"]},
                        "s2": {"name": "kNN", "tags": ["Vector"]}
                    },
                    "scenarios": {
                        "sc1": {"name": "Shoes", "tags": ["retail", "short"]},
                        "sc2": {"name": "Boots", "tags": ["retail"]}
                    }
                },
                "results": [
                    {"strategy_id": "s1", "searches": [
                        {"scenario_id": "sc1", "metrics": {"ndcg": 0.8}},
                        {"scenario_id": "sc2", "metrics": {"ndcg": 0.4}}
                    ]},
                    {"strategy_id": "s2", "searches": [
                        {"scenario_id": "sc1", "metrics": {"ndcg": 0.2}},
                        {"scenario_id": "sc2", "metrics": {"ndcg": "oops"}}
                    ]}
                ]
            }"#,
        )
    }

    #[test]
    fn test_results_variant_selected_without_summary() {
        let eval = results_evaluation();
        assert_eq!(
            select_variant(&eval, &HeatmapConfig::default()),
            Some(HeatmapVariant::Results)
        );
    }

    #[test]
    fn test_results_strategy_tag_fan_out() {
        let eval = parse(
            r#"{
                "runtime": {"strategies": {"s1": {"tags": ["Lexical", "Hybrid"]}}},
                "results": [
                    {"strategy_id": "s1", "searches": [
                        {"scenario_id": "sc1", "metrics": {"ndcg": 0.8}}
                    ]}
                ]
            }"#,
        );
        let config = HeatmapConfig {
            y_group_by: GroupBy::StrategyTag,
            ..descending()
        };
        let cells = build_heatmap_matrix(&eval, &config);
        let data: Vec<&AggregatedCell> = cells.iter().filter(|c| c.x != RAW_AVERAGE_COLUMN).collect();

        assert_eq!(data.len(), 2);
        assert!(data.iter().any(|c| c.x == "sc1" && c.y == "Lexical" && approx(c.value, 0.8)));
        assert!(data.iter().any(|c| c.x == "sc1" && c.y == "Hybrid" && approx(c.value, 0.8)));
    }

    #[test]
    fn test_results_average_over_multiple_searches() {
        let eval = parse(
            r#"{
                "runtime": {"scenarios": {
                    "a": {"tags": ["t"]}, "b": {"tags": ["t"]}, "c": {"tags": ["t"]}
                }},
                "results": [
                    {"strategy_id": "s1", "searches": [
                        {"scenario_id": "a", "metrics": {"ndcg": 0.2}},
                        {"scenario_id": "b", "metrics": {"ndcg": 0.6}},
                        {"scenario_id": "c", "metrics": {"ndcg": 1.0}}
                    ]}
                ]
            }"#,
        );
        let config = HeatmapConfig {
            x_group_by: GroupBy::ScenarioTag,
            ..descending()
        };
        let cells = build_heatmap_matrix(&eval, &config);

        assert_eq!(cells_of(&cells), vec![("_avg", "s1"), ("t", "s1")]);
        assert!(approx(cells[1].value, 0.6));
        assert!(approx(cells[0].value, 0.6));
    }

    #[test]
    fn test_results_row_and_column_order() {
        let eval = results_evaluation();
        let cells = build_heatmap_matrix(&eval, &descending());

        // s1 averages 0.6, s2 only has sc1 = 0.2 (the malformed value is dropped).
        // sc1 averages 0.5 across rows, sc2 0.4.
        assert_eq!(
            cells_of(&cells),
            vec![
                ("_avg", "s1"),
                ("sc1", "s1"),
                ("sc2", "s1"),
                ("_avg", "s2"),
                ("sc1", "s2"),
            ]
        );
        assert!(approx(cells[0].value, 0.6));
        assert!(approx(cells[3].value, 0.2));
    }

    #[test]
    fn test_results_ascending_orders_columns_too() {
        let eval = results_evaluation();
        let config = HeatmapConfig {
            y_sort_by: SortBy { by: SortField::Value, order: SortOrder::Asc },
            ..HeatmapConfig::default()
        };
        let cells = build_heatmap_matrix(&eval, &config);
        assert_eq!(
            cells_of(&cells),
            vec![
                ("_avg", "s2"),
                ("sc1", "s2"),
                ("_avg", "s1"),
                ("sc2", "s1"),
                ("sc1", "s1"),
            ]
        );
    }

    #[test]
    fn test_results_cells_are_unique() {
        let eval = results_evaluation();
        let config = HeatmapConfig {
            x_group_by: GroupBy::ScenarioTag,
            y_group_by: GroupBy::StrategyTag,
            ..descending()
        };
        let cells = build_heatmap_matrix(&eval, &config);
        let mut pairs = cells_of(&cells);
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total);

        // Lexical/retail collects sc1 and sc2 of s1: (0.8 + 0.4) / 2.
        let lexical_retail = cells.iter().find(|c| c.y == "Lexical" && c.x == "retail").unwrap();
        assert!(approx(lexical_retail.value, 0.6));
    }

    #[test]
    fn test_results_column_named_like_average_is_dropped() {
        let eval = parse(
            r#"{
                "runtime": {"scenarios": {
                    "sc1": {"tags": ["_avg"]},
                    "sc2": {"tags": ["_avg", "retail"]}
                }},
                "results": [
                    {"strategy_id": "s1", "searches": [
                        {"scenario_id": "sc1", "metrics": {"ndcg": 0.8}},
                        {"scenario_id": "sc2", "metrics": {"ndcg": 0.4}}
                    ]}
                ]
            }"#,
        );
        let config = HeatmapConfig {
            x_group_by: GroupBy::ScenarioTag,
            ..descending()
        };
        let cells = build_heatmap_matrix(&eval, &config);

        assert_eq!(
            cells,
            vec![
                AggregatedCell::new("_avg", "s1", 0.4),
                AggregatedCell::new("retail", "s1", 0.4),
            ]
        );
    }

    #[test]
    fn test_results_only_average_sentinel_tags_yield_no_cells() {
        let eval = parse(
            r#"{
                "runtime": {"scenarios": {"sc1": {"tags": ["_avg"]}}},
                "results": [
                    {"strategy_id": "s1", "searches": [
                        {"scenario_id": "sc1", "metrics": {"ndcg": 0.8}}
                    ]}
                ]
            }"#,
        );
        let config = HeatmapConfig {
            x_group_by: GroupBy::ScenarioTag,
            ..descending()
        };
        assert!(build_heatmap_matrix(&eval, &config).is_empty());
    }

    #[test]
    fn test_results_scenario_id_falls_back_to_result() {
        let eval = parse(
            r#"{
                "results": [
                    {"strategy_id": "s1", "scenario_id": "sc9", "searches": [
                        {"metrics": {"ndcg": 0.3}}
                    ]}
                ]
            }"#,
        );
        let cells = build_heatmap_matrix(&eval, &descending());
        assert_eq!(cells_of(&cells), vec![("_avg", "s1"), ("sc9", "s1")]);
    }

    #[test]
    fn test_tag_grouping_falls_back_to_results_when_summary_lacks_it() {
        let mut eval = results_evaluation();
        eval.summary = summary_evaluation().summary;
        let config = HeatmapConfig {
            y_group_by: GroupBy::StrategyTag,
            ..descending()
        };
        assert_eq!(select_variant(&eval, &config), Some(HeatmapVariant::Results));
        assert_eq!(select_variant(&eval, &descending()), Some(HeatmapVariant::Summary));
    }

    #[test]
    fn test_axis_labels_use_runtime_names() {
        let eval = results_evaluation();
        let config = descending();
        let cells = build_heatmap_matrix(&eval, &config);
        let (xs, ys) = axis_labels(&eval, &config, &cells);

        let x_labels: Vec<&str> = xs.iter().map(|l| l.label.as_str()).collect();
        let y_labels: Vec<&str> = ys.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(x_labels, vec!["Average", "Shoes", "Boots"]);
        assert_eq!(y_labels, vec!["Hybrid BM25", "kNN"]);
    }
}
