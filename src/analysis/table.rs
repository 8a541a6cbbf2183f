//! Ranked strategy table.
//!
//! Rows come from `summary.strategy_id`. The table starts sorted by the
//! highest-priority metric enabled for the evaluation's task; a sort the
//! user picked is never replaced by that default.

use super::grouping::{sort_stable, strategy_name, PRIORITY_METRICS};
use crate::models::{Evaluation, GroupBy, Keyed, RankedRow, SortBy, SortField, SortOrder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column a ranked table is sorted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "metric")]
pub enum TableSortKey {
    #[default]
    Name,
    Metric(String),
}

/// Current sort state of a ranked table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableSort {
    pub key: TableSortKey,
    pub order: SortOrder,
    /// Set once the user picked a sort; disables the automatic default.
    #[serde(default)]
    pub user_selected: bool,
}

impl Default for TableSort {
    fn default() -> Self {
        Self {
            key: TableSortKey::Name,
            order: SortOrder::Asc,
            user_selected: false,
        }
    }
}

impl TableSort {
    /// A sort explicitly chosen by the user.
    pub fn user(key: TableSortKey, order: SortOrder) -> Self {
        Self {
            key,
            order,
            user_selected: true,
        }
    }
}

impl fmt::Display for TableSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            SortOrder::Asc => "ascending",
            SortOrder::Desc => "descending",
        };
        match &self.key {
            TableSortKey::Name => write!(f, "name, {}", order),
            TableSortKey::Metric(metric) => write!(f, "{}, {}", metric, order),
        }
    }
}

/// One row per strategy of `summary.strategy_id`, in summary order.
pub fn build_ranked_table(evaluation: &Evaluation) -> Vec<RankedRow> {
    let rows = match evaluation
        .summary
        .as_ref()
        .and_then(|s| s.group(GroupBy::StrategyId))
    {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    rows.iter()
        .map(|(strategy_id, node)| {
            let metrics: Keyed<f64> = node
                .total
                .metrics
                .iter()
                .filter_map(|(name, stat)| stat.avg.map(|avg| (name.to_string(), avg)))
                .collect();

            let tags = evaluation
                .runtime
                .strategies
                .get(strategy_id)
                .map(|asset| asset.tags.clone())
                .unwrap_or_default();

            RankedRow {
                strategy_id: strategy_id.to_string(),
                name: strategy_name(evaluation, strategy_id).to_string(),
                tags,
                metrics,
            }
        })
        .collect()
}

/// The sort a freshly opened table uses for this evaluation.
///
/// First metric of the priority list that the task enables, descending;
/// name ascending when none applies.
pub fn default_table_sort(evaluation: &Evaluation) -> TableSort {
    let enabled = evaluation.enabled_metrics();

    PRIORITY_METRICS
        .iter()
        .find(|metric| enabled.iter().any(|m| m == *metric))
        .map(|metric| TableSort {
            key: TableSortKey::Metric(metric.to_string()),
            order: SortOrder::Desc,
            user_selected: false,
        })
        .unwrap_or_default()
}

/// Resolve the sort to apply given the table's current sort state.
///
/// The automatic default only replaces the implicit name sort; anything
/// the user selected is returned unchanged.
pub fn resolve_table_sort(current: Option<&TableSort>, evaluation: &Evaluation) -> TableSort {
    match current {
        Some(sort) if sort.user_selected || sort.key != TableSortKey::Name => sort.clone(),
        _ => default_table_sort(evaluation),
    }
}

/// Stable sort of table rows. Rows without the sort metric go last.
pub fn sort_ranked_rows(rows: &mut [RankedRow], sort: &TableSort) {
    match &sort.key {
        TableSortKey::Name => {
            let by = SortBy {
                by: SortField::Name,
                order: sort.order,
            };
            sort_stable(rows, by, |_| None, |r| r.name.as_str());
        }
        TableSortKey::Metric(metric) => {
            let by = SortBy {
                by: SortField::Value,
                order: sort.order,
            };
            sort_stable(rows, by, |r| r.metrics.get(metric).copied(), |r| r.name.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(task_metrics: &str) -> Evaluation {
        let json = format!(
            r#"{{
                "task": {{"metrics": {}}},
                "runtime": {{"strategies": {{
                    "s1": {{"name": "BM25", "tags": ["Lexical"]}},
                    "s2": {{"name": "Dense"}}
                }}}},
                "summary": {{"strategy_id": {{
                    "s1": {{"_total": {{"metrics": {{"ndcg": {{"avg": 0.4}}, "recall": {{"avg": 0.9}}}}}}}},
                    "s2": {{"_total": {{"metrics": {{"ndcg": {{"avg": 0.8}}, "recall": {{"avg": 0.3}}}}}}}},
                    "ghost": {{"_total": {{"metrics": {{"ndcg": {{"avg": 0.6}}}}}}}}
                }}}}
            }}"#,
            task_metrics
        );
        serde_json::from_str(&json).unwrap()
    }

    fn ids(rows: &[RankedRow]) -> Vec<&str> {
        rows.iter().map(|r| r.strategy_id.as_str()).collect()
    }

    #[test]
    fn test_build_ranked_table() {
        let eval = evaluation(r#"["ndcg"]"#);
        let rows = build_ranked_table(&eval);

        assert_eq!(ids(&rows), vec!["s1", "s2", "ghost"]);
        assert_eq!(rows[0].name, "BM25");
        assert_eq!(rows[0].tags, vec!["Lexical".to_string()]);
        assert_eq!(rows[0].metrics.get("recall"), Some(&0.9));
        assert!(rows[1].tags.is_empty());
    }

    #[test]
    fn test_unresolved_strategy_uses_raw_id() {
        let eval = evaluation(r#"["ndcg"]"#);
        let rows = build_ranked_table(&eval);
        assert_eq!(rows[2].name, "ghost");
        assert!(rows[2].tags.is_empty());
    }

    #[test]
    fn test_default_sort_prefers_priority_metric() {
        let eval = evaluation(r#"["recall", "ndcg"]"#);
        let sort = default_table_sort(&eval);
        assert_eq!(sort.key, TableSortKey::Metric("ndcg".to_string()));
        assert_eq!(sort.order, SortOrder::Desc);

        let mut rows = build_ranked_table(&eval);
        sort_ranked_rows(&mut rows, &sort);
        assert_eq!(ids(&rows), vec!["s2", "ghost", "s1"]);
    }

    #[test]
    fn test_default_sort_falls_back_to_name() {
        let eval = evaluation(r#"["mrr"]"#);
        let sort = default_table_sort(&eval);
        assert_eq!(sort, TableSort::default());

        let mut rows = build_ranked_table(&eval);
        sort_ranked_rows(&mut rows, &sort);
        assert_eq!(ids(&rows), vec!["s1", "s2", "ghost"]);
    }

    #[test]
    fn test_user_sort_is_not_overridden() {
        let eval = evaluation(r#"["ndcg"]"#);

        let implicit = TableSort::default();
        assert_eq!(
            resolve_table_sort(Some(&implicit), &eval).key,
            TableSortKey::Metric("ndcg".to_string())
        );
        assert_eq!(
            resolve_table_sort(None, &eval).key,
            TableSortKey::Metric("ndcg".to_string())
        );

        let by_name = TableSort::user(TableSortKey::Name, SortOrder::Desc);
        assert_eq!(resolve_table_sort(Some(&by_name), &eval), by_name);

        let by_recall = TableSort::user(TableSortKey::Metric("recall".to_string()), SortOrder::Asc);
        assert_eq!(resolve_table_sort(Some(&by_recall), &eval), by_recall);
    }

    #[test]
    fn test_rows_missing_metric_sort_last() {
        let eval = evaluation(r#"["ndcg"]"#);
        let mut rows = build_ranked_table(&eval);
        let sort = TableSort::user(TableSortKey::Metric("recall".to_string()), SortOrder::Asc);
        sort_ranked_rows(&mut rows, &sort);
        assert_eq!(ids(&rows), vec!["s2", "s1", "ghost"]);
    }

    #[test]
    fn test_table_without_summary_is_empty() {
        let eval: Evaluation = serde_json::from_str("{}").unwrap();
        assert!(build_ranked_table(&eval).is_empty());
    }
}
