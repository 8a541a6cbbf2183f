//! Scatter/bubble series built from the summary totals.

use super::grouping::axis_label;
use crate::models::{AxisLabel, Evaluation, GroupBy, ScatterPoint};

/// One point per key of `summary[group_by]`, in summary order.
///
/// Points are positioned by recall/precision and sized by ndcg; values come
/// straight from `_total.metrics.*.avg` without further aggregation.
pub fn build_scatter_series(evaluation: &Evaluation, group_by: GroupBy) -> Vec<ScatterPoint> {
    let rows = match evaluation.summary.as_ref().and_then(|s| s.group(group_by)) {
        Some(rows) => rows,
        None => return Vec::new(),
    };

    rows.iter()
        .map(|(key, node)| ScatterPoint {
            label: key.to_string(),
            ndcg: node.total.avg("ndcg"),
            precision: node.total.avg("precision"),
            recall: node.total.avg("recall"),
        })
        .collect()
}

/// Display labels for scatter points, with the raw key as fallback.
pub fn scatter_labels(
    evaluation: &Evaluation,
    group_by: GroupBy,
    points: &[ScatterPoint],
) -> Vec<AxisLabel> {
    points
        .iter()
        .map(|point| AxisLabel {
            key: point.label.clone(),
            label: axis_label(evaluation, group_by, &point.label).to_string(),
        })
        .collect()
}
