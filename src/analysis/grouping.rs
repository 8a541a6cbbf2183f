//! Group key resolution and shared aggregation helpers.
//!
//! Strategies and scenarios are grouped either by their id or by their
//! tags. Tag grouping fans out: an entity carrying several tags contributes
//! to every one of those groups.

use crate::models::{Evaluation, GroupBy, Keyed, RuntimeAsset, SortBy, SortField};
use std::cmp::Ordering;
use tracing::debug;

/// Column key of the server-computed row average (summary-driven heatmap).
pub const AVERAGE_COLUMN: &str = "Average";

/// Column key of the locally computed row average (results-driven heatmap).
pub const RAW_AVERAGE_COLUMN: &str = "_avg";

/// Metrics considered for default table ordering, highest priority first.
pub const PRIORITY_METRICS: [&str; 3] = ["ndcg", "precision", "recall"];

/// Keys a strategy contributes to under the given grouping.
pub fn strategy_keys<'a>(evaluation: &'a Evaluation, strategy_id: &'a str, by: GroupBy) -> Vec<&'a str> {
    entity_keys(&evaluation.runtime.strategies, strategy_id, by.is_tag())
}

/// Keys a scenario contributes to under the given grouping.
pub fn scenario_keys<'a>(evaluation: &'a Evaluation, scenario_id: &'a str, by: GroupBy) -> Vec<&'a str> {
    entity_keys(&evaluation.runtime.scenarios, scenario_id, by.is_tag())
}

fn entity_keys<'a>(assets: &'a Keyed<RuntimeAsset>, id: &'a str, by_tag: bool) -> Vec<&'a str> {
    if !by_tag {
        return vec![id];
    }

    match assets.get(id) {
        Some(asset) => {
            let mut keys: Vec<&str> = Vec::with_capacity(asset.tags.len());
            for tag in &asset.tags {
                if !keys.contains(&tag.as_str()) {
                    keys.push(tag);
                }
            }
            if keys.is_empty() {
                debug!("{} has no tags, skipped in tag grouping", id);
            }
            keys
        }
        None => {
            debug!("{} missing from runtime snapshot, skipped in tag grouping", id);
            Vec::new()
        }
    }
}

/// Display name of a strategy, falling back to its raw id.
pub fn strategy_name<'a>(evaluation: &'a Evaluation, strategy_id: &'a str) -> &'a str {
    asset_name(&evaluation.runtime.strategies, strategy_id)
}

/// Display name of a scenario, falling back to its raw id.
pub fn scenario_name<'a>(evaluation: &'a Evaluation, scenario_id: &'a str) -> &'a str {
    asset_name(&evaluation.runtime.scenarios, scenario_id)
}

fn asset_name<'a>(assets: &'a Keyed<RuntimeAsset>, id: &'a str) -> &'a str {
    match assets.get(id).and_then(|asset| asset.name.as_deref()) {
        Some(name) => name,
        None => {
            debug!("No runtime name for {}, using raw id", id);
            id
        }
    }
}

/// Axis label for a group key. Tags and sentinels label as themselves.
pub fn axis_label<'a>(evaluation: &'a Evaluation, by: GroupBy, key: &'a str) -> &'a str {
    if key == AVERAGE_COLUMN || key == RAW_AVERAGE_COLUMN {
        return AVERAGE_COLUMN;
    }
    match by {
        GroupBy::StrategyId => strategy_name(evaluation, key),
        GroupBy::ScenarioId => scenario_name(evaluation, key),
        GroupBy::StrategyTag | GroupBy::ScenarioTag => key,
    }
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Stable sort by value or name.
///
/// Equal elements keep their original relative order in both directions.
/// Elements without a value always sort last.
pub fn sort_stable<T>(
    items: &mut [T],
    sort: SortBy,
    value: impl Fn(&T) -> Option<f64>,
    name: impl Fn(&T) -> &str,
) {
    items.sort_by(|a, b| match sort.by {
        SortField::Value => compare_values(value(a), value(b), sort),
        SortField::Name => sort.order.apply(name(a).cmp(name(b))),
    });
}

fn compare_values(a: Option<f64>, b: Option<f64>, sort: SortBy) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => sort.order.apply(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
