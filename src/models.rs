//! Data models for evaluation documents and chart output.
//!
//! The input side mirrors the evaluation document returned by the backend:
//! per-strategy search results, a precomputed summary, and the runtime
//! snapshot of strategies and scenarios. The output side holds the
//! chart-ready records produced by the aggregator.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// Deserialize an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A string-keyed map that keeps the key order of the source document.
///
/// Row and column ordering of the heatmap depends on the order in which keys
/// appear in the evaluation document, so plain hash maps are not an option.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T>(Vec<(String, T)>);

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Keyed<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert a value, replacing an existing entry in place.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T: Default> Keyed<T> {
    /// Get the entry for `key`, appending a default value if it is new.
    pub fn entry_or_default(&mut self, key: &str) -> &mut T {
        let idx = match self.0.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.0.push((key.to_string(), T::default()));
                self.0.len() - 1
            }
        };
        &mut self.0[idx].1
    }
}

impl<T> FromIterator<(String, T)> for Keyed<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut map = Keyed::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<T: Serialize> Serialize for Keyed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct KeyedVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for KeyedVisitor<T> {
    type Value = Keyed<T>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = Keyed::new();
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Keyed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(KeyedVisitor(PhantomData))
    }
}

/// A metric score as found in a search result.
///
/// Missing or non-numeric values deserialize to `Score(None)` instead of
/// failing the whole document; they are excluded from averaging.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Score(pub Option<f64>);

impl Score {
    pub fn value(&self) -> Option<f64> {
        self.0
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Score(value.as_f64().filter(|v| v.is_finite())))
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_none(),
        }
    }
}

/// Aggregated statistics of one metric in a summary node (`{"avg": ...}`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricStat {
    pub avg: Option<f64>,
}

impl<'de> Deserialize<'de> for MetricStat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let avg = value
            .get("avg")
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite());
        Ok(MetricStat { avg })
    }
}

/// A node carrying `metrics[name].avg` values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsNode {
    #[serde(default)]
    pub metrics: Keyed<MetricStat>,
}

impl MetricsNode {
    /// Average of the given metric, if present and numeric.
    pub fn avg(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).and_then(|stat| stat.avg)
    }
}

/// Field an evaluation can be grouped by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[value(name = "scenario_id")]
    ScenarioId,
    #[value(name = "scenario_tag")]
    ScenarioTag,
    #[value(name = "strategy_id")]
    StrategyId,
    #[value(name = "strategy_tag")]
    StrategyTag,
}

impl GroupBy {
    /// Field name as used in the evaluation document.
    pub fn field_name(&self) -> &'static str {
        match self {
            GroupBy::ScenarioId => "scenario_id",
            GroupBy::ScenarioTag => "scenario_tag",
            GroupBy::StrategyId => "strategy_id",
            GroupBy::StrategyTag => "strategy_tag",
        }
    }

    pub fn is_strategy(&self) -> bool {
        matches!(self, GroupBy::StrategyId | GroupBy::StrategyTag)
    }

    pub fn is_scenario(&self) -> bool {
        !self.is_strategy()
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, GroupBy::ScenarioTag | GroupBy::StrategyTag)
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// What a sort compares.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    /// Sort by the average metric value
    #[default]
    Value,
    /// Sort by display name
    Name,
}

/// Sort direction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Orient an ascending comparison according to this direction.
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Sort selection for a chart axis or table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortBy {
    #[serde(default)]
    pub by: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by = match self.by {
            SortField::Value => "value",
            SortField::Name => "name",
        };
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        write!(f, "{} {}", by, order)
    }
}

/// A strategy or scenario as captured in the runtime snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuntimeAsset {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// Point-in-time snapshot of the assets an evaluation ran with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Runtime {
    #[serde(default, deserialize_with = "null_as_default")]
    pub strategies: Keyed<RuntimeAsset>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenarios: Keyed<RuntimeAsset>,
}

/// The task an evaluation was run for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    /// Metrics enabled for this task.
    #[serde(default, deserialize_with = "null_as_default")]
    pub metrics: Vec<String>,
}

/// Outcome of one search (one scenario run against one strategy).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub metrics: Keyed<Score>,
}

/// All searches run for one strategy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy_id: String,
    /// Scenario the searches belong to when they don't name one themselves.
    #[serde(default)]
    pub scenario_id: Option<String>,
    #[serde(default)]
    pub searches: Vec<SearchOutcome>,
}

/// One row of `summary[group_field]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryNode {
    #[serde(rename = "_total", default)]
    pub total: MetricsNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_scenario_id: Option<Keyed<MetricsNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_scenario_tag: Option<Keyed<MetricsNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_strategy_id: Option<Keyed<MetricsNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_strategy_tag: Option<Keyed<MetricsNode>>,
}

impl SummaryNode {
    /// The `by_<field>` breakdown of this node.
    pub fn breakdown(&self, by: GroupBy) -> Option<&Keyed<MetricsNode>> {
        match by {
            GroupBy::ScenarioId => self.by_scenario_id.as_ref(),
            GroupBy::ScenarioTag => self.by_scenario_tag.as_ref(),
            GroupBy::StrategyId => self.by_strategy_id.as_ref(),
            GroupBy::StrategyTag => self.by_strategy_tag.as_ref(),
        }
    }
}

/// Server-side aggregates, keyed by group field then group key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_id: Option<Keyed<SummaryNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_tag: Option<Keyed<SummaryNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<Keyed<SummaryNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_tag: Option<Keyed<SummaryNode>>,
}

impl Summary {
    pub fn group(&self, by: GroupBy) -> Option<&Keyed<SummaryNode>> {
        match by {
            GroupBy::StrategyId => self.strategy_id.as_ref(),
            GroupBy::StrategyTag => self.strategy_tag.as_ref(),
            GroupBy::ScenarioId => self.scenario_id.as_ref(),
            GroupBy::ScenarioTag => self.scenario_tag.as_ref(),
        }
    }
}

/// An evaluation document as returned by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub task: Option<Task>,
    #[serde(default)]
    pub results: Option<Vec<StrategyResult>>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub runtime: Runtime,
}

impl Evaluation {
    /// Whether the document carries anything to aggregate yet.
    pub fn is_loaded(&self) -> bool {
        self.results.is_some() || self.summary.is_some()
    }

    /// Metrics enabled for the evaluation's task.
    pub fn enabled_metrics(&self) -> &[String] {
        self.task.as_ref().map(|t| t.metrics.as_slice()).unwrap_or(&[])
    }

    /// Human-readable name for reports.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("unnamed evaluation")
    }
}

/// One heatmap cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCell {
    pub x: String,
    pub y: String,
    pub value: f64,
}

impl AggregatedCell {
    pub fn new(x: impl Into<String>, y: impl Into<String>, value: f64) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            value,
        }
    }
}

/// Display label for a heatmap axis key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisLabel {
    pub key: String,
    pub label: String,
}

/// One bubble of the scatter chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndcg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
}

/// One row of the ranked strategy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub strategy_id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub metrics: Keyed<f64>,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
    pub metric: String,
    pub x_group_by: GroupBy,
    pub y_group_by: GroupBy,
    pub sort: SortBy,
    pub evaluations: usize,
}

/// Chart data derived from one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationCharts {
    pub evaluation_id: Option<String>,
    pub evaluation_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Which heatmap algorithm produced `heatmap`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_variant: Option<crate::analysis::HeatmapVariant>,
    pub heatmap: Vec<AggregatedCell>,
    pub x_labels: Vec<AxisLabel>,
    pub y_labels: Vec<AxisLabel>,
    pub scatter: Vec<ScatterPoint>,
    /// Display labels for the scatter point keys.
    #[serde(default)]
    pub scatter_labels: Vec<AxisLabel>,
    pub table: Vec<RankedRow>,
    pub table_sort: crate::analysis::TableSort,
}

impl EvaluationCharts {
    /// True when no chart has anything to show.
    pub fn is_empty(&self) -> bool {
        self.heatmap.is_empty() && self.scatter.is_empty() && self.table.is_empty()
    }
}

/// The complete chart report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub evaluations: Vec<EvaluationCharts>,
}
