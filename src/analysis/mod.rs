//! Evaluation metrics aggregation.
//!
//! Turns an evaluation document into chart-ready data: heatmap cells,
//! scatter points and ranked table rows. Everything here is a pure
//! function of its inputs.

pub mod color;
pub mod grouping;
pub mod heatmap;
pub mod scatter;
pub mod table;

pub use color::{ColorBand, ColorScale};
pub use heatmap::{axis_labels, build_heatmap_matrix, select_variant, HeatmapConfig, HeatmapVariant};
pub use scatter::{build_scatter_series, scatter_labels};
pub use table::{build_ranked_table, resolve_table_sort, sort_ranked_rows, TableSort, TableSortKey};
