//! Loading evaluation documents from disk.

use super::error::SourceError;
use crate::models::Evaluation;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Load an evaluation document from a JSON file.
pub fn load_from_file(path: &Path) -> Result<Evaluation, SourceError> {
    debug!("Reading evaluation from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_document(&content, &path.display().to_string())
}

/// Parse an evaluation document, unwrapping a `{"_id", "_source"}` envelope.
///
/// Documents served by the backend's document store come wrapped; the
/// envelope id is used when the inner document carries none.
pub fn parse_document(content: &str, origin: &str) -> Result<Evaluation, SourceError> {
    let parse_err = |source| SourceError::Parse {
        origin: origin.to_string(),
        source,
    };

    let mut value: Value = serde_json::from_str(content).map_err(parse_err)?;

    let envelope_id = value.get("_id").and_then(Value::as_str).map(String::from);
    if let Some(inner) = value.get_mut("_source").map(Value::take) {
        debug!("Unwrapping document envelope from {}", origin);
        value = inner;
    }

    let mut evaluation: Evaluation = serde_json::from_value(value).map_err(parse_err)?;
    if evaluation.id.is_none() {
        evaluation.id = envelope_id;
    }

    Ok(evaluation)
}
