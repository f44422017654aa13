use log::debug;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{PerfWatchError, Result};
use crate::snapshot::MetricGroup;
use crate::storage::latest_json_file;

/// Newest artifact in a tool's output directory, with its contents.
pub async fn read_latest_artifact(dir: &Path) -> Result<Option<(PathBuf, String)>> {
    let Some(path) = latest_json_file(dir).await? else {
        debug!("No artifacts in {}", dir.display());
        return Ok(None);
    };

    let content = fs::read_to_string(&path).await?;
    Ok(Some((path, content)))
}

/// Every numeric top-level field of a JSON object becomes a metric. Used for
/// bundle-analyzer and memory-profiler summaries.
pub fn parse_numeric_fields(content: &str) -> Result<MetricGroup> {
    let value: Value = serde_json::from_str(content)?;

    let Value::Object(fields) = value else {
        return Err(PerfWatchError::Source(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    let metrics: MetricGroup = fields
        .into_iter()
        .filter_map(|(name, value)| value.as_f64().map(|number| (name, number)))
        .collect();

    if metrics.is_empty() {
        return Err(PerfWatchError::Source(
            "artifact contains no numeric metrics".to_string(),
        ));
    }

    Ok(metrics)
}
