use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{PerfWatchError, Result};
use crate::snapshot::MetricGroup;

#[derive(Debug, Deserialize)]
struct DeviceResult {
    #[serde(default)]
    scores: IndexMap<String, Option<f64>>,
    #[serde(default)]
    metrics: IndexMap<String, Option<f64>>,
}

/// Parse a Lighthouse runner summary (`device -> { scores, metrics }`) into
/// per-device metric groups; null entries are dropped.
///
/// The score scale is decided once for the whole artifact: scores are read as
/// 0-1 fractions and scaled to points only when every score lies in `0..=1`
/// and at least one of them is fractional. Anything else is taken as points.
pub fn parse_lighthouse(content: &str) -> Result<IndexMap<String, MetricGroup>> {
    let devices: IndexMap<String, DeviceResult> = serde_json::from_str(content)?;

    if let Some(device) = devices.keys().find(|device| device.contains('.')) {
        return Err(PerfWatchError::Source(format!(
            "lighthouse device name '{device}' must not contain '.'"
        )));
    }

    let scale = if uses_fraction_scale(&devices) {
        100.0
    } else {
        1.0
    };

    let parsed: IndexMap<String, MetricGroup> = devices
        .into_iter()
        .map(|(device, result)| {
            let scores = result
                .scores
                .into_iter()
                .filter_map(|(name, score)| score.map(|s| (name, s * scale)));
            let timings = result
                .metrics
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name, v)));

            (device, scores.chain(timings).collect::<MetricGroup>())
        })
        .filter(|(_, group)| !group.is_empty())
        .collect();

    if parsed.is_empty() {
        return Err(PerfWatchError::Source(
            "lighthouse artifact contains no device results".to_string(),
        ));
    }

    Ok(parsed)
}

fn uses_fraction_scale(devices: &IndexMap<String, DeviceResult>) -> bool {
    let mut scores = devices
        .values()
        .flat_map(|result| result.scores.values().flatten().copied())
        .peekable();

    if scores.peek().is_none() {
        return false;
    }

    let mut any_fractional = false;
    for score in scores {
        if !(0.0..=1.0).contains(&score) {
            return false;
        }
        any_fractional |= score.fract() != 0.0;
    }

    any_fractional
}
