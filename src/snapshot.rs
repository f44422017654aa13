use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Metric name to measured value, in source order.
pub type MetricGroup = IndexMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Lighthouse,
    Bundle,
    Memory,
    Database,
    Realtime,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 5] = [
        MetricCategory::Lighthouse,
        MetricCategory::Bundle,
        MetricCategory::Memory,
        MetricCategory::Database,
        MetricCategory::Realtime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricCategory::Lighthouse => "lighthouse",
            MetricCategory::Bundle => "bundle",
            MetricCategory::Memory => "memory",
            MetricCategory::Database => "database",
            MetricCategory::Realtime => "realtime",
        }
    }
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub commit: String,
    pub branch: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub git: Option<GitInfo>,
    /// Device name (`desktop`, `mobile`) to scores and page timings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighthouse: Option<IndexMap<String, MetricGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<MetricGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MetricGroup>,
    /// Average duration per database operation category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<MetricGroup>,
    /// Average duration per realtime operation category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime: Option<MetricGroup>,
}

impl MetricSnapshot {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            git: None,
            lighthouse: None,
            bundle: None,
            memory: None,
            database: None,
            realtime: None,
        }
    }

    /// Metrics for a category as one flat group. Lighthouse entries are keyed
    /// `<device>.<metric>`.
    pub fn metrics(&self, category: MetricCategory) -> Option<MetricGroup> {
        match category {
            MetricCategory::Lighthouse => self.lighthouse.as_ref().map(|devices| {
                devices
                    .iter()
                    .flat_map(|(device, group)| {
                        group
                            .iter()
                            .map(move |(name, value)| (format!("{device}.{name}"), *value))
                    })
                    .collect()
            }),
            MetricCategory::Bundle => self.bundle.clone(),
            MetricCategory::Memory => self.memory.clone(),
            MetricCategory::Database => self.database.clone(),
            MetricCategory::Realtime => self.realtime.clone(),
        }
    }

    pub fn categories(&self) -> Vec<MetricCategory> {
        MetricCategory::ALL
            .into_iter()
            .filter(|category| self.metrics(*category).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(entries: &[(&str, f64)]) -> MetricGroup {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_lighthouse_metrics_are_flattened_by_device() {
        let mut snapshot = MetricSnapshot::empty(Utc::now());
        let mut devices = IndexMap::new();
        devices.insert("desktop".to_string(), group(&[("performance", 92.0)]));
        devices.insert("mobile".to_string(), group(&[("performance", 71.0), ("seo", 100.0)]));
        snapshot.lighthouse = Some(devices);

        let flat = snapshot.metrics(MetricCategory::Lighthouse).unwrap();

        assert_eq!(flat.len(), 3);
        assert_eq!(flat.get("desktop.performance"), Some(&92.0));
        assert_eq!(flat.get("mobile.seo"), Some(&100.0));
        assert_eq!(flat.keys().next().map(String::as_str), Some("desktop.performance"));
    }

    #[test]
    fn test_categories_lists_only_present_groups() {
        let mut snapshot = MetricSnapshot::empty(Utc::now());
        snapshot.bundle = Some(group(&[("totalFirstLoadJS", 180.0)]));
        snapshot.realtime = Some(group(&[("presence", 40.0)]));

        assert_eq!(
            snapshot.categories(),
            vec![MetricCategory::Bundle, MetricCategory::Realtime]
        );
    }

    #[test]
    fn test_snapshot_json_uses_camel_case_and_skips_missing_groups() {
        let mut snapshot = MetricSnapshot::empty(Utc::now());
        snapshot.memory = Some(group(&[("peakHeapMB", 120.0)]));

        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json.get("memory").is_some());
        assert!(json.get("bundle").is_none());
        assert!(json.get("git").unwrap().is_null());
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&MetricCategory::Realtime).unwrap();
        assert_eq!(json, "\"realtime\"");
        assert_eq!(MetricCategory::Lighthouse.to_string(), "lighthouse");
    }
}
