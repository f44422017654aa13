use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{PerfWatchError, Result};
use crate::snapshot::MetricGroup;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_name: String,
    /// Milliseconds.
    pub duration: f64,
    pub passed: bool,
}

impl TestResult {
    pub fn new(test_name: &str, duration: f64, passed: bool) -> Self {
        Self {
            test_name: test_name.to_string(),
            duration,
            passed,
        }
    }
}

/// Supplies database and realtime suite results gathered by the caller.
/// `Ok(None)` means the suite did not run.
#[async_trait]
pub trait TestResultProvider: Send + Sync {
    async fn database_results(&self) -> Result<Option<Vec<TestResult>>>;

    async fn realtime_results(&self) -> Result<Option<Vec<TestResult>>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTestResults {
    pub database: Option<Vec<TestResult>>,
    pub realtime: Option<Vec<TestResult>>,
}

impl StaticTestResults {
    #[must_use]
    pub fn with_database(mut self, results: Vec<TestResult>) -> Self {
        self.database = Some(results);
        self
    }

    #[must_use]
    pub fn with_realtime(mut self, results: Vec<TestResult>) -> Self {
        self.realtime = Some(results);
        self
    }
}

#[async_trait]
impl TestResultProvider for StaticTestResults {
    async fn database_results(&self) -> Result<Option<Vec<TestResult>>> {
        Ok(self.database.clone())
    }

    async fn realtime_results(&self) -> Result<Option<Vec<TestResult>>> {
        Ok(self.realtime.clone())
    }
}

/// Reads each suite's results from a JSON array written by the test runner.
#[derive(Debug, Clone, Default)]
pub struct FileTestResults {
    pub database: Option<PathBuf>,
    pub realtime: Option<PathBuf>,
}

impl FileTestResults {
    async fn read(path: Option<&Path>) -> Result<Option<Vec<TestResult>>> {
        let Some(path) = path else {
            return Ok(None);
        };

        let content = fs::read_to_string(path).await.map_err(|e| {
            PerfWatchError::Source(format!("Failed to read {}: {e}", path.display()))
        })?;

        let results = serde_json::from_str(&content).map_err(|e| {
            PerfWatchError::Source(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(Some(results))
    }
}

#[async_trait]
impl TestResultProvider for FileTestResults {
    async fn database_results(&self) -> Result<Option<Vec<TestResult>>> {
        Self::read(self.database.as_deref()).await
    }

    async fn realtime_results(&self) -> Result<Option<Vec<TestResult>>> {
        Self::read(self.realtime.as_deref()).await
    }
}

/// `"query: list users"` belongs to the `query` operation category.
pub fn operation_category(test_name: &str) -> &str {
    match test_name.split_once(':') {
        Some((prefix, _)) if !prefix.trim().is_empty() => prefix.trim(),
        _ => test_name.trim(),
    }
}

/// Average duration of passing tests per operation category, in first-seen
/// order. Failed runs carry no meaningful timing and are left out.
pub fn average_by_operation(results: &[TestResult]) -> MetricGroup {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();

    for result in results.iter().filter(|r| r.passed) {
        let category = operation_category(&result.test_name);
        let entry = totals.entry(category).or_insert_with(|| {
            order.push(category);
            (0.0, 0)
        });
        entry.0 += result.duration;
        entry.1 += 1;
    }

    order
        .into_iter()
        .filter_map(|category| {
            let (sum, count) = totals.get(category)?;
            #[allow(clippy::cast_precision_loss)]
            let average = sum / *count as f64;
            Some((category.to_string(), average))
        })
        .collect()
}
