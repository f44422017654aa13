use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::baseline::{Baseline, BaselineStore};
use crate::config::{
    CategoryThresholds, DetectorConfig, Direction, ThresholdRule, Thresholds, Unit,
};
use crate::error::Result;
use crate::git::collect_git_info;
use crate::report::{Regression, RegressionReport, Severity};
use crate::snapshot::{MetricCategory, MetricGroup, MetricSnapshot};
use crate::sources::artifacts::{parse_numeric_fields, read_latest_artifact};
use crate::sources::lighthouse::parse_lighthouse;
use crate::sources::test_results::{average_by_operation, TestResult};
use crate::sources::TestResultProvider;
use crate::storage::{file_timestamp, prune_history};

const REPORT_PREFIX: &str = "regression-report-";

pub struct RegressionDetector<P> {
    config: DetectorConfig,
    baselines: BaselineStore,
    test_results: P,
}

impl<P: TestResultProvider> RegressionDetector<P> {
    pub fn new(config: DetectorConfig, test_results: P) -> Result<Self> {
        config.validate()?;

        let baselines = BaselineStore::new(config.baselines_dir(), config.max_baseline_history);
        Ok(Self {
            config,
            baselines,
            test_results,
        })
    }

    /// Gather, compare, write the report, then roll the baseline forward when
    /// no critical regression was found.
    pub async fn detect(&self) -> Result<RegressionReport> {
        info!(
            "Starting regression detection in {}",
            self.config.reports_dir.display()
        );

        let current = self.gather_snapshot().await;

        let (baseline, seeded) = match self.baselines.load().await? {
            Some(baseline) => (baseline, false),
            None => {
                info!("No baseline found, seeding from the current snapshot");
                let baseline = Baseline::seed(current.clone());
                if self.config.update_baseline {
                    self.baselines.save(&baseline).await?;
                }
                (baseline, true)
            }
        };

        let regressions = compare_snapshots(&current, &baseline.snapshot, &self.config.thresholds);
        let report = RegressionReport::new(regressions, baseline.reference(), current);

        let report_path = self.write_report(&report).await?;
        info!(
            "Found {} regressions ({} critical), report written to {}",
            report.summary.total,
            report.summary.critical,
            report_path.display()
        );

        if !seeded {
            self.update_baseline_if_safe(&baseline, &report).await?;
        }

        Ok(report)
    }

    /// Missing or unreadable sources leave their category empty; this never fails.
    pub async fn gather_snapshot(&self) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::empty(chrono::Utc::now());

        snapshot.lighthouse = self
            .load_artifact(MetricCategory::Lighthouse, parse_lighthouse)
            .await;
        snapshot.bundle = self
            .load_artifact(MetricCategory::Bundle, parse_numeric_fields)
            .await;
        snapshot.memory = self
            .load_artifact(MetricCategory::Memory, parse_numeric_fields)
            .await;

        snapshot.database = Self::suite_averages(
            MetricCategory::Database,
            self.test_results.database_results().await,
        );
        snapshot.realtime = Self::suite_averages(
            MetricCategory::Realtime,
            self.test_results.realtime_results().await,
        );

        if self.config.collect_git_metadata {
            snapshot.git = collect_git_info(Path::new(".")).await;
        }

        let categories: Vec<_> = snapshot
            .categories()
            .into_iter()
            .map(MetricCategory::as_str)
            .collect();
        info!("Gathered metrics for: [{}]", categories.join(", "));

        snapshot
    }

    async fn load_artifact<T>(
        &self,
        category: MetricCategory,
        parse: fn(&str) -> Result<T>,
    ) -> Option<T> {
        let dir = self.config.source_dir(category);

        let (path, content) = match read_latest_artifact(&dir).await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                warn!("No {category} data found in {}", dir.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read {category} data from {}: {e}", dir.display());
                return None;
            }
        };

        match parse(&content) {
            Ok(parsed) => {
                debug!("Loaded {category} metrics from {}", path.display());
                Some(parsed)
            }
            Err(e) => {
                warn!("Skipping malformed {category} artifact {}: {e}", path.display());
                None
            }
        }
    }

    fn suite_averages(
        category: MetricCategory,
        results: Result<Option<Vec<TestResult>>>,
    ) -> Option<MetricGroup> {
        match results {
            Ok(Some(results)) => {
                let averages = average_by_operation(&results);
                if averages.is_empty() {
                    warn!("No passing {category} test results to average");
                    None
                } else {
                    Some(averages)
                }
            }
            Ok(None) => {
                warn!("No {category} test results available");
                None
            }
            Err(e) => {
                warn!("Failed to load {category} test results: {e}");
                None
            }
        }
    }

    async fn write_report(&self, report: &RegressionReport) -> Result<PathBuf> {
        let dir = self.config.regressions_dir();
        fs::create_dir_all(&dir).await?;

        let path = dir.join(format!(
            "{REPORT_PREFIX}{}.json",
            file_timestamp(report.timestamp)
        ));
        fs::write(&path, serde_json::to_string_pretty(report)?).await?;

        prune_history(&dir, REPORT_PREFIX, self.config.max_report_history).await;

        Ok(path)
    }

    /// Replace the baseline with the report's snapshot unless the report holds
    /// a critical regression. Returns the new baseline when one was written.
    pub async fn update_baseline_if_safe(
        &self,
        baseline: &Baseline,
        report: &RegressionReport,
    ) -> Result<Option<Baseline>> {
        if report.has_critical() {
            warn!(
                "{} critical regressions found, keeping baseline v{}",
                report.summary.critical, baseline.version
            );
            return Ok(None);
        }

        if !self.config.update_baseline {
            info!("Baseline updates disabled, keeping v{}", baseline.version);
            return Ok(None);
        }

        let next = baseline.advance(report.current.clone())?;
        self.baselines.save(&next).await?;
        info!("Baseline updated from v{} to v{}", baseline.version, next.version);

        Ok(Some(next))
    }
}

/// Diff every category present in both snapshots.
pub fn compare_snapshots(
    current: &MetricSnapshot,
    baseline: &MetricSnapshot,
    thresholds: &Thresholds,
) -> Vec<Regression> {
    MetricCategory::ALL
        .into_iter()
        .flat_map(|category| {
            match (current.metrics(category), baseline.metrics(category)) {
                (Some(current_group), Some(baseline_group)) => compare_category(
                    category,
                    &current_group,
                    &baseline_group,
                    thresholds.for_category(category),
                ),
                _ => {
                    debug!("Skipping {category}: missing current or baseline data");
                    Vec::new()
                }
            }
        })
        .collect()
}

/// The absolute threshold decides whether a change is a regression; the
/// percent change only picks its severity.
pub fn compare_category(
    category: MetricCategory,
    current: &MetricGroup,
    baseline: &MetricGroup,
    thresholds: &CategoryThresholds,
) -> Vec<Regression> {
    current
        .iter()
        .filter_map(|(metric, &current_value)| {
            let &baseline_value = baseline.get(metric)?;
            let rule = thresholds.rule_for(rule_key(category, metric));

            if !rule.is_breached(current_value, baseline_value) {
                return None;
            }

            let change = current_value - baseline_value;
            let percent_change = percent_change(change, baseline_value);

            Some(Regression {
                category,
                metric: metric.clone(),
                current: current_value,
                baseline: baseline_value,
                change,
                percent_change,
                severity: Severity::from_percent_change(percent_change),
                description: describe(metric, rule, change.abs(), percent_change.abs()),
            })
        })
        .collect()
}

/// Lighthouse keys are `<device>.<metric>` and share one rule per metric;
/// every other category is looked up by its full key.
fn rule_key(category: MetricCategory, metric: &str) -> &str {
    match category {
        MetricCategory::Lighthouse => metric.split_once('.').map_or(metric, |(_, name)| name),
        _ => metric,
    }
}

/// Signed percent change; a zero baseline reports ±100.
pub fn percent_change(change: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        100.0_f64.copysign(change)
    } else {
        change / baseline * 100.0
    }
}

fn describe(metric: &str, rule: &ThresholdRule, amount: f64, percent: f64) -> String {
    let label = metric.replace('.', " ");

    match (rule.direction, rule.unit) {
        (Direction::LowerIsWorse, Unit::Points) => {
            format!("{label} score decreased by {amount:.1} points ({percent:.1}%)")
        }
        (Direction::LowerIsWorse, unit) => {
            format!("{label} decreased by {} ({percent:.1}%)", format_amount(unit, amount))
        }
        (Direction::HigherIsWorse, unit) => {
            format!("{label} increased by {} ({percent:.1}%)", format_amount(unit, amount))
        }
    }
}

fn format_amount(unit: Unit, amount: f64) -> String {
    match unit {
        Unit::Ratio => format!("{amount:.3}"),
        _ => format!("{amount:.1} {}", unit.suffix()),
    }
}
