use std::path::PathBuf;

use crate::error::{PerfWatchError, Result};
use crate::snapshot::MetricCategory;

pub const DEFAULT_REPORTS_DIR: &str = "performance-reports";
pub const BASELINES_DIR: &str = "baselines";
pub const REGRESSIONS_DIR: &str = "regressions";
pub const CURRENT_BASELINE_FILE: &str = "current-baseline.json";

/// Percent-change cutoffs for severity tiers, checked from the top down.
pub const CRITICAL_PERCENT: f64 = 15.0;
pub const HIGH_PERCENT: f64 = 10.0;
pub const MEDIUM_PERCENT: f64 = 5.0;
pub const LOW_PERCENT: f64 = 2.0;

pub const MAX_BASELINE_HISTORY: usize = 10;
pub const MAX_REPORT_HISTORY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Points,
    Milliseconds,
    Kilobytes,
    Megabytes,
    Ratio,
}

impl Unit {
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Points => "points",
            Unit::Milliseconds => "ms",
            Unit::Kilobytes => "KB",
            Unit::Megabytes => "MB",
            Unit::Ratio => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRule {
    pub threshold: f64,
    pub direction: Direction,
    pub unit: Unit,
}

impl ThresholdRule {
    pub const fn higher_is_worse(threshold: f64, unit: Unit) -> Self {
        Self {
            threshold,
            direction: Direction::HigherIsWorse,
            unit,
        }
    }

    pub const fn lower_is_worse(threshold: f64, unit: Unit) -> Self {
        Self {
            threshold,
            direction: Direction::LowerIsWorse,
            unit,
        }
    }

    /// How much worse `current` is than `baseline`; negative means improvement.
    pub fn worsening(&self, current: f64, baseline: f64) -> f64 {
        match self.direction {
            Direction::HigherIsWorse => current - baseline,
            Direction::LowerIsWorse => baseline - current,
        }
    }

    pub fn is_breached(&self, current: f64, baseline: f64) -> bool {
        self.worsening(current, baseline) > self.threshold
    }
}

#[derive(Debug, Clone)]
pub struct CategoryThresholds {
    pub default: ThresholdRule,
    pub overrides: Vec<(&'static str, ThresholdRule)>,
}

impl CategoryThresholds {
    pub fn uniform(default: ThresholdRule) -> Self {
        Self {
            default,
            overrides: Vec::new(),
        }
    }

    /// Exact-name lookup; callers strip the Lighthouse `<device>.` prefix.
    pub fn rule_for(&self, metric: &str) -> &ThresholdRule {
        self.overrides
            .iter()
            .find(|(key, _)| *key == metric)
            .map_or(&self.default, |(_, rule)| rule)
    }
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub lighthouse: CategoryThresholds,
    pub bundle: CategoryThresholds,
    pub memory: CategoryThresholds,
    pub database: CategoryThresholds,
    pub realtime: CategoryThresholds,
}

impl Thresholds {
    pub fn for_category(&self, category: MetricCategory) -> &CategoryThresholds {
        match category {
            MetricCategory::Lighthouse => &self.lighthouse,
            MetricCategory::Bundle => &self.bundle,
            MetricCategory::Memory => &self.memory,
            MetricCategory::Database => &self.database,
            MetricCategory::Realtime => &self.realtime,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        let page_timing = ThresholdRule::higher_is_worse(200.0, Unit::Milliseconds);

        Self {
            lighthouse: CategoryThresholds {
                default: ThresholdRule::lower_is_worse(5.0, Unit::Points),
                overrides: vec![
                    ("firstContentfulPaint", page_timing),
                    ("largestContentfulPaint", page_timing),
                    ("speedIndex", page_timing),
                    (
                        "totalBlockingTime",
                        ThresholdRule::higher_is_worse(50.0, Unit::Milliseconds),
                    ),
                    (
                        "cumulativeLayoutShift",
                        ThresholdRule::higher_is_worse(0.05, Unit::Ratio),
                    ),
                ],
            },
            bundle: CategoryThresholds {
                default: ThresholdRule::higher_is_worse(10.0, Unit::Kilobytes),
                overrides: vec![(
                    "totalBundleSize",
                    ThresholdRule::higher_is_worse(50.0, Unit::Kilobytes),
                )],
            },
            memory: CategoryThresholds {
                default: ThresholdRule::higher_is_worse(10.0, Unit::Megabytes),
                overrides: vec![(
                    "heapGrowthMB",
                    ThresholdRule::higher_is_worse(5.0, Unit::Megabytes),
                )],
            },
            database: CategoryThresholds::uniform(ThresholdRule::higher_is_worse(
                50.0,
                Unit::Milliseconds,
            )),
            realtime: CategoryThresholds::uniform(ThresholdRule::higher_is_worse(
                100.0,
                Unit::Milliseconds,
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub reports_dir: PathBuf,
    pub thresholds: Thresholds,
    pub max_baseline_history: usize,
    pub max_report_history: usize,
    pub update_baseline: bool,
    pub collect_git_metadata: bool,
}

impl DetectorConfig {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            ..Self::default()
        }
    }

    pub fn source_dir(&self, category: MetricCategory) -> PathBuf {
        self.reports_dir.join(category.as_str())
    }

    pub fn baselines_dir(&self) -> PathBuf {
        self.reports_dir.join(BASELINES_DIR)
    }

    pub fn regressions_dir(&self) -> PathBuf {
        self.reports_dir.join(REGRESSIONS_DIR)
    }

    pub fn validate(&self) -> Result<()> {
        if self.reports_dir.as_os_str().is_empty() {
            return Err(PerfWatchError::Config(
                "reports directory must not be empty".to_string(),
            ));
        }

        if self.max_baseline_history == 0 || self.max_report_history == 0 {
            return Err(PerfWatchError::Config(
                "history retention must keep at least one file".to_string(),
            ));
        }

        for category in MetricCategory::ALL {
            let thresholds = self.thresholds.for_category(category);
            let negative = std::iter::once(&thresholds.default)
                .chain(thresholds.overrides.iter().map(|(_, rule)| rule))
                .any(|rule| rule.threshold.is_nan() || rule.threshold < 0.0);
            if negative {
                return Err(PerfWatchError::Config(format!(
                    "{category} thresholds must be non-negative numbers"
                )));
            }
        }

        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            thresholds: Thresholds::default(),
            max_baseline_history: MAX_BASELINE_HISTORY,
            max_report_history: MAX_REPORT_HISTORY,
            update_baseline: true,
            collect_git_metadata: true,
        }
    }
}
