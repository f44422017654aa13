use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{CRITICAL_PERCENT, HIGH_PERCENT, LOW_PERCENT, MEDIUM_PERCENT};
use crate::snapshot::{GitInfo, MetricCategory, MetricSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Tier for a percent change; only the magnitude matters.
    pub fn from_percent_change(percent_change: f64) -> Self {
        let magnitude = percent_change.abs();

        if magnitude >= CRITICAL_PERCENT {
            Severity::Critical
        } else if magnitude >= HIGH_PERCENT {
            Severity::High
        } else if magnitude >= MEDIUM_PERCENT {
            Severity::Medium
        } else if magnitude >= LOW_PERCENT {
            Severity::Low
        } else {
            Severity::Minimal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Minimal => "minimal",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regression {
    pub category: MetricCategory,
    pub metric: String,
    pub current: f64,
    pub baseline: f64,
    pub change: f64,
    pub percent_change: f64,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeveritySummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub minimal: usize,
}

impl SeveritySummary {
    pub fn from_regressions(regressions: &[Regression]) -> Self {
        regressions
            .iter()
            .fold(Self::default(), |mut summary, regression| {
                summary.total += 1;
                match regression.severity {
                    Severity::Critical => summary.critical += 1,
                    Severity::High => summary.high += 1,
                    Severity::Medium => summary.medium += 1,
                    Severity::Low => summary.low += 1,
                    Severity::Minimal => summary.minimal += 1,
                }
                summary
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineRef {
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionReport {
    pub timestamp: DateTime<Utc>,
    pub git: Option<GitInfo>,
    pub summary: SeveritySummary,
    pub regressions: Vec<Regression>,
    pub baseline: BaselineRef,
    pub current: MetricSnapshot,
}

impl RegressionReport {
    pub fn new(regressions: Vec<Regression>, baseline: BaselineRef, current: MetricSnapshot) -> Self {
        Self {
            timestamp: Utc::now(),
            git: current.git.clone(),
            summary: SeveritySummary::from_regressions(&regressions),
            regressions,
            baseline,
            current,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.summary.critical > 0
    }

    /// CI gate: a single critical regression fails the build.
    pub fn should_fail_build(&self) -> bool {
        self.has_critical()
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Regression> {
        self.regressions
            .iter()
            .filter(move |regression| regression.severity == severity)
    }
}

impl fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance regression report ({})", self.timestamp.to_rfc3339())?;
        writeln!(
            f,
            "  Baseline: v{} ({})",
            self.baseline.version,
            self.baseline.timestamp.to_rfc3339()
        )?;
        if let Some(git) = &self.git {
            writeln!(f, "  Commit:   {} on {} by {}", git.commit, git.branch, git.author)?;
        }

        if self.regressions.is_empty() {
            return writeln!(f, "  No regressions detected.");
        }

        let summary = &self.summary;
        writeln!(
            f,
            "  Regressions: {} (critical: {}, high: {}, medium: {}, low: {}, minimal: {})",
            summary.total,
            summary.critical,
            summary.high,
            summary.medium,
            summary.low,
            summary.minimal
        )?;

        for severity in [Severity::Critical, Severity::High] {
            for regression in self.with_severity(severity) {
                writeln!(
                    f,
                    "  [{}] {}: {}",
                    severity.as_str().to_uppercase(),
                    regression.category,
                    regression.description
                )?;
            }
        }

        Ok(())
    }
}
