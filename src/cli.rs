use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use perfwatch::baseline::{Baseline, BaselineStore};
use perfwatch::config::{DetectorConfig, Thresholds, DEFAULT_REPORTS_DIR};
use perfwatch::detector::{compare_snapshots, RegressionDetector};
use perfwatch::report::{BaselineRef, RegressionReport};
use perfwatch::snapshot::MetricSnapshot;
use perfwatch::sources::FileTestResults;

#[derive(Parser)]
#[command(name = "perfwatch")]
#[command(author, version, about = "Performance Regression Detector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the JSON result to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the latest metrics against the stored baseline
    Detect {
        /// Directory holding lighthouse/, bundle/, memory/ and baselines/
        #[arg(short, long, env = "PERFWATCH_REPORTS_DIR", default_value = DEFAULT_REPORTS_DIR)]
        reports_dir: PathBuf,

        /// JSON array of database test results ({testName, duration, passed})
        #[arg(long)]
        database_results: Option<PathBuf>,

        /// JSON array of realtime test results ({testName, duration, passed})
        #[arg(long)]
        realtime_results: Option<PathBuf>,

        /// Never write or advance the baseline
        #[arg(long, default_value_t = false)]
        no_baseline_update: bool,

        /// Skip collecting commit, branch and author
        #[arg(long, default_value_t = false)]
        no_git: bool,
    },
    /// Diff two snapshot (or baseline) files without touching any stored state
    Compare {
        /// Snapshot with the new measurements
        #[arg(short, long)]
        current: PathBuf,

        /// Snapshot or baseline file to compare against
        #[arg(short, long)]
        baseline: PathBuf,
    },
    /// Show the current baseline
    Baseline {
        #[arg(short, long, env = "PERFWATCH_REPORTS_DIR", default_value = DEFAULT_REPORTS_DIR)]
        reports_dir: PathBuf,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<ExitCode> {
        match &self.command {
            Commands::Detect {
                reports_dir,
                database_results,
                realtime_results,
                no_baseline_update,
                no_git,
            } => {
                info!("Detecting regressions in: {}", reports_dir.display());

                let config = DetectorConfig {
                    update_baseline: !no_baseline_update,
                    collect_git_metadata: !no_git,
                    ..DetectorConfig::new(reports_dir.clone())
                };
                let test_results = FileTestResults {
                    database: database_results.clone(),
                    realtime: realtime_results.clone(),
                };

                let report = RegressionDetector::new(config, test_results)?
                    .detect()
                    .await?;
                self.finish(&report).await
            }
            Commands::Compare { current, baseline } => {
                let current_snapshot = read_snapshot(current).await?.1;
                let (baseline_ref, baseline_snapshot) = read_snapshot(baseline).await?;

                let regressions =
                    compare_snapshots(&current_snapshot, &baseline_snapshot, &Thresholds::default());
                let report = RegressionReport::new(regressions, baseline_ref, current_snapshot);
                self.finish(&report).await
            }
            Commands::Baseline { reports_dir } => {
                let config = DetectorConfig::new(reports_dir.clone());
                let store = BaselineStore::new(config.baselines_dir(), config.max_baseline_history);

                let Some(baseline) = store.load().await? else {
                    println!("No baseline recorded in {}", store.current_path().display());
                    return Ok(ExitCode::SUCCESS);
                };

                let json_output = self.to_json(&baseline)?;
                if let Some(output_path) = &self.output {
                    tokio::fs::write(output_path, json_output).await?;
                    info!("Baseline written to: {}", output_path.display());
                } else {
                    println!("{json_output}");
                }

                Ok(ExitCode::SUCCESS)
            }
        }
    }

    /// Summary on stderr; JSON to `--output` or stdout.
    async fn finish(&self, report: &RegressionReport) -> Result<ExitCode> {
        eprint!("{report}");

        let json_output = self.to_json(report)?;
        if let Some(output_path) = &self.output {
            tokio::fs::write(output_path, json_output)
                .await
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Report written to: {}", output_path.display());
        } else {
            println!("{json_output}");
        }

        if report.should_fail_build() {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json_output)
    }
}

/// Accepts either a stored baseline or a bare snapshot.
async fn read_snapshot(path: &Path) -> Result<(BaselineRef, MetricSnapshot)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(baseline) = serde_json::from_str::<Baseline>(&content) {
        return Ok((baseline.reference(), baseline.snapshot));
    }

    let snapshot: MetricSnapshot = serde_json::from_str(&content)
        .with_context(|| format!("{} is neither a baseline nor a snapshot", path.display()))?;
    let reference = BaselineRef {
        version: "unversioned".to_string(),
        timestamp: snapshot.timestamp,
    };

    Ok((reference, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_detect_defaults() {
        let cli = Cli::try_parse_from(["perfwatch", "detect"]).unwrap();

        let Commands::Detect {
            reports_dir,
            no_baseline_update,
            ..
        } = cli.command
        else {
            panic!("expected detect command");
        };
        assert_eq!(reports_dir, PathBuf::from(DEFAULT_REPORTS_DIR));
        assert!(!no_baseline_update);
    }

    #[test]
    fn test_compare_requires_both_files() {
        assert!(Cli::try_parse_from(["perfwatch", "compare", "--current", "a.json"]).is_err());
        assert!(Cli::try_parse_from([
            "perfwatch",
            "compare",
            "--current",
            "a.json",
            "--baseline",
            "b.json"
        ])
        .is_ok());
    }

    #[tokio::test]
    async fn test_read_snapshot_accepts_baseline_and_bare_snapshot() {
        let dir = TempDir::new().unwrap();

        let baseline = Baseline::seed(MetricSnapshot::empty(Utc::now()));
        let baseline_path = dir.path().join("current-baseline.json");
        std::fs::write(&baseline_path, serde_json::to_string(&baseline).unwrap()).unwrap();

        let snapshot_path = dir.path().join("snapshot.json");
        std::fs::write(
            &snapshot_path,
            serde_json::to_string(&MetricSnapshot::empty(Utc::now())).unwrap(),
        )
        .unwrap();

        let (reference, _) = read_snapshot(&baseline_path).await.unwrap();
        assert_eq!(reference.version, "1.0.0");

        let (reference, _) = read_snapshot(&snapshot_path).await.unwrap();
        assert_eq!(reference.version, "unversioned");
    }

    #[tokio::test]
    async fn test_compare_writes_json_report_to_output() {
        let dir = TempDir::new().unwrap();

        let mut baseline = MetricSnapshot::empty(Utc::now());
        baseline.bundle = Some([("totalFirstLoadJS".to_string(), 180.0)].into_iter().collect());
        let mut current = baseline.clone();
        current.bundle = Some([("totalFirstLoadJS".to_string(), 195.0)].into_iter().collect());

        let baseline_path = dir.path().join("baseline.json");
        let current_path = dir.path().join("current.json");
        let output_path = dir.path().join("report.json");
        std::fs::write(&baseline_path, serde_json::to_string(&baseline).unwrap()).unwrap();
        std::fs::write(&current_path, serde_json::to_string(&current).unwrap()).unwrap();

        let cli = Cli::try_parse_from([
            "perfwatch",
            "compare",
            "--current",
            current_path.to_str().unwrap(),
            "--baseline",
            baseline_path.to_str().unwrap(),
            "--output",
            output_path.to_str().unwrap(),
        ])
        .unwrap();

        let code = cli.execute().await.unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
        assert_eq!(report["summary"]["total"], 1);
        assert_eq!(report["regressions"][0]["metric"], "totalFirstLoadJS");
        assert_eq!(report["baseline"]["version"], "unversioned");
    }

    #[tokio::test]
    async fn test_read_snapshot_rejects_other_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, r#"{"hello": "world"}"#).unwrap();

        assert!(read_snapshot(&path).await.is_err());
    }
}
