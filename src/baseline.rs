use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::fs;

use crate::config::CURRENT_BASELINE_FILE;
use crate::error::{PerfWatchError, Result};
use crate::report::BaselineRef;
use crate::snapshot::MetricSnapshot;
use crate::storage::{file_timestamp, prune_history, write_atomic};

const ARCHIVE_PREFIX: &str = "baseline-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaselineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl BaselineVersion {
    pub const INITIAL: BaselineVersion = BaselineVersion {
        major: 1,
        minor: 0,
        patch: 0,
    };

    pub fn bump_patch(self) -> Result<Self> {
        let patch = self.patch.checked_add(1).ok_or_else(|| {
            PerfWatchError::Baseline(format!("baseline version {self} cannot be bumped further"))
        })?;

        Ok(Self { patch, ..self })
    }
}

impl fmt::Display for BaselineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for BaselineVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(format!("expected major.minor.patch, got '{s}'"));
        };

        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|e| format!("invalid version component '{part}' in '{s}': {e}"))
        };

        Ok(Self {
            major: parse(*major)?,
            minor: parse(*minor)?,
            patch: parse(*patch)?,
        })
    }
}

impl TryFrom<String> for BaselineVersion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BaselineVersion> for String {
    fn from(version: BaselineVersion) -> Self {
        version.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub version: BaselineVersion,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub snapshot: MetricSnapshot,
}

impl Baseline {
    pub fn seed(snapshot: MetricSnapshot) -> Self {
        let now = Utc::now();
        Self {
            version: BaselineVersion::INITIAL,
            created_at: now,
            updated_at: now,
            snapshot,
        }
    }

    /// Full replacement by `snapshot`; never a merge with the old metrics.
    pub fn advance(&self, snapshot: MetricSnapshot) -> Result<Self> {
        Ok(Self {
            version: self.version.bump_patch()?,
            created_at: self.created_at,
            updated_at: Utc::now(),
            snapshot,
        })
    }

    pub fn reference(&self) -> BaselineRef {
        BaselineRef {
            version: self.version.to_string(),
            timestamp: self.updated_at,
        }
    }
}

pub struct BaselineStore {
    dir: PathBuf,
    max_history: usize,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>, max_history: usize) -> Self {
        Self {
            dir: dir.into(),
            max_history,
        }
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_BASELINE_FILE)
    }

    /// `None` when no baseline has been recorded yet. A file that exists but
    /// cannot be parsed is an error so it is never silently replaced.
    pub async fn load(&self) -> Result<Option<Baseline>> {
        let path = self.current_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let baseline = serde_json::from_str(&content).map_err(|e| {
            PerfWatchError::Baseline(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(Some(baseline))
    }

    pub async fn save(&self, baseline: &Baseline) -> Result<()> {
        let content = serde_json::to_string_pretty(baseline)?;

        write_atomic(&self.current_path(), &content).await?;

        let archive = self.archive_path(baseline.updated_at);
        fs::write(&archive, &content).await?;
        info!(
            "Baseline v{} saved to {} (archived as {})",
            baseline.version,
            self.current_path().display(),
            archive.display()
        );

        prune_history(&self.dir, ARCHIVE_PREFIX, self.max_history).await;

        Ok(())
    }

    fn archive_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{ARCHIVE_PREFIX}{}.json", file_timestamp(at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_round_trips_through_string() {
        let version: BaselineVersion = "1.2.3".parse().unwrap();

        assert_eq!(version.major, 1);
        assert_eq!(version.patch, 3);
        assert_eq!(version.to_string(), "1.2.3");
    }

    #[test]
    fn test_version_rejects_malformed_input() {
        assert!("1.2".parse::<BaselineVersion>().is_err());
        assert!("1.2.x".parse::<BaselineVersion>().is_err());
        assert!("".parse::<BaselineVersion>().is_err());
    }

    #[test]
    fn test_bump_patch_only_touches_patch() {
        let version: BaselineVersion = "2.4.9".parse().unwrap();
        assert_eq!(version.bump_patch().unwrap().to_string(), "2.4.10");
    }

    #[test]
    fn test_bump_patch_at_limit_is_baseline_error() {
        let version: BaselineVersion = format!("1.0.{}", u32::MAX).parse().unwrap();

        let err = version.bump_patch().unwrap_err();

        assert!(matches!(err, PerfWatchError::Baseline(_)));
    }

    #[test]
    fn test_advance_keeps_creation_time_and_replaces_snapshot() {
        let seeded = Baseline::seed(MetricSnapshot::empty(Utc::now()));
        let mut next_snapshot = MetricSnapshot::empty(Utc::now());
        next_snapshot.bundle = Some([("totalFirstLoadJS".to_string(), 190.0)].into_iter().collect());

        let advanced = seeded.advance(next_snapshot.clone()).unwrap();

        assert_eq!(advanced.version.to_string(), "1.0.1");
        assert_eq!(advanced.created_at, seeded.created_at);
        assert_eq!(advanced.snapshot, next_snapshot);
    }

    #[test]
    fn test_version_serializes_as_string() {
        let baseline = Baseline::seed(MetricSnapshot::empty(Utc::now()));
        let json = serde_json::to_value(&baseline).unwrap();

        assert_eq!(json["version"], "1.0.0");
        assert!(json.get("createdAt").is_some());
    }

    #[tokio::test]
    async fn test_load_missing_baseline_is_none() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path(), 10);

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_malformed_baseline_is_error() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path(), 10);
        std::fs::write(store.current_path(), "{ not json").unwrap();

        let err = store.load().await.unwrap_err();

        assert!(matches!(err, PerfWatchError::Baseline(_)));
    }

    #[tokio::test]
    async fn test_save_writes_current_and_archive() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path().join("baselines"), 10);
        let baseline = Baseline::seed(MetricSnapshot::empty(Utc::now()));

        store.save(&baseline).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, baseline);

        let archives: Vec<_> = std::fs::read_dir(dir.path().join("baselines"))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("baseline-"))
            .collect();
        assert_eq!(archives.len(), 1);
    }
}
