use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::Result;

/// Filesystem-safe timestamp that sorts chronologically as a string.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// Write to a sibling temp file, then rename over the target.
pub async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).await?;
    fs::rename(&temp_path, path).await?;

    Ok(())
}

/// `*.json` files in `dir` whose name starts with `prefix`, sorted by name.
/// A missing directory yields an empty list.
pub async fn list_json_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path.extension().is_some_and(|ext| ext == "json")
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix));

        if matches && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

pub async fn latest_json_file(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(list_json_files(dir, "").await?.pop())
}

/// Keep the newest `keep` files matching `prefix`; failures only warn.
pub async fn prune_history(dir: &Path, prefix: &str, keep: usize) {
    let files = match list_json_files(dir, prefix).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Could not list {} for pruning: {e}", dir.display());
            return;
        }
    };

    let excess = files.len().saturating_sub(keep);
    for path in files.into_iter().take(excess) {
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Pruned {}", path.display()),
            Err(e) => warn!("Failed to prune {}: {e}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_file_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(file_timestamp(at), "2026-03-09T14-05-07-000Z");
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parent_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("current-baseline.json");

        write_atomic(&target, "{\"a\":1}").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"a\":1}");
        assert!(!target.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_latest_json_file_is_lexicographically_last() {
        let dir = TempDir::new().unwrap();
        for name in ["run-2026-01-02.json", "run-2026-01-10.json", "zzz.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let latest = latest_json_file(dir.path()).await.unwrap().unwrap();

        assert_eq!(latest.file_name().unwrap(), "run-2026-01-10.json");
    }

    #[tokio::test]
    async fn test_latest_json_file_missing_dir() {
        let dir = TempDir::new().unwrap();
        let latest = latest_json_file(&dir.path().join("absent")).await.unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_prune_history_keeps_newest() {
        let dir = TempDir::new().unwrap();
        for i in 1..=5 {
            std::fs::write(dir.path().join(format!("baseline-0{i}.json")), "{}").unwrap();
        }
        std::fs::write(dir.path().join("current-baseline.json"), "{}").unwrap();

        prune_history(dir.path(), "baseline-", 2).await;

        let remaining = list_json_files(dir.path(), "baseline-").await.unwrap();
        let names: Vec<_> = remaining
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["baseline-04.json", "baseline-05.json"]);
        assert!(dir.path().join("current-baseline.json").exists());
    }
}
